use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScopeId(usize);

/// A chain of lexical scopes, stored as an arena of scope records that point
/// to their parent by index.
///
/// Scopes nest strictly, so leaving a scope discards it along with every
/// scope created after it.
#[derive(Debug)]
pub struct Scopes<T> {
    scopes: Vec<Scope<T>>,
}

#[derive(Debug)]
struct Scope<T> {
    names: HashMap<Box<str>, T>,
    parent: Option<ScopeId>,
}

impl<T> Scopes<T> {
    /// Creates a chain holding only the root scope.
    pub fn new() -> Scopes<T> {
        Scopes {
            scopes: vec![Scope {
                names: HashMap::new(),
                parent: None,
            }],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn enter(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            names: HashMap::new(),
            parent: Some(parent),
        });
        id
    }

    pub fn leave(&mut self, id: ScopeId) {
        debug_assert!(id.0 > 0, "can't leave the root scope");
        self.scopes.truncate(id.0);
    }

    /// Binds `name` in the given scope.
    ///
    /// Fails, returning the value back, if the name is already bound in that
    /// same scope. Bindings in enclosing scopes may be shadowed.
    pub fn define(&mut self, scope: ScopeId, name: &str, value: T) -> Result<(), T> {
        let names = &mut self.scopes[scope.0].names;
        if names.contains_key(name) {
            return Err(value);
        }
        names.insert(name.into(), value);
        Ok(())
    }

    /// Looks `name` up, walking the chain outwards. Also returns the scope
    /// where the name was found.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, &T)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if let Some(value) = scope.names.get(name) {
                return Some((id, value));
            }
            current = scope.parent;
        }
        None
    }
}

impl<T> Default for Scopes<T> {
    fn default() -> Self {
        Scopes::new()
    }
}
