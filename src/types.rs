use std::{fmt, rc::Rc};

/// A resolved type. Types are values, compared structurally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Bool,
    Int,
    String,
    Void,
    /// Wildcard compatible with every type, used by the polymorphic
    /// built-ins and by empty collection literals.
    Any,
    List(Rc<Type>),
    Map(Rc<Type>, Rc<Type>),
    Function(Rc<FunctionType>),
    Struct(Rc<StructType>),
    Enum(Rc<EnumType>),
    /// The type of a type name used in value position, such as the callee of
    /// a struct construction (`Point(x: 1)`) or the base of an enum case
    /// (`Shape.Empty`).
    Meta(Rc<Type>),
}

impl Type {
    pub fn list(item: Type) -> Type {
        Type::List(Rc::new(item))
    }

    pub fn map(key: Type, value: Type) -> Type {
        Type::Map(Rc::new(key), Rc::new(value))
    }

    pub fn meta(ty: Type) -> Type {
        Type::Meta(Rc::new(ty))
    }

    /// Checks whether a value of type `actual` may be used where `self` is
    /// expected. There is no implicit conversion: besides the `any` wildcard
    /// (on either side), types must have the same shape.
    pub fn is_compatible_with(&self, actual: &Type) -> bool {
        use Type::*;
        match (self, actual) {
            (Any, _) | (_, Any) => true,
            (List(a), List(b)) | (Meta(a), Meta(b)) => a.is_compatible_with(b),
            (Map(ka, va), Map(kb, vb)) => ka.is_compatible_with(kb) && va.is_compatible_with(vb),
            (Function(a), Function(b)) => {
                a.params.len() == b.params.len()
                    && a.ret.is_compatible_with(&b.ret)
                    && a.params
                        .iter()
                        .zip(&b.params)
                        .all(|(a, b)| a.is_compatible_with(b))
            }
            (Struct(a), Struct(b)) => {
                a.name == b.name
                    && a.fields.len() == b.fields.len()
                    && a.fields
                        .iter()
                        .zip(&b.fields)
                        .all(|((na, ta), (nb, tb))| na == nb && ta.is_compatible_with(tb))
            }
            (a, b) => a == b,
        }
    }

    /// Returns the type shared by two compatible values, preferring the more
    /// specific side when one of them is a wildcard.
    pub fn unify(&self, other: &Type) -> Option<Type> {
        if !self.is_compatible_with(other) {
            return None;
        }
        match self {
            Type::Any => Some(other.clone()),
            _ => Some(self.clone()),
        }
    }

    /// Resolves one of the atomic type names.
    pub fn atomic(name: &str) -> Option<Type> {
        let ty = match name {
            "bool" => Type::Bool,
            "int" => Type::Int,
            "string" => Type::String,
            "void" => Type::Void,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => f.write_str("bool"),
            Type::Int => f.write_str("int"),
            Type::String => f.write_str("string"),
            Type::Void => f.write_str("void"),
            Type::Any => f.write_str("any"),
            Type::List(item) => write!(f, "list<{item}>"),
            Type::Map(key, value) => write!(f, "map<{key}, {value}>"),
            Type::Function(function) => {
                f.write_str("fn(")?;
                for (i, param) in function.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") -> {}", function.ret)
            }
            Type::Struct(s) => f.write_str(&s.name),
            Type::Enum(e) => f.write_str(&e.name),
            Type::Meta(ty) => write!(f, "type {ty}"),
        }
    }
}

#[derive(Clone, Debug, Eq)]
pub struct FunctionType {
    pub params: Vec<Type>,
    /// Parameter names, used to bind keyword arguments. Not part of the
    /// function's type identity.
    pub labels: Vec<Option<Box<str>>>,
    pub ret: Type,
}

impl PartialEq for FunctionType {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && self.ret == other.ret
    }
}

impl FunctionType {
    pub fn position_of(&self, label: &str) -> Option<usize> {
        self.labels
            .iter()
            .position(|l| l.as_deref() == Some(label))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructType {
    pub name: Box<str>,
    pub fields: Vec<(Box<str>, Type)>,
}

impl StructType {
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields
            .iter()
            .find_map(|(field, ty)| (**field == *name).then_some(ty))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumType {
    pub name: Box<str>,
    pub cases: Vec<(Box<str>, Vec<Type>)>,
}

impl EnumType {
    pub fn case(&self, name: &str) -> Option<&[Type]> {
        self.cases
            .iter()
            .find_map(|(case, params)| (**case == *name).then_some(params.as_slice()))
    }
}

pub mod builtins {
    use std::rc::Rc;

    use super::{FunctionType, Type};

    pub struct Builtin {
        pub name: &'static str,
        signature: fn() -> FunctionType,
    }

    impl Builtin {
        pub fn ty(&self) -> Type {
            Type::Function(Rc::new((self.signature)()))
        }
    }

    pub const PRINT: Builtin = Builtin {
        name: "print",
        signature: || FunctionType {
            params: vec![Type::Any],
            labels: vec![Some("value".into())],
            ret: Type::Void,
        },
    };

    pub const ALL: &[Builtin] = &[PRINT];
}
