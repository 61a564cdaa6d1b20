use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
};

use tracing::trace;

use crate::{
    ast::{
        Argument, Binding, Decl, EnumDecl, Expr, ExprId, ExprKind, Function, Ident, MatchArm,
        Program, Stmt, StmtKind, StructDecl, TypeExpr, TypeExprKind, UnaryOperator,
    },
    scope::{ScopeId, Scopes},
    token::{Span, Spanned},
    types::{builtins, EnumType, FunctionType, StructType, Type},
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Type checks the program, returning the type of every expression in it.
#[tracing::instrument(level = "trace", skip_all)]
pub fn check(program: &Program) -> crate::Result<TypeTable> {
    Ok(Checker::new().check(program)?)
}

/// The side table produced by the analyzer: the resolved type of each
/// expression, keyed by the expression's id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeTable {
    types: HashMap<ExprId, Type>,
    /// Symbol expressions that resolved to a built-in.
    builtins: HashSet<ExprId>,
    /// Signatures of the declared functions. Functions are only declared at
    /// the top level, so their names are unique.
    functions: HashMap<Box<str>, Rc<FunctionType>>,
}

impl TypeTable {
    pub fn type_of(&self, expr: &Expr) -> Option<&Type> {
        self.types.get(&expr.id)
    }

    pub fn is_builtin(&self, expr: &Expr) -> bool {
        self.builtins.contains(&expr.id)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionType> {
        self.functions.get(name).map(Rc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

pub struct Checker {
    scopes: Scopes<Type>,
    table: TypeTable,
}

impl Checker {
    pub fn new() -> Checker {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        for builtin in builtins::ALL {
            // Built-in names are unique.
            let _ = scopes.define(root, builtin.name, builtin.ty());
        }
        Checker {
            scopes,
            table: TypeTable::default(),
        }
    }

    pub fn check(mut self, program: &Program) -> Result<TypeTable> {
        let scope = self.scopes.enter(self.scopes.root());
        self.check_block(&program.body, scope, None)?;
        Ok(self.table)
    }

    /// Checks the statements in the given scope. `ret` is the return type of
    /// the enclosing function, if any.
    fn check_block(&mut self, stmts: &[Stmt], scope: ScopeId, ret: Option<&Type>) -> Result<()> {
        for stmt in stmts {
            self.check_stmt(stmt, scope, ret)?;
        }
        Ok(())
    }

    /// Checks the statements in a new child scope.
    fn check_nested_block(
        &mut self,
        stmts: &[Stmt],
        parent: ScopeId,
        ret: Option<&Type>,
    ) -> Result<()> {
        let scope = self.scopes.enter(parent);
        self.check_block(stmts, scope, ret)?;
        self.scopes.leave(scope);
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &Stmt, scope: ScopeId, ret: Option<&Type>) -> Result<()> {
        match &stmt.kind {
            StmtKind::Let { name, ty, value } => {
                let actual = self.check_expr(value, scope)?;
                let ty = match ty {
                    Some(ty) => {
                        let expected = self.resolve(ty, scope)?;
                        expect(&expected, &actual, value.span)?;
                        expected
                    }
                    None => actual,
                };
                if ty == Type::Void {
                    return Err(value.span.wrap(Error::VoidBinding(name.name.clone())));
                }
                self.define(scope, name, ty)?;
            }

            StmtKind::Assign { target, value } => {
                let expected = self.check_expr(target, scope)?;
                if let (ExprKind::Symbol(name), Type::Meta(_)) = (&target.kind, &expected) {
                    return Err(target.span.wrap(Error::AssignToType(name.name.clone())));
                }
                let actual = self.check_expr(value, scope)?;
                expect(&expected, &actual, value.span)?;
            }

            StmtKind::Return(value) => {
                let Some(expected) = ret else {
                    return Err(stmt.span.wrap(Error::ReturnOutsideFunction));
                };
                match value {
                    Some(value) => {
                        let actual = self.check_expr(value, scope)?;
                        expect(expected, &actual, value.span)?;
                    }
                    None => expect(expected, &Type::Void, stmt.span)?,
                }
            }

            StmtKind::Expr(expr) => {
                self.check_expr(expr, scope)?;
            }

            StmtKind::If { clauses, otherwise } => {
                for clause in clauses {
                    self.check_condition(&clause.cond, scope)?;
                    self.check_nested_block(&clause.body, scope, ret)?;
                }
                if let Some(otherwise) = otherwise {
                    self.check_nested_block(otherwise, scope, ret)?;
                }
            }

            StmtKind::While { cond, body } => {
                self.check_condition(cond, scope)?;
                self.check_nested_block(body, scope, ret)?;
            }

            StmtKind::For {
                vars,
                iterable,
                body,
            } => {
                let item = match self.check_expr(iterable, scope)? {
                    Type::List(item) => (*item).clone(),
                    other => return Err(iterable.span.wrap(Error::NotIterable(other))),
                };
                let body_scope = self.scopes.enter(scope);
                match vars.as_slice() {
                    [var] => self.define(body_scope, var, item)?,
                    [index, var] => {
                        self.define(body_scope, index, Type::Int)?;
                        self.define(body_scope, var, item)?;
                    }
                    _ => unreachable!("the parser produces one or two loop variables"),
                }
                self.check_block(body, body_scope, ret)?;
                self.scopes.leave(body_scope);
            }

            StmtKind::Match {
                scrutinee,
                arms,
                default,
            } => {
                let enum_ty = match self.check_expr(scrutinee, scope)? {
                    Type::Enum(enum_ty) => enum_ty,
                    other => return Err(scrutinee.span.wrap(Error::NotAnEnum(other))),
                };
                let mut seen = HashSet::with_capacity(arms.len());
                for arm in arms {
                    self.check_match_arm(arm, &enum_ty, &mut seen, scope, ret)?;
                }
                if let Some(default) = default {
                    self.check_nested_block(default, scope, ret)?;
                }
            }

            StmtKind::Decl(Decl::Function(function)) => self.check_function(function, scope)?,
            StmtKind::Decl(Decl::Struct(decl)) => self.check_struct(decl, scope)?,
            StmtKind::Decl(Decl::Enum(decl)) => self.check_enum(decl, scope)?,
        }
        Ok(())
    }

    fn check_condition(&mut self, cond: &Expr, scope: ScopeId) -> Result<()> {
        let actual = self.check_expr(cond, scope)?;
        expect(&Type::Bool, &actual, cond.span)
    }

    fn check_match_arm<'a>(
        &mut self,
        arm: &'a MatchArm,
        enum_ty: &EnumType,
        seen: &mut HashSet<&'a str>,
        scope: ScopeId,
        ret: Option<&Type>,
    ) -> Result<()> {
        let case = &arm.pattern.case;
        let Some(params) = enum_ty.case(&case.name) else {
            return Err(case.span.wrap(Error::UndefinedCase {
                ty: enum_ty.name.clone(),
                case: case.name.clone(),
            }));
        };
        if !seen.insert(&*case.name) {
            return Err(case.span.wrap(Error::DuplicateCase(case.name.clone())));
        }
        let bindings = &arm.pattern.bindings;
        if bindings.len() != params.len() {
            return Err(case.span.wrap(Error::PatternArity {
                case: case.name.clone(),
                expected: params.len(),
                actual: bindings.len(),
            }));
        }
        let arm_scope = self.scopes.enter(scope);
        for (binding, ty) in bindings.iter().zip(params) {
            self.define(arm_scope, binding, ty.clone())?;
        }
        self.check_block(&arm.body, arm_scope, ret)?;
        self.scopes.leave(arm_scope);
        Ok(())
    }

    fn check_function(&mut self, function: &Function, scope: ScopeId) -> Result<()> {
        trace!(name = %function.name.name, "checking function");
        let params = function
            .params
            .iter()
            .map(|param| self.resolve(&param.ty, scope))
            .collect::<Result<Vec<_>>>()?;
        let ret = match &function.return_ty {
            Some(ty) => self.resolve(ty, scope)?,
            None => Type::Void,
        };
        let labels = function
            .params
            .iter()
            .map(|param| Some(param.name.name.clone()))
            .collect();
        let ty = FunctionType {
            params: params.clone(),
            labels,
            ret: ret.clone(),
        };

        // Defined before checking the body so that it may call itself.
        let ty = Rc::new(ty);
        self.define(scope, &function.name, Type::Function(ty.clone()))?;
        self.table.functions.insert(function.name.name.clone(), ty);

        let body_scope = self.scopes.enter(scope);
        for (param, ty) in function.params.iter().zip(params) {
            self.define(body_scope, &param.name, ty)?;
        }
        self.check_block(&function.body, body_scope, Some(&ret))?;
        self.scopes.leave(body_scope);
        Ok(())
    }

    fn check_struct(&mut self, decl: &StructDecl, scope: ScopeId) -> Result<()> {
        let mut fields: Vec<(Box<str>, Type)> = Vec::with_capacity(decl.fields.len());
        for Binding { name, ty } in &decl.fields {
            if fields.iter().any(|(field, _)| *field == name.name) {
                return Err(name.span.wrap(Error::Redefinition(name.name.clone())));
            }
            fields.push((name.name.clone(), self.resolve(ty, scope)?));
        }
        let ty = Type::Struct(Rc::new(StructType {
            name: decl.name.name.clone(),
            fields,
        }));
        self.define(scope, &decl.name, Type::meta(ty))
    }

    fn check_enum(&mut self, decl: &EnumDecl, scope: ScopeId) -> Result<()> {
        let mut cases: Vec<(Box<str>, Vec<Type>)> = Vec::with_capacity(decl.cases.len());
        for case in &decl.cases {
            if cases.iter().any(|(name, _)| *name == case.name.name) {
                return Err(case.name.span.wrap(Error::Redefinition(case.name.name.clone())));
            }
            let params = case
                .params
                .iter()
                .map(|ty| self.resolve(ty, scope))
                .collect::<Result<Vec<_>>>()?;
            cases.push((case.name.name.clone(), params));
        }
        let ty = Type::Enum(Rc::new(EnumType {
            name: decl.name.name.clone(),
            cases,
        }));
        self.define(scope, &decl.name, Type::meta(ty))
    }

    /// Computes the type of the expression, recording it in the type table.
    fn check_expr(&mut self, expr: &Expr, scope: ScopeId) -> Result<Type> {
        let ty = self.infer_expr(expr, scope)?;
        self.table.types.insert(expr.id, ty.clone());
        Ok(ty)
    }

    fn infer_expr(&mut self, expr: &Expr, scope: ScopeId) -> Result<Type> {
        let ty = match &expr.kind {
            ExprKind::Int(_) => Type::Int,
            ExprKind::String(_) => Type::String,
            ExprKind::Bool(_) => Type::Bool,

            ExprKind::Symbol(ident) => {
                let Some((found_in, ty)) = self.scopes.lookup(scope, &ident.name) else {
                    return Err(ident.span.wrap(Error::UndefinedSymbol {
                        name: ident.name.clone(),
                    }));
                };
                if found_in == self.scopes.root() {
                    self.table.builtins.insert(expr.id);
                }
                ty.clone()
            }

            ExprKind::Infix { op, lhs, rhs } => {
                let operand = if op.is_logical() {
                    Type::Bool
                } else {
                    Type::Int
                };
                let lhs_ty = self.check_expr(lhs, scope)?;
                expect(&operand, &lhs_ty, lhs.span)?;
                let rhs_ty = self.check_expr(rhs, scope)?;
                expect(&operand, &rhs_ty, rhs.span)?;
                if op.is_comparison() {
                    Type::Bool
                } else {
                    operand
                }
            }

            ExprKind::Prefix { op, expr: operand } => {
                let ty = match op {
                    UnaryOperator::Neg => Type::Int,
                    UnaryOperator::Not => Type::Bool,
                };
                let actual = self.check_expr(operand, scope)?;
                expect(&ty, &actual, operand.span)?;
                ty
            }

            ExprKind::Call { callee, args } => match self.check_expr(callee, scope)? {
                Type::Function(function) => {
                    self.check_arguments(&function, args, expr.span, scope)?;
                    function.ret.clone()
                }
                Type::Meta(ty) => match &*ty {
                    Type::Struct(s) => {
                        self.check_construction(s, args, expr.span, scope)?;
                        (*ty).clone()
                    }
                    _ => return Err(callee.span.wrap(Error::NotCallable(Type::Meta(ty.clone())))),
                },
                other => return Err(callee.span.wrap(Error::NotCallable(other))),
            },

            ExprKind::List(items) => {
                let mut item_ty = Type::Any;
                for item in items {
                    let ty = self.check_expr(item, scope)?;
                    item_ty = unify(&item_ty, &ty, item.span)?;
                }
                Type::list(item_ty)
            }

            ExprKind::Map(entries) => {
                let mut key_ty = Type::Any;
                let mut value_ty = Type::Any;
                for (key, value) in entries {
                    let ty = self.check_expr(key, scope)?;
                    key_ty = unify(&key_ty, &ty, key.span)?;
                    let ty = self.check_expr(value, scope)?;
                    value_ty = unify(&value_ty, &ty, value.span)?;
                }
                Type::map(key_ty, value_ty)
            }

            ExprKind::Index { base, index } => {
                let base_ty = self.check_expr(base, scope)?;
                let index_ty = self.check_expr(index, scope)?;
                match base_ty {
                    Type::List(item) => {
                        expect(&Type::Int, &index_ty, index.span)?;
                        (*item).clone()
                    }
                    Type::Map(key, value) => {
                        expect(&key, &index_ty, index.span)?;
                        (*value).clone()
                    }
                    other => return Err(base.span.wrap(Error::NotIndexable(other))),
                }
            }

            ExprKind::Field { base, field } => match self.check_expr(base, scope)? {
                Type::Struct(s) => match s.field(&field.name) {
                    Some(ty) => ty.clone(),
                    None => {
                        return Err(field.span.wrap(Error::UndefinedField {
                            ty: Type::Struct(s.clone()),
                            field: field.name.clone(),
                        }));
                    }
                },
                Type::Meta(ty) => match &*ty {
                    Type::Enum(e) => enum_case_type(e, field)?,
                    _ => return Err(base.span.wrap(Error::NoFields(Type::Meta(ty.clone())))),
                },
                other => return Err(base.span.wrap(Error::NoFields(other))),
            },
        };
        Ok(ty)
    }

    /// Binds the arguments of a call to the function's parameters. Positional
    /// arguments come first; keyword arguments bind by parameter name.
    fn check_arguments(
        &mut self,
        function: &FunctionType,
        args: &[Argument],
        call_span: Span,
        scope: ScopeId,
    ) -> Result<()> {
        if args.len() != function.params.len() {
            return Err(call_span.wrap(Error::ArityMismatch {
                expected: function.params.len(),
                actual: args.len(),
            }));
        }
        let mut bound = vec![false; args.len()];
        let mut seen_keyword = false;
        for (i, arg) in args.iter().enumerate() {
            let position = match &arg.label {
                None if seen_keyword => {
                    return Err(arg.value.span.wrap(Error::PositionalAfterKeyword));
                }
                None => i,
                Some(label) => {
                    seen_keyword = true;
                    function.position_of(&label.name).ok_or_else(|| {
                        label.span.wrap(Error::UnknownKeyword(label.name.clone()))
                    })?
                }
            };
            if std::mem::replace(&mut bound[position], true) {
                let name = arg.label.as_ref().map_or_else(
                    || format!("#{}", position + 1).into_boxed_str(),
                    |label| label.name.clone(),
                );
                return Err(arg.value.span.wrap(Error::DuplicateArgument(name)));
            }
            let actual = self.check_expr(&arg.value, scope)?;
            expect(&function.params[position], &actual, arg.value.span)?;
        }
        Ok(())
    }

    /// Struct construction only takes keyword arguments, one per field, in
    /// any order.
    fn check_construction(
        &mut self,
        s: &StructType,
        args: &[Argument],
        call_span: Span,
        scope: ScopeId,
    ) -> Result<()> {
        let mut given = HashSet::with_capacity(args.len());
        for arg in args {
            let Some(label) = &arg.label else {
                return Err(arg.value.span.wrap(Error::PositionalConstruction(s.name.clone())));
            };
            let Some(expected) = s.field(&label.name) else {
                return Err(label.span.wrap(Error::UndefinedField {
                    ty: Type::Struct(Rc::new(s.clone())),
                    field: label.name.clone(),
                }));
            };
            if !given.insert(&*label.name) {
                return Err(label.span.wrap(Error::DuplicateArgument(label.name.clone())));
            }
            let actual = self.check_expr(&arg.value, scope)?;
            expect(expected, &actual, arg.value.span)?;
        }
        if let Some((missing, _)) = s.fields.iter().find(|(name, _)| !given.contains(&**name)) {
            return Err(call_span.wrap(Error::MissingField {
                ty: s.name.clone(),
                field: missing.clone(),
            }));
        }
        Ok(())
    }

    fn define(&mut self, scope: ScopeId, name: &Ident, ty: Type) -> Result<()> {
        self.scopes
            .define(scope, &name.name, ty)
            .map_err(|_| name.span.wrap(Error::Redefinition(name.name.clone())))
    }

    fn resolve(&self, ty: &TypeExpr, scope: ScopeId) -> Result<Type> {
        resolve_type(ty, &|name: &str| {
            self.scopes
                .lookup(scope, name)
                .map(|(_, ty)| ty.clone())
        })
    }
}

impl Default for Checker {
    fn default() -> Self {
        Checker::new()
    }
}

/// Resolves a type annotation. Names other than the built-in ones are looked
/// up with `lookup`, and must name a struct or an enum.
pub fn resolve_type(ty: &TypeExpr, lookup: &dyn Fn(&str) -> Option<Type>) -> Result<Type> {
    let name = ty.name();
    let args: &[TypeExpr] = match &ty.kind {
        TypeExprKind::Named(_) => &[],
        TypeExprKind::Parameterized { args, .. } => args,
    };
    let arity_error = |expected: usize| {
        ty.span.wrap(Error::TypeArity {
            name: name.name.clone(),
            expected,
            actual: args.len(),
        })
    };
    match (&*name.name, args) {
        ("list", [item]) => Ok(Type::list(resolve_type(item, lookup)?)),
        ("list", _) => Err(arity_error(1)),
        ("map", [key, value]) => Ok(Type::map(
            resolve_type(key, lookup)?,
            resolve_type(value, lookup)?,
        )),
        ("map", _) => Err(arity_error(2)),
        (other, args) => {
            let ty = match Type::atomic(other) {
                Some(atomic) => atomic,
                None => match lookup(other) {
                    Some(Type::Meta(ty)) => (*ty).clone(),
                    Some(_) => return Err(name.span.wrap(Error::NotAType(name.name.clone()))),
                    None => return Err(name.span.wrap(Error::UndefinedType(name.name.clone()))),
                },
            };
            if args.is_empty() {
                Ok(ty)
            } else {
                Err(arity_error(0))
            }
        }
    }
}

/// The type of `Enum.Case`: the enum itself for cases without values, or a
/// function building the enum otherwise.
fn enum_case_type(e: &Rc<EnumType>, case: &Ident) -> Result<Type> {
    let Some(params) = e.case(&case.name) else {
        return Err(case.span.wrap(Error::UndefinedCase {
            ty: e.name.clone(),
            case: case.name.clone(),
        }));
    };
    let ty = Type::Enum(e.clone());
    if params.is_empty() {
        return Ok(ty);
    }
    Ok(Type::Function(Rc::new(FunctionType {
        params: params.to_vec(),
        labels: vec![None; params.len()],
        ret: ty,
    })))
}

fn expect(expected: &Type, actual: &Type, span: Span) -> Result<()> {
    if expected.is_compatible_with(actual) {
        Ok(())
    } else {
        Err(span.wrap(Error::Mismatch {
            expected: expected.clone(),
            actual: actual.clone(),
        }))
    }
}

fn unify(current: &Type, next: &Type, span: Span) -> Result<Type> {
    current.unify(next).ok_or_else(|| {
        span.wrap(Error::Mismatch {
            expected: current.clone(),
            actual: next.clone(),
        })
    })
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("undefined symbol `{name}`")]
    UndefinedSymbol { name: Box<str> },
    #[error("redefinition of `{0}` in the same scope")]
    Redefinition(Box<str>),
    #[error("expected type {expected}, but got {actual}")]
    Mismatch { expected: Type, actual: Type },
    #[error("incorrect number of arguments. expected {expected}, but got {actual}")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("type {0} is not callable")]
    NotCallable(Type),
    #[error("type {0} can't be indexed")]
    NotIndexable(Type),
    #[error("type {0} has no fields")]
    NoFields(Type),
    #[error("type {ty} has no field `{field}`")]
    UndefinedField { ty: Type, field: Box<str> },
    #[error("struct {0} must be constructed with keyword arguments only")]
    PositionalConstruction(Box<str>),
    #[error("missing field `{field}` in construction of {ty}")]
    MissingField { ty: Box<str>, field: Box<str> },
    #[error("no parameter named `{0}`")]
    UnknownKeyword(Box<str>),
    #[error("argument `{0}` given more than once")]
    DuplicateArgument(Box<str>),
    #[error("positional argument after keyword arguments")]
    PositionalAfterKeyword,
    #[error("return outside of a function")]
    ReturnOutsideFunction,
    #[error("can't bind `{0}` to a void value")]
    VoidBinding(Box<str>),
    #[error("can't assign to type name `{0}`")]
    AssignToType(Box<str>),
    #[error("undefined type `{0}`")]
    UndefinedType(Box<str>),
    #[error("`{0}` is not a type")]
    NotAType(Box<str>),
    #[error("type {name} takes {expected} type arguments, but got {actual}")]
    TypeArity {
        name: Box<str>,
        expected: usize,
        actual: usize,
    },
    #[error("type {0} is not iterable, expected a list")]
    NotIterable(Type),
    #[error("can't match on type {0}, expected an enum")]
    NotAnEnum(Type),
    #[error("enum {ty} has no case `{case}`")]
    UndefinedCase { ty: Box<str>, case: Box<str> },
    #[error("case `{0}` is matched more than once")]
    DuplicateCase(Box<str>),
    #[error("case {case} holds {expected} values, but the pattern binds {actual}")]
    PatternArity {
        case: Box<str>,
        expected: usize,
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::parse_program, util::test_utils::tree_tests};
    use pretty_assertions::assert_eq;

    fn check_src(src: &str) -> crate::Result<TypeTable> {
        check(&parse_program(src)?)
    }

    tree_tests!(
        use checker;

        fn test_arithmetic_and_print() {
            let program = "let x = 1 + 2; print(x);";
            let tree_ok = "
                let x (0..13)
                  infix Add (8..13 %: int)
                    int 1 (8..9 %: int)
                    int 2 (12..13 %: int)
                call (15..23 %: void)
                  symbol print (15..20 %: fn(any) -> void)
                  symbol x (21..22 %: int)
            ";
        }

        fn test_struct_construction_and_field() {
            let program = "struct P { x: int } let p = P(x: 1); p.x";
            let tree_ok = "
                struct P (0..19)
                  x: int
                let p (20..35)
                  call (28..35 %: P)
                    symbol P (28..29 %: type P)
                    keyword x
                      int 1 (33..34 %: int)
                field x (37..40 %: int)
                  symbol p (37..38 %: P)
            ";
        }

        fn test_assignment_mismatch() {
            let program = r#"let x = 1; x = "a";"#;
            let expected_errors = &["type error at 1:16: expected type int, but got string"];
        }

        fn test_annotation_mismatch() {
            let program = "let s: string = 1;";
            let expected_errors = &["type error at 1:17: expected type string, but got int"];
        }

        fn test_arity_mismatch() {
            let program = "fn f(a: int, b: int) { } f(1);";
            let expected_errors = &["type error at 1:26: incorrect number of arguments. expected 2, but got 1"];
        }

        fn test_print_takes_one_argument() {
            let program = "print(1, 2)";
            let expected_errors = &["type error at 1:1: incorrect number of arguments. expected 1, but got 2"];
        }

        fn test_undefined_symbol() {
            let program = "print(y);";
            let expected_errors = &["type error at 1:7: undefined symbol `y`"];
        }

        fn test_functions_are_not_hoisted() {
            let program = "fn f() { g() } fn g() { }";
            let expected_errors = &["type error at 1:10: undefined symbol `g`"];
        }

        fn test_not_callable() {
            let program = "let a = 1; a(2);";
            let expected_errors = &["type error at 1:12: type int is not callable"];
        }

        fn test_struct_rejects_positional_arguments() {
            let program = "struct P { x: int, y: int } let p = P(1, 2);";
            let expected_errors = &["type error at 1:39: struct P must be constructed with keyword arguments only"];
        }

        fn test_struct_arguments_are_checked_by_name() {
            let program = "struct P { x: int, y: string } let p = P(y: 1, x: 2);";
            let expected_errors = &["type error at 1:45: expected type string, but got int"];
        }

        fn test_struct_missing_field() {
            let program = "struct P { x: int, y: int } let p = P(x: 1);";
            let expected_errors = &["type error at 1:37: missing field `y` in construction of P"];
        }

        fn test_undefined_field() {
            let program = "struct P { x: int } let p = P(x: 1); p.z";
            let expected_errors = &["type error at 1:40: type P has no field `z`"];
        }

        fn test_unknown_keyword_argument() {
            let program = "fn f(a: int, b: string) { } f(c: 1, a: 1)";
            let expected_errors = &["type error at 1:31: no parameter named `c`"];
        }

        fn test_return_outside_function() {
            let program = "return 1;";
            let expected_errors = &["type error at 1:1: return outside of a function"];
        }

        fn test_return_type_mismatch() {
            let program = r#"fn f(): int { return "a" }"#;
            let expected_errors = &["type error at 1:22: expected type int, but got string"];
        }

        fn test_condition_must_be_bool() {
            let program = "if 1 { }";
            let expected_errors = &["type error at 1:4: expected type bool, but got int"];
        }

        fn test_redefinition_in_same_scope() {
            let program = "let a = 1; let a = 2;";
            let expected_errors = &["type error at 1:16: redefinition of `a` in the same scope"];
        }

        fn test_for_requires_a_list() {
            let program = "for x in 1 { }";
            let expected_errors = &["type error at 1:10: type int is not iterable, expected a list"];
        }

        fn test_list_index_must_be_int() {
            let program = r#"let xs = [1]; xs["a"]"#;
            let expected_errors = &["type error at 1:18: expected type int, but got string"];
        }

        fn test_map_value_type() {
            let program = r#"let m = {"a": 1}; let b: bool = m["a"];"#;
            let expected_errors = &["type error at 1:33: expected type bool, but got int"];
        }

        fn test_list_items_must_agree() {
            let program = r#"let l = [1, "a"];"#;
            let expected_errors = &["type error at 1:13: expected type int, but got string"];
        }

        fn test_void_binding() {
            let program = "fn f() { } let x = f();";
            let expected_errors = &["type error at 1:20: can't bind `x` to a void value"];
        }

        fn test_assign_to_type_name() {
            let program = "struct P { x: int } P = 1;";
            let expected_errors = &["type error at 1:21: can't assign to type name `P`"];
        }

        fn test_undefined_type() {
            let program = "let x: foo = 1;";
            let expected_errors = &["type error at 1:8: undefined type `foo`"];
        }

        fn test_type_arity() {
            let program = "let x: list = [];";
            let expected_errors = &["type error at 1:8: type list takes 1 type arguments, but got 0"];
        }

        fn test_match_requires_an_enum() {
            let program = "match 1 { }";
            let expected_errors = &["type error at 1:7: can't match on type int, expected an enum"];
        }

        fn test_match_pattern_arity() {
            let program = "enum S { A(int), B } match S.B { case A { } }";
            let expected_errors = &["type error at 1:39: case A holds 1 values, but the pattern binds 0"];
        }

        fn test_unknown_enum_case() {
            let program = "enum S { A(int), B } let s = S.C;";
            let expected_errors = &["type error at 1:32: enum S has no case `C`"];
        }
    );

    #[test]
    fn test_well_typed_programs() {
        let programs = [
            "let a = 1; if true { let a = \"s\"; print(a) }",
            "fn f(n: int): int { if n < 1 { return 0 } return f(n - 1) }",
            "fn f(a: int, b: string) { } f(b: \"x\", a: 1); f(1, b: \"y\")",
            "for i, x in [\"a\"] { let s: string = x; let n: int = i; }",
            "let l: list<int> = []; let m: map<string, list<int>> = {\"k\": l};",
            "let xs = [[1], []]; xs[0][0] = 2; let m = {1: true}; m[2] = false;",
            "enum S { A(int), B } match S.A(1) { case A(n) { print(n + 1) } case B { } }",
            "enum S { A, B } let s = S.A; match s { case A { } default { print(s) } }",
            "struct P { x: int, y: int } let p = P(y: 2, x: 1); p.x = p.y % 2;",
            "fn print(x: int) { } print(1)",
        ];
        for src in programs {
            if let Err(error) = check_src(src) {
                panic!("{src}: {error}");
            }
        }
    }

    #[test]
    fn test_builtin_references_are_recorded() {
        let program = parse_program("print(1); fn g(print: int) { let x = print + 1 }").unwrap();
        let types = check(&program).unwrap();
        let symbols = collect_symbols(&program);
        let [builtin, shadowed] = symbols.as_slice() else {
            panic!("expected two symbols named print, got {}", symbols.len());
        };
        assert!(types.is_builtin(builtin));
        assert!(!types.is_builtin(shadowed));
        assert_eq!(types.type_of(shadowed), Some(&Type::Int));
    }

    fn collect_symbols(program: &Program) -> Vec<Expr> {
        fn walk_expr(expr: &Expr, out: &mut Vec<Expr>) {
            match &expr.kind {
                ExprKind::Symbol(name) if &*name.name == "print" => out.push(expr.clone()),
                ExprKind::Call { callee, args } => {
                    walk_expr(callee, out);
                    args.iter().for_each(|arg| walk_expr(&arg.value, out));
                }
                ExprKind::Infix { lhs, rhs, .. } => {
                    walk_expr(lhs, out);
                    walk_expr(rhs, out);
                }
                _ => {}
            }
        }
        fn walk(stmts: &[Stmt], out: &mut Vec<Expr>) {
            for stmt in stmts {
                match &stmt.kind {
                    StmtKind::Expr(expr) | StmtKind::Let { value: expr, .. } => {
                        walk_expr(expr, out)
                    }
                    StmtKind::Decl(Decl::Function(function)) => walk(&function.body, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&program.body, &mut out);
        out
    }

    #[test]
    fn test_checking_is_idempotent() {
        let program = parse_program(include_str!("../demos/shapes.vn")).unwrap();
        let first = check(&program).unwrap();
        let second = check(&program).unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}
