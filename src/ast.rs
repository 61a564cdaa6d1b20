// program   ::= item*
// item      ::= function | stmt
// function  ::= ('fn' | 'func') ID '(' [param (',' param)*] ')' [(':' | '->') type] block
// param     ::= ID ':' type
// block     ::= '{' stmt* '}'
// stmt      ::= 'let' ID [':' type] '=' expr term
//             | 'return' [expr] term
//             | 'if' expr block (('elif' | 'else' 'if') expr block)* ['else' block]
//             | 'while' expr block
//             | 'for' ID [',' ID] 'in' expr block
//             | 'match' expr '{' ('case' pattern block)* ['default' block] '}'
//             | 'struct' ID '{' [ID ':' type (',' ID ':' type)*] '}'
//             | 'enum' ID '{' [variant (',' variant)*] '}'
//             | expr ['=' expr] term
// variant   ::= ID ['(' type (',' type)* ')']
// pattern   ::= ID ['(' ID (',' ID)* ')']
// term      ::= ';' | (before '}' or end of input)
// type      ::= ID ['<' type (',' type)* '>']
// expr      ::= expr binop expr
//             | ('-' | 'not') expr
//             | expr '(' [arg (',' arg)*] ')'
//             | expr '[' expr ']'
//             | expr '.' ID
//             | '[' [expr (',' expr)*] ']'
//             | '{' [expr ':' expr (',' expr ':' expr)*] '}'
//             | '(' expr ')'
//             | ID | integer | string | 'true' | 'false'
// arg       ::= [ID ':'] expr

// Precedence (loosest first)
//
// or
// and
// == != < <= > >=
// + -
// * / %
// - not (prefix)
// call, index, field access

use std::fmt;

use crate::token::Span;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StmtKind {
    Let {
        name: Ident,
        ty: Option<TypeExpr>,
        value: Expr,
    },
    /// The target is an expression of symbol, index or field shape.
    Assign {
        target: Expr,
        value: Expr,
    },
    Return(Option<Expr>),
    Expr(Expr),
    If {
        clauses: Vec<IfClause>,
        otherwise: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    For {
        /// Either the item, or the index and the item.
        vars: Vec<Ident>,
        iterable: Expr,
        body: Block,
    },
    Match {
        scrutinee: Expr,
        arms: Vec<MatchArm>,
        default: Option<Block>,
    },
    Decl(Decl),
}

pub type Block = Vec<Stmt>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IfClause {
    pub cond: Expr,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    pub case: Ident,
    pub bindings: Vec<Ident>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decl {
    Function(Function),
    Struct(StructDecl),
    Enum(EnumDecl),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub name: Ident,
    pub params: Vec<Binding>,
    pub return_ty: Option<TypeExpr>,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructDecl {
    pub name: Ident,
    pub fields: Vec<Binding>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumDecl {
    pub name: Ident,
    pub cases: Vec<EnumCase>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumCase {
    pub name: Ident,
    pub params: Vec<TypeExpr>,
}

/// A name with a type annotation, such as a parameter or a struct field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub name: Ident,
    pub ty: TypeExpr,
}

/// Identifies an expression within a single parsed program. Used as the key
/// of the analyzer's type table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExprKind {
    Int(i64),
    String(Box<str>),
    Bool(bool),
    Symbol(Ident),
    Infix {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Prefix {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Argument>,
    },
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Field {
        base: Box<Expr>,
        field: Ident,
    },
}

impl Expr {
    pub fn precedence(&self) -> Precedence {
        match &self.kind {
            ExprKind::Infix { op, .. } => op.precedence(),
            ExprKind::Prefix { .. } => Precedence::Prefix,
            ExprKind::Call { .. } | ExprKind::Index { .. } | ExprKind::Field { .. } => {
                Precedence::Call
            }
            ExprKind::Int(_)
            | ExprKind::String(_)
            | ExprKind::Bool(_)
            | ExprKind::Symbol(_)
            | ExprKind::List(_)
            | ExprKind::Map(_) => Precedence::Atom,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Argument {
    /// Present for keyword arguments.
    pub label: Option<Ident>,
    pub value: Expr,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOperator {
    pub fn precedence(self) -> Precedence {
        use BinaryOperator::*;
        match self {
            Or => Precedence::Or,
            And => Precedence::And,
            Eq | Ne | Lt | Le | Gt | Ge => Precedence::Comparison,
            Add | Sub => Precedence::Sum,
            Mul | Div | Rem => Precedence::Product,
        }
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == Precedence::Comparison
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::Or | BinaryOperator::And)
    }

    /// The source spelling of the operator.
    pub fn symbol(self) -> &'static str {
        use BinaryOperator::*;
        match self {
            Or => "or",
            And => "and",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Rem => "%",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Neg,
    Not,
}

/// Binding strength of an expression, loosest first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    Or,
    And,
    Comparison,
    Sum,
    Product,
    Prefix,
    Call,
    Atom,
}

impl Precedence {
    /// The next tighter level.
    pub fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            Lowest => Or,
            Or => And,
            And => Comparison,
            Comparison => Sum,
            Sum => Product,
            Product => Prefix,
            Prefix => Call,
            Call | Atom => Atom,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeExprKind {
    Named(Ident),
    Parameterized { name: Ident, args: Vec<TypeExpr> },
}

impl TypeExpr {
    pub fn name(&self) -> &Ident {
        match &self.kind {
            TypeExprKind::Named(name) | TypeExprKind::Parameterized { name, .. } => name,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeExprKind::Named(name) => write!(f, "{name}"),
            TypeExprKind::Parameterized { name, args } => {
                write!(f, "{name}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: Box<str>,
    pub span: Span,
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
