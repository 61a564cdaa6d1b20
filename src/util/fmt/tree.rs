use std::io::Write;

use crate::{
    analyzer::TypeTable,
    ast::*,
};

const INDENT_WIDTH: usize = 2;

pub fn print_program_string(program: &Program, types: Option<&TypeTable>) -> String {
    let mut buf = Vec::with_capacity(1024);
    let mut printer = Printer { w: &mut buf, types };
    printer
        .program(program)
        .expect("writing to a vec never fails");
    String::from_utf8(buf).expect("tree is valid utf-8")
}

pub fn print_expr_string(expr: &Expr, types: Option<&TypeTable>) -> String {
    let mut buf = Vec::with_capacity(512);
    let mut printer = Printer { w: &mut buf, types };
    printer
        .expr(0, expr)
        .expect("writing to a vec never fails");
    String::from_utf8(buf).expect("tree is valid utf-8")
}

/// Prints a syntax tree, one node per line, with children indented under
/// their parent. When given the analyzer's type table, expressions are
/// annotated with their types.
struct Printer<'a, W> {
    w: W,
    types: Option<&'a TypeTable>,
}

impl<W: Write> Printer<'_, W> {
    fn program(&mut self, program: &Program) -> std::io::Result<()> {
        self.block(0, &program.body)
    }

    fn block(&mut self, i: usize, stmts: &[Stmt]) -> std::io::Result<()> {
        for stmt in stmts {
            self.stmt(i, stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, i: usize, stmt: &Stmt) -> std::io::Result<()> {
        let span = stmt.span;
        if let StmtKind::Expr(expr) = &stmt.kind {
            return self.expr(i, expr);
        }
        self.sp(i)?;
        match &stmt.kind {
            StmtKind::Let { name, ty, value } => {
                write!(self.w, "let {name}")?;
                if let Some(ty) = ty {
                    write!(self.w, ": {ty}")?;
                }
                writeln!(self.w, " ({span})")?;
                self.expr(i + 1, value)?;
            }
            StmtKind::Assign { target, value } => {
                writeln!(self.w, "assign ({span})")?;
                self.expr(i + 1, target)?;
                self.expr(i + 1, value)?;
            }
            StmtKind::Return(value) => {
                writeln!(self.w, "return ({span})")?;
                if let Some(value) = value {
                    self.expr(i + 1, value)?;
                }
            }
            StmtKind::If { clauses, otherwise } => {
                writeln!(self.w, "if ({span})")?;
                for clause in clauses {
                    self.sp(i + 1)?;
                    writeln!(self.w, "cond")?;
                    self.expr(i + 2, &clause.cond)?;
                    self.sp(i + 1)?;
                    writeln!(self.w, "then")?;
                    self.block(i + 2, &clause.body)?;
                }
                if let Some(otherwise) = otherwise {
                    self.sp(i + 1)?;
                    writeln!(self.w, "else")?;
                    self.block(i + 2, otherwise)?;
                }
            }
            StmtKind::While { cond, body } => {
                writeln!(self.w, "while ({span})")?;
                self.expr(i + 1, cond)?;
                self.block(i + 1, body)?;
            }
            StmtKind::For {
                vars,
                iterable,
                body,
            } => {
                write!(self.w, "for ")?;
                self.list(vars)?;
                writeln!(self.w, " ({span})")?;
                self.expr(i + 1, iterable)?;
                self.block(i + 1, body)?;
            }
            StmtKind::Match {
                scrutinee,
                arms,
                default,
            } => {
                writeln!(self.w, "match ({span})")?;
                self.expr(i + 1, scrutinee)?;
                for arm in arms {
                    self.sp(i + 1)?;
                    write!(self.w, "case {}", arm.pattern.case)?;
                    if !arm.pattern.bindings.is_empty() {
                        write!(self.w, "(")?;
                        self.list(&arm.pattern.bindings)?;
                        write!(self.w, ")")?;
                    }
                    writeln!(self.w)?;
                    self.block(i + 2, &arm.body)?;
                }
                if let Some(default) = default {
                    self.sp(i + 1)?;
                    writeln!(self.w, "default")?;
                    self.block(i + 2, default)?;
                }
            }
            StmtKind::Decl(Decl::Function(Function {
                name,
                params,
                return_ty,
                body,
            })) => {
                write!(self.w, "fn {name}(")?;
                for (idx, param) in params.iter().enumerate() {
                    if idx > 0 {
                        write!(self.w, ", ")?;
                    }
                    write!(self.w, "{}: {}", param.name, param.ty)?;
                }
                write!(self.w, ")")?;
                if let Some(return_ty) = return_ty {
                    write!(self.w, ": {return_ty}")?;
                }
                writeln!(self.w, " ({span})")?;
                self.block(i + 1, body)?;
            }
            StmtKind::Decl(Decl::Struct(StructDecl { name, fields })) => {
                writeln!(self.w, "struct {name} ({span})")?;
                for field in fields {
                    self.sp(i + 1)?;
                    writeln!(self.w, "{}: {}", field.name, field.ty)?;
                }
            }
            StmtKind::Decl(Decl::Enum(EnumDecl { name, cases })) => {
                writeln!(self.w, "enum {name} ({span})")?;
                for case in cases {
                    self.sp(i + 1)?;
                    write!(self.w, "{}", case.name)?;
                    if !case.params.is_empty() {
                        write!(self.w, "(")?;
                        self.list(&case.params)?;
                        write!(self.w, ")")?;
                    }
                    writeln!(self.w)?;
                }
            }
            StmtKind::Expr(_) => unreachable!(),
        }
        Ok(())
    }

    fn expr(&mut self, i: usize, expr: &Expr) -> std::io::Result<()> {
        self.sp(i)?;
        let span = expr.span;
        let info = TypeInfo(self.types.and_then(|types| types.type_of(expr)));
        match &expr.kind {
            ExprKind::Int(val) => writeln!(self.w, "int {val} ({span}{info})")?,
            ExprKind::String(val) => writeln!(self.w, "string {val:?} ({span}{info})")?,
            ExprKind::Bool(val) => writeln!(self.w, "bool {val} ({span}{info})")?,
            ExprKind::Symbol(ident) => writeln!(self.w, "symbol {ident} ({span}{info})")?,
            ExprKind::Infix { op, lhs, rhs } => {
                writeln!(self.w, "infix {op:?} ({span}{info})")?;
                self.expr(i + 1, lhs)?;
                self.expr(i + 1, rhs)?;
            }
            ExprKind::Prefix { op, expr: operand } => {
                writeln!(self.w, "prefix {op:?} ({span}{info})")?;
                self.expr(i + 1, operand)?;
            }
            ExprKind::Call { callee, args } => {
                writeln!(self.w, "call ({span}{info})")?;
                self.expr(i + 1, callee)?;
                for arg in args {
                    match &arg.label {
                        Some(label) => {
                            self.sp(i + 1)?;
                            writeln!(self.w, "keyword {label}")?;
                            self.expr(i + 2, &arg.value)?;
                        }
                        None => self.expr(i + 1, &arg.value)?,
                    }
                }
            }
            ExprKind::List(items) => {
                writeln!(self.w, "list ({span}{info})")?;
                for item in items {
                    self.expr(i + 1, item)?;
                }
            }
            ExprKind::Map(entries) => {
                writeln!(self.w, "map ({span}{info})")?;
                for (key, value) in entries {
                    self.sp(i + 1)?;
                    writeln!(self.w, "entry")?;
                    self.expr(i + 2, key)?;
                    self.expr(i + 2, value)?;
                }
            }
            ExprKind::Index { base, index } => {
                writeln!(self.w, "index ({span}{info})")?;
                self.expr(i + 1, base)?;
                self.expr(i + 1, index)?;
            }
            ExprKind::Field { base, field } => {
                writeln!(self.w, "field {field} ({span}{info})")?;
                self.expr(i + 1, base)?;
            }
        }
        Ok(())
    }

    fn list<T: std::fmt::Display>(&mut self, items: &[T]) -> std::io::Result<()> {
        for (idx, item) in items.iter().enumerate() {
            if idx > 0 {
                write!(self.w, ", ")?;
            }
            write!(self.w, "{item}")?;
        }
        Ok(())
    }

    fn sp(&mut self, i: usize) -> std::io::Result<()> {
        write!(self.w, "{:width$}", "", width = i * INDENT_WIDTH)
    }
}

struct TypeInfo<'a>(Option<&'a crate::types::Type>);

impl std::fmt::Display for TypeInfo<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(ty) => write!(f, " %: {ty}"),
            None => Ok(()),
        }
    }
}
