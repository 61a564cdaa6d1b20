use std::format_args as f;

use phf::phf_set;
use tracing::trace;

use super::{
    callee_function, join, ordered_args, quote_string, remap_builtin, Backend, ControlEscape,
    Emitter, Generate, Names, Namespace,
};
use crate::{
    analyzer::{self, TypeTable},
    ast::{
        BinaryOperator, Decl, Expr, ExprKind, Function, Ident, Precedence, Program, Stmt,
        StmtKind, UnaryOperator,
    },
    types::{FunctionType, Type},
};

static RESERVED: phf::Set<&'static str> = phf_set! {
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double",
    "else", "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long",
    "register", "restrict", "return", "short", "signed", "sizeof", "static",
    "struct", "switch", "typedef", "union", "unsigned", "void", "volatile", "while",
    "asm", "alignas", "alignof", "noreturn", "static_assert", "thread_local",
    "bool", "true", "false", "main", "NULL", "offsetof",
    "int8_t", "int16_t", "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t",
    "uint64_t", "intptr_t", "uintptr_t", "intmax_t", "uintmax_t", "size_t",
    "ptrdiff_t", "wchar_t", "max_align_t", "INT64_MIN", "INT64_MAX", "UINT64_MAX",
    "SIZE_MAX",
};

const HEADER: &str = "#include <venice.h>\n";

/// Where the statements being generated go.
#[derive(Copy, Clone, PartialEq, Eq)]
enum Section {
    Functions,
    Main,
}

/// Generates C for the `venice.h` runtime. The file holds the typedefs of
/// the function signatures in use, the prototypes of the functions, the
/// globals backing top-level `let`s, the functions, and finally `main` with
/// the top-level statements.
///
/// Containers hold 64-bit words: values go in through `VENICE_WORD` and come
/// back out through `VENICE_FROM_WORD`, at their static type.
///
/// Structs and enums have no runtime representation yet: their declarations
/// become `#error` directives and their values `venice_unsupported` calls.
pub struct Generator<'t> {
    types: &'t TypeTable,
    names: Names,
    /// Typedef names and declarations, in dependency order.
    typedefs: Vec<(String, String)>,
    prototypes: Vec<String>,
    globals: Vec<String>,
    functions: Emitter,
    main: Emitter,
    section: Section,
    /// Return type of the function being generated.
    ret: Option<Type>,
}

impl Generate for Generator<'_> {
    fn emitter(&mut self) -> &mut Emitter {
        match self.section {
            Section::Functions => &mut self.functions,
            Section::Main => &mut self.main,
        }
    }

    fn expr(&mut self, expr: &Expr) -> String {
        if let Some(ty @ (Type::Struct(_) | Type::Enum(_) | Type::Meta(_))) =
            self.types.type_of(expr)
        {
            return unsupported(f!("value of type {ty}"));
        }
        match &expr.kind {
            ExprKind::Int(int) => int.to_string(),
            ExprKind::String(s) => format!(
                "venice_string_new({}, {})",
                quote_string(s, ControlEscape::Octal),
                s.len()
            ),
            ExprKind::Bool(b) => b.to_string(),
            ExprKind::Symbol(_) if self.types.is_builtin(expr) => {
                let ty = self.type_of(expr);
                self.read_word(&ty, unsupported("print as a value"))
            }
            ExprKind::Symbol(name) => self.names.get(&name.name).into_owned(),
            ExprKind::Infix { op, lhs, rhs } => {
                let p = op.precedence();
                let lhs = self.operand(lhs, p);
                let rhs = self.operand(rhs, p.next());
                format!("{lhs} {} {rhs}", binary_operator(*op))
            }
            ExprKind::Prefix { op, expr: operand } => {
                let operand = self.operand(operand, Precedence::Call);
                match op {
                    UnaryOperator::Neg => format!("-{operand}"),
                    UnaryOperator::Not => format!("!{operand}"),
                }
            }
            ExprKind::Call { callee, args } => {
                let Some(function) = callee_function(self.types, callee) else {
                    return unsupported("struct construction");
                };
                let args = ordered_args(function, args);
                if self.types.is_builtin(callee) {
                    if let (ExprKind::Symbol(name), [arg]) = (&callee.kind, args.as_slice()) {
                        if let Some(builtin) = remap_builtin(&name.name, Backend::Native) {
                            return self.print(builtin, arg);
                        }
                    }
                }
                let args: Vec<_> = args
                    .into_iter()
                    .zip(&function.params)
                    .map(|(arg, param)| self.coerce(arg, param))
                    .collect();
                let callee = self.operand(callee, Precedence::Call);
                format!("{callee}({})", join(args, ", "))
            }
            ExprKind::List(items) => {
                let mut args = vec![items.len().to_string()];
                args.extend(items.iter().map(|item| word(&self.expr(item))));
                format!("venice_list_from_varargs({})", join(args, ", "))
            }
            ExprKind::Map(entries) => {
                let key = match self.type_of(expr) {
                    Type::Map(key, _) => (*key).clone(),
                    _ => Type::Any,
                };
                self.map_literal(entries, &key)
            }
            ExprKind::Index { base, index } => {
                let ty = self.type_of(expr);
                let read = match self.types.type_of(base) {
                    Some(Type::Map(..)) => {
                        let base = self.expr(base);
                        let key = word(&self.expr(index));
                        format!("venice_map_get({base}, {key})")
                    }
                    _ => {
                        let base = self.expr(base);
                        let index = self.expr(index);
                        format!("venice_list_index({base}, {index})")
                    }
                };
                self.read_word(&ty, read)
            }
            ExprKind::Field { field, .. } => {
                let ty = self.type_of(expr);
                self.read_word(&ty, unsupported(f!("field {}", field.name)))
            }
        }
    }
}

impl<'t> Generator<'t> {
    pub fn new(types: &'t TypeTable) -> Generator<'t> {
        let mut main = Emitter::new("    ");
        main.depth = 1;
        Generator {
            types,
            names: Names::new(Namespace {
                reserved: &RESERVED,
                prefix: Some("venice_"),
            }),
            typedefs: Vec::new(),
            prototypes: Vec::new(),
            globals: Vec::new(),
            functions: Emitter::new("    "),
            main,
            section: Section::Main,
            ret: None,
        }
    }

    pub fn generate(mut self, program: &Program) -> String {
        for stmt in &program.body {
            self.stmt(stmt, true);
        }

        let mut code = String::from(HEADER);
        code.push('\n');
        let typedefs = self.typedefs.iter().map(|(_, typedef)| typedef);
        for section in [
            typedefs.collect::<Vec<_>>(),
            self.prototypes.iter().collect(),
            self.globals.iter().collect(),
        ] {
            for line in &section {
                code.push_str(line);
                code.push('\n');
            }
            if !section.is_empty() {
                code.push('\n');
            }
        }
        code.push_str(&self.functions.finish());
        code.push_str("int main(void) {\n");
        code.push_str(&self.main.finish());
        code.push_str("    return 0;\n}\n");
        code
    }

    /// Prints through the runtime, which is told the static type of the
    /// value.
    fn print(&mut self, builtin: &str, arg: &Expr) -> String {
        let ty = self.type_of(arg);
        let value = self.expr(arg);
        let value = if ty == Type::Void {
            format!("({value}, {})", unsupported("printing a void value"))
        } else {
            word(&value)
        };
        let mut descriptor = String::new();
        describe(&ty, &mut descriptor);
        format!("{builtin}({value}, \"{descriptor}\")")
    }

    /// Renders a value going where a `target` is expected, converting values
    /// only known to be `any`.
    fn coerce(&mut self, value: &Expr, target: &Type) -> String {
        if let (ExprKind::Map(entries), Type::Map(key, _)) = (&value.kind, target) {
            return self.map_literal(entries, key);
        }
        let code = self.expr(value);
        if self.type_of(value) == Type::Any {
            self.read_word(target, code)
        } else {
            code
        }
    }

    /// Maps need the type of their keys, to compare strings by content.
    fn map_literal(&mut self, entries: &[(Expr, Expr)], key: &Type) -> String {
        let mut descriptor = String::new();
        describe(key, &mut descriptor);
        let key_type = descriptor.chars().next().unwrap_or('a');
        let mut args = vec![format!("'{key_type}'"), entries.len().to_string()];
        for (key, value) in entries {
            args.push(word(&self.expr(key)));
            args.push(word(&self.expr(value)));
        }
        format!("venice_map_from_varargs({})", join(args, ", "))
    }

    /// Converts a word back to a value of type `ty`.
    fn read_word(&mut self, ty: &Type, code: String) -> String {
        let c_type = self.c_type(ty);
        if c_type == "venice_word_t" || c_type == "void" {
            code
        } else {
            format!("VENICE_FROM_WORD({c_type}, {code})")
        }
    }

    fn block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt, false);
        }
    }

    /// Writes a block with its own scope, one level deeper.
    fn nested_block(&mut self, stmts: &[Stmt]) {
        self.names.enter();
        self.indented(|this| this.block(stmts));
        self.names.leave();
    }

    /// `top_level` statements belong to the program scope: their `let`s
    /// declare globals.
    fn stmt(&mut self, stmt: &Stmt, top_level: bool) {
        match &stmt.kind {
            StmtKind::Let { name, ty, value } => {
                let ty = ty
                    .as_ref()
                    .and_then(|ty| analyzer::resolve_type(ty, &|_: &str| None).ok())
                    .unwrap_or_else(|| self.type_of(value));
                let value = self.coerce(value, &ty);
                let c_type = self.c_type(&ty);
                let name = self.names.declare(&name.name);
                if top_level {
                    self.globals.push(format!("static {c_type} {name};"));
                    self.line(f!("{name} = {value};"));
                } else {
                    self.line(f!("{c_type} {name} = {value};"));
                }
            }
            StmtKind::Assign { target, value } => match &target.kind {
                ExprKind::Index { base, index } => {
                    let is_map = matches!(self.types.type_of(base), Some(Type::Map(..)));
                    let base = self.expr(base);
                    let index = self.expr(index);
                    let value = word(&self.expr(value));
                    if is_map {
                        let key = word(&index);
                        self.line(f!("venice_map_set({base}, {key}, {value});"));
                    } else {
                        self.line(f!("venice_list_set({base}, {index}, {value});"));
                    }
                }
                ExprKind::Field { field, .. } => {
                    let placeholder = unsupported(f!("assignment to field {}", field.name));
                    self.line(f!("{placeholder};"));
                }
                _ => {
                    let ty = self.type_of(target);
                    let target = self.expr(target);
                    let value = self.coerce(value, &ty);
                    self.line(f!("{target} = {value};"));
                }
            },
            StmtKind::Return(None) => self.line("return;"),
            StmtKind::Return(Some(value)) => {
                let ret = self.ret.clone().unwrap_or(Type::Any);
                let value = self.coerce(value, &ret);
                self.line(f!("return {value};"));
            }
            StmtKind::Expr(expr) => {
                let expr = self.expr(expr);
                self.line(f!("{expr};"));
            }
            StmtKind::If { clauses, otherwise } => {
                for (i, clause) in clauses.iter().enumerate() {
                    let cond = self.expr(&clause.cond);
                    if i == 0 {
                        self.line(f!("if ({cond}) {{"));
                    } else {
                        self.line(f!("}} else if ({cond}) {{"));
                    }
                    self.nested_block(&clause.body);
                }
                if let Some(otherwise) = otherwise {
                    self.line("} else {");
                    self.nested_block(otherwise);
                }
                self.line("}");
            }
            StmtKind::While { cond, body } => {
                let cond = self.expr(cond);
                self.line(f!("while ({cond}) {{"));
                self.nested_block(body);
                self.line("}");
            }
            StmtKind::For {
                vars,
                iterable,
                body,
            } => self.for_stmt(vars, iterable, body),
            StmtKind::Match { .. } => {
                let placeholder = unsupported("match on enum");
                self.line(f!("{placeholder};"));
            }
            StmtKind::Decl(Decl::Function(function)) => {
                self.section = Section::Functions;
                self.function(function);
                self.section = Section::Main;
            }
            StmtKind::Decl(Decl::Struct(decl)) => {
                self.line(f!(
                    "#error \"struct {} is not supported by the native backend\"",
                    decl.name.name
                ));
            }
            StmtKind::Decl(Decl::Enum(decl)) => {
                self.line(f!(
                    "#error \"enum {} is not supported by the native backend\"",
                    decl.name.name
                ));
            }
        }
    }

    /// Lowers `for` to a counted loop over a snapshot of the list. The
    /// counter is hidden, so assigning the index variable doesn't skip items.
    fn for_stmt(&mut self, vars: &[Ident], iterable: &Expr, body: &[Stmt]) {
        let item_ty = match self.type_of(iterable) {
            Type::List(item) => (*item).clone(),
            _ => Type::Any,
        };
        let item_ty = self.c_type(&item_ty);
        let iterable = self.expr(iterable);
        let list = self.names.temp("iter");
        let counter = self.names.temp("index");
        self.line(f!("venice_list_t* {list} = {iterable};"));
        self.line(f!(
            "for (venice_int_t {counter} = 0; {counter} < venice_list_length({list}); {counter}++) {{"
        ));
        self.names.enter();
        self.indented(|this| {
            let item = match vars {
                [index, item] => {
                    let index = this.names.declare(&index.name);
                    this.line(f!("venice_int_t {index} = {counter};"));
                    item
                }
                [item, ..] => item,
                [] => unreachable!("the parser produces one or two loop variables"),
            };
            let item = this.names.declare(&item.name);
            this.line(f!(
                "{item_ty} {item} = VENICE_FROM_WORD({item_ty}, venice_list_index({list}, {counter}));"
            ));
            this.block(body);
        });
        self.names.leave();
        self.line("}");
    }

    fn function(&mut self, function: &Function) {
        trace!(name = %function.name.name, "generating function");
        let name = self.names.declare(&function.name.name);
        let Some(signature) = self.types.function(&function.name.name) else {
            // Not checked: nothing sensible to declare.
            self.line(f!("#error \"function {name} was not type checked\""));
            return;
        };
        let signature = signature.clone();
        self.typedef(&signature);

        self.names.enter_function();
        let ret = self.c_type(&signature.ret);
        let params: Vec<_> = function
            .params
            .iter()
            .zip(&signature.params)
            .map(|(param, ty)| {
                let ty = self.c_type(ty);
                format!("{ty} {}", self.names.param(&param.name.name))
            })
            .collect();
        let params = if params.is_empty() {
            "void".to_owned()
        } else {
            join(params, ", ")
        };
        let head = format!("{ret} {name}({params})");
        self.prototypes.push(format!("{head};"));

        self.ret = Some(signature.ret.clone());
        self.line(f!("{head} {{"));
        self.indented(|this| this.block(&function.body));
        self.line("}");
        self.ret = None;
        self.names.leave_function();
        self.functions.blank_line();
    }

    fn type_of(&self, expr: &Expr) -> Type {
        self.types.type_of(expr).cloned().unwrap_or(Type::Any)
    }

    fn c_type(&mut self, ty: &Type) -> String {
        match ty {
            Type::Bool => "venice_bool_t".into(),
            Type::Int => "venice_int_t".into(),
            Type::String => "venice_string_t*".into(),
            Type::Void => "void".into(),
            Type::Any => "venice_any_t".into(),
            Type::List(_) => "venice_list_t*".into(),
            Type::Map(..) => "venice_map_t*".into(),
            Type::Function(function) => self.typedef(function),
            Type::Struct(_) | Type::Enum(_) | Type::Meta(_) => "venice_word_t".into(),
        }
    }

    /// Declares the function pointer type of a signature, named after the
    /// shapes of its parameter and return types. Returns the type's name.
    fn typedef(&mut self, function: &FunctionType) -> String {
        let params: Vec<_> = function.params.iter().map(|ty| self.c_type(ty)).collect();
        let ret = self.c_type(&function.ret);
        let mut name = String::from("venice_fn_");
        for param in &function.params {
            name.push_str(&shape(param));
            name.push('_');
        }
        name.push_str("to_");
        name.push_str(&shape(&function.ret));

        if !self.typedefs.iter().any(|(existing, _)| *existing == name) {
            let params = if params.is_empty() {
                "void".to_owned()
            } else {
                join(params, ", ")
            };
            let typedef = format!("typedef {ret} (*{name})({params});");
            self.typedefs.push((name.clone(), typedef));
        }
        name
    }
}

/// Writes the runtime's descriptor of a type, as `venice_print` reads it.
fn describe(ty: &Type, out: &mut String) {
    match ty {
        Type::Bool => out.push('b'),
        Type::Int => out.push('i'),
        Type::String => out.push('s'),
        Type::List(item) => {
            out.push('l');
            describe(item, out);
        }
        Type::Map(key, value) => {
            out.push('m');
            describe(key, out);
            describe(value, out);
        }
        _ => out.push('a'),
    }
}

/// The part of a function typedef name contributed by a type.
fn shape(ty: &Type) -> String {
    match ty {
        Type::Bool => "bool".into(),
        Type::Int => "int".into(),
        Type::String => "string".into(),
        Type::Void => "void".into(),
        Type::Any => "any".into(),
        Type::List(_) => "list".into(),
        Type::Map(..) => "map".into(),
        Type::Function(function) => {
            let mut shape = String::from("fn_");
            for param in &function.params {
                shape.push_str(&self::shape(param));
                shape.push('_');
            }
            shape.push_str("to_");
            shape.push_str(&self::shape(&function.ret));
            shape
        }
        Type::Struct(_) | Type::Enum(_) | Type::Meta(_) => "word".into(),
    }
}

fn word(code: &str) -> String {
    format!("VENICE_WORD({code})")
}

fn unsupported(what: impl std::fmt::Display) -> String {
    let what = quote_string(&what.to_string(), ControlEscape::Octal);
    format!("venice_unsupported({what})")
}

fn binary_operator(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Or => "||",
        BinaryOperator::And => "&&",
        _ => op.symbol(),
    }
}
