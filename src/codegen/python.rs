use std::{collections::BTreeSet, format_args as f, mem};

use phf::phf_set;

use super::{
    callee_function, join, ordered_args, prints_natively, quote_string, remap_builtin, Backend,
    ControlEscape, Emitter, Generate, Names, Namespace,
};
use crate::{
    analyzer::TypeTable,
    ast::{
        BinaryOperator, Decl, EnumDecl, Expr, ExprKind, Function, MatchArm, Precedence, Program,
        Stmt, StmtKind, StructDecl, UnaryOperator,
    },
};

static RESERVED: phf::Set<&'static str> = phf_set! {
    "False", "None", "True", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "except", "finally", "from", "global", "import",
    "is", "lambda", "nonlocal", "pass", "raise", "try", "with", "yield",
    "enumerate", "isinstance", "print", "repr", "self", "str", "int", "bool",
    "list", "dict", "len", "json",
};

const INDENT: &str = "    ";

/// Renders values the same way the other backends do.
const SHOW: &str = r#"import json

def venice_show_(value):
    if isinstance(value, bool):
        return "true" if value else "false"
    if isinstance(value, str):
        return json.dumps(value, ensure_ascii=False)
    if isinstance(value, list):
        return "[" + ", ".join(venice_show_(item) for item in value) + "]"
    if isinstance(value, dict):
        entries = (venice_show_(key) + ": " + venice_show_(item) for key, item in value.items())
        return "{" + ", ".join(entries) + "}"
    return str(value)
"#;

const PRINT: &str = "def venice_print_(value):
    print(value if isinstance(value, str) else venice_show_(value))
";

/// Integer division rounding towards zero, where `//` floors.
const DIV: &str = "def venice_div_(a, b):
    q = a // b
    if q < 0 and q * b != a:
        q += 1
    return q
";

const MOD: &str = "def venice_mod_(a, b):
    return a - b * venice_div_(a, b)
";

/// The helpers used by the program, emitted before it.
#[derive(Default)]
struct Prelude {
    show: bool,
    print: bool,
    div: bool,
    modulo: bool,
}

impl Prelude {
    fn render(&self) -> String {
        let helpers = [
            (self.show, SHOW),
            (self.print, PRINT),
            (self.div || self.modulo, DIV),
            (self.modulo, MOD),
        ];
        let mut code = String::new();
        for (used, helper) in helpers {
            if used {
                code.push_str(helper);
                code.push('\n');
            }
        }
        code
    }
}

pub struct Generator<'t> {
    em: Emitter,
    types: &'t TypeTable,
    names: Names,
    prelude: Prelude,
    /// Globals assigned by the function being generated. Python needs them
    /// declared `global` in the function.
    assigned_globals: BTreeSet<String>,
}

impl Generate for Generator<'_> {
    fn emitter(&mut self) -> &mut Emitter {
        &mut self.em
    }

    fn expr(&mut self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Int(int) => int.to_string(),
            ExprKind::String(s) => quote_string(s, ControlEscape::Hex),
            ExprKind::Bool(true) => "True".into(),
            ExprKind::Bool(false) => "False".into(),
            ExprKind::Symbol(name) if self.types.is_builtin(expr) => {
                // Passed around, it may be called with anything.
                self.builtin(&name.name, false)
            }
            ExprKind::Symbol(name) => self.names.get(&name.name).into_owned(),
            ExprKind::Infix {
                op: op @ (BinaryOperator::Div | BinaryOperator::Rem),
                lhs,
                rhs,
            } => {
                let helper = if *op == BinaryOperator::Div {
                    self.prelude.div = true;
                    "venice_div_"
                } else {
                    self.prelude.modulo = true;
                    "venice_mod_"
                };
                format!("{helper}({}, {})", self.expr(lhs), self.expr(rhs))
            }
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
                    UnaryOperator::Not => format!("not {operand}"),
                }
            }
            ExprKind::Call { callee, args } => match (&callee.kind, callee_function(self.types, callee)) {
                // Built-ins don't share the parameter names of their Python
                // counterparts.
                (ExprKind::Symbol(name), Some(function)) if self.types.is_builtin(callee) => {
                    let args = ordered_args(function, args);
                    let plain = args.iter().all(|arg| prints_natively(self.types, arg));
                    let callee = self.builtin(&name.name, plain);
                    let args: Vec<_> = args.into_iter().map(|arg| self.expr(arg)).collect();
                    format!("{callee}({})", join(args, ", "))
                }
                _ => {
                    let args: Vec<_> = args
                        .iter()
                        .map(|arg| match &arg.label {
                            Some(label) => {
                                let value = self.expr(&arg.value);
                                format!("{}={value}", self.names.ident(&label.name))
                            }
                            None => self.expr(&arg.value),
                        })
                        .collect();
                    let callee = self.operand(callee, Precedence::Call);
                    format!("{callee}({})", join(args, ", "))
                }
            },
            ExprKind::List(items) => {
                let items: Vec<_> = items.iter().map(|item| self.expr(item)).collect();
                format!("[{}]", join(items, ", "))
            }
            ExprKind::Map(entries) => {
                let entries: Vec<_> = entries
                    .iter()
                    .map(|(key, value)| format!("{}: {}", self.expr(key), self.expr(value)))
                    .collect();
                format!("{{{}}}", join(entries, ", "))
            }
            ExprKind::Index { base, index } => {
                let base = self.operand(base, Precedence::Call);
                format!("{base}[{}]", self.expr(index))
            }
            ExprKind::Field { base, field } => {
                let base = self.operand(base, Precedence::Call);
                format!("{base}.{}", self.names.ident(&field.name))
            }
        }
    }

    fn precedence(&self, expr: &Expr) -> Precedence {
        match &expr.kind {
            // Rendered as helper calls.
            ExprKind::Infix {
                op: BinaryOperator::Div | BinaryOperator::Rem,
                ..
            } => Precedence::Call,
            _ => expr.precedence(),
        }
    }
}

impl<'t> Generator<'t> {
    pub fn new(types: &'t TypeTable) -> Generator<'t> {
        Generator {
            em: Emitter::new(INDENT),
            types,
            names: Names::new(Namespace {
                reserved: &RESERVED,
                prefix: None,
            }),
            prelude: Prelude::default(),
            assigned_globals: BTreeSet::new(),
        }
    }

    pub fn generate(mut self, program: &Program) -> String {
        self.block(&program.body);
        let mut code = self.prelude.render();
        code.push_str(&self.em.finish());
        code
    }

    /// Spells a built-in. Python prints booleans and collections its own
    /// way, so printing anything but integers and strings (`plain`) goes
    /// through a helper.
    fn builtin(&mut self, name: &str, plain: bool) -> String {
        match (name, remap_builtin(name, Backend::Python)) {
            (_, Some(builtin)) if plain => builtin.into(),
            ("print", _) => {
                self.prelude.show = true;
                self.prelude.print = true;
                "venice_print_".into()
            }
            _ => self.names.ident(name).into_owned(),
        }
    }

    fn block(&mut self, stmts: &[Stmt]) {
        if stmts.is_empty() {
            self.line("pass");
        }
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    /// Writes a block with its own scope, one level deeper.
    fn nested_block(&mut self, stmts: &[Stmt]) {
        self.names.enter();
        self.indented(|this| this.block(stmts));
        self.names.leave();
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let { name, value, .. } => {
                let value = self.expr(value);
                let name = self.names.declare(&name.name);
                self.line(f!("{name} = {value}"));
            }
            StmtKind::Assign { target, value } => {
                if let ExprKind::Symbol(name) = &target.kind {
                    if self.names.is_global_from_function(&name.name) {
                        let global = self.names.get(&name.name).into_owned();
                        self.assigned_globals.insert(global);
                    }
                }
                let target = self.expr(target);
                let value = self.expr(value);
                self.line(f!("{target} = {value}"));
            }
            StmtKind::Return(None) => self.line("return"),
            StmtKind::Return(Some(value)) => {
                let value = self.expr(value);
                self.line(f!("return {value}"));
            }
            StmtKind::Expr(expr) => {
                let expr = self.expr(expr);
                self.line(expr);
            }
            StmtKind::If { clauses, otherwise } => {
                for (i, clause) in clauses.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { "elif" };
                    let cond = self.expr(&clause.cond);
                    self.line(f!("{keyword} {cond}:"));
                    self.nested_block(&clause.body);
                }
                if let Some(otherwise) = otherwise {
                    self.line("else:");
                    self.nested_block(otherwise);
                }
            }
            StmtKind::While { cond, body } => {
                let cond = self.expr(cond);
                self.line(f!("while {cond}:"));
                self.nested_block(body);
            }
            StmtKind::For {
                vars,
                iterable,
                body,
            } => {
                let iterable = self.expr(iterable);
                self.names.enter();
                let vars: Vec<_> = vars.iter().map(|var| self.names.declare(&var.name)).collect();
                match vars.as_slice() {
                    [index, item] => self.line(f!("for {index}, {item} in enumerate({iterable}):")),
                    _ => self.line(f!("for {} in {iterable}:", join(&vars, ", "))),
                }
                self.indented(|this| this.block(body));
                self.names.leave();
            }
            StmtKind::Match {
                scrutinee,
                arms,
                default,
            } => self.match_stmt(scrutinee, arms, default.as_deref()),
            StmtKind::Decl(Decl::Function(function)) => self.function(function),
            StmtKind::Decl(Decl::Struct(decl)) => self.struct_decl(decl),
            StmtKind::Decl(Decl::Enum(decl)) => self.enum_decl(decl),
        }
    }

    /// Lowers `match` to an `if`/`elif` chain over the enum value's tag.
    fn match_stmt(&mut self, scrutinee: &Expr, arms: &[MatchArm], default: Option<&[Stmt]>) {
        let scrutinee = self.expr(scrutinee);
        let temp = self.names.temp("match");
        self.line(f!("{temp} = {scrutinee}"));

        for (i, arm) in arms.iter().enumerate() {
            let keyword = if i == 0 { "if" } else { "elif" };
            let case = quote_string(&arm.pattern.case.name, ControlEscape::Hex);
            self.line(f!("{keyword} {temp}.tag == {case}:"));
            self.names.enter();
            self.indented(|this| {
                for (n, binding) in arm.pattern.bindings.iter().enumerate() {
                    let binding = this.names.declare(&binding.name);
                    this.line(f!("{binding} = {temp}.values[{n}]"));
                }
                this.block(&arm.body);
            });
            self.names.leave();
        }
        match default {
            Some(default) if arms.is_empty() => {
                self.names.enter();
                self.block(default);
                self.names.leave();
            }
            Some(default) => {
                self.line("else:");
                self.nested_block(default);
            }
            None => {}
        }
    }

    fn function(&mut self, function: &Function) {
        let name = self.names.declare(&function.name.name);
        self.names.enter_function();
        let params: Vec<_> = function
            .params
            .iter()
            .map(|param| self.names.param(&param.name.name))
            .collect();
        self.line(f!("def {name}({}):", join(params, ", ")));

        // The body goes apart, as the globals it assigns are declared first.
        let mut body = Emitter::new(INDENT);
        body.depth = self.em.depth + 1;
        let outer = mem::replace(&mut self.em, body);
        self.block(&function.body);
        let body = mem::replace(&mut self.em, outer);
        self.names.leave_function();

        let globals = mem::take(&mut self.assigned_globals);
        if !globals.is_empty() {
            self.indented(|this| this.line(f!("global {}", join(&globals, ", "))));
        }
        self.em.append(body);
        self.em.blank_line();
    }

    /// Structs become classes built from keyword arguments, printed with
    /// their fields in declaration order.
    fn struct_decl(&mut self, decl: &StructDecl) {
        self.prelude.show = true;
        let display = &decl.name.name;
        let name = self.names.declare(display);
        let fields: Vec<_> = decl
            .fields
            .iter()
            .map(|field| self.names.ident(&field.name.name).into_owned())
            .collect();

        self.line(f!("class {name}:"));
        self.indented(|this| {
            if fields.is_empty() {
                this.line("def __init__(self):");
                this.indented(|this| this.line("pass"));
            } else {
                this.line(f!("def __init__(self, *, {}):", join(&fields, ", ")));
                this.indented(|this| {
                    for field in &fields {
                        this.line(f!("self.{field} = {field}"));
                    }
                });
            }
            this.em.blank_line();

            let shown: Vec<_> = decl
                .fields
                .iter()
                .zip(&fields)
                .map(|(field, spelled)| {
                    format!("{}: {{venice_show_(self.{spelled})}}", field.name.name)
                })
                .collect();
            this.line("def __str__(self):");
            this.indented(|this| this.line(f!("return f\"{display}({})\"", join(shown, ", "))));
        });
        self.em.blank_line();
    }

    /// Enums become a class holding a case tag and the case's values. Each
    /// case is an attribute of the class: a value for cases without values,
    /// a constructor function otherwise.
    fn enum_decl(&mut self, decl: &EnumDecl) {
        self.prelude.show = true;
        let display = &decl.name.name;
        let name = self.names.declare(display);
        self.line(f!("class {name}:"));
        self.indented(|this| {
            this.line("def __init__(self, tag, *values):");
            this.indented(|this| {
                this.line("self.tag = tag");
                this.line("self.values = values");
            });
            this.em.blank_line();
            this.line("def __str__(self):");
            this.indented(|this| {
                this.line("if not self.values:");
                this.indented(|this| this.line(f!("return \"{display}.\" + self.tag")));
                this.line("values = \", \".join(venice_show_(value) for value in self.values)");
                this.line(f!("return f\"{display}.{{self.tag}}({{values}})\""));
            });
        });
        self.em.blank_line();

        for case in &decl.cases {
            let tag = quote_string(&case.name.name, ControlEscape::Hex);
            let attribute = self.names.ident(&case.name.name).into_owned();
            if case.params.is_empty() {
                self.line(f!("{name}.{attribute} = {name}({tag})"));
            } else {
                self.line(f!("{name}.{attribute} = lambda *values: {name}({tag}, *values)"));
            }
        }
        self.em.blank_line();
    }
}

fn binary_operator(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Or => "or",
        BinaryOperator::And => "and",
        _ => op.symbol(),
    }
}

#[cfg(test)]
mod tests {
    use super::{DIV, MOD, PRINT, SHOW};
    use crate::codegen::{tests::compile, Backend};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[track_caller]
    fn python(src: &str) -> String {
        compile(src, Backend::Python)
    }

    #[test]
    fn test_control_flow() {
        let src = indoc! {"
            let xs = [1, 2, 3];
            for i, x in xs {
                if x % 2 == 0 { print(x / 2) } elif not (x > 2 or false) { print(i) } else { }
            }
            let n = 0;
            while n < 3 { n = n + 1 }
        "};
        let expected = indoc! {"
            xs = [1, 2, 3]
            for i, x in enumerate(xs):
                if venice_mod_(x, 2) == 0:
                    print(venice_div_(x, 2))
                elif not (x > 2 or False):
                    print(i)
                else:
                    pass
            n = 0
            while n < 3:
                n = n + 1
        "};
        assert_eq!(python(src), format!("{DIV}\n{MOD}\n{expected}"));
    }

    #[test]
    fn test_division_rounds_towards_zero() {
        assert_eq!(
            python("print(-7 / 2 * 2);"),
            format!("{DIV}\nprint(venice_div_(-7, 2) * 2)\n")
        );
    }

    #[test]
    fn test_parenthesization_follows_precedence() {
        let src = "let a = 1; let b = (a + 2) * (3 - a) - (a - 1); let c = a - (2 - 3); let d = -(-a);";
        assert_eq!(
            python(src),
            indoc! {"
                a = 1
                b = (a + 2) * (3 - a) - (a - 1)
                c = a - (2 - 3)
                d = -(-a)
            "}
        );
    }

    #[test]
    fn test_functions_declare_the_globals_they_assign() {
        let src = indoc! {"
            let count = 0;
            let step = 2;
            fn inc(by: int) { let old = count; count = old + by; step = step }
            fn read(): int { return count }
            inc(step);
            print(read());
        "};
        assert_eq!(
            python(src),
            indoc! {"
                count = 0
                step = 2
                def inc(by):
                    global count, step
                    old = count
                    count = old + by
                    step = step

                def read():
                    return count

                inc(step)
                print(read())
            "}
        );
    }

    #[test]
    fn test_shadowing_bindings_get_fresh_names() {
        let src = indoc! {"
            let a = 1;
            if true { let a = a + 1; print(a) }
            print(a);
            for a in [a] { print(a) }
            fn f(a: int) { while true { let a = a; } }
        "};
        assert_eq!(
            python(src),
            indoc! {"
                a = 1
                if True:
                    a_0_ = a + 1
                    print(a_0_)
                print(a)
                for a_1_ in [a]:
                    print(a_1_)
                def f(a):
                    while True:
                        a_2_ = a

            "}
        );
    }

    #[test]
    fn test_print_shows_values_alike() {
        let src = r#"print(true); print("s"); print([1]); let p = print; p(1);"#;
        let expected = indoc! {r#"
            venice_print_(True)
            print("s")
            venice_print_([1])
            p = venice_print_
            p(1)
        "#};
        assert_eq!(python(src), format!("{SHOW}\n{PRINT}\n{expected}"));
    }

    #[test]
    fn test_struct_class() {
        let src = indoc! {r#"
            struct Point { x: int, y: int }
            let p = Point(y: 2, x: 1);
            p.x = 3;
            print(p)
        "#};
        let expected = indoc! {r#"
            class Point:
                def __init__(self, *, x, y):
                    self.x = x
                    self.y = y

                def __str__(self):
                    return f"Point(x: {venice_show_(self.x)}, y: {venice_show_(self.y)})"

            p = Point(y=2, x=1)
            p.x = 3
            venice_print_(p)
        "#};
        assert_eq!(python(src), format!("{SHOW}\n{PRINT}\n{expected}"));
    }

    #[test]
    fn test_enum_and_match() {
        let src = indoc! {"
            enum Shape { Circle(int), Empty }
            let s = Shape.Circle(2);
            let match_0_ = 0;
            match s {
                case Circle(r) { print(r) }
                default { }
            }
        "};
        let expected = indoc! {r#"
            class Shape:
                def __init__(self, tag, *values):
                    self.tag = tag
                    self.values = values

                def __str__(self):
                    if not self.values:
                        return "Shape." + self.tag
                    values = ", ".join(venice_show_(value) for value in self.values)
                    return f"Shape.{self.tag}({values})"

            Shape.Circle = lambda *values: Shape("Circle", *values)
            Shape.Empty = Shape("Empty")

            s = Shape.Circle(2)
            match_0__ = 0
            match_0_ = s
            if match_0_.tag == "Circle":
                r = match_0_.values[0]
                print(r)
            else:
                pass
        "#};
        assert_eq!(python(src), format!("{SHOW}\n{expected}"));
    }

    #[test]
    fn test_reserved_names_and_keyword_arguments() {
        let src = "fn f(lambda: int, pass: int): int { return lambda - pass } print(value: f(pass: 1, lambda: 2));";
        assert_eq!(
            python(src),
            indoc! {"
                def f(lambda_, pass_):
                    return lambda_ - pass_

                print(f(pass_=1, lambda_=2))
            "}
        );
    }
}
