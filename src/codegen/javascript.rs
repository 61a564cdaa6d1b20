use std::format_args as f;

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
    types::Type,
};

static RESERVED: phf::Set<&'static str> = phf_set! {
    "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "export", "extends", "false", "finally", "function", "import",
    "instanceof", "new", "null", "super", "switch", "this", "throw", "true", "try",
    "typeof", "var", "void", "with", "yield", "let", "static", "await",
    "implements", "package", "protected", "interface", "private", "public",
    "arguments", "eval", "undefined", "NaN", "Infinity", "Array", "Map", "Math",
    "String", "JSON", "Symbol", "console",
};

/// Renders values the same way the other backends do.
const SHOW: &str = r#"function $show(value) {
  if (typeof value === "string") {
    return JSON.stringify(value);
  }
  if (Array.isArray(value)) {
    return `[${value.map($show).join(", ")}]`;
  }
  if (value instanceof Map) {
    const entries = Array.from(value, ([key, item]) => `${$show(key)}: ${$show(item)}`);
    return `{${entries.join(", ")}}`;
  }
  return String(value);
}
"#;

const PRINT: &str = r#"function $print(value) {
  console.log(typeof value === "string" ? value : $show(value));
}
"#;

/// The helpers used by the program, emitted before it.
#[derive(Default)]
struct Prelude {
    show: bool,
    print: bool,
}

impl Prelude {
    fn render(&self) -> String {
        let mut code = String::new();
        for (used, helper) in [(self.show, SHOW), (self.print, PRINT)] {
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
    /// Counter for the names of `match` temporaries.
    temps: usize,
}

impl Generate for Generator<'_> {
    fn emitter(&mut self) -> &mut Emitter {
        &mut self.em
    }

    fn expr(&mut self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Int(int) => int.to_string(),
            ExprKind::String(s) => quote_string(s, ControlEscape::Hex),
            ExprKind::Bool(b) => b.to_string(),
            ExprKind::Symbol(name) if self.types.is_builtin(expr) => {
                self.builtin(&name.name, false)
            }
            ExprKind::Symbol(name) => self.names.get(&name.name).into_owned(),
            ExprKind::Infix {
                op: BinaryOperator::Div,
                lhs,
                rhs,
            } => {
                let p = BinaryOperator::Div.precedence();
                let lhs = self.operand(lhs, p);
                let rhs = self.operand(rhs, p.next());
                format!("Math.trunc({lhs} / {rhs})")
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
                    UnaryOperator::Not => format!("!{operand}"),
                }
            }
            ExprKind::Call { callee, args } => match callee_function(self.types, callee) {
                Some(function) => {
                    let args = ordered_args(function, args);
                    let callee = match &callee.kind {
                        ExprKind::Symbol(name) if self.types.is_builtin(callee) => {
                            let plain = args.iter().all(|arg| prints_natively(self.types, arg));
                            self.builtin(&name.name, plain)
                        }
                        _ => self.operand(callee, Precedence::Call),
                    };
                    let args: Vec<_> = args.into_iter().map(|arg| self.expr(arg)).collect();
                    format!("{callee}({})", join(args, ", "))
                }
                None => {
                    // Struct construction, with the fields in an object.
                    let fields: Vec<_> = args
                        .iter()
                        .map(|arg| {
                            let value = self.expr(&arg.value);
                            match &arg.label {
                                Some(label) => format!("{}: {value}", self.names.ident(&label.name)),
                                None => value,
                            }
                        })
                        .collect();
                    let callee = self.operand(callee, Precedence::Call);
                    if fields.is_empty() {
                        format!("new {callee}({{}})")
                    } else {
                        format!("new {callee}({{ {} }})", join(fields, ", "))
                    }
                }
            },
            ExprKind::List(items) => {
                let items: Vec<_> = items.iter().map(|item| self.expr(item)).collect();
                format!("[{}]", join(items, ", "))
            }
            ExprKind::Map(entries) if entries.is_empty() => "new Map()".into(),
            ExprKind::Map(entries) => {
                let entries: Vec<_> = entries
                    .iter()
                    .map(|(key, value)| format!("[{}, {}]", self.expr(key), self.expr(value)))
                    .collect();
                format!("new Map([{}])", join(entries, ", "))
            }
            ExprKind::Index { base, index } => {
                let is_map = self.is_map(base);
                let base = self.operand(base, Precedence::Call);
                let index = self.expr(index);
                if is_map {
                    format!("{base}.get({index})")
                } else {
                    format!("{base}[{index}]")
                }
            }
            ExprKind::Field { base, field } => {
                let base = self.operand(base, Precedence::Call);
                format!("{base}.{}", self.names.ident(&field.name))
            }
        }
    }

    fn precedence(&self, expr: &Expr) -> Precedence {
        match &expr.kind {
            // Rendered as a call to `Math.trunc`.
            ExprKind::Infix {
                op: BinaryOperator::Div,
                ..
            } => Precedence::Call,
            _ => expr.precedence(),
        }
    }
}

impl<'t> Generator<'t> {
    pub fn new(types: &'t TypeTable) -> Generator<'t> {
        Generator {
            em: Emitter::new("  "),
            types,
            names: Names::new(Namespace {
                reserved: &RESERVED,
                prefix: None,
            }),
            prelude: Prelude::default(),
            temps: 0,
        }
    }

    pub fn generate(mut self, program: &Program) -> String {
        self.block(&program.body);
        let mut code = self.prelude.render();
        code.push_str(&self.em.finish());
        code
    }

    /// Spells a built-in. `console.log` prints booleans and collections its
    /// own way, so printing anything but integers and strings (`plain`)
    /// goes through a helper.
    fn builtin(&mut self, name: &str, plain: bool) -> String {
        match (name, remap_builtin(name, Backend::JavaScript)) {
            (_, Some(builtin)) if plain => builtin.into(),
            ("print", _) => {
                self.prelude.show = true;
                self.prelude.print = true;
                "$print".into()
            }
            _ => self.names.ident(name).into_owned(),
        }
    }

    fn is_map(&self, expr: &Expr) -> bool {
        matches!(self.types.type_of(expr), Some(Type::Map(..)))
    }

    fn block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    /// Writes a block with its own scope: the header and the opening brace,
    /// the statements, then the closing brace.
    fn braced(&mut self, header: impl std::fmt::Display, stmts: &[Stmt]) {
        self.line(f!("{header} {{"));
        self.names.enter();
        self.indented(|this| this.block(stmts));
        self.names.leave();
        self.line("}");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let { name, value, .. } => {
                let value = self.expr(value);
                let name = self.names.declare(&name.name);
                self.line(f!("let {name} = {value};"));
            }
            StmtKind::Assign { target, value } => {
                let value = self.expr(value);
                match &target.kind {
                    ExprKind::Index { base, index } if self.is_map(base) => {
                        let base = self.operand(base, Precedence::Call);
                        let index = self.expr(index);
                        self.line(f!("{base}.set({index}, {value});"));
                    }
                    _ => {
                        let target = self.expr(target);
                        self.line(f!("{target} = {value};"));
                    }
                }
            }
            StmtKind::Return(None) => self.line("return;"),
            StmtKind::Return(Some(value)) => {
                let value = self.expr(value);
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
                    self.scoped(&clause.body);
                }
                if let Some(otherwise) = otherwise {
                    self.line("} else {");
                    self.scoped(otherwise);
                }
                self.line("}");
            }
            StmtKind::While { cond, body } => {
                let cond = self.expr(cond);
                self.braced(f!("while ({cond})"), body);
            }
            StmtKind::For {
                vars,
                iterable,
                body,
            } => {
                let iterable = self.operand(iterable, Precedence::Call);
                self.names.enter();
                let vars: Vec<_> = vars.iter().map(|var| self.names.declare(&var.name)).collect();
                match vars.as_slice() {
                    [index, item] => {
                        self.line(f!("for (let [{index}, {item}] of {iterable}.entries()) {{"));
                    }
                    _ => self.line(f!("for (let {} of {iterable}) {{", join(&vars, ", "))),
                }
                self.indented(|this| this.block(body));
                self.line("}");
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

    /// Writes the statements of a block with its own scope, one level
    /// deeper.
    fn scoped(&mut self, stmts: &[Stmt]) {
        self.names.enter();
        self.indented(|this| this.block(stmts));
        self.names.leave();
    }

    /// Lowers `match` to an `if`/`else if` chain over the enum value's tag.
    fn match_stmt(&mut self, scrutinee: &Expr, arms: &[MatchArm], default: Option<&[Stmt]>) {
        let temp = format!("$match{}", self.temps);
        self.temps += 1;
        let scrutinee = self.expr(scrutinee);
        self.line(f!("const {temp} = {scrutinee};"));

        for (i, arm) in arms.iter().enumerate() {
            let case = quote_string(&arm.pattern.case.name, ControlEscape::Hex);
            if i == 0 {
                self.line(f!("if ({temp}.tag === {case}) {{"));
            } else {
                self.line(f!("}} else if ({temp}.tag === {case}) {{"));
            }
            self.names.enter();
            self.indented(|this| {
                if !arm.pattern.bindings.is_empty() {
                    let bindings: Vec<_> = arm
                        .pattern
                        .bindings
                        .iter()
                        .map(|binding| this.names.declare(&binding.name))
                        .collect();
                    this.line(f!("let [{}] = {temp}.values;", join(bindings, ", ")));
                }
                this.block(&arm.body);
            });
            self.names.leave();
        }
        match default {
            Some(default) if arms.is_empty() => {
                self.line("{");
                self.scoped(default);
                self.line("}");
            }
            Some(default) => {
                self.line("} else {");
                self.scoped(default);
                self.line("}");
            }
            None if arms.is_empty() => {}
            None => self.line("}"),
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
        self.line(f!("function {name}({}) {{", join(params, ", ")));
        self.indented(|this| this.block(&function.body));
        self.line("}");
        self.names.leave_function();
        self.em.blank_line();
    }

    /// Structs become classes built from an object of fields.
    fn struct_decl(&mut self, decl: &StructDecl) {
        self.prelude.show = true;
        let display = &decl.name.name;
        let name = self.names.declare(display);
        let fields: Vec<_> = decl
            .fields
            .iter()
            .map(|field| self.names.ident(&field.name.name).into_owned())
            .collect();

        self.line(f!("class {name} {{"));
        self.indented(|this| {
            if fields.is_empty() {
                this.line("constructor() {}");
            } else {
                this.line(f!("constructor({{ {} }}) {{", join(&fields, ", ")));
                this.indented(|this| {
                    for field in &fields {
                        this.line(f!("this.{field} = {field};"));
                    }
                });
                this.line("}");
            }
            this.em.blank_line();

            let shown: Vec<_> = decl
                .fields
                .iter()
                .zip(&fields)
                .map(|(field, spelled)| format!("{}: ${{$show(this.{spelled})}}", field.name.name))
                .collect();
            this.line("toString() {");
            this.indented(|this| this.line(f!("return `{display}({})`;", join(shown, ", "))));
            this.line("}");
        });
        self.line("}");
        self.em.blank_line();
    }

    /// Enums become a class holding a case tag and the case's values. Each
    /// case is a static member: a value for cases without values, a
    /// constructor function otherwise.
    fn enum_decl(&mut self, decl: &EnumDecl) {
        self.prelude.show = true;
        let display = &decl.name.name;
        let name = self.names.declare(display);
        self.line(f!("class {name} {{"));
        self.indented(|this| {
            this.line("constructor(tag, values) {");
            this.indented(|this| {
                this.line("this.tag = tag;");
                this.line("this.values = values;");
            });
            this.line("}");
            this.em.blank_line();
            this.line("toString() {");
            this.indented(|this| {
                this.line("if (this.values.length === 0) {");
                this.indented(|this| this.line(f!("return `{display}.${{this.tag}}`;")));
                this.line("}");
                this.line(f!(
                    "return `{display}.${{this.tag}}(${{this.values.map($show).join(\", \")}})`;"
                ));
            });
            this.line("}");
        });
        self.line("}");
        self.em.blank_line();

        for case in &decl.cases {
            let tag = quote_string(&case.name.name, ControlEscape::Hex);
            let member = self.names.ident(&case.name.name).into_owned();
            if case.params.is_empty() {
                self.line(f!("{name}.{member} = new {name}({tag}, []);"));
            } else {
                self.line(f!(
                    "{name}.{member} = (...values) => new {name}({tag}, values);"
                ));
            }
        }
        self.em.blank_line();
    }
}

fn binary_operator(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Or => "||",
        BinaryOperator::And => "&&",
        BinaryOperator::Eq => "===",
        BinaryOperator::Ne => "!==",
        _ => op.symbol(),
    }
}

#[cfg(test)]
mod tests {
    use super::{PRINT, SHOW};
    use crate::codegen::{tests::compile, Backend};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[track_caller]
    fn javascript(src: &str) -> String {
        compile(src, Backend::JavaScript)
    }

    #[test]
    fn test_control_flow() {
        let src = indoc! {"
            let xs = [1, 2, 3];
            for i, x in xs {
                if x % 2 == 0 and x != 4 { print(x / 2) } elif not (x > 2) { print(i) } else { }
            }
            while false { }
        "};
        assert_eq!(
            javascript(src),
            indoc! {"
                let xs = [1, 2, 3];
                for (let [i, x] of xs.entries()) {
                  if (x % 2 === 0 && x !== 4) {
                    console.log(Math.trunc(x / 2));
                  } else if (!(x > 2)) {
                    console.log(i);
                  } else {
                  }
                }
                while (false) {
                }
            "}
        );
    }

    #[test]
    fn test_maps_and_keyword_arguments() {
        let src = indoc! {r#"
            fn f(a: int, b: int): int { return a - -b }
            let m = {"k": f(b: 1, a: 2)};
            m["j"] = m["k"] * -(-1);
            let e: map<int, bool> = {};
        "#};
        assert_eq!(
            javascript(src),
            indoc! {r#"
                function f(a, b) {
                  return a - -b;
                }

                let m = new Map([["k", f(2, 1)]]);
                m.set("j", m.get("k") * -(-1));
                let e = new Map();
            "#}
        );
    }

    #[test]
    fn test_loop_and_match_variables_are_assignable() {
        let src = indoc! {"
            enum S { A(int) }
            for x in [1, 2] { x = x + 10; print(x) }
            match S.A(1) { case A(n) { n = n + 1; print(n) } }
        "};
        let expected = indoc! {r#"
            class S {
              constructor(tag, values) {
                this.tag = tag;
                this.values = values;
              }

              toString() {
                if (this.values.length === 0) {
                  return `S.${this.tag}`;
                }
                return `S.${this.tag}(${this.values.map($show).join(", ")})`;
              }
            }

            S.A = (...values) => new S("A", values);

            for (let x of [1, 2]) {
              x = x + 10;
              console.log(x);
            }
            const $match0 = S.A(1);
            if ($match0.tag === "A") {
              let [n] = $match0.values;
              n = n + 1;
              console.log(n);
            }
        "#};
        assert_eq!(javascript(src), format!("{SHOW}\n{expected}"));
    }

    #[test]
    fn test_shadowing_bindings_get_fresh_names() {
        let src = indoc! {"
            let a = 1;
            if true { let a = a + 1; print(a) }
            fn f(a: int) { for i, a in [a] { } }
        "};
        assert_eq!(
            javascript(src),
            indoc! {"
                let a = 1;
                if (true) {
                  let a_0_ = a + 1;
                  console.log(a_0_);
                }
                function f(a) {
                  for (let [i, a_1_] of [a].entries()) {
                  }
                }

            "}
        );
    }

    #[test]
    fn test_struct_declared_in_a_function() {
        let src = "fn f() { struct P { x: string } print(P(x: \"a\")) } f();";
        let expected = indoc! {r#"
            function f() {
              class P {
                constructor({ x }) {
                  this.x = x;
                }

                toString() {
                  return `P(x: ${$show(this.x)})`;
                }
              }

              $print(new P({ x: "a" }));
            }

            f();
        "#};
        assert_eq!(javascript(src), format!("{SHOW}\n{PRINT}\n{expected}"));
    }

    #[test]
    fn test_print_shows_values_alike() {
        let src = r#"print(false); print("s"); print({1: [true]});"#;
        let expected = indoc! {r#"
            $print(false);
            console.log("s");
            $print(new Map([[1, [true]]]));
        "#};
        assert_eq!(javascript(src), format!("{SHOW}\n{PRINT}\n{expected}"));
    }

    #[test]
    fn test_struct_class() {
        let src = "struct Point { x: int, y: int } let p = Point(y: 2, x: 1); print(p);";
        let expected = indoc! {r#"
            class Point {
              constructor({ x, y }) {
                this.x = x;
                this.y = y;
              }

              toString() {
                return `Point(x: ${$show(this.x)}, y: ${$show(this.y)})`;
              }
            }

            let p = new Point({ y: 2, x: 1 });
            $print(p);
        "#};
        assert_eq!(javascript(src), format!("{SHOW}\n{PRINT}\n{expected}"));
    }

    #[test]
    fn test_enum_and_match() {
        let src = indoc! {"
            enum Shape { Circle(int), Empty }
            match Shape.Empty {
                case Circle(r) { print(r) }
                case Empty { }
            }
        "};
        let expected = indoc! {r#"
            class Shape {
              constructor(tag, values) {
                this.tag = tag;
                this.values = values;
              }

              toString() {
                if (this.values.length === 0) {
                  return `Shape.${this.tag}`;
                }
                return `Shape.${this.tag}(${this.values.map($show).join(", ")})`;
              }
            }

            Shape.Circle = (...values) => new Shape("Circle", values);
            Shape.Empty = new Shape("Empty", []);

            const $match0 = Shape.Empty;
            if ($match0.tag === "Circle") {
              let [r] = $match0.values;
              console.log(r);
            } else if ($match0.tag === "Empty") {
            }
        "#};
        assert_eq!(javascript(src), format!("{SHOW}\n{expected}"));
    }

    #[test]
    fn test_reserved_names() {
        let src = "let new = 1; let this = new + 1; let this_ = this;";
        assert_eq!(
            javascript(src),
            indoc! {"
                let new_ = 1;
                let this_ = new_ + 1;
                let this__ = this_;
            "}
        );
    }
}
