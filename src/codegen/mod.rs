use std::{
    borrow::Cow,
    collections::HashMap,
    fmt::{self, Write},
};

use phf::phf_map;
use tracing::debug;

use crate::{
    analyzer::{self, TypeTable},
    ast::{Argument, Expr, Precedence, Program},
    types::{FunctionType, Type},
};

mod javascript;
mod native;
mod python;

const DEFAULT_CODE_CAPACITY: usize = 4 * 1024; // 4 KiB

/// Type checks the program, then generates it in the given backend.
pub fn generate(program: &Program, backend: Backend) -> crate::Result<String> {
    let types = analyzer::check(program)?;
    Ok(generate_with(program, &types, backend))
}

/// Generates a program that already passed the analyzer, which produced
/// `types`.
#[tracing::instrument(level = "trace", skip(program, types))]
pub fn generate_with(program: &Program, types: &TypeTable, backend: Backend) -> String {
    let code = match backend {
        Backend::Python => python::Generator::new(types).generate(program),
        Backend::JavaScript => javascript::Generator::new(types).generate(program),
        Backend::Native => native::Generator::new(types).generate(program),
    };
    debug!(%backend, bytes = code.len(), "generated");
    code
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    Python,
    JavaScript,
    /// C, linked against the `venice.h` runtime.
    Native,
}

impl Backend {
    pub const ALL: &[Backend] = &[Backend::Python, Backend::JavaScript, Backend::Native];

    pub const fn name(&self) -> &'static str {
        match self {
            Backend::Python => "python",
            Backend::JavaScript => "javascript",
            Backend::Native => "native",
        }
    }

    pub const fn file_extension(&self) -> &'static str {
        match self {
            Backend::Python => "py",
            Backend::JavaScript => "js",
            Backend::Native => "c",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct Remap {
    python: &'static str,
    javascript: &'static str,
    native: &'static str,
}

/// Built-in functions and their counterpart in each backend.
static BUILTINS: phf::Map<&'static str, Remap> = phf_map! {
    "print" => Remap {
        python: "print",
        javascript: "console.log",
        native: "venice_print",
    },
};

fn remap_builtin(name: &str, backend: Backend) -> Option<&'static str> {
    let remap = BUILTINS.get(name)?;
    Some(match backend {
        Backend::Python => remap.python,
        Backend::JavaScript => remap.javascript,
        Backend::Native => remap.native,
    })
}

/// How a backend spells the identifiers of a program.
struct Namespace {
    reserved: &'static phf::Set<&'static str>,
    /// Prefix of the names of the runtime, compared ignoring case.
    prefix: Option<&'static str>,
}

impl Namespace {
    /// Spells a program identifier. Reserved words, names ending in `_` and
    /// names under the runtime prefix get one more `_`. Distinct identifiers
    /// thus never share a spelling, nor take one from [`Namespace::fresh`].
    fn ident<'a>(&self, name: &'a str) -> Cow<'a, str> {
        let taken = self.reserved.contains(name)
            || name.ends_with('_')
            || self.prefix.is_some_and(|prefix| {
                name.get(..prefix.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
            });
        if taken {
            Cow::Owned(format!("{name}_"))
        } else {
            Cow::Borrowed(name)
        }
    }

    /// A name that no program identifier is spelled as.
    fn fresh(&self, stem: &str, n: usize) -> String {
        match self.prefix {
            Some(prefix) => format!("{prefix}{stem}{n}"),
            None => format!("{stem}_{n}_"),
        }
    }
}

struct Binding {
    name: String,
    /// Declared outside of every function.
    global: bool,
}

/// The bindings in scope while generating, following the analyzer's scopes.
///
/// A declaration that shadows a visible binding gets a fresh name. Python
/// scopes by function, and in JavaScript and C the new binding would already
/// be visible in its own initializer.
struct Names {
    namespace: Namespace,
    scopes: Vec<HashMap<Box<str>, Binding>>,
    in_function: bool,
    fresh: usize,
}

impl Names {
    fn new(namespace: Namespace) -> Names {
        Names {
            namespace,
            scopes: vec![HashMap::new()],
            in_function: false,
            fresh: 0,
        }
    }

    fn enter(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Leaves the current scope. The program scope is never left.
    fn leave(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Enters the scope of a function's parameters and body.
    fn enter_function(&mut self) {
        self.in_function = true;
        self.enter();
    }

    fn leave_function(&mut self) {
        self.leave();
        self.in_function = false;
    }

    /// Declares a binding in the current scope, returning its spelling.
    fn declare(&mut self, name: &str) -> String {
        let spelling = if self.lookup(name).is_some() {
            self.temp(name)
        } else {
            self.namespace.ident(name).into_owned()
        };
        self.insert(name, spelling)
    }

    /// Declares a function parameter. Nothing but the function's enclosing
    /// scope is visible to it, so it keeps its name.
    fn param(&mut self, name: &str) -> String {
        let spelling = self.namespace.ident(name).into_owned();
        self.insert(name, spelling)
    }

    fn insert(&mut self, name: &str, spelling: String) -> String {
        let depth = self.scopes.len() - 1;
        self.scopes[depth].insert(
            name.into(),
            Binding {
                name: spelling.clone(),
                global: !self.in_function,
            },
        );
        spelling
    }

    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Spells a reference to a binding.
    fn get<'a>(&'a self, name: &'a str) -> Cow<'a, str> {
        match self.lookup(name) {
            Some(binding) => Cow::Borrowed(&binding.name),
            None => self.namespace.ident(name),
        }
    }

    /// Whether a reference from the current function reaches a global.
    fn is_global_from_function(&self, name: &str) -> bool {
        self.in_function && self.lookup(name).is_some_and(|binding| binding.global)
    }

    /// A name for a temporary of the generated code.
    fn temp(&mut self, stem: &str) -> String {
        let n = self.fresh;
        self.fresh += 1;
        self.namespace.fresh(stem, n)
    }

    fn ident<'a>(&self, name: &'a str) -> Cow<'a, str> {
        self.namespace.ident(name)
    }
}

/// Line-oriented code buffer, indented by `depth` copies of the backend's
/// indentation unit.
struct Emitter {
    code: String,
    depth: usize,
    indent: &'static str,
}

impl Emitter {
    fn new(indent: &'static str) -> Emitter {
        Emitter {
            code: String::with_capacity(DEFAULT_CODE_CAPACITY),
            depth: 0,
            indent,
        }
    }

    /// Prints a line at the current depth.
    fn line(&mut self, f: impl fmt::Display) {
        for _ in 0..self.depth {
            self.code.push_str(self.indent);
        }
        writeln!(self.code, "{f}").expect("code emit should be infallible");
    }

    /// Prints an empty line.
    fn blank_line(&mut self) {
        self.code.push('\n');
    }

    /// Appends the code of another buffer.
    fn append(&mut self, other: Emitter) {
        self.code.push_str(&other.code);
    }

    fn finish(self) -> String {
        self.code
    }
}

/// Shared machinery of the backends' generators.
trait Generate {
    fn emitter(&mut self) -> &mut Emitter;

    /// Renders an expression, without surrounding parentheses.
    fn expr(&mut self, expr: &Expr) -> String;

    /// The precedence of the rendered expression, which is the source
    /// precedence unless the backend lowers the node to another shape.
    fn precedence(&self, expr: &Expr) -> Precedence {
        expr.precedence()
    }

    /// Renders an operand that must bind at least as tight as `min`,
    /// parenthesizing it otherwise.
    fn operand(&mut self, expr: &Expr, min: Precedence) -> String {
        let code = self.expr(expr);
        if self.precedence(expr) < min {
            format!("({code})")
        } else {
            code
        }
    }

    fn line(&mut self, f: impl fmt::Display) {
        self.emitter().line(f);
    }

    /// Writes in a block one level deeper.
    fn indented<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T
    where
        Self: Sized,
    {
        self.emitter().depth += 1;
        let res = f(self);
        self.emitter().depth -= 1;
        res
    }
}

/// Orders the arguments of a function call by the parameter each one binds
/// to, so that keyword arguments become positional.
fn ordered_args<'a>(function: &FunctionType, args: &'a [Argument]) -> Vec<&'a Expr> {
    let mut slots = vec![None; args.len()];
    for (i, arg) in args.iter().enumerate() {
        let position = arg
            .label
            .as_ref()
            .and_then(|label| function.position_of(&label.name))
            .unwrap_or(i);
        if let Some(slot) = slots.get_mut(position) {
            *slot = Some(&arg.value);
        }
    }
    slots.into_iter().flatten().collect()
}

/// The function type of a callee, if it isn't a struct construction.
fn callee_function<'t>(types: &'t TypeTable, callee: &Expr) -> Option<&'t FunctionType> {
    match types.type_of(callee) {
        Some(Type::Function(function)) => Some(function.as_ref()),
        _ => None,
    }
}

/// Whether the output primitive of the backend prints the value like every
/// other backend does, which only holds for integers and strings.
fn prints_natively(types: &TypeTable, expr: &Expr) -> bool {
    matches!(types.type_of(expr), Some(Type::Int | Type::String))
}

#[derive(Copy, Clone)]
enum ControlEscape {
    /// `\xNN`, for Python and JavaScript.
    Hex,
    /// `\NNN`, for C, where hexadecimal escapes don't have a fixed length.
    Octal,
}

/// Renders a double-quoted string literal.
fn quote_string(s: &str, control: ControlEscape) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_control() => {
                let byte = c as u8;
                match control {
                    ControlEscape::Hex => write!(out, "\\x{byte:02x}"),
                    ControlEscape::Octal => write!(out, "\\{byte:03o}"),
                }
                .expect("code emit should be infallible");
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn join(items: impl IntoIterator<Item = impl AsRef<str>>, sep: &str) -> String {
    let mut out = String::new();
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        out.push_str(item.as_ref());
    }
    out
}
