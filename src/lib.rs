use tracing::debug;

/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The analyzer checks the soundness of the AST's types, recording the type
/// of every expression in a side table.
pub mod analyzer;

/// The code generator maps a checked AST into the source of a target
/// language.
pub mod codegen;

pub mod ast;
pub mod error;
pub mod scope;
pub mod token;
pub mod types;
pub mod util;

pub use error::{Error, Result};

use codegen::Backend;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CompileOptions {
    pub backend: Backend,
}

/// Compiles a program, from its source to the source of the selected
/// backend.
pub fn compile(src: &str, options: &CompileOptions) -> Result<String> {
    let program = parser::parse_program(src)?;
    debug!(statements = program.body.len(), "parsed");

    let types = analyzer::check(&program)?;
    debug!(expressions = types.len(), "checked");

    Ok(codegen::generate_with(&program, &types, options.backend))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compile_reports_the_first_error() {
        let options = CompileOptions {
            backend: Backend::Python,
        };
        let error = compile("let x = ;", &options).unwrap_err();
        assert_eq!(
            error.to_string(),
            "syntax error at 1:9: expected expression, but got `;`"
        );
        let error = compile("print(1 + true);", &options).unwrap_err();
        assert_eq!(
            error.to_string(),
            "type error at 1:11: expected type int, but got bool"
        );
    }

    #[test]
    fn test_compile_every_demo() {
        let demos = [
            include_str!("../demos/add.vn"),
            include_str!("../demos/shapes.vn"),
            include_str!("../demos/fizzbuzz.vn"),
            include_str!("../demos/words.vn"),
            include_str!("../demos/scopes.vn"),
            include_str!("../demos/tokens.vn"),
        ];
        for src in demos {
            for &backend in Backend::ALL {
                if let Err(error) = compile(src, &CompileOptions { backend }) {
                    panic!("{backend}: {error}");
                }
            }
        }
    }
}
