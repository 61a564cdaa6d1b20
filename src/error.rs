use crate::{analyzer, lexer, parser, token::Spanned};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A compilation diagnostic. The first violation found by any stage aborts
/// the compilation with one of these.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("syntax error at {0}")]
    Syntax(Spanned<parser::Error>),
    #[error("type error at {0}")]
    Type(Spanned<analyzer::Error>),
    /// A bug in the compiler itself, never caused by the input.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl From<Spanned<parser::Error>> for Error {
    fn from(error: Spanned<parser::Error>) -> Self {
        Error::Syntax(error)
    }
}

impl From<Spanned<lexer::Error>> for Error {
    fn from(Spanned { span, inner }: Spanned<lexer::Error>) -> Self {
        Error::Syntax(span.wrap(parser::Error::Lexer(inner)))
    }
}

impl From<Spanned<analyzer::Error>> for Error {
    fn from(error: Spanned<analyzer::Error>) -> Self {
        Error::Type(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Span;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_carries_kind_and_location() {
        let span = Span::new_of_bounds(4..5, 1, 5);
        let error = Error::from(span.wrap(analyzer::Error::UndefinedSymbol { name: "y".into() }));
        assert_eq!(error.to_string(), "type error at 1:5: undefined symbol `y`");

        let error = Error::from(span.wrap(lexer::Error::UnterminatedString));
        assert_eq!(
            error.to_string(),
            "syntax error at 1:5: unterminated string literal"
        );
    }
}
