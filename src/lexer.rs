use std::{iter::Peekable, str::Chars};

use crate::{
    token::{Span, Spanned, Token, TokenKind, KEYWORDS},
    util::BreakableIteratorExt,
};

/// Lexes the whole input, returning every token up to (and including) the
/// end-of-input token.
#[tracing::instrument(level = "trace", skip_all)]
pub fn tokenize(src: &str) -> Result<Vec<Token>, Spanned<Error>> {
    Lexer::new(src)
        .up_to(|result| result.as_ref().map_or(true, Token::is_eof))
        .collect()
}

/// The Venice lexer.
///
/// Tokens are scanned on demand, one per call to [`Lexer::next`]. Once the
/// input is exhausted, every subsequent call yields an end-of-input token.
pub struct Lexer<'src> {
    src: &'src str,
    iter: Peekable<Chars<'src>>,
    cursor: usize,
    line: u32,
    column: u32,
    current_lo: usize,
    current_line: u32,
    current_column: u32,
    done: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Lexer<'src> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            line: 1,
            column: 1,
            current_lo: 0,
            current_line: 1,
            current_column: 1,
            done: false,
        }
    }

    /// Scans and returns the next token.
    pub fn next(&mut self) -> Result<Token, Spanned<Error>> {
        loop {
            if let Some(kind) = self.scan_token_kind()? {
                self.done = kind == TokenKind::Eof;
                return Ok(self.produce(kind));
            }
        }
    }

    /// Whether the end-of-input token was already produced.
    pub fn done(&self) -> bool {
        self.done
    }

    /// Tries to scan the current character. Returns `None` for trivia
    /// (whitespace and comments), which produce no token.
    fn scan_token_kind(&mut self) -> Result<Option<TokenKind>, Spanned<Error>> {
        use TokenKind::*;
        let Some(c) = self.mark_advance() else {
            return Ok(Some(Eof));
        };
        let kind = match c {
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            '[' => LBracket,
            ']' => RBracket,
            ',' => Comma,
            ':' => Colon,
            ';' => Semicolon,
            '.' => Dot,
            '+' => Plus,
            '*' => Star,
            '%' => Percent,
            '-' => match self.peek() {
                Some('>') => self.advance_with(Arrow),
                _ => Minus,
            },
            '/' => match self.peek() {
                Some('/') => {
                    self.inline_comment();
                    return Ok(None);
                }
                _ => Slash,
            },
            '=' => match self.peek() {
                Some('=') => self.advance_with(EqEq),
                _ => Assign,
            },
            '!' => match self.peek() {
                Some('=') => self.advance_with(NotEq),
                _ => Unknown,
            },
            '<' => match self.peek() {
                Some('=') => self.advance_with(LessEq),
                _ => Less,
            },
            '>' => match self.peek() {
                Some('=') => self.advance_with(GreaterEq),
                _ => Greater,
            },
            '"' => self.string()?,
            c if c.is_alphabetic() || c == '_' => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_whitespace() => {
                self.whitespace();
                return Ok(None);
            }
            _ => Unknown,
        };
        Ok(Some(kind))
    }

    /// Scans a string literal up to its closing quotation mark. The escapes
    /// are only decoded when the token text is produced.
    fn string(&mut self) -> Result<TokenKind, Spanned<Error>> {
        let mut is_escaping = false;
        loop {
            match (is_escaping, self.advance()) {
                (_, None) => return Err(self.span().wrap(Error::UnterminatedString)),
                (false, Some('"')) => return Ok(TokenKind::String),
                (false, Some('\\')) => is_escaping = true,
                (_, _) => is_escaping = false,
            }
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        TokenKind::Int
    }

    fn whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn inline_comment(&mut self) {
        while !matches!(self.peek(), Some('\n') | None) {
            self.advance();
        }
    }
}

impl<'src> Lexer<'src> {
    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> Option<char> {
        self.current_lo = self.cursor;
        self.current_line = self.line;
        self.current_column = self.column;
        self.advance()
    }

    /// Returns the next character and advances the iterator, keeping track of
    /// the current line and column. Returns `None` at the end of the input.
    fn advance(&mut self) -> Option<char> {
        let c = self.iter.next()?;
        self.cursor += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next character without advancing the iterator.
    fn peek(&mut self) -> Option<char> {
        self.iter.peek().copied()
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(
            self.current_lo..self.cursor,
            self.current_line,
            self.current_column,
        )
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &'src str {
        &self.src[self.current_lo..self.cursor]
    }

    /// Produces a token using the marked bounds.
    fn produce(&self, kind: TokenKind) -> Token {
        let text = match kind {
            TokenKind::String => {
                let raw = self.substr();
                perform_escape(&raw[1..raw.len() - 1])
            }
            _ => self.substr().to_owned(),
        };
        Token::new(kind, text, self.span())
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, Spanned<Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(Lexer::next(self))
    }
}

fn perform_escape(raw: &str) -> String {
    let mut buf = String::with_capacity(raw.len());
    let mut escaped = false;
    for char in raw.chars() {
        let char = match (escaped, char) {
            (true, '"') => '"',
            (true, '\'') => '\'',
            (true, '\\') => '\\',
            (true, 'n') => '\n',
            (true, 'r') => '\r',
            (true, 't') => '\t',
            (true, 'b') => '\x08', // backspace
            (true, 'f') => '\x0c', // form feed
            (true, 'v') => '\x0b', // vertical tab
            (true, '0') => '\0',
            (true, other) => {
                // Unknown escapes are kept verbatim.
                buf.push('\\');
                other
            }
            (false, '\\') => {
                escaped = true;
                continue;
            }
            (false, char) => char,
        };
        escaped = false;
        buf.push(char);
    }
    buf
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unterminated string literal")]
    UnterminatedString,
}
