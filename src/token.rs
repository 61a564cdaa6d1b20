use std::{fmt, ops::Range};

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The literal text of the token. For string literals this holds the
    /// decoded contents, without the surrounding quotes.
    pub text: Box<str>,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<Box<str>>, span: Span) -> Token {
        Token {
            kind,
            text: text.into(),
            span,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {:?}, {})", self.kind, self.text, self.span)
    }
}

/// A byte range in the source, along with the 1-based line and column of its
/// first character.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub lo: usize,
    pub len: u32,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>, line: u32, column: u32) -> Span {
        debug_assert!(hi >= lo);
        let len = u32::try_from(hi - lo).unwrap_or(u32::MAX);
        Span {
            lo,
            len,
            line,
            column,
        }
    }

    pub fn hi(self) -> usize {
        self.lo + self.len as usize
    }

    /// Creates a new span that starts at `self` and ends at `other`.
    pub fn to(self, other: Span) -> Span {
        let hi = other.hi().max(self.hi());
        Span::new_of_bounds(self.lo..hi, self.line, self.column)
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { span: self, inner }
    }

    pub fn location(self) -> Location {
        Location {
            line: self.line,
            column: self.column,
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, at {})", self.location())
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.lo, self.hi())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub inner: T,
}

impl<T: fmt::Display> fmt::Display for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.span.location(), self.inner)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Fn,
    Struct,
    Enum,
    Let,
    Return,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Match,
    Case,
    Default,
    True,
    False,
    Not,
    And,
    Or,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    /// `=`
    Assign,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    /// `->`
    Arrow,

    Identifier,
    Int,
    String,

    /// A character that starts no valid token. The lexer never fails on
    /// these; the parser rejects them.
    Unknown,
    Eof,
}

impl TokenKind {
    pub fn is_keyword(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Fn | Struct
                | Enum
                | Let
                | Return
                | If
                | Elif
                | Else
                | While
                | For
                | In
                | Match
                | Case
                | Default
                | True
                | False
                | Not
                | And
                | Or
        )
    }

    /// The fixed spelling of this kind, if it has one.
    pub fn lexeme(self) -> Option<&'static str> {
        use TokenKind::*;
        let s = match self {
            Fn => "fn",
            Struct => "struct",
            Enum => "enum",
            Let => "let",
            Return => "return",
            If => "if",
            Elif => "elif",
            Else => "else",
            While => "while",
            For => "for",
            In => "in",
            Match => "match",
            Case => "case",
            Default => "default",
            True => "true",
            False => "false",
            Not => "not",
            And => "and",
            Or => "or",
            LParen => "(",
            RParen => ")",
            LBrace => "{",
            RBrace => "}",
            LBracket => "[",
            RBracket => "]",
            Comma => ",",
            Colon => ":",
            Semicolon => ";",
            Dot => ".",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            Assign => "=",
            EqEq => "==",
            NotEq => "!=",
            Less => "<",
            LessEq => "<=",
            Greater => ">",
            GreaterEq => ">=",
            Arrow => "->",
            Identifier | Int | String | Unknown | Eof => return None,
        };
        Some(s)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lexeme(), self) {
            (Some(lexeme), kind) if kind.is_keyword() => write!(f, "keyword `{lexeme}`"),
            (Some(lexeme), _) => write!(f, "`{lexeme}`"),
            (None, TokenKind::Identifier) => f.write_str("identifier"),
            (None, TokenKind::Int) => f.write_str("integer literal"),
            (None, TokenKind::String) => f.write_str("string literal"),
            (None, TokenKind::Unknown) => f.write_str("unknown character"),
            (None, _) => f.write_str("end of input"),
        }
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "fn" => TokenKind::Fn,
    "func" => TokenKind::Fn,
    "struct" => TokenKind::Struct,
    "enum" => TokenKind::Enum,
    "let" => TokenKind::Let,
    "return" => TokenKind::Return,
    "if" => TokenKind::If,
    "elif" => TokenKind::Elif,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "for" => TokenKind::For,
    "in" => TokenKind::In,
    "match" => TokenKind::Match,
    "case" => TokenKind::Case,
    "default" => TokenKind::Default,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "not" => TokenKind::Not,
    "and" => TokenKind::And,
    "or" => TokenKind::Or,
};
