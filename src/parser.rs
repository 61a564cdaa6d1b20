use std::fmt;

use crate::{
    ast::{
        Argument, BinaryOperator, Binding, Block, Decl, EnumCase, EnumDecl, Expr, ExprId,
        ExprKind, Function, Ident, IfClause, MatchArm, Pattern, Precedence, Program, Stmt,
        StmtKind, StructDecl, TypeExpr, TypeExprKind, UnaryOperator,
    },
    error::{self, Result},
    lexer::{self, Lexer},
    token::{Span, Token, TokenKind},
};

/// Parses a whole program.
#[tracing::instrument(level = "trace", skip_all)]
pub fn parse_program(src: &str) -> Result<Program> {
    Parser::new(src).parse_program()
}

/// Parses a single expression, which must span the entire input.
pub fn parse_expr(src: &str) -> Result<Expr> {
    let mut p = Parser::new(src);
    let expr = p.parse_expr()?;
    p.consume(TokenKind::Eof)?;
    Ok(expr)
}

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    /// Single-slot pushback buffer.
    pushed_back: Option<Token>,
    next_id: u32,
}

impl Parser<'_> {
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut body = Vec::new();
        loop {
            let token = self.advance()?;
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Fn => {
                    let function = self.parse_function(&token)?;
                    body.push(function);
                }
                _ => {
                    self.push_back(token)?;
                    body.push(self.parse_stmt()?);
                }
            }
        }
        Ok(Program { body })
    }

    fn parse_function(&mut self, fn_token: &Token) -> Result<Stmt> {
        let name = self.parse_ident()?;
        self.consume(TokenKind::LParen)?;
        let (params, _) = self.parse_list(TokenKind::RParen, Parser::parse_binding)?;
        let return_ty = match self.take_any(&[TokenKind::Colon, TokenKind::Arrow])? {
            Some(_) => Some(self.parse_type()?),
            None => None,
        };
        let (body, end) = self.parse_block()?;
        let function = Function {
            name,
            params,
            return_ty,
            body,
        };
        Ok(Stmt {
            kind: StmtKind::Decl(Decl::Function(function)),
            span: fn_token.span.to(end),
        })
    }

    fn parse_struct(&mut self, struct_token: &Token) -> Result<Stmt> {
        let name = self.parse_ident()?;
        self.consume(TokenKind::LBrace)?;
        let (fields, end) = self.parse_list(TokenKind::RBrace, Parser::parse_binding)?;
        Ok(Stmt {
            kind: StmtKind::Decl(Decl::Struct(StructDecl { name, fields })),
            span: struct_token.span.to(end.span),
        })
    }

    fn parse_enum(&mut self, enum_token: &Token) -> Result<Stmt> {
        let name = self.parse_ident()?;
        self.consume(TokenKind::LBrace)?;
        let (cases, end) = self.parse_list(TokenKind::RBrace, |this| {
            let name = this.parse_ident()?;
            let params = match this.take(TokenKind::LParen)? {
                Some(_) => this.parse_list(TokenKind::RParen, Parser::parse_type)?.0,
                None => Vec::new(),
            };
            Ok(EnumCase { name, params })
        })?;
        Ok(Stmt {
            kind: StmtKind::Decl(Decl::Enum(EnumDecl { name, cases })),
            span: enum_token.span.to(end.span),
        })
    }

    /// Parses `name: type`.
    fn parse_binding(&mut self) -> Result<Binding> {
        let name = self.parse_ident()?;
        self.consume(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        Ok(Binding { name, ty })
    }

    fn parse_type(&mut self) -> Result<TypeExpr> {
        let name = self.parse_ident()?;
        if self.take(TokenKind::Less)?.is_none() {
            let span = name.span;
            return Ok(TypeExpr {
                kind: TypeExprKind::Named(name),
                span,
            });
        }
        let mut args = Vec::new();
        let end = loop {
            args.push(self.parse_type()?);
            if let Some(end) = self.take(TokenKind::Greater)? {
                break end;
            }
            self.consume(TokenKind::Comma)?;
        };
        let span = name.span.to(end.span);
        Ok(TypeExpr {
            kind: TypeExprKind::Parameterized { name, args },
            span,
        })
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(Ident {
            name: token.text,
            span: token.span,
        })
    }

    /// Parses `{ stmt* }`, returning the statements and the span of the
    /// closing brace.
    fn parse_block(&mut self) -> Result<(Block, Span)> {
        self.consume(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        loop {
            let token = self.advance()?;
            match token.kind {
                TokenKind::RBrace => return Ok((stmts, token.span)),
                TokenKind::Eof => return Err(self.unexpected(&token, TokenKind::RBrace.into())),
                _ => {
                    self.push_back(token)?;
                    stmts.push(self.parse_stmt()?);
                }
            }
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let token = self.advance()?;
        let (kind, span) = match token.kind {
            TokenKind::Let => {
                let name = self.parse_ident()?;
                let ty = match self.take(TokenKind::Colon)? {
                    Some(_) => Some(self.parse_type()?),
                    None => None,
                };
                self.consume(TokenKind::Assign)?;
                let value = self.parse_expr()?;
                self.parse_terminator()?;
                let span = token.span.to(value.span);
                (StmtKind::Let { name, ty, value }, span)
            }

            TokenKind::Return => {
                let next = self.advance()?;
                let is_bare = matches!(
                    next.kind,
                    TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
                );
                self.push_back(next)?;
                let value = if is_bare {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.parse_terminator()?;
                let span = value.as_ref().map_or(token.span, |v| token.span.to(v.span));
                (StmtKind::Return(value), span)
            }

            TokenKind::If => {
                let mut clauses = vec![self.parse_if_clause()?];
                let mut otherwise = None;
                let mut end = clauses[0].1;
                loop {
                    if self.take(TokenKind::Elif)?.is_some() {
                        clauses.push(self.parse_if_clause()?);
                    } else if self.take(TokenKind::Else)?.is_some() {
                        if self.take(TokenKind::If)?.is_some() {
                            clauses.push(self.parse_if_clause()?);
                        } else {
                            let (body, else_end) = self.parse_block()?;
                            otherwise = Some(body);
                            end = else_end;
                            break;
                        }
                    } else {
                        break;
                    }
                    end = clauses[clauses.len() - 1].1;
                }
                let clauses = clauses.into_iter().map(|(clause, _)| clause).collect();
                (StmtKind::If { clauses, otherwise }, token.span.to(end))
            }

            TokenKind::While => {
                let cond = self.parse_expr()?;
                let (body, end) = self.parse_block()?;
                (StmtKind::While { cond, body }, token.span.to(end))
            }

            TokenKind::For => {
                let mut vars = vec![self.parse_ident()?];
                if self.take(TokenKind::Comma)?.is_some() {
                    vars.push(self.parse_ident()?);
                }
                self.consume(TokenKind::In)?;
                let iterable = self.parse_expr()?;
                let (body, end) = self.parse_block()?;
                let kind = StmtKind::For {
                    vars,
                    iterable,
                    body,
                };
                (kind, token.span.to(end))
            }

            TokenKind::Match => return self.parse_match(&token),
            TokenKind::Struct => return self.parse_struct(&token),
            TokenKind::Enum => return self.parse_enum(&token),
            TokenKind::Fn => {
                return Err(error::Error::Syntax(token.span.wrap(Error::NestedFunction)));
            }

            // Expression statement, possibly an assignment
            _ => {
                let expr = self.parse_expr_from(token, Precedence::Lowest)?;
                if self.take(TokenKind::Assign)?.is_some() {
                    if !matches!(
                        expr.kind,
                        ExprKind::Symbol(_) | ExprKind::Index { .. } | ExprKind::Field { .. }
                    ) {
                        return Err(error::Error::Syntax(
                            expr.span.wrap(Error::InvalidAssignmentTarget),
                        ));
                    }
                    let value = self.parse_expr()?;
                    self.parse_terminator()?;
                    let span = expr.span.to(value.span);
                    let assign = StmtKind::Assign {
                        target: expr,
                        value,
                    };
                    (assign, span)
                } else {
                    self.parse_terminator()?;
                    let span = expr.span;
                    (StmtKind::Expr(expr), span)
                }
            }
        };
        Ok(Stmt { kind, span })
    }

    fn parse_if_clause(&mut self) -> Result<(IfClause, Span)> {
        let cond = self.parse_expr()?;
        let (body, end) = self.parse_block()?;
        Ok((IfClause { cond, body }, end))
    }

    fn parse_match(&mut self, match_token: &Token) -> Result<Stmt> {
        let scrutinee = self.parse_expr()?;
        self.consume(TokenKind::LBrace)?;
        let mut arms = Vec::new();
        let mut default = None;
        let end = loop {
            let token = self.advance()?;
            match token.kind {
                TokenKind::RBrace => break token.span,
                TokenKind::Case if default.is_none() => {
                    let case = self.parse_ident()?;
                    let bindings = match self.take(TokenKind::LParen)? {
                        Some(_) => self.parse_list(TokenKind::RParen, Parser::parse_ident)?.0,
                        None => Vec::new(),
                    };
                    let (body, _) = self.parse_block()?;
                    arms.push(MatchArm {
                        pattern: Pattern { case, bindings },
                        body,
                    });
                }
                TokenKind::Default if default.is_none() => {
                    default = Some(self.parse_block()?.0);
                }
                _ if default.is_some() => {
                    return Err(self.unexpected(&token, TokenKind::RBrace.into()));
                }
                _ => return Err(self.unexpected(&token, Expected::MatchArm)),
            }
        };
        let kind = StmtKind::Match {
            scrutinee,
            arms,
            default,
        };
        Ok(Stmt {
            kind,
            span: match_token.span.to(end),
        })
    }

    /// Expects a `;`. The terminator may be left out right before a closing
    /// brace or the end of input.
    fn parse_terminator(&mut self) -> Result<()> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Semicolon => Ok(()),
            TokenKind::RBrace | TokenKind::Eof => self.push_back(token),
            _ => Err(self.unexpected(&token, TokenKind::Semicolon.into())),
        }
    }

    pub fn parse_expr(&mut self) -> Result<Expr> {
        let token = self.advance()?;
        self.parse_expr_from(token, Precedence::Lowest)
    }

    fn parse_expr_bp(&mut self, min: Precedence) -> Result<Expr> {
        let token = self.advance()?;
        self.parse_expr_from(token, min)
    }

    /// Parses an expression whose first token was already consumed. Only
    /// operators binding tighter than `min` are folded into it, so operators
    /// of equal precedence associate to the left.
    fn parse_expr_from(&mut self, first: Token, min: Precedence) -> Result<Expr> {
        let mut lhs = self.parse_nud(first)?;

        loop {
            let op_token = self.advance()?;
            match Self::infix_precedence(op_token.kind) {
                Some(precedence) if precedence > min => {
                    lhs = self.parse_led(op_token, lhs, precedence)?;
                }
                // Not an infix operator or binds too loosely
                _ => {
                    self.push_back(op_token)?;
                    break;
                }
            }
        }

        Ok(lhs)
    }

    /// nud: Parses tokens that start an expression
    /// (prefix operators, literals, grouping)
    fn parse_nud(&mut self, token: Token) -> Result<Expr> {
        let (kind, span) = match token.kind {
            TokenKind::Identifier => {
                let ident = Ident {
                    name: token.text,
                    span: token.span,
                };
                (ExprKind::Symbol(ident), token.span)
            }
            TokenKind::Int => {
                let Ok(parsed) = token.text.parse() else {
                    let error = Error::IntOutOfRange(token.text);
                    return Err(error::Error::Syntax(token.span.wrap(error)));
                };
                (ExprKind::Int(parsed), token.span)
            }
            TokenKind::String => (ExprKind::String(token.text), token.span),
            TokenKind::True => (ExprKind::Bool(true), token.span),
            TokenKind::False => (ExprKind::Bool(false), token.span),

            // Grouping: ( expr )
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                let end = self.consume(TokenKind::RParen)?;
                return Ok(Expr {
                    span: token.span.to(end.span),
                    ..expr
                });
            }

            // List literal: [ expr, ... ]
            TokenKind::LBracket => {
                let (items, end) = self.parse_list(TokenKind::RBracket, Parser::parse_expr)?;
                (ExprKind::List(items), token.span.to(end.span))
            }

            // Map literal: { key: value, ... }
            TokenKind::LBrace => {
                let (entries, end) = self.parse_list(TokenKind::RBrace, |this| {
                    let key = this.parse_expr()?;
                    this.consume(TokenKind::Colon)?;
                    let value = this.parse_expr()?;
                    Ok((key, value))
                })?;
                (ExprKind::Map(entries), token.span.to(end.span))
            }

            // Prefix operators: -, not
            kind @ (TokenKind::Minus | TokenKind::Not) => {
                let op = if kind == TokenKind::Minus {
                    UnaryOperator::Neg
                } else {
                    UnaryOperator::Not
                };
                let expr = self.parse_expr_bp(Precedence::Prefix)?;
                let span = token.span.to(expr.span);
                let prefix = ExprKind::Prefix {
                    op,
                    expr: Box::new(expr),
                };
                (prefix, span)
            }

            _ => return Err(self.unexpected(&token, Expected::Expression)),
        };
        Ok(self.make_expr(kind, span))
    }

    /// led: Parses tokens that continue an expression
    /// (infix operators, call, index and field access)
    fn parse_led(&mut self, op_token: Token, lhs: Expr, precedence: Precedence) -> Result<Expr> {
        let (kind, span) = match op_token.kind {
            // Call: callee(arg, ...)
            TokenKind::LParen => {
                let (args, end) = self.parse_list(TokenKind::RParen, Parser::parse_argument)?;
                let span = lhs.span.to(end.span);
                let call = ExprKind::Call {
                    callee: Box::new(lhs),
                    args,
                };
                (call, span)
            }

            // Index: base[index]
            TokenKind::LBracket => {
                let index = self.parse_expr()?;
                let end = self.consume(TokenKind::RBracket)?;
                let span = lhs.span.to(end.span);
                let index = ExprKind::Index {
                    base: Box::new(lhs),
                    index: Box::new(index),
                };
                (index, span)
            }

            // Field access: base.field
            TokenKind::Dot => {
                let field = self.parse_ident()?;
                let span = lhs.span.to(field.span);
                let access = ExprKind::Field {
                    base: Box::new(lhs),
                    field,
                };
                (access, span)
            }

            kind => {
                let op = Self::binary_operator(kind)
                    .ok_or(error::Error::Internal("led called for a non-infix token"))?;
                let rhs = self.parse_expr_bp(precedence)?;
                let span = lhs.span.to(rhs.span);
                let infix = ExprKind::Infix {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
                (infix, span)
            }
        };
        Ok(self.make_expr(kind, span))
    }

    /// Parses a call argument. A bare symbol followed by a colon is a keyword
    /// argument.
    fn parse_argument(&mut self) -> Result<Argument> {
        let first = self.advance()?;
        if first.kind == TokenKind::Identifier {
            let next = self.advance()?;
            if next.kind == TokenKind::Colon {
                let label = Ident {
                    name: first.text,
                    span: first.span,
                };
                let value = self.parse_expr()?;
                return Ok(Argument {
                    label: Some(label),
                    value,
                });
            }
            self.push_back(next)?;
        }
        let value = self.parse_expr_from(first, Precedence::Lowest)?;
        Ok(Argument { label: None, value })
    }

    fn infix_precedence(kind: TokenKind) -> Option<Precedence> {
        let precedence = match kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::Dot => Precedence::Call,
            kind => Self::binary_operator(kind)?.precedence(),
        };
        Some(precedence)
    }

    fn binary_operator(kind: TokenKind) -> Option<BinaryOperator> {
        let op = match kind {
            TokenKind::Or => BinaryOperator::Or,
            TokenKind::And => BinaryOperator::And,
            TokenKind::EqEq => BinaryOperator::Eq,
            TokenKind::NotEq => BinaryOperator::Ne,
            TokenKind::Less => BinaryOperator::Lt,
            TokenKind::LessEq => BinaryOperator::Le,
            TokenKind::Greater => BinaryOperator::Gt,
            TokenKind::GreaterEq => BinaryOperator::Ge,
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Sub,
            TokenKind::Star => BinaryOperator::Mul,
            TokenKind::Slash => BinaryOperator::Div,
            TokenKind::Percent => BinaryOperator::Rem,
            _ => return None,
        };
        Some(op)
    }

    /// Parses a comma separated list of items, up to the provided closing
    /// delimiter (which is consumed and returned). A trailing comma is
    /// allowed.
    fn parse_list<T>(
        &mut self,
        end: TokenKind,
        mut parse_item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<(Vec<T>, Token)> {
        let mut items = Vec::new();
        loop {
            if let Some(end) = self.take(end)? {
                return Ok((items, end));
            }
            items.push(parse_item(self)?);
            if let Some(end) = self.take(end)? {
                return Ok((items, end));
            }
            self.consume(TokenKind::Comma)?;
        }
    }
}

impl<'src> Parser<'src> {
    pub fn new(src: &'src str) -> Parser<'src> {
        Parser {
            lexer: Lexer::new(src),
            pushed_back: None,
            next_id: 0,
        }
    }

    fn make_expr(&mut self, kind: ExprKind, span: Span) -> Expr {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        Expr { id, kind, span }
    }

    /// Returns the pushed back token, if any, or scans a new one.
    fn advance(&mut self) -> Result<Token> {
        match self.pushed_back.take() {
            Some(token) => Ok(token),
            None => Ok(self.lexer.next()?),
        }
    }

    /// Returns a token to the parser, so that the next call to
    /// [`Parser::advance`] yields it again.
    fn push_back(&mut self, token: Token) -> Result<()> {
        if self.pushed_back.is_some() {
            return Err(error::Error::Internal(
                "pushed back a token while another one was pending",
            ));
        }
        self.pushed_back = Some(token);
        Ok(())
    }

    /// Advances if the current token matches the provided one, returning it.
    /// If not, returns `None` and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> Result<Option<Token>> {
        self.take_any(&[expect])
    }

    fn take_any(&mut self, expect: &[TokenKind]) -> Result<Option<Token>> {
        let token = self.advance()?;
        if expect.contains(&token.kind) {
            Ok(Some(token))
        } else {
            self.push_back(token)?;
            Ok(None)
        }
    }

    /// Advances if the current token matches the provided one, returning it.
    /// If not, fails with a syntax error.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let token = self.advance()?;
        if token.kind == expect {
            Ok(token)
        } else {
            Err(self.unexpected(&token, expect.into()))
        }
    }

    #[allow(clippy::unused_self)]
    fn unexpected(&self, token: &Token, expected: Expected) -> error::Error {
        let error = match token.kind {
            TokenKind::Eof => Error::PrematureEof { expected },
            actual => Error::Unexpected {
                expected,
                actual,
                text: token.text.clone(),
            },
        };
        error::Error::Syntax(token.span.wrap(error))
    }
}

/// Describes what the parser was looking for when it failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Expected {
    Token(TokenKind),
    Expression,
    MatchArm,
}

impl From<TokenKind> for Expected {
    fn from(kind: TokenKind) -> Self {
        Expected::Token(kind)
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Token(kind) => kind.fmt(f),
            Expected::Expression => f.write_str("expression"),
            Expected::MatchArm => f.write_str("`case`, `default` or `}`"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("expected {expected}, but got {}", describe(.actual, .text))]
    Unexpected {
        expected: Expected,
        actual: TokenKind,
        text: Box<str>,
    },
    #[error("premature end of input, expected {expected}")]
    PrematureEof { expected: Expected },
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("integer literal {0} is out of range")]
    IntOutOfRange(Box<str>),
    #[error("functions may only be declared at the top level")]
    NestedFunction,
    #[error(transparent)]
    Lexer(lexer::Error),
}

fn describe(kind: &TokenKind, text: &str) -> String {
    match kind {
        TokenKind::Identifier | TokenKind::Int | TokenKind::Unknown => format!("{kind} `{text}`"),
        _ => kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_utils::tree_tests;
    use pretty_assertions::assert_eq;

    tree_tests!(
        use parser;

        fn test_precedence_mul_binds_tighter() {
            let expr = "1 + 2 * 3";
            let tree_ok = "
                infix Add (0..9)
                  int 1 (0..1)
                  infix Mul (4..9)
                    int 2 (4..5)
                    int 3 (8..9)
            ";
        }

        fn test_unary_minus_binds_to_operand() {
            let expr = "-1 + 2";
            let tree_ok = "
                infix Add (0..6)
                  prefix Neg (0..2)
                    int 1 (1..2)
                  int 2 (5..6)
            ";
        }

        fn test_left_associativity() {
            let expr = "a - b - c";
            let tree_ok = "
                infix Sub (0..9)
                  infix Sub (0..5)
                    symbol a (0..1)
                    symbol b (4..5)
                  symbol c (8..9)
            ";
        }

        fn test_grouping() {
            let expr = "(1 + 2) * 3";
            let tree_ok = "
                infix Mul (0..11)
                  infix Add (0..7)
                    int 1 (1..2)
                    int 2 (5..6)
                  int 3 (10..11)
            ";
        }

        fn test_logical_and_comparison() {
            let expr = "not a or b < c and d";
            let tree_ok = "
                infix Or (0..20)
                  prefix Not (0..5)
                    symbol a (4..5)
                  infix And (9..20)
                    infix Lt (9..14)
                      symbol b (9..10)
                      symbol c (13..14)
                    symbol d (19..20)
            ";
        }

        fn test_prefix_does_not_swallow_call() {
            let expr = "-f(x)[0]";
            let tree_ok = "
                prefix Neg (0..8)
                  index (1..8)
                    call (1..5)
                      symbol f (1..2)
                      symbol x (3..4)
                    int 0 (6..7)
            ";
        }

        fn test_call_and_field_chains() {
            let expr = "a.b(1)(2).c";
            let tree_ok = "
                field c (0..11)
                  call (0..9)
                    call (0..6)
                      field b (0..3)
                        symbol a (0..1)
                      int 1 (4..5)
                    int 2 (7..8)
            ";
        }

        fn test_keyword_arguments() {
            let expr = "Point(x: 1, y + 1)";
            let tree_ok = "
                call (0..18)
                  symbol Point (0..5)
                  keyword x
                    int 1 (9..10)
                  infix Add (12..17)
                    symbol y (12..13)
                    int 1 (16..17)
            ";
        }

        fn test_list_and_map_literals() {
            let expr = r#"[{"a": 1}, {}]"#;
            let tree_ok = r#"
                list (0..14)
                  map (1..9)
                    entry
                      string "a" (2..5)
                      int 1 (7..8)
                  map (11..13)
            "#;
        }

        fn test_literals() {
            let expr = r#"[true, false, "hi\n", 42]"#;
            let tree_ok = r#"
                list (0..25)
                  bool true (1..5)
                  bool false (7..12)
                  string "hi\n" (14..20)
                  int 42 (22..24)
            "#;
        }

        fn test_add_function() {
            let program = "fn add(x: int, y: int): int { return x + y }";
            let tree_ok = "
                fn add(x: int, y: int): int (0..44)
                  return (30..42)
                    infix Add (37..42)
                      symbol x (37..38)
                      symbol y (41..42)
            ";
        }

        fn test_func_with_arrow_and_no_return_type() {
            let program = "func f() -> list<int> { return [] } fn g() { }";
            let tree_ok = "
                fn f(): list<int> (0..35)
                  return (24..33)
                    list (31..33)
                fn g() (36..46)
            ";
        }

        fn test_let_and_assignment() {
            let program = "let x: map<string, int> = {}; x[\"k\"] = 1; p.y = x";
            let tree_ok = r#"
                let x: map<string, int> (0..28)
                  map (26..28)
                assign (30..40)
                  index (30..36)
                    symbol x (30..31)
                    string "k" (32..35)
                  int 1 (39..40)
                assign (42..49)
                  field y (42..45)
                    symbol p (42..43)
                  symbol x (48..49)
            "#;
        }

        fn test_if_elif_else() {
            let program = "if a { f() } elif b { g() } else if c { } else { h() }";
            let tree_ok = "
                if (0..54)
                  cond
                    symbol a (3..4)
                  then
                    call (7..10)
                      symbol f (7..8)
                  cond
                    symbol b (18..19)
                  then
                    call (22..25)
                      symbol g (22..23)
                  cond
                    symbol c (36..37)
                  then
                  else
                    call (49..52)
                      symbol h (49..50)
            ";
        }

        fn test_loops() {
            let program = "while i < 3 { i = i + 1; } for i, x in xs { print(x) }";
            let tree_ok = "
                while (0..26)
                  infix Lt (6..11)
                    symbol i (6..7)
                    int 3 (10..11)
                  assign (14..23)
                    symbol i (14..15)
                    infix Add (18..23)
                      symbol i (18..19)
                      int 1 (22..23)
                for i, x (27..54)
                  symbol xs (39..41)
                  call (44..52)
                    symbol print (44..49)
                    symbol x (50..51)
            ";
        }

        fn test_struct_enum_and_match() {
            let program = "struct P { x: int, y: int } enum S { A(int, string), B } match s { case A(n, m) { } case B { } default { } }";
            let tree_ok = "
                struct P (0..27)
                  x: int
                  y: int
                enum S (28..56)
                  A(int, string)
                  B
                match (57..108)
                  symbol s (63..64)
                  case A(n, m)
                  case B
                  default
            ";
        }

        fn test_missing_terminator() {
            let program = "let x = 1 let y = 2";
            let expected_errors = &["syntax error at 1:11: expected `;`, but got keyword `let`"];
        }

        fn test_premature_end_of_input() {
            let program = "fn f(x: int) { return x";
            let expected_errors = &["syntax error at 1:24: premature end of input, expected `}`"];
        }

        fn test_unknown_character_is_rejected() {
            let program = "let x = 1 @ 2;";
            let expected_errors = &["syntax error at 1:11: expected `;`, but got unknown character `@`"];
        }

        fn test_nul_character_does_not_end_the_input() {
            let program = "print(1);\0 this is @@ not ( valid";
            let expected_errors = &["syntax error at 1:10: expected expression, but got unknown character `\0`"];
        }

        fn test_not_an_expression() {
            let expr = ")";
            let expected_errors = &["syntax error at 1:1: expected expression, but got `)`"];
        }

        fn test_invalid_assignment_target() {
            let program = "f() = 1;";
            let expected_errors = &["syntax error at 1:1: invalid assignment target"];
        }

        fn test_chained_assignment_is_rejected() {
            let program = "a = b = c;";
            let expected_errors = &["syntax error at 1:7: expected `;`, but got `=`"];
        }

        fn test_nested_function_is_rejected() {
            let program = "fn f() { fn g() { } }";
            let expected_errors = &["syntax error at 1:10: functions may only be declared at the top level"];
        }

        fn test_unterminated_string() {
            let program = "print(\"oops)";
            let expected_errors = &["syntax error at 1:7: unterminated string literal"];
        }

        fn test_integer_out_of_range() {
            let expr = "99999999999999999999";
            let expected_errors = &["syntax error at 1:1: integer literal 99999999999999999999 is out of range"];
        }
    );

    #[test]
    fn test_parsing_is_deterministic() {
        let src = include_str!("../demos/shapes.vn");
        assert_eq!(parse_program(src).unwrap(), parse_program(src).unwrap());
    }

    #[test]
    fn test_expression_ids_are_unique() {
        let expr = parse_expr("f(a, b + c)[0]").unwrap();
        fn collect(expr: &Expr, ids: &mut Vec<u32>) {
            ids.push(expr.id.0);
            match &expr.kind {
                ExprKind::Call { callee, args } => {
                    collect(callee, ids);
                    args.iter().for_each(|arg| collect(&arg.value, ids));
                }
                ExprKind::Index { base, index } => {
                    collect(base, ids);
                    collect(index, ids);
                }
                ExprKind::Infix { lhs, rhs, .. } => {
                    collect(lhs, ids);
                    collect(rhs, ids);
                }
                _ => {}
            }
        }
        let mut ids = Vec::new();
        collect(&expr, &mut ids);
        ids.sort_unstable();
        assert_eq!(ids, [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_double_push_back_is_an_internal_error() {
        let mut p = Parser::new("a b");
        let a = p.advance().unwrap();
        let b = p.advance().unwrap();
        p.push_back(b).unwrap();
        let error = p.push_back(a).unwrap_err();
        assert!(matches!(error, error::Error::Internal(_)));
    }
}
