use rust_decimal::Decimal;

use crate::ast::{BinaryOp, Expr, Program, Stmt, UnaryOp};
use crate::diagnostics::Diagnostic;
use crate::types::Type;

type ParseResult<T> = Result<T, Diagnostic>;

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Identifier(String),
    Int(i64),
    Decimal(Decimal),
    String(String),
    True,
    False,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Assign,
    EqualsEquals,
    NotEquals,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    AndAnd,
    OrOr,
    Eof,
}

struct Lexer<'a> {
    input: &'a str,
    chars: std::str::Chars<'a>,
    peeked: Option<char>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        let mut chars = input.chars();
        let peeked = chars.next();
        Self {
            input,
            chars,
            peeked,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let current = self.peeked.take();
        self.peeked = self.chars.next();
        current
    }

    fn peek(&self) -> Option<char> {
        self.peeked
    }

    fn peek_second(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn consume_while<F>(&mut self, mut predicate: F) -> String
    where
        F: FnMut(char) -> bool,
    {
        let mut buf = String::new();
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            buf.push(ch);
            self.bump();
        }
        buf
    }

    fn skip_whitespace(&mut self) {
        self.consume_while(|c| c.is_whitespace());
    }

    fn next_token(&mut self) -> ParseResult<Token> {
        self.skip_whitespace();
        let Some(ch) = self.peek() else {
            return Ok(Token::Eof);
        };

        match ch {
            '(' => {
                self.bump();
                Ok(Token::LParen)
            }
            ')' => {
                self.bump();
                Ok(Token::RParen)
            }
            ',' => {
                self.bump();
                Ok(Token::Comma)
            }
            ';' => {
                self.bump();
                Ok(Token::Semicolon)
            }
            '.' => {
                self.bump();
                Ok(Token::Dot)
            }
            '+' => {
                self.bump();
                Ok(Token::Plus)
            }
            '-' => {
                self.bump();
                Ok(Token::Minus)
            }
            '*' => {
                self.bump();
                Ok(Token::Star)
            }
            '/' => {
                self.bump();
                Ok(Token::Slash)
            }
            '%' => {
                self.bump();
                Ok(Token::Percent)
            }
            '!' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(Token::NotEquals)
                } else {
                    Ok(Token::Bang)
                }
            }
            '=' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(Token::EqualsEquals)
                } else {
                    Ok(Token::Assign)
                }
            }
            '<' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(Token::LessEquals)
                } else {
                    Ok(Token::Less)
                }
            }
            '>' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(Token::GreaterEquals)
                } else {
                    Ok(Token::Greater)
                }
            }
            '&' => {
                self.bump();
                if self.peek() == Some('&') {
                    self.bump();
                    Ok(Token::AndAnd)
                } else {
                    Err(Diagnostic::error(format!(
                        "unexpected character '&' in {:?}",
                        self.input
                    )))
                }
            }
            '|' => {
                self.bump();
                if self.peek() == Some('|') {
                    self.bump();
                    Ok(Token::OrOr)
                } else {
                    Err(Diagnostic::error(format!(
                        "unexpected character '|' in {:?}",
                        self.input
                    )))
                }
            }
            '"' => {
                self.bump();
                let mut out = String::new();
                loop {
                    match self.bump() {
                        None => return Err(Diagnostic::error("unterminated string literal")),
                        Some('"') => break,
                        Some('\\') => match self.bump() {
                            Some('"') => out.push('"'),
                            Some('\\') => out.push('\\'),
                            Some('n') => out.push('\n'),
                            Some('t') => out.push('\t'),
                            Some(other) => {
                                return Err(Diagnostic::error(format!(
                                    "unknown escape sequence '\\{other}'"
                                )))
                            }
                            None => {
                                return Err(Diagnostic::error("unterminated string literal"))
                            }
                        },
                        Some(c) => out.push(c),
                    }
                }
                Ok(Token::String(out))
            }
            c if c.is_ascii_digit() => self.lex_number(),
            c if is_ident_start(c) => {
                let ident = self.consume_while(is_ident_part);
                match ident.as_str() {
                    "true" => Ok(Token::True),
                    "false" => Ok(Token::False),
                    _ => Ok(Token::Identifier(ident)),
                }
            }
            other => Err(Diagnostic::error(format!(
                "unexpected character {other:?} in {:?}",
                self.input
            ))),
        }
    }

    fn lex_number(&mut self) -> ParseResult<Token> {
        let mut num_str = self.consume_while(|c| c.is_ascii_digit());
        let mut is_decimal = false;

        // A `.` continues the number only when a digit follows; `1.x` is a
        // member access on the literal `1`.
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            is_decimal = true;
            num_str.push('.');
            self.bump();
            num_str.push_str(&self.consume_while(|c| c.is_ascii_digit()));
        }

        let mut has_exponent = false;
        if matches!(self.peek(), Some('e' | 'E')) {
            is_decimal = true;
            has_exponent = true;
            let Some(exp) = self.bump() else {
                return Err(Diagnostic::error(format!("invalid number {num_str:?}")));
            };
            num_str.push(exp);
            if matches!(self.peek(), Some('+' | '-')) {
                let Some(sign) = self.bump() else {
                    return Err(Diagnostic::error(format!("invalid number {num_str:?}")));
                };
                num_str.push(sign);
            }
            let exp_digits = self.consume_while(|c| c.is_ascii_digit());
            if exp_digits.is_empty() {
                return Err(Diagnostic::error(format!(
                    "invalid number {num_str:?} (expected exponent digits)"
                )));
            }
            num_str.push_str(&exp_digits);
        }

        if is_decimal {
            let parsed = if has_exponent {
                Decimal::from_scientific(&num_str)
            } else {
                num_str.parse::<Decimal>()
            };
            parsed
                .map(Token::Decimal)
                .map_err(|_| Diagnostic::error(format!("invalid decimal literal {num_str:?}")))
        } else {
            num_str
                .parse::<i64>()
                .map(Token::Int)
                .map_err(|_| Diagnostic::error(format!("integer literal {num_str:?} out of range")))
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Token,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> ParseResult<Self> {
        let mut lexer = Lexer::new(input);
        let lookahead = lexer.next_token()?;
        Ok(Self { lexer, lookahead })
    }

    fn bump(&mut self) -> ParseResult<Token> {
        let current = std::mem::replace(&mut self.lookahead, Token::Eof);
        self.lookahead = self.lexer.next_token()?;
        Ok(current)
    }

    fn expect(&mut self, token: Token) -> ParseResult<()> {
        if self.lookahead == token {
            self.bump()?;
            Ok(())
        } else {
            Err(Diagnostic::error(format!(
                "expected {token:?}, found {:?}",
                self.lookahead
            )))
        }
    }

    fn parse_program(&mut self) -> ParseResult<Program> {
        let mut stmts = Vec::new();
        while self.lookahead != Token::Eof {
            stmts.push(self.parse_stmt()?);
        }
        if stmts.is_empty() {
            return Err(Diagnostic::error("empty program"));
        }
        Ok(Program { stmts })
    }

    /// A statement is either `<type> <name> = <expr> ;` or a bare expression
    /// (with an optional trailing semicolon).
    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        if let Token::Identifier(first) = &self.lookahead {
            if let Some(data_type) = Type::parse_name(first) {
                let first = first.clone();
                self.bump()?;
                if let Token::Identifier(_) = &self.lookahead {
                    let name = match self.bump()? {
                        Token::Identifier(name) => name,
                        _ => unreachable!("lookahead was an identifier"),
                    };
                    self.expect(Token::Assign)?;
                    let expr = self.parse_expr(0)?;
                    self.expect(Token::Semicolon)?;
                    return Ok(Stmt::Decl {
                        data_type,
                        name,
                        expr,
                    });
                }
                // The type name was an ordinary identifier after all; resume
                // expression parsing with it as the already-consumed prefix.
                let left = self.parse_postfix(Expr::Ident(first))?;
                let expr = self.parse_expr_with(left, 0)?;
                if self.lookahead == Token::Semicolon {
                    self.bump()?;
                }
                return Ok(Stmt::Expr(expr));
            }
        }
        let expr = self.parse_expr(0)?;
        if self.lookahead == Token::Semicolon {
            self.bump()?;
        }
        Ok(Stmt::Expr(expr))
    }

    fn parse_expr(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let left = self.parse_prefix()?;
        self.parse_expr_with(left, min_prec)
    }

    fn parse_expr_with(&mut self, mut left: Expr, min_prec: u8) -> ParseResult<Expr> {
        loop {
            let (op, prec) = match self.infix_binding_power() {
                Some(v) => v,
                None => break,
            };
            if prec < min_prec {
                break;
            }
            self.bump()?;
            let right = self.parse_expr(prec + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        match &self.lookahead {
            Token::Minus => {
                self.bump()?;
                let expr = self.parse_expr(UNARY_PRECEDENCE)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Negate,
                    expr: Box::new(expr),
                })
            }
            Token::Bang => {
                self.bump()?;
                let expr = self.parse_expr(UNARY_PRECEDENCE)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(expr),
                })
            }
            Token::Int(n) => {
                let n = *n;
                self.bump()?;
                self.parse_postfix(Expr::Int(n))
            }
            Token::Decimal(d) => {
                let d = *d;
                self.bump()?;
                self.parse_postfix(Expr::Decimal(d))
            }
            Token::String(s) => {
                let s = s.clone();
                self.bump()?;
                Ok(Expr::Text(s))
            }
            Token::True => {
                self.bump()?;
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.bump()?;
                Ok(Expr::Bool(false))
            }
            Token::Identifier(name) => {
                let name = name.clone();
                self.bump()?;
                self.parse_postfix(Expr::Ident(name))
            }
            Token::LParen => {
                self.bump()?;
                let inner = self.parse_expr(0)?;
                self.expect(Token::RParen)?;
                self.parse_postfix(inner)
            }
            other => Err(Diagnostic::error(format!(
                "unexpected token in expression: {other:?}"
            ))),
        }
    }

    /// Member access and calls bind tighter than any operator.
    fn parse_postfix(&mut self, mut expr: Expr) -> ParseResult<Expr> {
        loop {
            match &self.lookahead {
                Token::Dot => {
                    self.bump()?;
                    let member = match self.bump()? {
                        Token::Identifier(name) => name,
                        other => {
                            return Err(Diagnostic::error(format!(
                                "expected member name after '.', found {other:?}"
                            )))
                        }
                    };
                    expr = Expr::Member {
                        base: Box::new(expr),
                        member,
                    };
                }
                Token::LParen => {
                    self.bump()?;
                    let mut args = Vec::new();
                    if self.lookahead != Token::RParen {
                        loop {
                            args.push(self.parse_expr(0)?);
                            if self.lookahead == Token::Comma {
                                self.bump()?;
                                continue;
                            }
                            break;
                        }
                    }
                    self.expect(Token::RParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn infix_binding_power(&self) -> Option<(BinaryOp, u8)> {
        match self.lookahead {
            Token::OrOr => Some((BinaryOp::Or, 1)),
            Token::AndAnd => Some((BinaryOp::And, 2)),
            Token::EqualsEquals => Some((BinaryOp::Equals, 3)),
            Token::NotEquals => Some((BinaryOp::NotEquals, 3)),
            Token::Less => Some((BinaryOp::Less, 3)),
            Token::LessEquals => Some((BinaryOp::LessEquals, 3)),
            Token::Greater => Some((BinaryOp::Greater, 3)),
            Token::GreaterEquals => Some((BinaryOp::GreaterEquals, 3)),
            Token::Plus => Some((BinaryOp::Add, 4)),
            Token::Minus => Some((BinaryOp::Subtract, 4)),
            Token::Star => Some((BinaryOp::Multiply, 5)),
            Token::Slash => Some((BinaryOp::Divide, 5)),
            Token::Percent => Some((BinaryOp::Remainder, 5)),
            _ => None,
        }
    }
}

const UNARY_PRECEDENCE: u8 = 6;

/// Parse a statement list (a single expression is a one-statement program).
pub fn parse_program(input: &str) -> Result<Program, Diagnostic> {
    if input.trim().is_empty() {
        return Err(Diagnostic::error("empty program"));
    }
    Parser::new(input)?.parse_program()
}
