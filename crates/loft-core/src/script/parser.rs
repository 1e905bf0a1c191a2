//! Recursive descent parser for feature scripts.
//!
//! Declarations are separated by newlines or `;`. Newlines inside call
//! argument lists and list literals are insignificant, so long invocations
//! can wrap across lines.

use crate::error::ParseError;

use super::lexer::{Token, TokenKind, tokenize};
use super::{BinaryOp, Decl, Expr, Script, SourceRange};

/// Parse a whole script.
///
/// Fails on the first syntax error; there is no recovery. The returned
/// declarations are in source order and may contain duplicate names
/// (resolved later during graph construction).
pub fn parse(source: &str) -> Result<Script, ParseError> {
    let tokens = tokenize(source)?;
    Parser { tokens, pos: 0 }.script()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token stream always ends with Eof, so `pos` stays in range.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error_at(token: &Token, message: impl Into<String>) -> ParseError {
        ParseError::new(message, token.line, token.column)
    }

    fn expected(token: &Token, what: &str) -> ParseError {
        Self::error_at(
            token,
            format!("expected {what}, found {}", token.kind.describe()),
        )
    }

    /// Skip newline/semicolon separators.
    fn skip_separators(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline | TokenKind::Semi) {
            self.bump();
        }
    }

    /// Skip newlines only. Used inside bracketed contexts where a stray
    /// `;` is still a syntax error.
    fn skip_newlines(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline) {
            self.bump();
        }
    }

    fn script(mut self) -> Result<Script, ParseError> {
        let mut decls = Vec::new();

        loop {
            self.skip_separators();
            if matches!(self.peek().kind, TokenKind::Eof) {
                break;
            }
            decls.push(self.decl()?);

            match self.peek().kind {
                TokenKind::Newline | TokenKind::Semi | TokenKind::Eof => {}
                _ => return Err(Self::expected(self.peek(), "end of declaration")),
            }
        }

        Ok(Script { decls })
    }

    fn decl(&mut self) -> Result<Decl, ParseError> {
        let start = self.bump();
        let name = match start.kind {
            TokenKind::Ident(name) => name,
            _ => return Err(Self::expected(&start, "feature name")),
        };

        let eq = self.bump();
        if !matches!(eq.kind, TokenKind::Eq) {
            return Err(Self::expected(&eq, "`=`"));
        }

        let init = self.expr()?;
        let end_line = self.last_consumed_line().unwrap_or(start.line);

        Ok(Decl {
            name,
            init,
            range: SourceRange {
                start_line: start.line,
                end_line,
            },
        })
    }

    fn last_consumed_line(&self) -> Option<usize> {
        self.pos.checked_sub(1).map(|i| self.tokens[i].line)
    }

    /// expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.term()?;

        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            self.skip_newlines();
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    /// term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;

        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.bump();
            self.skip_newlines();
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    /// unary := '-' unary | primary
    fn unary(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek().kind, TokenKind::Minus) {
            self.bump();
            let inner = self.unary()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.bump();
        match token.kind {
            TokenKind::Number(value) => Ok(Expr::Number(value)),
            TokenKind::Str(text) => Ok(Expr::Str(text)),
            TokenKind::Ident(name) => {
                if matches!(self.peek().kind, TokenKind::LParen) {
                    self.bump();
                    let args = self.arguments(TokenKind::RParen)?;
                    Ok(Expr::Call { func: name, args })
                } else {
                    Ok(Expr::Ref(name))
                }
            }
            TokenKind::LBracket => {
                let items = self.arguments(TokenKind::RBracket)?;
                Ok(Expr::List(items))
            }
            TokenKind::LParen => {
                self.skip_newlines();
                let inner = self.expr()?;
                self.skip_newlines();
                let close = self.bump();
                if !matches!(close.kind, TokenKind::RParen) {
                    return Err(Self::expected(&close, "`)`"));
                }
                Ok(inner)
            }
            _ => Err(Self::expected(&token, "expression")),
        }
    }

    /// Comma-separated expressions up to `close` (which is consumed).
    fn arguments(&mut self, close: TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();

        self.skip_newlines();
        if self.peek().kind == close {
            self.bump();
            return Ok(items);
        }

        loop {
            items.push(self.expr()?);
            self.skip_newlines();

            let next = self.bump();
            if next.kind == close {
                return Ok(items);
            }
            if !matches!(next.kind, TokenKind::Comma) {
                return Err(Self::expected(&next, "`,` or closing delimiter"));
            }
            self.skip_newlines();
            // Trailing comma before the closing delimiter is allowed.
            if self.peek().kind == close {
                self.bump();
                return Ok(items);
            }
        }
    }
}
