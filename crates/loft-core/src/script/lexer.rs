//! Hand-written lexer for feature scripts.
//!
//! Produces a flat token stream with 1-based line/column positions.
//! Newlines are significant (they terminate declarations) and are emitted
//! as tokens; the parser decides where they may be skipped.

use crate::error::ParseError;

/// A lexical token kind.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Number(f64),
    Str(String),
    Eq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Newline,
    Semi,
    Eof,
}

impl TokenKind {
    /// Short description used in parser error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier `{name}`"),
            TokenKind::Number(n) => format!("number `{n}`"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Eq => "`=`".to_string(),
            TokenKind::LParen => "`(`".to_string(),
            TokenKind::RParen => "`)`".to_string(),
            TokenKind::LBracket => "`[`".to_string(),
            TokenKind::RBracket => "`]`".to_string(),
            TokenKind::Comma => "`,`".to_string(),
            TokenKind::Plus => "`+`".to_string(),
            TokenKind::Minus => "`-`".to_string(),
            TokenKind::Star => "`*`".to_string(),
            TokenKind::Slash => "`/`".to_string(),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Semi => "`;`".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// A token with its source position.
#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// Tokenize a whole script.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            let (line, column) = (self.line, self.column);

            match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\n' => {
                    self.bump();
                    tokens.push(Token {
                        kind: TokenKind::Newline,
                        line,
                        column,
                    });
                }
                '/' if self.peek_next() == Some('/') => {
                    // Line comment, runs to end of line.
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '"' => {
                    let text = self.string(line, column)?;
                    tokens.push(Token {
                        kind: TokenKind::Str(text),
                        line,
                        column,
                    });
                }
                c if c.is_ascii_digit() => {
                    let value = self.number(line, column)?;
                    tokens.push(Token {
                        kind: TokenKind::Number(value),
                        line,
                        column,
                    });
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let mut name = String::new();
                    while let Some(c) = self.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' {
                            name.push(c);
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    tokens.push(Token {
                        kind: TokenKind::Ident(name),
                        line,
                        column,
                    });
                }
                c => {
                    let kind = match c {
                        '=' => TokenKind::Eq,
                        '(' => TokenKind::LParen,
                        ')' => TokenKind::RParen,
                        '[' => TokenKind::LBracket,
                        ']' => TokenKind::RBracket,
                        ',' => TokenKind::Comma,
                        '+' => TokenKind::Plus,
                        '-' => TokenKind::Minus,
                        '*' => TokenKind::Star,
                        '/' => TokenKind::Slash,
                        ';' => TokenKind::Semi,
                        other => {
                            return Err(ParseError::new(
                                format!("unexpected character `{other}`"),
                                line,
                                column,
                            ));
                        }
                    };
                    self.bump();
                    tokens.push(Token { kind, line, column });
                }
            }
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            line: self.line,
            column: self.column,
        });

        Ok(tokens)
    }

    fn string(&mut self, line: usize, column: usize) -> Result<String, ParseError> {
        self.bump(); // opening quote
        let mut text = String::new();

        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(ParseError::new("unterminated string literal", line, column));
                }
                Some('"') => return Ok(text),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(other) => {
                            return Err(ParseError::new(
                                format!("unknown escape `\\{other}`"),
                                self.line,
                                self.column.saturating_sub(2),
                            ));
                        }
                        None => {
                            return Err(ParseError::new(
                                "unterminated string literal",
                                line,
                                column,
                            ));
                        }
                    };
                    text.push(escaped);
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn number(&mut self, line: usize, column: usize) -> Result<f64, ParseError> {
        let mut text = String::new();

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            text.push('.');
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            text.push('e');
            self.bump();
            if matches!(self.peek(), Some('+') | Some('-')) {
                text.push(self.bump().unwrap_or('+'));
            }
            let mut digits = false;
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.bump();
                    digits = true;
                } else {
                    break;
                }
            }
            if !digits {
                return Err(ParseError::new("malformed number literal", line, column));
            }
        }

        text.parse::<f64>()
            .map_err(|_| ParseError::new("malformed number literal", line, column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_declaration() {
        let tokens = kinds("a = box(1, 2, 3)");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Eq,
                TokenKind::Ident("box".to_string()),
                TokenKind::LParen,
                TokenKind::Number(1.0),
                TokenKind::Comma,
                TokenKind::Number(2.0),
                TokenKind::Comma,
                TokenKind::Number(3.0),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("a = 1\nbb = 2").unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[0].column, 1);
        // The newline token sits at the end of line 1.
        assert_eq!(tokens[3].kind, TokenKind::Newline);
        // `bb` starts line 2.
        assert_eq!(tokens[4].kind, TokenKind::Ident("bb".to_string()));
        assert_eq!(tokens[4].line, 2);
        assert_eq!(tokens[4].column, 1);
    }

    #[test]
    fn test_comments_skipped() {
        let tokens = kinds("// header\na = 1 // trailing\n");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Newline,
                TokenKind::Ident("a".to_string()),
                TokenKind::Eq,
                TokenKind::Number(1.0),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = kinds(r#"a = label("line\n\"quoted\"")"#);
        assert!(tokens.contains(&TokenKind::Str("line\n\"quoted\"".to_string())));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("a = \"oops").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 5);
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_float_and_exponent() {
        assert_eq!(kinds("x = 2.5")[2], TokenKind::Number(2.5));
        assert_eq!(kinds("x = 1e3")[2], TokenKind::Number(1000.0));
        assert_eq!(kinds("x = 1.5e-2")[2], TokenKind::Number(0.015));
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("a = 1 @ 2").unwrap_err();
        assert_eq!(err.column, 7);
        assert!(err.message.contains('@'));
    }
}
