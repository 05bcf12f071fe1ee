//! Expression lexer.
//!
//! Tokenizes the small Python-flavoured arithmetic language used in joint
//! arguments, e.g. `csts['L1'] * 2` or `-np.deg2rad(csts["tilt"]) / 3`.

use crate::error::ExprError;

/// A token in an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Numeric literal.
    Number(f64),
    /// Identifier (e.g. `csts`, `np`, `sin`).
    Ident(String),
    /// Quoted string literal (contents without quotes).
    Str(String),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `**`
    DoubleStar,
    /// `/`
    Slash,
    /// `//`
    DoubleSlash,
    /// `%`
    Percent,
}

/// A token with the column where it starts.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    /// The token.
    pub token: Token,
    /// Column (1-indexed).
    pub col: usize,
}

/// Lexer over an expression string.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    /// Tokenize the entire input.
    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>, ExprError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next_token()? {
            tokens.push(tok);
        }
        Ok(tokens)
    }

    /// Get the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<SpannedToken>, ExprError> {
        while matches!(self.peek_char(), Some(ch) if ch.is_ascii_whitespace()) {
            self.advance();
        }

        let Some(ch) = self.peek_char() else {
            return Ok(None);
        };
        let col = self.pos + 1;

        let token = match ch {
            b'(' => self.single(Token::LParen),
            b')' => self.single(Token::RParen),
            b'[' => self.single(Token::LBracket),
            b']' => self.single(Token::RBracket),
            b',' => self.single(Token::Comma),
            b'+' => self.single(Token::Plus),
            b'-' => self.single(Token::Minus),
            b'%' => self.single(Token::Percent),
            b'*' => {
                self.advance();
                if self.peek_char() == Some(b'*') {
                    self.advance();
                    Token::DoubleStar
                } else {
                    Token::Star
                }
            }
            b'/' => {
                self.advance();
                if self.peek_char() == Some(b'/') {
                    self.advance();
                    Token::DoubleSlash
                } else {
                    Token::Slash
                }
            }
            b'.' => {
                if matches!(self.input.get(self.pos + 1), Some(d) if d.is_ascii_digit()) {
                    self.read_number()?
                } else {
                    self.single(Token::Dot)
                }
            }
            b'\'' | b'"' => self.read_string(ch)?,
            b'0'..=b'9' => self.read_number()?,
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => self.read_ident(),
            _ => {
                return Err(ExprError::lexer(
                    col,
                    format!("unexpected character: '{}'", ch as char),
                ));
            }
        };

        Ok(Some(SpannedToken { token, col }))
    }

    fn peek_char(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.input.get(self.pos).copied()?;
        self.pos += 1;
        Some(ch)
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn read_string(&mut self, quote: u8) -> Result<Token, ExprError> {
        let col = self.pos + 1;
        self.advance();
        let start = self.pos;
        loop {
            match self.advance() {
                None => return Err(ExprError::lexer(col, "unterminated string")),
                Some(ch) if ch == quote => break,
                Some(_) => {}
            }
        }
        let content = String::from_utf8_lossy(&self.input[start..self.pos - 1]).into_owned();
        Ok(Token::Str(content))
    }

    fn read_number(&mut self) -> Result<Token, ExprError> {
        let col = self.pos + 1;
        let start = self.pos;

        while matches!(self.peek_char(), Some(ch) if ch.is_ascii_digit() || ch == b'.') {
            self.advance();
        }
        // Exponent part, only when followed by digits (optionally signed).
        if matches!(self.peek_char(), Some(b'e' | b'E')) {
            let mut look = self.pos + 1;
            if matches!(self.input.get(look), Some(b'+' | b'-')) {
                look += 1;
            }
            if matches!(self.input.get(look), Some(d) if d.is_ascii_digit()) {
                self.pos = look;
                while matches!(self.peek_char(), Some(ch) if ch.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text = String::from_utf8_lossy(&self.input[start..self.pos]);
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ExprError::lexer(col, format!("invalid number: {}", text)))
    }

    fn read_ident(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek_char(), Some(ch) if ch.is_ascii_alphanumeric() || ch == b'_') {
            self.advance();
        }
        Token::Ident(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_subscript_expression() {
        assert_eq!(
            kinds("csts['L1']*2"),
            vec![
                Token::Ident("csts".into()),
                Token::LBracket,
                Token::Str("L1".into()),
                Token::RBracket,
                Token::Star,
                Token::Number(2.0),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds(".5"), vec![Token::Number(0.5)]);
        assert_eq!(kinds("1e-3"), vec![Token::Number(1e-3)]);
        assert_eq!(kinds("2.5E2"), vec![Token::Number(250.0)]);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a ** b // c % d"),
            vec![
                Token::Ident("a".into()),
                Token::DoubleStar,
                Token::Ident("b".into()),
                Token::DoubleSlash,
                Token::Ident("c".into()),
                Token::Percent,
                Token::Ident("d".into()),
            ]
        );
    }

    #[test]
    fn test_rejects_unknown_characters() {
        let err = Lexer::new("1 + $x").tokenize().unwrap_err();
        assert!(matches!(err, ExprError::Lexer { col: 5, .. }));
        assert!(Lexer::new("'open").tokenize().is_err());
    }
}
