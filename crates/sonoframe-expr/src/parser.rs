//! Recursive-descent parser producing an expression tree.
//!
//! Precedence, loosest first: `+ -`, `* / // %`, unary `- +`, `**`
//! (right-associative). Names are resolved here, so anything outside the
//! constants lookup and the math whitelist is rejected before evaluation.

use crate::error::ExprError;
use crate::functions::{Function, MATH_CONSTANTS, NAMESPACES};
use crate::lexer::{Lexer, SpannedToken, Token};

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `//`
    FloorDiv,
    /// `%` (Python semantics: result takes the divisor's sign)
    Rem,
    /// `**`
    Pow,
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal or resolved math constant.
    Number(f64),
    /// Named chain constant, looked up at evaluation time.
    Constant(String),
    /// Unary negation.
    Neg(Box<Expr>),
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Whitelisted function call.
    Call {
        /// Function.
        function: Function,
        /// Arguments.
        args: Vec<Expr>,
    },
}

/// Identifiers that expose the chain constants mapping.
const CONSTANT_TABLES: &[&str] = &["csts", "constants"];

/// Parse `source` into an expression tree.
pub fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end_col: source.len() + 1,
    };
    let expr = parser.additive()?;
    if let Some(tok) = parser.peek() {
        return Err(ExprError::parser(
            tok.col,
            format!("unexpected trailing {:?}", tok.token),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    end_col: usize,
}

impl Parser {
    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|t| &t.token)
    }

    fn col(&self) -> usize {
        self.peek().map(|t| t.col).unwrap_or(self.end_col)
    }

    fn next(&mut self) -> Option<SpannedToken> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek_token() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(ExprError::parser(self.col(), format!("expected {:?}", expected)))
        }
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::DoubleSlash) => BinaryOp::FloorDiv,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ExprError> {
        let base = self.primary()?;
        if self.eat(&Token::DoubleStar) {
            let exponent = self.unary()?;
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let col = self.col();
        match self.next() {
            Some(SpannedToken {
                token: Token::Number(v),
                ..
            }) => Ok(Expr::Number(v)),
            Some(SpannedToken {
                token: Token::LParen,
                ..
            }) => {
                let inner = self.additive()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(SpannedToken {
                token: Token::Ident(name),
                ..
            }) => self.name(name, col),
            Some(tok) => Err(ExprError::parser(tok.col, format!("unexpected {:?}", tok.token))),
            None => Err(ExprError::parser(col, "unexpected end of expression")),
        }
    }

    /// Resolve `name`, `ns.name`, `csts['key']` and `fn(args)` forms.
    fn name(&mut self, first: String, col: usize) -> Result<Expr, ExprError> {
        if CONSTANT_TABLES.contains(&first.as_str()) && self.eat(&Token::LBracket) {
            let key_col = self.col();
            let key = match self.next() {
                Some(SpannedToken {
                    token: Token::Str(key),
                    ..
                }) => key,
                _ => return Err(ExprError::parser(key_col, "constants must be indexed by a quoted name")),
            };
            self.expect(Token::RBracket)?;
            return Ok(Expr::Constant(key));
        }

        let mut namespaced = false;
        let mut name = first;
        while NAMESPACES.contains(&name.as_str()) && self.eat(&Token::Dot) {
            namespaced = true;
            name = match self.next() {
                Some(SpannedToken {
                    token: Token::Ident(member),
                    ..
                }) => member,
                _ => return Err(ExprError::parser(self.col(), "expected a name after '.'")),
            };
        }

        if self.eat(&Token::LParen) {
            let function = Function::from_name(&name).ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
            let mut args = Vec::new();
            if !self.eat(&Token::RParen) {
                loop {
                    args.push(self.additive()?);
                    if self.eat(&Token::RParen) {
                        break;
                    }
                    self.expect(Token::Comma)?;
                }
            }
            function.check_arity(args.len())?;
            return Ok(Expr::Call { function, args });
        }

        if let Some((_, value)) = MATH_CONSTANTS.iter().find(|(n, _)| *n == name) {
            return Ok(Expr::Number(*value));
        }
        match name.as_str() {
            "True" => return Ok(Expr::Number(1.0)),
            "False" => return Ok(Expr::Number(0.0)),
            _ => {}
        }
        if namespaced || NAMESPACES.contains(&name.as_str()) || CONSTANT_TABLES.contains(&name.as_str()) {
            return Err(ExprError::parser(col, format!("'{}' is not a number", name)));
        }
        Ok(Expr::Constant(name))
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
