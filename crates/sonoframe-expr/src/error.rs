//! Error types for expression parsing and evaluation.

use thiserror::Error;

/// Errors that can occur while parsing or evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    /// Lexer error: unexpected character or malformed literal.
    #[error("Lexer error at column {col}: {message}")]
    Lexer {
        /// Column (1-indexed).
        col: usize,
        /// Error message.
        message: String,
    },

    /// Parser error: unexpected token or disallowed construct.
    #[error("Parser error at column {col}: {message}")]
    Parser {
        /// Column (1-indexed) of the offending token.
        col: usize,
        /// Error message.
        message: String,
    },

    /// Function is not part of the math whitelist.
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments for a whitelisted function.
    #[error("{function}() takes {expected} argument(s), got {found}")]
    Arity {
        /// Function name.
        function: String,
        /// Human readable expectation, e.g. `2` or `at least 1`.
        expected: String,
        /// Number of arguments supplied.
        found: usize,
    },

    /// Named constant is not defined for this chain.
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// Evaluation produced NaN or an infinity.
    #[error("Expression did not evaluate to a finite number ({0})")]
    NonFinite(f64),
}

impl ExprError {
    /// Create a lexer error.
    pub fn lexer(col: usize, message: impl Into<String>) -> Self {
        Self::Lexer {
            col,
            message: message.into(),
        }
    }

    /// Create a parser error.
    pub fn parser(col: usize, message: impl Into<String>) -> Self {
        Self::Parser {
            col,
            message: message.into(),
        }
    }
}
