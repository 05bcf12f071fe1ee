#![warn(missing_docs)]

//! Sandboxed arithmetic expressions for parametric joint arguments.
//!
//! Expressions reference chain constants (`csts['L1']`, `constants['L1']` or
//! a bare `L1`) and a fixed math namespace (`np.sin`, `math.pi`, `sqrt`, ...).
//! Anything else is rejected while parsing, so evaluation can never reach
//! outside the constants table.
//!
//! ```
//! use std::collections::BTreeMap;
//! let csts = BTreeMap::from([("L1".to_string(), 0.02)]);
//! let v = sonoframe_expr::evaluate("csts['L1'] * 2", &csts).unwrap();
//! assert!((v - 0.04).abs() < 1e-12);
//! ```

mod error;
mod eval;
mod functions;
mod lexer;
mod parser;

use std::collections::BTreeMap;

pub use error::ExprError;
pub use eval::Expression;
pub use functions::Function;
pub use parser::{BinaryOp, Expr};

/// Parse and evaluate `source` in one step.
pub fn evaluate(source: &str, constants: &BTreeMap<String, f64>) -> Result<f64, ExprError> {
    Expression::parse(source)?.eval(constants)
}
