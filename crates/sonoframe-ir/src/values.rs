//! Scalar values carried by documents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A joint or shape argument: a literal, or an expression over chain constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// Numeric literal.
    Number(f64),
    /// Boolean literal (`true` evaluates to 1, `false` to 0).
    Bool(bool),
    /// Expression source, e.g. `"csts['L1'] * 2"`.
    Expr(String),
    /// Anything else. Kept so evaluation can report it instead of failing the whole load.
    Other(serde_json::Value),
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        ArgValue::Number(v)
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Expr(s.to_string())
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Number(v) => write!(f, "{}", v),
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Expr(s) => write!(f, "{}", s),
            ArgValue::Other(v) => write!(f, "{}", v),
        }
    }
}

/// A solver parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Numeric parameter (integers are stored as floats).
    Number(f64),
    /// Flag.
    Bool(bool),
    /// Free text, e.g. an engine flavour.
    Text(String),
    /// Explicitly unset.
    Null,
}

impl ParamValue {
    /// Numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Flag value, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// True for [`ParamValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{}", v),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Text(s) => write!(f, "{}", s),
            ParamValue::Null => f.write_str("null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_value_forms() {
        let v: Vec<ArgValue> = serde_json::from_str(r#"[0.01, 5, true, "csts['L1']*2", [1, 2]]"#).unwrap();
        assert_eq!(v[0], ArgValue::Number(0.01));
        assert_eq!(v[1], ArgValue::Number(5.0));
        assert_eq!(v[2], ArgValue::Bool(true));
        assert_eq!(v[3], ArgValue::Expr("csts['L1']*2".into()));
        assert!(matches!(v[4], ArgValue::Other(_)));
    }

    #[test]
    fn test_param_value_forms() {
        let v: Vec<ParamValue> = serde_json::from_str(r#"[1482.3, false, "OMP", null]"#).unwrap();
        assert_eq!(v[0].as_f64(), Some(1482.3));
        assert_eq!(v[1].as_bool(), Some(false));
        assert_eq!(v[2].as_str(), Some("OMP"));
        assert!(v[3].is_null());
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"[1482.3,false,"OMP",null]"#);
    }
}
