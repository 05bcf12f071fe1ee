//! The math whitelist: functions and named constants an expression may use.

use sonoframe_math::round_half_even;

use crate::error::ExprError;

/// Module prefixes accepted in front of whitelisted names (`np.sin`, `math.pi`).
pub const NAMESPACES: &[&str] = &["np", "numpy", "math"];

/// Named mathematical constants.
pub const MATH_CONSTANTS: &[(&str, f64)] = &[
    ("pi", std::f64::consts::PI),
    ("e", std::f64::consts::E),
    ("tau", std::f64::consts::TAU),
    ("inf", f64::INFINITY),
];

/// A whitelisted function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Sqrt,
    Abs,
    Exp,
    Log,
    Log10,
    Log2,
    Deg2Rad,
    Rad2Deg,
    Min,
    Max,
    Pow,
    Floor,
    Ceil,
    Round,
    Hypot,
    Sign,
}

impl Function {
    /// Look up a function by any of its accepted spellings.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "asin" | "arcsin" => Self::Asin,
            "acos" | "arccos" => Self::Acos,
            "atan" | "arctan" => Self::Atan,
            "atan2" | "arctan2" => Self::Atan2,
            "sinh" => Self::Sinh,
            "cosh" => Self::Cosh,
            "tanh" => Self::Tanh,
            "sqrt" => Self::Sqrt,
            "abs" | "fabs" => Self::Abs,
            "exp" => Self::Exp,
            "log" => Self::Log,
            "log10" => Self::Log10,
            "log2" => Self::Log2,
            "deg2rad" | "radians" => Self::Deg2Rad,
            "rad2deg" | "degrees" => Self::Rad2Deg,
            "min" | "minimum" => Self::Min,
            "max" | "maximum" => Self::Max,
            "pow" | "power" => Self::Pow,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "round" => Self::Round,
            "hypot" => Self::Hypot,
            "sign" => Self::Sign,
            _ => return None,
        })
    }

    /// Canonical name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Atan2 => "atan2",
            Self::Sinh => "sinh",
            Self::Cosh => "cosh",
            Self::Tanh => "tanh",
            Self::Sqrt => "sqrt",
            Self::Abs => "abs",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Log10 => "log10",
            Self::Log2 => "log2",
            Self::Deg2Rad => "deg2rad",
            Self::Rad2Deg => "rad2deg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Pow => "pow",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Round => "round",
            Self::Hypot => "hypot",
            Self::Sign => "sign",
        }
    }

    /// Reject calls with the wrong number of arguments.
    pub fn check_arity(self, found: usize) -> Result<(), ExprError> {
        let (ok, expected) = match self {
            Self::Min | Self::Max => (found >= 1, "at least 1"),
            Self::Atan2 | Self::Pow | Self::Hypot => (found == 2, "2"),
            _ => (found == 1, "1"),
        };
        if ok {
            Ok(())
        } else {
            Err(ExprError::Arity {
                function: self.name().to_string(),
                expected: expected.to_string(),
                found,
            })
        }
    }

    /// Apply to already-evaluated arguments. Arity was checked at parse time.
    pub(crate) fn apply(self, args: &[f64]) -> f64 {
        let a = args.first().copied().unwrap_or(f64::NAN);
        let b = args.get(1).copied().unwrap_or(f64::NAN);
        match self {
            Self::Sin => a.sin(),
            Self::Cos => a.cos(),
            Self::Tan => a.tan(),
            Self::Asin => a.asin(),
            Self::Acos => a.acos(),
            Self::Atan => a.atan(),
            Self::Atan2 => a.atan2(b),
            Self::Sinh => a.sinh(),
            Self::Cosh => a.cosh(),
            Self::Tanh => a.tanh(),
            Self::Sqrt => a.sqrt(),
            Self::Abs => a.abs(),
            Self::Exp => a.exp(),
            Self::Log => a.ln(),
            Self::Log10 => a.log10(),
            Self::Log2 => a.log2(),
            Self::Deg2Rad => a.to_radians(),
            Self::Rad2Deg => a.to_degrees(),
            Self::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Pow => a.powf(b),
            Self::Floor => a.floor(),
            Self::Ceil => a.ceil(),
            Self::Round => round_half_even(a),
            Self::Hypot => a.hypot(b),
            Self::Sign => {
                if a > 0.0 {
                    1.0
                } else if a < 0.0 {
                    -1.0
                } else {
                    a
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_resolve_to_same_function() {
        assert_eq!(Function::from_name("arctan2"), Some(Function::Atan2));
        assert_eq!(Function::from_name("radians"), Some(Function::Deg2Rad));
        assert_eq!(Function::from_name("eval"), None);
    }

    #[test]
    fn test_variadic_min_max() {
        assert_eq!(Function::Min.apply(&[3.0, -1.0, 2.0]), -1.0);
        assert_eq!(Function::Max.apply(&[3.0, -1.0, 2.0]), 3.0);
        assert!(Function::Max.check_arity(0).is_err());
    }
}
