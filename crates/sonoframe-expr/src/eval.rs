//! Tree-walking evaluation against a constants table.

use std::collections::BTreeMap;

use crate::error::ExprError;
use crate::parser::{parse, BinaryOp, Expr};

/// A parsed, validated expression ready for repeated evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    /// Parse and validate `source`.
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        Ok(Self {
            source: source.to_string(),
            root: parse(source)?,
        })
    }

    /// Original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Syntax tree.
    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Names of the constants this expression reads, sorted and deduplicated.
    pub fn constants(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_constants(&self.root, &mut out);
        out.sort();
        out.dedup();
        out
    }

    /// Evaluate with the given constants. Non-finite results are rejected.
    pub fn eval(&self, constants: &BTreeMap<String, f64>) -> Result<f64, ExprError> {
        let value = eval_node(&self.root, constants)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ExprError::NonFinite(value))
        }
    }
}

impl std::str::FromStr for Expression {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn collect_constants(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Number(_) => {}
        Expr::Constant(name) => out.push(name.clone()),
        Expr::Neg(inner) => collect_constants(inner, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_constants(lhs, out);
            collect_constants(rhs, out);
        }
        Expr::Call { args, .. } => args.iter().for_each(|a| collect_constants(a, out)),
    }
}

fn eval_node(expr: &Expr, constants: &BTreeMap<String, f64>) -> Result<f64, ExprError> {
    Ok(match expr {
        Expr::Number(v) => *v,
        Expr::Constant(name) => *constants
            .get(name)
            .ok_or_else(|| ExprError::UnknownIdentifier(name.clone()))?,
        Expr::Neg(inner) => -eval_node(inner, constants)?,
        Expr::Binary { op, lhs, rhs } => {
            let a = eval_node(lhs, constants)?;
            let b = eval_node(rhs, constants)?;
            match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::FloorDiv => (a / b).floor(),
                BinaryOp::Rem => a - b * (a / b).floor(),
                BinaryOp::Pow => a.powf(b),
            }
        }
        Expr::Call { function, args } => {
            let values = args
                .iter()
                .map(|a| eval_node(a, constants))
                .collect::<Result<Vec<_>, _>>()?;
            function.apply(&values)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn csts() -> BTreeMap<String, f64> {
        BTreeMap::from([("L1".to_string(), 0.02), ("L2".to_string(), 0.04)])
    }

    #[test]
    fn test_constants_lookup() {
        let e = Expression::parse("csts['L1']*2").unwrap();
        assert_relative_eq!(e.eval(&csts()).unwrap(), 0.04);
        let e = Expression::parse("-csts['L2']").unwrap();
        assert_relative_eq!(e.eval(&csts()).unwrap(), -0.04);
        let e = Expression::parse("L1 + constants['L2']").unwrap();
        assert_relative_eq!(e.eval(&csts()).unwrap(), 0.06);
    }

    #[test]
    fn test_python_arithmetic() {
        let c = BTreeMap::new();
        assert_eq!(Expression::parse("7 // 2").unwrap().eval(&c).unwrap(), 3.0);
        assert_eq!(Expression::parse("-7 // 2").unwrap().eval(&c).unwrap(), -4.0);
        assert_eq!(Expression::parse("-7 % 3").unwrap().eval(&c).unwrap(), 2.0);
        assert_eq!(Expression::parse("2 ** 3 ** 2").unwrap().eval(&c).unwrap(), 512.0);
        assert_eq!(Expression::parse("-2 ** 2").unwrap().eval(&c).unwrap(), -4.0);
        assert_eq!(Expression::parse("2 ** -1").unwrap().eval(&c).unwrap(), 0.5);
    }

    #[test]
    fn test_math_namespace() {
        let c = BTreeMap::new();
        assert_relative_eq!(
            Expression::parse("np.sin(np.pi / 2)").unwrap().eval(&c).unwrap(),
            1.0
        );
        assert_relative_eq!(
            Expression::parse("np.deg2rad(180)").unwrap().eval(&c).unwrap(),
            std::f64::consts::PI
        );
        assert_eq!(Expression::parse("max(1, 5, 3)").unwrap().eval(&c).unwrap(), 5.0);
    }

    #[test]
    fn test_unknown_identifier() {
        let e = Expression::parse("csts['L3'] + 1").unwrap();
        assert_eq!(e.eval(&csts()).unwrap_err(), ExprError::UnknownIdentifier("L3".into()));
    }

    #[test]
    fn test_non_finite_rejected() {
        let c = BTreeMap::new();
        assert!(matches!(
            Expression::parse("1 / 0").unwrap().eval(&c).unwrap_err(),
            ExprError::NonFinite(_)
        ));
        assert!(matches!(
            Expression::parse("sqrt(-1)").unwrap().eval(&c).unwrap_err(),
            ExprError::NonFinite(_)
        ));
    }

    #[test]
    fn test_constants_listing() {
        let e = Expression::parse("csts['b'] + a * csts['b']").unwrap();
        assert_eq!(e.constants(), vec!["a".to_string(), "b".to_string()]);
    }
}
