//! Textual transform notation.
//!
//! Space-separated tokens, each one affine operation, composed left to right:
//!
//! - `Rz12deg`: rotate 12 degrees about z
//! - `Tx50um`: translate 50 micrometers along x (any SI prefix, `u` = micro)
//! - `S.2`: uniform scale by 0.2
//! - `Sy30`: scale by 30 along y only
//!
//! [`parse_transforms`] keeps the historical lenient behaviour (malformed
//! tokens are dropped with a warning); [`parse_transforms_strict`] reports them.

use crate::{parse_si, Axis, AngleUnit, ScaleRatio, Transform, TransformParseError};
use tracing::warn;

/// One parsed notation token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformOp {
    /// Rotation about an axis, in degrees.
    Rotate {
        /// Rotation axis.
        axis: Axis,
        /// Angle in degrees.
        degrees: f64,
    },
    /// Translation along an axis, in meters.
    Translate {
        /// Translation axis.
        axis: Axis,
        /// Distance in meters.
        distance: f64,
    },
    /// Uniform or single-axis scale.
    Scale(ScaleRatio),
}

impl TransformOp {
    /// Parse a single token.
    pub fn parse(token: &str) -> Result<Self, TransformParseError> {
        if let Some(body) = token.strip_prefix('R') {
            let body = body
                .strip_suffix("deg")
                .ok_or_else(|| TransformParseError::new(token, "rotation must end with 'deg'"))?;
            let (axis, rest) = split_axis(token, body)?;
            let degrees = number(token, rest)?;
            Ok(TransformOp::Rotate { axis, degrees })
        } else if let Some(body) = token.strip_prefix('T') {
            let body = body
                .strip_suffix('m')
                .ok_or_else(|| TransformParseError::new(token, "translation must end with 'm'"))?;
            let (axis, rest) = split_axis(token, body)?;
            let distance = number(token, rest)?;
            Ok(TransformOp::Translate { axis, distance })
        } else if let Some(body) = token.strip_prefix('S') {
            match body.chars().next().and_then(Axis::from_char) {
                Some(axis) => {
                    let ratio = number(token, &body[1..])?;
                    let mut factors = [1.0; 3];
                    factors[axis.index()] = ratio;
                    Ok(TransformOp::Scale(ScaleRatio::PerAxis(factors)))
                }
                None => Ok(TransformOp::Scale(ScaleRatio::Uniform(number(token, body)?))),
            }
        } else {
            Err(TransformParseError::new(token, "expected an R, T or S operation"))
        }
    }

    /// Matrix for this operation.
    pub fn to_transform(&self) -> Transform {
        match *self {
            TransformOp::Rotate { axis, degrees } => Transform::rotation(axis, degrees, AngleUnit::Degrees),
            TransformOp::Translate { axis, distance } => Transform::translation(axis, distance),
            TransformOp::Scale(ratio) => Transform::scale(ratio),
        }
    }
}

fn split_axis<'a>(token: &str, body: &'a str) -> Result<(Axis, &'a str), TransformParseError> {
    let mut chars = body.chars();
    let axis = chars
        .next()
        .and_then(Axis::from_char)
        .ok_or_else(|| TransformParseError::new(token, "missing axis (x, y or z)"))?;
    Ok((axis, chars.as_str()))
}

fn number(token: &str, text: &str) -> Result<f64, TransformParseError> {
    parse_si(text).ok_or_else(|| TransformParseError::new(token, format!("'{}' is not a number", text)))
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
}

/// Parse every token, failing on the first malformed one.
pub fn parse_ops_strict(text: Option<&str>) -> Result<Vec<TransformOp>, TransformParseError> {
    match text {
        None => Ok(Vec::new()),
        Some(text) => tokens(text).map(TransformOp::parse).collect(),
    }
}

/// Parse notation into matrices, dropping malformed tokens.
///
/// `None` and empty input yield an empty list; fold it with [`compose`].
pub fn parse_transforms(text: Option<&str>) -> Vec<Transform> {
    let Some(text) = text else {
        return Vec::new();
    };
    tokens(text)
        .filter_map(|token| match TransformOp::parse(token) {
            Ok(op) => Some(op.to_transform()),
            Err(err) => {
                warn!(%err, "dropping transform token");
                None
            }
        })
        .collect()
}

/// Parse notation into matrices, surfacing the first malformed token.
pub fn parse_transforms_strict(text: Option<&str>) -> Result<Vec<Transform>, TransformParseError> {
    Ok(parse_ops_strict(text)?.iter().map(TransformOp::to_transform).collect())
}

/// Fold transforms left to right starting from identity.
pub fn compose(transforms: &[Transform]) -> Transform {
    transforms
        .iter()
        .fold(Transform::identity(), |acc, t| acc.then(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point3;

    #[test]
    fn test_translate_then_rotate() {
        let ops = parse_ops_strict(Some("Tx50um Rz90deg")).unwrap();
        assert_eq!(ops.len(), 2);
        match ops[0] {
            TransformOp::Translate { axis, distance } => {
                assert_eq!(axis, Axis::X);
                assert!((distance - 5e-5).abs() < 1e-15);
            }
            other => panic!("expected translation, got {:?}", other),
        }
        assert_eq!(ops[1], TransformOp::Rotate { axis: Axis::Z, degrees: 90.0 });

        let m = compose(&parse_transforms(Some("Tx50um Rz90deg")));
        let p = m.apply_point(&Point3::origin());
        assert!(p.x.abs() < 1e-15);
        assert!((p.y - 5e-5).abs() < 1e-15);
    }

    #[test]
    fn test_scale_tokens() {
        assert_eq!(
            TransformOp::parse("S.2").unwrap(),
            TransformOp::Scale(ScaleRatio::Uniform(0.2))
        );
        assert_eq!(
            TransformOp::parse("Sy30").unwrap(),
            TransformOp::Scale(ScaleRatio::PerAxis([1.0, 30.0, 1.0]))
        );
    }

    #[test]
    fn test_whitespace_does_not_change_result() {
        let a = compose(&parse_transforms(Some("S1 Rx10deg Tz2mm")));
        let b = compose(&parse_transforms(Some("   S1   Rx10deg Tz2mm  ")));
        assert_eq!(a, b);
    }

    #[test]
    fn test_malformed_tokens_are_dropped() {
        let kept = parse_transforms(Some("Rq12deg Tx5mm Foo Rz1rad Sx"));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0], Transform::translation(Axis::X, 5e-3));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(parse_transforms(None).is_empty());
        assert!(parse_transforms(Some("")).is_empty());
        assert_eq!(compose(&[]), Transform::identity());
        assert_eq!(parse_ops_strict(None).unwrap(), Vec::new());
    }

    #[test]
    fn test_strict_reports_first_bad_token() {
        let err = parse_transforms_strict(Some("Tx1m Rw3deg Ty2m")).unwrap_err();
        assert_eq!(err.token, "Rw3deg");
    }
}
