//! Boolean operators and the engine seam.

use std::fmt;
use std::str::FromStr;

use crate::{MeshError, TriangleMesh};

/// Mesh boolean operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanOp {
    /// First operand minus all others.
    Difference,
    /// Volume shared by all operands.
    Intersection,
    /// Volume covered by any operand.
    Union,
}

impl BooleanOp {
    /// Lowercase operator name.
    pub fn as_str(self) -> &'static str {
        match self {
            BooleanOp::Difference => "difference",
            BooleanOp::Intersection => "intersection",
            BooleanOp::Union => "union",
        }
    }
}

impl FromStr for BooleanOp {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "difference" => Ok(BooleanOp::Difference),
            "intersection" => Ok(BooleanOp::Intersection),
            "union" => Ok(BooleanOp::Union),
            other => Err(MeshError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for BooleanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A CSG backend operating on closed triangle meshes.
///
/// Implementations receive meshes already placed in world coordinates and
/// return a mesh in the same frame. Material indices are assigned by the
/// caller afterwards.
pub trait BooleanEngine: Send + Sync {
    /// Combine `meshes` left to right with `op`.
    fn apply(&self, op: BooleanOp, meshes: &[TriangleMesh]) -> Result<TriangleMesh, MeshError>;

    /// Convex hull of `mesh`.
    fn convex_hull(&self, mesh: &TriangleMesh) -> Result<TriangleMesh, MeshError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operators() {
        assert_eq!("union".parse::<BooleanOp>().unwrap(), BooleanOp::Union);
        assert_eq!(BooleanOp::Intersection.to_string(), "intersection");
        assert_eq!(
            "xor".parse::<BooleanOp>().unwrap_err(),
            MeshError::UnknownOperator("xor".into())
        );
    }
}
