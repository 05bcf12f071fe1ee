#![warn(missing_docs)]

//! Math types for sonoframe kinematic chains.
//!
//! Thin wrappers around nalgebra providing the frame's affine transforms.
//! Transforms act on **row** vectors by right multiplication (`v' = v · M`):
//! the translation lives in the last row, and `a.then(&b)` (the product
//! `a · b`) applies `a` first and `b` second. Every chain, mesh placement and
//! solver domain in the workspace relies on this convention.

mod error;
mod notation;
mod round;
mod si;

pub use error::{MathError, TransformParseError};
pub use notation::{compose, parse_ops_strict, parse_transforms, parse_transforms_strict, TransformOp};
pub use round::round_half_even;
pub use si::parse_si;

use nalgebra::{Matrix4, RowVector4, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A point in 3D space (meters).
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// One of the three Cartesian axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// The x axis.
    X,
    /// The y axis.
    Y,
    /// The z axis.
    Z,
}

impl Axis {
    /// All axes in index order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Column/row index of this axis in a homogeneous matrix.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Axis from a single lowercase or uppercase character.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'x' => Some(Axis::X),
            'y' => Some(Axis::Y),
            'z' => Some(Axis::Z),
            _ => None,
        }
    }
}

impl FromStr for Axis {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Axis::from_char(c).ok_or_else(|| MathError::InvalidAxis(s.to_string())),
            _ => Err(MathError::InvalidAxis(s.to_string())),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(name)
    }
}

/// Unit of a rotation angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    /// Angles in degrees (the frame default).
    #[default]
    Degrees,
    /// Angles in radians.
    Radians,
}

impl AngleUnit {
    /// Convert `angle` expressed in this unit to radians.
    pub fn to_radians(self, angle: f64) -> f64 {
        match self {
            AngleUnit::Degrees => angle.to_radians(),
            AngleUnit::Radians => angle,
        }
    }
}

impl FromStr for AngleUnit {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degrees" => Ok(AngleUnit::Degrees),
            "radians" => Ok(AngleUnit::Radians),
            _ => Err(MathError::InvalidUnit(s.to_string())),
        }
    }
}

/// Scaling ratio: uniform, or one factor per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleRatio {
    /// Same factor along x, y and z.
    Uniform(f64),
    /// Independent factors along x, y and z.
    PerAxis([f64; 3]),
}

/// A 4x4 affine transformation acting on row vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix. Row 3 holds the translation.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Build from row-major entries.
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        let mut m = Matrix4::zeros();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                m[(r, c)] = *value;
            }
        }
        Self { matrix: m }
    }

    /// Row-major entries of the matrix.
    pub fn to_rows(&self) -> [[f64; 4]; 4] {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = self.matrix[(r, c)];
            }
        }
        rows
    }

    /// Translation by `distance` along `axis`.
    pub fn translation(axis: Axis, distance: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(3, axis.index())] = distance;
        Self { matrix: m }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation_xyz(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(3, 0)] = dx;
        m[(3, 1)] = dy;
        m[(3, 2)] = dz;
        Self { matrix: m }
    }

    /// Scale about the origin. The homogeneous entry stays at 1.
    pub fn scale(ratio: ScaleRatio) -> Self {
        let factors = match ratio {
            ScaleRatio::Uniform(r) => [r, r, r],
            ScaleRatio::PerAxis(f) => f,
        };
        let mut m = Matrix4::identity();
        for (i, f) in factors.iter().enumerate() {
            m[(i, i)] = *f;
        }
        Self { matrix: m }
    }

    /// Uniform scale by `ratio`.
    pub fn uniform_scale(ratio: f64) -> Self {
        Self::scale(ScaleRatio::Uniform(ratio))
    }

    /// Rotation about `axis` by `angle` expressed in `unit`.
    ///
    /// The matrix is the transpose of the usual column-vector rotation, so a
    /// positive rotation about z maps the row vector `(1, 0, 0)` onto `(0, 1, 0)`.
    pub fn rotation(axis: Axis, angle: f64, unit: AngleUnit) -> Self {
        let (s, c) = unit.to_radians(angle).sin_cos();
        let mut m = Matrix4::identity();
        match axis {
            Axis::X => {
                m[(1, 1)] = c;
                m[(1, 2)] = s;
                m[(2, 1)] = -s;
                m[(2, 2)] = c;
            }
            Axis::Y => {
                m[(0, 0)] = c;
                m[(0, 2)] = -s;
                m[(2, 0)] = s;
                m[(2, 2)] = c;
            }
            Axis::Z => {
                m[(0, 0)] = c;
                m[(0, 1)] = s;
                m[(1, 0)] = -s;
                m[(1, 1)] = c;
            }
        }
        Self { matrix: m }
    }

    /// Rotation from textual axis and unit names, as found in chain configs.
    pub fn rotation_named(axis: &str, angle: f64, unit: &str) -> Result<Self, MathError> {
        Ok(Self::rotation(axis.parse()?, angle, unit.parse()?))
    }

    /// Translation from a textual axis name.
    pub fn translation_named(axis: &str, distance: f64) -> Result<Self, MathError> {
        Ok(Self::translation(axis.parse()?, distance))
    }

    /// Compose: `self` then `other` (the product `self · other`).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point (row vector with homogeneous 1).
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = RowVector4::new(p.x, p.y, p.z, 1.0) * self.matrix;
        Point3::new(v[0], v[1], v[2])
    }

    /// Transform a direction vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = RowVector4::new(v.x, v.y, v.z, 0.0) * self.matrix;
        Vec3::new(r[0], r[1], r[2])
    }

    /// Image of the origin, i.e. the translation row.
    pub fn origin(&self) -> Point3 {
        Point3::new(self.matrix[(3, 0)], self.matrix[(3, 1)], self.matrix[(3, 2)])
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    /// Entry-wise comparison within `tol`.
    pub fn approx_eq(&self, other: &Transform, tol: f64) -> bool {
        self.matrix
            .iter()
            .zip(other.matrix.iter())
            .all(|(a, b)| (a - b).abs() <= tol)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
