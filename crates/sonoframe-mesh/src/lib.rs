#![warn(missing_docs)]

//! Triangle meshes for sonoframe.
//!
//! Meshes are stored flat (`[x0, y0, z0, x1, ...]`) in meters and carry the
//! material index a solver assigns to their interior. The crate provides the
//! parametric domain shapes used as boolean masks, lattice voxelization for
//! material assignment, and the [`BooleanEngine`] seam through which hosts
//! plug in a real CSG backend.

mod boolean;
mod error;
mod primitives;
mod voxel;

pub use boolean::{BooleanEngine, BooleanOp};
pub use error::MeshError;
pub use primitives::{box_extrusion, cylinder_extrusion};
pub use voxel::{voxelize, VoxelGrid};

use sonoframe_math::{Point3, Transform};

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Create an empty (inverted) box suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Expand to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// True until a point has been included.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    /// True if `p` lies inside or on the box.
    pub fn contains(&self, p: &Point3) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }
}

/// Indexed triangle mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    /// Flat vertex positions: `[x0, y0, z0, x1, y1, z1, ...]`.
    pub vertices: Vec<f64>,
    /// Flat triangle indices: `[i0, i1, i2, ...]`.
    pub indices: Vec<u32>,
    /// Material assigned to the enclosed volume (0 is the background medium).
    pub material_index: usize,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            material_index: 0,
        }
    }

    /// Build from vertex positions and triangles.
    pub fn from_triangles(points: &[Point3], triangles: &[[u32; 3]]) -> Self {
        Self {
            vertices: points.iter().flat_map(|p| [p.x, p.y, p.z]).collect(),
            indices: triangles.iter().flatten().copied().collect(),
            material_index: 0,
        }
    }

    /// Same mesh tagged with another material index.
    pub fn with_material(mut self, material_index: usize) -> Self {
        self.material_index = material_index;
        self
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// True when there is nothing to draw or voxelize.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Vertex position.
    pub fn vertex(&self, i: usize) -> Point3 {
        Point3::new(self.vertices[3 * i], self.vertices[3 * i + 1], self.vertices[3 * i + 2])
    }

    /// Iterate triangle corner positions.
    pub fn triangles(&self) -> impl Iterator<Item = [Point3; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|t| [self.vertex(t[0] as usize), self.vertex(t[1] as usize), self.vertex(t[2] as usize)])
    }

    /// Merge another mesh into this one. The material index is kept.
    pub fn merge(&mut self, other: &TriangleMesh) {
        let offset = self.num_vertices() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|&i| i + offset));
    }

    /// Copy with every vertex mapped through `transform` (row-vector convention).
    pub fn transformed(&self, transform: &Transform) -> TriangleMesh {
        let vertices = self
            .vertices
            .chunks_exact(3)
            .flat_map(|v| {
                let p = transform.apply_point(&Point3::new(v[0], v[1], v[2]));
                [p.x, p.y, p.z]
            })
            .collect();
        TriangleMesh {
            vertices,
            indices: self.indices.clone(),
            material_index: self.material_index,
        }
    }

    /// Bounding box of the vertices.
    pub fn bounds(&self) -> Aabb3 {
        let mut aabb = Aabb3::empty();
        for i in 0..self.num_vertices() {
            aabb.include_point(&self.vertex(i));
        }
        aabb
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonoframe_math::Axis;

    fn triangle() -> TriangleMesh {
        TriangleMesh::from_triangles(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2]],
        )
    }

    #[test]
    fn test_counts_and_merge() {
        let mut m = triangle();
        assert_eq!(m.num_triangles(), 1);
        assert_eq!(m.num_vertices(), 3);
        m.merge(&triangle());
        assert_eq!(m.num_triangles(), 2);
        assert_eq!(&m.indices[3..], &[3, 4, 5]);
    }

    #[test]
    fn test_transformed_and_bounds() {
        let m = triangle()
            .with_material(2)
            .transformed(&Transform::translation(Axis::Z, 0.5));
        assert_eq!(m.material_index, 2);
        let b = m.bounds();
        assert_eq!(b.min, Point3::new(0.0, 0.0, 0.5));
        assert_eq!(b.max, Point3::new(1.0, 1.0, 0.5));
        assert!(b.contains(&Point3::new(0.5, 0.5, 0.5)));
        assert!(TriangleMesh::new().bounds().is_empty());
    }
}
