//! Lattice voxelization of closed meshes.
//!
//! Voxel centres sit on integer multiples of the pitch. A voxel is occupied
//! when the surface passes through its cell (found by sampling every
//! triangle finer than half a pitch and rounding to the lattice) or when its
//! centre lies inside the mesh (ray parity along +z per lattice column).

use std::collections::HashSet;

use rayon::prelude::*;
use sonoframe_math::Point3;
use tracing::debug;

use crate::{MeshError, TriangleMesh};

// Irrational fractions of a pitch; keeps parity rays off shared edges and vertices.
const RAY_JITTER: (f64, f64) = (0.537_801_3e-6, 0.318_309_9e-6);

/// Occupied lattice cells of a voxelized mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    /// Lattice spacing in meters.
    pub pitch: f64,
    /// Occupied cells, sorted.
    pub cells: Vec<[i64; 3]>,
}

impl VoxelGrid {
    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when nothing is occupied.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell centre positions.
    pub fn centers(&self) -> Vec<Point3> {
        self.cells
            .iter()
            .map(|c| Point3::new(c[0] as f64 * self.pitch, c[1] as f64 * self.pitch, c[2] as f64 * self.pitch))
            .collect()
    }
}

fn lattice(p: &Point3, pitch: f64) -> [i64; 3] {
    [
        (p.x / pitch).round() as i64,
        (p.y / pitch).round() as i64,
        (p.z / pitch).round() as i64,
    ]
}

/// Voxelize `mesh` at `pitch`, filling the interior.
pub fn voxelize(mesh: &TriangleMesh, pitch: f64) -> Result<VoxelGrid, MeshError> {
    if !(pitch.is_finite() && pitch > 0.0) {
        return Err(MeshError::InvalidPitch(pitch));
    }
    if mesh.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    let triangles: Vec<[Point3; 3]> = mesh.triangles().collect();

    let mut cells: HashSet<[i64; 3]> = triangles
        .par_iter()
        .flat_map_iter(|tri| surface_cells(tri, pitch))
        .collect();

    let bounds = mesh.bounds();
    let lo = lattice(&bounds.min, pitch);
    let hi = lattice(&bounds.max, pitch);
    let columns: Vec<(i64, i64)> = (lo[0]..=hi[0])
        .flat_map(|i| (lo[1]..=hi[1]).map(move |j| (i, j)))
        .collect();
    let interior: Vec<[i64; 3]> = columns
        .par_iter()
        .flat_map_iter(|&(i, j)| column_cells(&triangles, i, j, pitch))
        .collect();
    let surface_count = cells.len();
    cells.extend(interior);

    let mut cells: Vec<[i64; 3]> = cells.into_iter().collect();
    cells.sort_unstable();
    debug!(pitch, surface = surface_count, total = cells.len(), "voxelized mesh");
    Ok(VoxelGrid { pitch, cells })
}

/// Cells touched by a triangle, found by barycentric sampling.
fn surface_cells(tri: &[Point3; 3], pitch: f64) -> Vec<[i64; 3]> {
    let [a, b, c] = tri;
    let longest = (b - a).norm().max((c - b).norm()).max((a - c).norm());
    let steps = ((2.0 * longest / pitch).ceil() as usize).max(1);
    let mut out = Vec::with_capacity((steps + 1) * (steps + 2) / 2);
    for i in 0..=steps {
        for j in 0..=(steps - i) {
            let u = i as f64 / steps as f64;
            let v = j as f64 / steps as f64;
            let p = a + (b - a) * u + (c - a) * v;
            out.push(lattice(&p, pitch));
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}

/// Interior cells of one lattice column, by crossing parity along +z.
fn column_cells(triangles: &[[Point3; 3]], i: i64, j: i64, pitch: f64) -> Vec<[i64; 3]> {
    let x = (i as f64 + RAY_JITTER.0) * pitch;
    let y = (j as f64 + RAY_JITTER.1) * pitch;
    let mut hits: Vec<f64> = triangles.iter().filter_map(|t| ray_z_hit(t, x, y)).collect();
    if hits.len() < 2 {
        return Vec::new();
    }
    hits.sort_by(|a, b| a.total_cmp(b));

    let mut out = Vec::new();
    for pair in hits.chunks_exact(2) {
        let k0 = (pair[0] / pitch).ceil() as i64;
        let k1 = (pair[1] / pitch).floor() as i64;
        out.extend((k0..=k1).map(|k| [i, j, k]));
    }
    out
}

/// Height where the vertical line through `(x, y)` crosses the triangle, if it does.
fn ray_z_hit(tri: &[Point3; 3], x: f64, y: f64) -> Option<f64> {
    let [a, b, c] = tri;
    let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    if det.abs() < f64::EPSILON * 1e-6 {
        return None;
    }
    let l1 = ((b.y - c.y) * (x - c.x) + (c.x - b.x) * (y - c.y)) / det;
    let l2 = ((c.y - a.y) * (x - c.x) + (a.x - c.x) * (y - c.y)) / det;
    let l3 = 1.0 - l1 - l2;
    if l1 < 0.0 || l2 < 0.0 || l3 < 0.0 {
        return None;
    }
    Some(l1 * a.z + l2 * b.z + l3 * c.z)
}
