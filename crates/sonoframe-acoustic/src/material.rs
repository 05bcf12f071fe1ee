//! Material assignment from voxelized meshes onto the Cartesian grid.

use std::collections::BTreeMap;

use kiddo::{KdTree, SquaredEuclidean};
use rayon::prelude::*;
use sonoframe_math::{AngleUnit, Axis, Point3, Transform};
use sonoframe_mesh::{voxelize, MeshError, TriangleMesh};
use tracing::{debug, warn};

use crate::error::Result;
use crate::medium::MaterialGrid;
use crate::params::SimulationParameters;

/// Lattice-aligned points share coordinates along every axis, which kiddo
/// cannot split into buckets. A fixed rotation leaves distances unchanged
/// and separates them.
fn tree_frame() -> Transform {
    Transform::rotation(Axis::Z, 0.383_972_4, AngleUnit::Radians)
        .then(&Transform::rotation(Axis::X, 0.271_234_9, AngleUnit::Radians))
        .then(&Transform::rotation(Axis::Y, 0.150_796_4, AngleUnit::Radians))
}

fn key(frame: &Transform, p: &Point3) -> [f64; 3] {
    let q = frame.apply_point(p);
    [q.x, q.y, q.z]
}

/// Grid points within half a voxel pitch of any voxel centre.
pub fn points_near_voxels(points: &[Point3], centers: &[Point3], pitch: f64) -> Vec<bool> {
    if centers.is_empty() {
        return vec![false; points.len()];
    }
    let frame = tree_frame();
    let mut tree: KdTree<f64, 3> = KdTree::new();
    for (i, c) in centers.iter().enumerate() {
        tree.add(&key(&frame, c), i as u64);
    }
    let threshold = (pitch / 2.0).powi(2);
    points
        .par_iter()
        .map(|p| tree.nearest_one::<SquaredEuclidean>(&key(&frame, p)).distance <= threshold)
        .collect()
}

/// Paint each mesh's material onto `grid`.
///
/// Meshes are in world coordinates and are brought into the domain frame
/// with `world_to_domain` before voxelizing at `pitch`. Later meshes win.
/// A mesh without triangles is logged and skipped. Returns the voxel centres of each material for preview.
pub fn assign_materials(
    grid: &mut MaterialGrid,
    coords: &[Point3],
    meshes: &[TriangleMesh],
    world_to_domain: &Transform,
    pitch: f64,
    params: &SimulationParameters,
) -> Result<BTreeMap<usize, Vec<Point3>>> {
    let mut centers_by_material: BTreeMap<usize, Vec<Point3>> = BTreeMap::new();
    for (position, mesh) in meshes.iter().enumerate() {
        let index = mesh.material_index;
        let voxels = match voxelize(&mesh.transformed(world_to_domain), pitch) {
            Ok(voxels) => voxels,
            Err(MeshError::EmptyMesh) => {
                warn!(mesh = position, material = index, "mesh has no triangles; skipped");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        grid.ensure_material(index, params)?;
        if voxels.is_empty() {
            warn!(mesh = position, material = index, "mesh voxelized to nothing; skipped");
            continue;
        }
        let centers = voxels.centers();
        let hits = points_near_voxels(coords, &centers, pitch);
        let mut painted = 0usize;
        for (slot, hit) in grid.indices.iter_mut().zip(hits) {
            if hit {
                *slot = index;
                painted += 1;
            }
        }
        debug!(material = index, voxels = centers.len(), painted, "material assigned");
        centers_by_material.entry(index).or_default().extend(centers);
    }
    Ok(centers_by_material)
}
