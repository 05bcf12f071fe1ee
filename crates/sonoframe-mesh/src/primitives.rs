//! Closed extrusions used as solver domain masks.
//!
//! Both shapes are centred on the z axis and extruded from z = 0 upward, with
//! outward-facing triangles.

use std::f64::consts::PI;

use sonoframe_math::Point3;

use crate::{MeshError, TriangleMesh};

fn check(name: &'static str, value: f64) -> Result<(), MeshError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MeshError::InvalidDimension { name, value })
    }
}

/// Extrude a polygon (counter-clockwise in xy) from z = 0 to `height`.
fn extrude(outline: &[(f64, f64)], height: f64) -> TriangleMesh {
    let n = outline.len() as u32;
    let mut points: Vec<Point3> = outline.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect();
    points.extend(outline.iter().map(|&(x, y)| Point3::new(x, y, height)));
    // Cap centres close the fan triangulation.
    points.push(Point3::new(0.0, 0.0, 0.0));
    points.push(Point3::new(0.0, 0.0, height));
    let (bottom_c, top_c) = (2 * n, 2 * n + 1);

    let mut tris = Vec::with_capacity(4 * n as usize);
    for i in 0..n {
        let j = (i + 1) % n;
        // Side quad.
        tris.push([i, j, n + j]);
        tris.push([i, n + j, n + i]);
        // Caps.
        tris.push([bottom_c, j, i]);
        tris.push([top_c, n + i, n + j]);
    }
    TriangleMesh::from_triangles(&points, &tris)
}

/// Box of `x_size × y_size` centred on the axis, extruded to `z_size`.
pub fn box_extrusion(x_size: f64, y_size: f64, z_size: f64) -> Result<TriangleMesh, MeshError> {
    check("x_size", x_size)?;
    check("y_size", y_size)?;
    check("z_size", z_size)?;
    let (hx, hy) = (x_size / 2.0, y_size / 2.0);
    Ok(extrude(&[(-hx, -hy), (hx, -hy), (hx, hy), (-hx, hy)], z_size))
}

/// Cylinder of `radius` extruded to `height`, approximated by `segments` sides.
pub fn cylinder_extrusion(radius: f64, height: f64, segments: u32) -> Result<TriangleMesh, MeshError> {
    check("radius", radius)?;
    check("height", height)?;
    let segments = segments.max(3);
    let outline: Vec<(f64, f64)> = (0..segments)
        .map(|i| {
            let a = 2.0 * PI * i as f64 / segments as f64;
            (radius * a.cos(), radius * a.sin())
        })
        .collect();
    Ok(extrude(&outline, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Signed volume via the divergence theorem; positive for outward winding.
    fn volume(mesh: &TriangleMesh) -> f64 {
        mesh.triangles()
            .map(|[a, b, c]| a.coords.dot(&b.coords.cross(&c.coords)) / 6.0)
            .sum()
    }

    #[test]
    fn test_box_volume_and_bounds() {
        let m = box_extrusion(0.02, 0.01, 0.03).unwrap();
        assert_relative_eq!(volume(&m), 0.02 * 0.01 * 0.03, max_relative = 1e-12);
        let b = m.bounds();
        assert_relative_eq!(b.min.x, -0.01);
        assert_relative_eq!(b.max.y, 0.005);
        assert_relative_eq!(b.min.z, 0.0);
        assert_relative_eq!(b.max.z, 0.03);
    }

    #[test]
    fn test_cylinder_volume() {
        let m = cylinder_extrusion(1.0, 2.0, 16).unwrap();
        let polygon_area = 0.5 * 16.0 * (2.0 * PI / 16.0).sin();
        assert_relative_eq!(volume(&m), polygon_area * 2.0, max_relative = 1e-12);
        assert_eq!(m.num_triangles(), 64);
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        assert_eq!(
            box_extrusion(0.0, 1.0, 1.0).unwrap_err(),
            MeshError::InvalidDimension { name: "x_size", value: 0.0 }
        );
        assert!(cylinder_extrusion(1.0, f64::NAN, 8).is_err());
    }
}
