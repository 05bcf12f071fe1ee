//! Solved fields on Cartesian grids, and their colour-mapped render volumes.

use sonoframe_ir::VolumeRenderConfig;
use sonoframe_math::{Axis, Transform};

use crate::error::{Result, SolverError, SolverOutputError};

/// A scalar field sampled on a rectilinear grid, `x` fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldVolume {
    /// x coordinates.
    pub x: Vec<f64>,
    /// y coordinates.
    pub y: Vec<f64>,
    /// z coordinates.
    pub z: Vec<f64>,
    /// Samples, `values[i + nx * (j + ny * k)]`.
    pub values: Vec<f64>,
}

impl FieldVolume {
    /// Wrap samples, checking the length.
    pub fn new(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        let expected = x.len() * y.len() * z.len();
        if values.len() != expected {
            return Err(SolverError::ShapeMismatch {
                field: "volume".to_string(),
                expected,
                found: values.len(),
            });
        }
        Ok(Self { x, y, z, values })
    }

    /// Points per axis.
    pub fn dims(&self) -> [usize; 3] {
        [self.x.len(), self.y.len(), self.z.len()]
    }

    /// Sample at `(i, j, k)`.
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.values[i + self.x.len() * (j + self.y.len() * k)]
    }

    /// Largest sample, 0 for an empty volume.
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Fail when any sample is NaN or infinite.
    pub fn check_finite(&self, field: &str) -> Result<()> {
        if self.values.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(SolverOutputError { field: field.to_string() }.into())
        }
    }

    /// Every `stride`-th sample along each axis, starting at `stride / 2`.
    pub fn strided(&self, stride: usize) -> Self {
        let stride = stride.max(1);
        let pick = |n: usize| (stride / 2..n).step_by(stride).collect::<Vec<_>>();
        let (ix, iy, iz) = (pick(self.x.len()), pick(self.y.len()), pick(self.z.len()));
        let mut values = Vec::with_capacity(ix.len() * iy.len() * iz.len());
        for &k in &iz {
            for &j in &iy {
                for &i in &ix {
                    values.push(self.get(i, j, k));
                }
            }
        }
        Self {
            x: ix.iter().map(|&i| self.x[i]).collect(),
            y: iy.iter().map(|&j| self.y[j]).collect(),
            z: iz.iter().map(|&k| self.z[k]).collect(),
            values,
        }
    }

    /// Keep the z planes strictly below `z_max`.
    pub fn below_z(&self, z_max: f64) -> Self {
        let keep: Vec<usize> = (0..self.z.len()).filter(|&k| self.z[k] < z_max).collect();
        let plane = self.x.len() * self.y.len();
        let values = keep
            .iter()
            .flat_map(|&k| self.values[k * plane..(k + 1) * plane].iter().copied())
            .collect();
        Self {
            x: self.x.clone(),
            y: self.y.clone(),
            z: keep.iter().map(|&k| self.z[k]).collect(),
            values,
        }
    }
}

const VIRIDIS: [[u8; 3]; 10] = [
    [0x44, 0x01, 0x54],
    [0x48, 0x28, 0x78],
    [0x3e, 0x49, 0x89],
    [0x31, 0x68, 0x8e],
    [0x26, 0x82, 0x8e],
    [0x1f, 0x9e, 0x89],
    [0x35, 0xb7, 0x79],
    [0x6e, 0xce, 0x58],
    [0xb5, 0xde, 0x2b],
    [0xfd, 0xe7, 0x25],
];

/// Viridis colour at `t` in `[0, 1]`, clamped.
pub fn viridis(t: f64) -> [u8; 3] {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let pos = t * (VIRIDIS.len() - 1) as f64;
    let lo = (pos.floor() as usize).min(VIRIDIS.len() - 2);
    let w = pos - lo as f64;
    let mut out = [0u8; 3];
    for (c, slot) in out.iter_mut().enumerate() {
        let a = VIRIDIS[lo][c] as f64;
        let b = VIRIDIS[lo + 1][c] as f64;
        *slot = (a + (b - a) * w).round() as u8;
    }
    out
}

/// Colour-mapped field ready for additive volume rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeData {
    /// Voxels per axis.
    pub dims: [usize; 3],
    /// RGBA per voxel, `x` fastest.
    pub rgba: Vec<[u8; 4]>,
    /// Voxel index space to world.
    pub transform: Transform,
}

/// Colour-map `field` for rendering in the frame `end`.
///
/// Samples normalise against `p_max_viz`, or the field maximum. Colour is
/// viridis and alpha is `opacity × normalised value`. Voxel `(i, j, k)` maps
/// to `(x0, y0, z0) + stride · dx · (i, j, k)`, then through `end`.
pub fn render_volume(field: &FieldVolume, config: &VolumeRenderConfig, dx: f64, end: &Transform) -> Result<VolumeData> {
    field.check_finite("pressure")?;
    let stride = config.stride.max(1);
    let field = field.strided(stride);
    let vmax = config.p_max_viz.unwrap_or_else(|| field.max());
    let norm = |v: f64| if vmax > 0.0 { (v / vmax).clamp(0.0, 1.0) } else { 0.0 };
    let rgba = field
        .values
        .iter()
        .map(|&v| {
            let n = norm(v);
            let [r, g, b] = viridis(n);
            [r, g, b, (config.opacity * n).clamp(0.0, 255.0) as u8]
        })
        .collect();
    let origin = |axis: &[f64]| axis.first().copied().unwrap_or(0.0);
    let transform = Transform::uniform_scale(dx * stride as f64)
        .then(&Transform::translation(Axis::X, origin(&field.x)))
        .then(&Transform::translation(Axis::Y, origin(&field.y)))
        .then(&Transform::translation(Axis::Z, origin(&field.z)))
        .then(end);
    Ok(VolumeData {
        dims: field.dims(),
        rgba,
        transform,
    })
}
