//! Acoustic media and per-material properties.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SolverError};
use crate::params::SimulationParameters;

/// Power-law exponent the solver requires with `stokes` absorption.
pub const STOKES_ALPHA_POWER: f64 = 2.0;

/// Convert a power-law attenuation into the equivalent coefficient at
/// `f0` under the fixed exponent 2: `alpha · f^y / f^2` with `f` in MHz.
pub fn alpha_corrected(alpha: f64, alpha_power: f64, f0: f64) -> f64 {
    let f_mhz = f0 * 1e-6;
    alpha * f_mhz.powf(alpha_power) / f_mhz.powf(STOKES_ALPHA_POWER)
}

/// Properties of one material, read from `c_i`, `rho_i`, `alpha_i` and `alpha_power_i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperties {
    /// Sound speed in m/s.
    pub sound_speed: f64,
    /// Density in kg/m³.
    pub density: f64,
    /// Attenuation in dB/(MHz^y cm).
    pub alpha: f64,
    /// Attenuation power-law exponent `y`.
    pub alpha_power: f64,
}

fn material_value(params: &SimulationParameters, property: &'static str, prefix: &str, index: usize) -> Result<f64> {
    let key = format!("{}_{}", prefix, index);
    if !params.contains(&key) {
        return Err(SolverError::MissingMaterial { property, index, key });
    }
    params.number(&key)
}

impl MaterialProperties {
    /// Look up material `index`.
    pub fn lookup(params: &SimulationParameters, index: usize) -> Result<Self> {
        Ok(Self {
            sound_speed: material_value(params, "sound speed", "c", index)?,
            density: material_value(params, "density", "rho", index)?,
            alpha: material_value(params, "attenuation", "alpha", index)?,
            alpha_power: material_value(params, "attenuation power", "alpha_power", index)?,
        })
    }

    /// Attenuation corrected for the stokes exponent at `f0`.
    pub fn alpha_at(&self, f0: f64) -> f64 {
        alpha_corrected(self.alpha, self.alpha_power, f0)
    }
}

/// Medium handed to the engine.
///
/// Property vectors hold one value for a homogeneous medium, or one value
/// per grid point in solver order (first dimension fastest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medium {
    /// Sound speed.
    pub sound_speed: Vec<f64>,
    /// Density.
    pub density: Vec<f64>,
    /// Corrected attenuation coefficient.
    pub alpha_coeff: Vec<f64>,
    /// Always [`STOKES_ALPHA_POWER`].
    pub alpha_power: f64,
    /// Absorption model name.
    pub alpha_mode: String,
}

impl Medium {
    /// Uniform medium of one material.
    pub fn homogeneous(material: &MaterialProperties, f0: f64, alpha_mode: &str) -> Self {
        Self {
            sound_speed: vec![material.sound_speed],
            density: vec![material.density],
            alpha_coeff: vec![material.alpha_at(f0)],
            alpha_power: STOKES_ALPHA_POWER,
            alpha_mode: alpha_mode.to_string(),
        }
    }

    /// True when every property is a single value.
    pub fn is_homogeneous(&self) -> bool {
        self.sound_speed.len() == 1 && self.density.len() == 1 && self.alpha_coeff.len() == 1
    }
}

/// Per-point material indices over a grid, plus the properties they map to.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialGrid {
    /// Material index of each grid point, solver order.
    pub indices: Vec<usize>,
    /// Distinct materials present, sorted by index.
    pub materials: Vec<(usize, MaterialProperties)>,
}

impl MaterialGrid {
    /// Every point set to the background material 0.
    pub fn background(num_points: usize, params: &SimulationParameters) -> Result<Self> {
        Ok(Self {
            indices: vec![0; num_points],
            materials: vec![(0, MaterialProperties::lookup(params, 0)?)],
        })
    }

    /// Register material `index`, failing if it is not declared.
    pub fn ensure_material(&mut self, index: usize, params: &SimulationParameters) -> Result<()> {
        if self.materials.iter().all(|(i, _)| *i != index) {
            self.materials.push((index, MaterialProperties::lookup(params, index)?));
            self.materials.sort_by_key(|(i, _)| *i);
        }
        Ok(())
    }

    /// Number of points carrying `index`.
    pub fn count(&self, index: usize) -> usize {
        self.indices.iter().filter(|&&i| i == index).count()
    }

    /// Expand to a heterogeneous medium.
    pub fn to_medium(&self, f0: f64, alpha_mode: &str) -> Medium {
        let lookup = |index: usize| {
            self.materials
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, m)| *m)
        };
        let mut sound_speed = Vec::with_capacity(self.indices.len());
        let mut density = Vec::with_capacity(self.indices.len());
        let mut alpha_coeff = Vec::with_capacity(self.indices.len());
        for &index in &self.indices {
            // Indices are only ever written after ensure_material.
            if let Some(m) = lookup(index).or_else(|| lookup(0)) {
                sound_speed.push(m.sound_speed);
                density.push(m.density);
                alpha_coeff.push(m.alpha_at(f0));
            }
        }
        Medium {
            sound_speed,
            density,
            alpha_coeff,
            alpha_power: STOKES_ALPHA_POWER,
            alpha_mode: alpha_mode.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SolverKind;
    use approx::assert_relative_eq;

    #[test]
    fn test_alpha_correction() {
        // y = 2 leaves alpha unchanged; y = 1 at 2 MHz halves it.
        assert_relative_eq!(alpha_corrected(0.5, 2.0, 3e6), 0.5, max_relative = 1e-12);
        assert_relative_eq!(alpha_corrected(0.5, 1.0, 2e6), 0.25, max_relative = 1e-12);
    }

    #[test]
    fn test_material_lookup() {
        let p = SimulationParameters::defaults(SolverKind::Cartesian);
        let bone = MaterialProperties::lookup(&p, 1).unwrap();
        assert_eq!(bone.sound_speed, 2400.0);
        assert_eq!(bone.alpha_power, 1.18);
        let err = MaterialProperties::lookup(&p, 3).unwrap_err();
        assert!(err.to_string().contains("c_3"));
    }

    #[test]
    fn test_material_grid_to_medium() {
        let p = SimulationParameters::defaults(SolverKind::Cartesian);
        let mut grid = MaterialGrid::background(4, &p).unwrap();
        grid.ensure_material(1, &p).unwrap();
        grid.indices[2] = 1;
        let medium = grid.to_medium(1e6, "stokes");
        assert_eq!(medium.sound_speed, vec![1482.3, 1482.3, 2400.0, 1482.3]);
        assert_eq!(medium.density[2], 1850.0);
        assert!(!medium.is_homogeneous());
        assert_eq!(grid.count(1), 1);
        assert!(grid.ensure_material(7, &p).is_err());
    }
}
