//! Layered simulation parameters.
//!
//! A parameter set starts from the solver's default table, takes the values
//! configured on the chain, then the editable overrides. Its short content
//! hash names artifacts and keys every derived quantity.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sonoframe_ir::{ContentHash, ContentHasher, ParamValue, SolverConfig};
use tracing::debug;

use crate::error::{Result, SolverError};

/// Which solver a parameter set drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// 2D axisymmetric (z, r) solve.
    Axisymmetric,
    /// 3D Cartesian solve.
    Cartesian,
}

impl SolverKind {
    /// Prefix used in artifact file names.
    pub fn file_tag(self) -> &'static str {
        match self {
            SolverKind::Axisymmetric => "axisymmetric",
            SolverKind::Cartesian => "3d",
        }
    }

    /// Default parameter table.
    pub fn defaults(self) -> BTreeMap<String, ParamValue> {
        let table = match self {
            SolverKind::Axisymmetric => axisymmetric_defaults(),
            SolverKind::Cartesian => cartesian_defaults(),
        };
        table.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_tag())
    }
}

fn axisymmetric_defaults() -> Vec<(&'static str, ParamValue)> {
    vec![
        // water, material #0
        ("c_0", 1482.3.into()),
        ("rho_0", 994.04.into()),
        ("alpha_0", 0.0022.into()),
        ("alpha_power_0", 1.0.into()),
        ("alpha_mode", "stokes".into()),
        ("c_tx_coupling_medium", 1482.3.into()),
        ("rho_tx_coupling_medium", 994.04.into()),
        // bowl source
        ("source_f0", 1e6.into()),
        ("source_roc", 15e-3.into()),
        ("source_diameter", 15e-3.into()),
        ("source_ac_pwr", 0.0249.into()),
        ("source_phase", 0.0.into()),
        // domain
        ("AS_domain_z_size", 30e-3.into()),
        ("AS_domain_r_size", 10e-3.into()),
        // discretisation
        ("ppw", 5.0.into()),
        ("n_reflections", 2.0.into()),
        ("record_periods", 1.0.into()),
        ("cfl", 0.1.into()),
        ("source_z_offset", 20.0.into()),
        ("domain_z_extension", 20.0.into()),
        ("bli_tolerance", 0.01.into()),
        ("upsampling_rate", 10.0.into()),
        // execution
        ("cpp_engine", "OMP".into()),
        ("cpp_io_files_directory_path", ParamValue::Null),
        ("run_through_external_cpp_solvers", false.into()),
    ]
}

fn cartesian_defaults() -> Vec<(&'static str, ParamValue)> {
    vec![
        // water, material #0
        ("c_0", 1482.3.into()),
        ("rho_0", 994.04.into()),
        ("alpha_0", 0.0022.into()),
        ("alpha_power_0", 1.0.into()),
        // bone, material #1
        ("c_1", 2400.0.into()),
        ("rho_1", 1850.0.into()),
        ("alpha_1", 2.693.into()),
        ("alpha_power_1", 1.18.into()),
        ("alpha_mode", "stokes".into()),
        // bowl source
        ("source_f0", 1e6.into()),
        ("source_roc", 15e-3.into()),
        ("source_diameter", 8e-3.into()),
        ("source_amp", 1e6.into()),
        ("source_phase", 0.0.into()),
        // domain
        ("AS_domain_z_size", 0.0.into()),
        ("threeD_domain_x_size", 10e-3.into()),
        ("threeD_domain_y_size", 10e-3.into()),
        ("threeD_domain_z_size", 20e-3.into()),
        // discretisation
        ("ppw", 4.0.into()),
        ("t_end", 40e-6.into()),
        ("record_periods", 1.0.into()),
        ("cfl", 0.3.into()),
        ("source_z_offset", 10.0.into()),
        ("domain_z_extension", 0.0.into()),
        ("bli_tolerance", 0.01.into()),
        ("upsampling_rate", 10.0.into()),
        ("verbose_level", 1.0.into()),
        // execution
        ("cpp_engine", "OMP".into()),
        ("cpp_io_files_directory_path", ParamValue::Null),
        ("run_through_external_cpp_solvers", false.into()),
        ("use_gpu", false.into()),
    ]
}

/// A flat, hashed parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParameters {
    kind: SolverKind,
    values: BTreeMap<String, ParamValue>,
    hash: ContentHash,
}

fn hash_of(values: &BTreeMap<String, ParamValue>) -> ContentHash {
    match ContentHash::of_json(values) {
        Ok(hash) => hash,
        // Scalar maps always serialize; hash the debug form rather than panic.
        Err(_) => {
            let mut hasher = ContentHasher::new();
            hasher.update_str(&format!("{:?}", values));
            hasher.finish()
        }
    }
}

impl SimulationParameters {
    /// The default table of `kind`.
    pub fn defaults(kind: SolverKind) -> Self {
        Self::from_values(kind, kind.defaults())
    }

    /// An explicit table, without defaults.
    pub fn from_values(kind: SolverKind, values: BTreeMap<String, ParamValue>) -> Self {
        let hash = hash_of(&values);
        Self { kind, values, hash }
    }

    /// Defaults, then the configured parameters, then editable overrides.
    ///
    /// Editable values only override keys the set already has, so editable
    /// geometry that is not a solver input stays out of the hash.
    pub fn layered(kind: SolverKind, config: &SolverConfig) -> Self {
        let mut params = Self::defaults(kind);
        for (key, value) in &config.parameters {
            params.set_parameter(key, value.clone());
        }
        for (key, editable) in &config.editable {
            if params.values.contains_key(key) {
                params.set_parameter(key, ParamValue::Number(editable.value));
            }
        }
        params
    }

    /// Solver kind.
    pub fn kind(&self) -> SolverKind {
        self.kind
    }

    /// Every parameter, sorted by name.
    pub fn values(&self) -> &BTreeMap<String, ParamValue> {
        &self.values
    }

    /// Full content hash.
    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    /// Eight-hex-character hash used in artifact names.
    pub fn short_hash(&self) -> String {
        self.hash.short()
    }

    /// Set one parameter. Returns true when the hash changed.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<ParamValue>) -> bool {
        let mut next = self.values.clone();
        next.insert(name.to_string(), value.into());
        let hash = hash_of(&next);
        if hash == self.hash {
            return false;
        }
        debug!(param = name, from = %self.hash.short(), to = %hash.short(), "parameter set rehashed");
        self.values = next;
        self.hash = hash;
        true
    }

    /// Remove a parameter. Returns true when it was present.
    pub fn remove_parameter(&mut self, name: &str) -> bool {
        if self.values.remove(name).is_some() {
            self.hash = hash_of(&self.values);
            true
        } else {
            false
        }
    }

    /// Raw value, `None` when absent or null.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    /// True when the parameter is present and not null.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Numeric parameter.
    pub fn number(&self, name: &str) -> Result<f64> {
        match self.get(name) {
            None => Err(SolverError::MissingParameter(name.to_string())),
            Some(v) => v
                .as_f64()
                .filter(|x| x.is_finite())
                .ok_or_else(|| SolverError::invalid(name, format!("expected a finite number, found {}", v))),
        }
    }

    /// Numeric parameter, `None` when absent.
    pub fn optional_number(&self, name: &str) -> Result<Option<f64>> {
        if self.contains(name) {
            self.number(name).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Strictly positive numeric parameter.
    pub fn positive(&self, name: &str) -> Result<f64> {
        let v = self.number(name)?;
        if v > 0.0 {
            Ok(v)
        } else {
            Err(SolverError::invalid(name, format!("must be positive, found {}", v)))
        }
    }

    /// Non-negative integer parameter (grid-point counts, periods).
    pub fn count(&self, name: &str) -> Result<usize> {
        let v = self.number(name)?;
        if v < 0.0 || v.fract() != 0.0 {
            return Err(SolverError::invalid(name, format!("must be a non-negative integer, found {}", v)));
        }
        Ok(v as usize)
    }

    /// Flag, false when absent.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(ParamValue::as_bool).unwrap_or(false)
    }

    /// Text parameter, `None` when absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }
}
