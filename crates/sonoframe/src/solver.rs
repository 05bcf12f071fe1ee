//! Solver attachments.
//!
//! Each wraps one acoustic solver together with its configuration, so
//! editable overrides and configured parameters stay layered the same way
//! they were loaded.

use std::path::Path;

use sonoframe_acoustic::{AxisymmetricSolver, CartesianSolver, SimulationParameters, SolverKind};
use sonoframe_ir::{EditableParam, ParamValue, SolverConfig};
use tracing::debug;

use crate::attachment::{AttachContext, Attachment};
use crate::error::{FrameError, Result};
use crate::render::{DrawSet, Drawable, Renderer};

const DOMAIN_COLOR: [f64; 4] = [0.945, 0.768, 0.059, 1.0];

/// Preview colour for voxels of a material.
fn material_color(index: usize) -> [f64; 4] {
    match index {
        0 => [0.5, 0.5, 0.5, 0.5],
        1 => [0.83, 0.33, 0.0, 0.8],
        2 => [0.95, 0.95, 0.85, 0.8],
        _ => [0.2, 0.6, 0.9, 0.8],
    }
}

fn editable_entries(config: &SolverConfig) -> Vec<(&str, &EditableParam)> {
    config
        .editable
        .iter()
        .filter(|(_, p)| p.meta.editable)
        .map(|(k, p)| (k.as_str(), p))
        .collect()
}

fn edit(config: &mut SolverConfig, name: &str, value: f64) -> Result<()> {
    let param = config
        .editable
        .get_mut(name)
        .ok_or_else(|| FrameError::UnknownParameter(name.to_string()))?;
    param.value = value;
    Ok(())
}

fn nudged(config: &SolverConfig, name: &str, steps: f64) -> Result<f64> {
    let param = config
        .editable
        .get(name)
        .filter(|p| p.meta.editable)
        .ok_or_else(|| FrameError::UnknownParameter(name.to_string()))?;
    Ok(param.value + steps * param.meta.increment)
}

// =============================================================================
// Axisymmetric
// =============================================================================

/// Axisymmetric solver mounted on a chain.
///
/// Draws the domain cylinder at the end effector and, once solved, the
/// revolved amplitude field.
#[derive(Debug, Clone)]
pub struct AxisymmetricAttachment {
    config: SolverConfig,
    solver: AxisymmetricSolver,
    draw: DrawSet,
}

impl AxisymmetricAttachment {
    /// Attachment for `config`.
    pub fn new(config: SolverConfig) -> Self {
        Self {
            solver: AxisymmetricSolver::from_config(&config),
            config,
            draw: DrawSet::new(),
        }
    }

    /// Configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// The solver.
    pub fn solver(&self) -> &AxisymmetricSolver {
        &self.solver
    }

    /// Mutable solver.
    pub fn solver_mut(&mut self) -> &mut AxisymmetricSolver {
        &mut self.solver
    }

    /// Configured artifact directory.
    pub fn cache_dir(&self) -> Option<&Path> {
        self.config.cache_dir.as_deref()
    }

    /// Parameters offered for editing.
    pub fn editable_parameters(&self) -> Vec<(&str, &EditableParam)> {
        editable_entries(&self.config)
    }

    /// Set a configured parameter. Returns true when the solver's hash changed.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<ParamValue>) -> bool {
        self.config.parameters.insert(name.to_string(), value.into());
        self.relayer()
    }

    /// Set an editable parameter. Returns true when the solver's hash changed.
    pub fn set_editable(&mut self, name: &str, value: f64) -> Result<bool> {
        edit(&mut self.config, name, value)?;
        Ok(self.relayer())
    }

    /// Add `steps × increment` to an editable parameter.
    pub fn nudge_editable(&mut self, name: &str, steps: f64) -> Result<f64> {
        let next = nudged(&self.config, name, steps)?;
        self.set_editable(name, next)?;
        Ok(next)
    }

    fn relayer(&mut self) -> bool {
        self.solver
            .set_params(SimulationParameters::layered(SolverKind::Axisymmetric, &self.config))
    }
}

impl Attachment for AxisymmetricAttachment {
    fn kind(&self) -> &'static str {
        "axisymmetric_solver"
    }

    fn add(&mut self, ctx: &AttachContext<'_>, renderer: &mut dyn Renderer) -> Result<()> {
        let domain = self.solver.domain_mesh()?;
        self.draw.show(
            renderer,
            ctx.drawable("as_domain"),
            Drawable::Mesh {
                mesh: domain,
                transform: ctx.end.clone(),
                color: DOMAIN_COLOR,
            },
        );
        let field = ctx.drawable("as_field");
        if self.solver.is_solved() {
            let volume = self.solver.render_volume(&self.config.render, ctx.end)?;
            debug!(chain = ctx.chain, dims = ?volume.dims, "axisymmetric field drawn");
            self.draw.show(renderer, field, Drawable::Volume(volume));
        } else {
            self.draw.hide(renderer, &field);
        }
        Ok(())
    }

    fn remove(&mut self, renderer: &mut dyn Renderer) {
        self.draw.clear(renderer);
    }
}

// =============================================================================
// Cartesian
// =============================================================================

/// 3D Cartesian solver mounted on a chain.
///
/// Draws the solved amplitude and the voxel centres of each painted material.
#[derive(Debug, Clone)]
pub struct CartesianAttachment {
    config: SolverConfig,
    solver: CartesianSolver,
    draw: DrawSet,
}

impl CartesianAttachment {
    /// Attachment for `config`.
    pub fn new(config: SolverConfig) -> Self {
        Self {
            solver: CartesianSolver::from_config(&config),
            config,
            draw: DrawSet::new(),
        }
    }

    /// Configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// The solver.
    pub fn solver(&self) -> &CartesianSolver {
        &self.solver
    }

    /// Mutable solver.
    pub fn solver_mut(&mut self) -> &mut CartesianSolver {
        &mut self.solver
    }

    /// Configured artifact directory.
    pub fn cache_dir(&self) -> Option<&Path> {
        self.config.cache_dir.as_deref()
    }

    /// Parameters offered for editing.
    pub fn editable_parameters(&self) -> Vec<(&str, &EditableParam)> {
        editable_entries(&self.config)
    }

    /// Set a configured parameter. Returns true when the solver's hash changed.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<ParamValue>) -> bool {
        self.config.parameters.insert(name.to_string(), value.into());
        self.relayer()
    }

    /// Set an editable parameter. Returns true when the solver's hash changed.
    pub fn set_editable(&mut self, name: &str, value: f64) -> Result<bool> {
        edit(&mut self.config, name, value)?;
        Ok(self.relayer())
    }

    /// Add `steps × increment` to an editable parameter.
    pub fn nudge_editable(&mut self, name: &str, steps: f64) -> Result<f64> {
        let next = nudged(&self.config, name, steps)?;
        self.set_editable(name, next)?;
        Ok(next)
    }

    fn relayer(&mut self) -> bool {
        self.solver
            .set_params(SimulationParameters::layered(SolverKind::Cartesian, &self.config))
    }
}

impl Attachment for CartesianAttachment {
    fn kind(&self) -> &'static str {
        "cartesian_solver"
    }

    fn add(&mut self, ctx: &AttachContext<'_>, renderer: &mut dyn Renderer) -> Result<()> {
        let field = ctx.drawable("field");
        if self.solver.is_solved() {
            let volume = self.solver.render_volume(&self.config.render, ctx.end)?;
            self.draw.show(renderer, field, Drawable::Volume(volume));
        } else {
            self.draw.hide(renderer, &field);
        }

        let prefix = ctx.drawable("voxels/");
        let mut shown = Vec::new();
        for (&material, centers) in self.solver.voxel_centers() {
            let name = format!("{}{}", prefix, material);
            let points = centers.iter().map(|c| ctx.end.apply_point(c)).collect();
            self.draw.show(
                renderer,
                name.clone(),
                Drawable::Points {
                    points,
                    color: material_color(material),
                    size: 2.0,
                },
            );
            shown.push(name);
        }
        let stale: Vec<String> = self
            .draw
            .names()
            .filter(|n| n.starts_with(&prefix) && !shown.iter().any(|s| s == n))
            .map(str::to_string)
            .collect();
        for name in stale {
            self.draw.hide(renderer, &name);
        }
        Ok(())
    }

    fn remove(&mut self, renderer: &mut dyn Renderer) {
        self.draw.clear(renderer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::MeshLibrary;
    use crate::render::RecordingRenderer;
    use sonoframe_ir::{Constants, EditableMeta};
    use sonoframe_math::Transform;

    fn config_with_f0() -> SolverConfig {
        let mut config = SolverConfig::default();
        config.editable.insert(
            "source_f0".into(),
            EditableParam {
                value: 1e6,
                meta: EditableMeta::new(5e5, "Source f0").with_unit("Hz"),
            },
        );
        config
    }

    #[test]
    fn test_editable_override_rehashes() {
        let mut att = AxisymmetricAttachment::new(config_with_f0());
        let before = att.solver().params().short_hash();
        assert_eq!(att.editable_parameters().len(), 1);
        assert_eq!(att.nudge_editable("source_f0", 2.0).unwrap(), 2e6);
        assert_eq!(att.solver().params().number("source_f0").unwrap(), 2e6);
        assert_ne!(att.solver().params().short_hash(), before);
        // Same value again: nothing to invalidate.
        assert!(!att.set_editable("source_f0", 2e6).unwrap());
        assert!(matches!(
            att.set_editable("ppw", 3.0),
            Err(FrameError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_unsolved_draws_domain_only() {
        let mut att = AxisymmetricAttachment::new(SolverConfig::default());
        let end = Transform::identity();
        let csts = Constants::new();
        let lib = MeshLibrary::new();
        let ctx = AttachContext {
            chain: "AS",
            end: &end,
            calibration: None,
            constants: &csts,
            library: &lib,
            has_processed: false,
        };
        let mut r = RecordingRenderer::new();
        att.add(&ctx, &mut r).unwrap();
        assert_eq!(r.names(), vec!["AS/as_domain"]);
        att.remove(&mut r);
        assert!(r.is_empty());

        let mut cart = CartesianAttachment::new(SolverConfig::default());
        cart.add(&ctx, &mut r).unwrap();
        assert!(r.is_empty());
        assert!(cart.set_parameter("ppw", 6.0));
        assert_eq!(cart.solver().params().number("ppw").unwrap(), 6.0);
    }
}
