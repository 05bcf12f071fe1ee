//! Saving and restoring frame state through a [`SettingsStore`].
//!
//! Each chain lives under `armature.<clean name>`; the parenting tree under
//! `stereotaxic_frame.hierarchy`.

use serde_json::{json, Value};
use sonoframe_ir::{clean_name, flatten_hierarchy, settings_path, Constants, HierarchyNode, JointConfig, SettingsStore};
use tracing::{debug, warn};

use crate::error::Result;
use crate::frame::Frame;

const CHAIN_ROOT: &str = "armature";
const HIERARCHY_KEY: &str = "stereotaxic_frame.hierarchy";

fn key(chain: &str, field: &str) -> String {
    settings_path(&[CHAIN_ROOT, &clean_name(chain), field])
}

impl Frame {
    /// Write every chain's editable state and the hierarchy to `store`.
    pub fn save_settings(&self, store: &mut dyn SettingsStore) -> Result<()> {
        for name in self.chain_names() {
            let Some(chain) = self.chain(&name) else {
                continue;
            };
            let config = chain.config();
            store.set_value(&key(&name, "visible"), json!(config.visible));
            store.set_value(&key(&name, "highlighted"), json!(config.highlighted));
            store.set_value(&key(&name, "rgba_color"), json!(config.color));
            store.set_value(&key(&name, "glline_width"), json!(config.line_width));
            store.set_value(
                &key(&name, "armature_config_csts"),
                serde_json::to_value(&config.constants).map_err(sonoframe_ir::IrError::from)?,
            );
            store.set_value(
                &key(&name, "joints"),
                serde_json::to_value(&config.joints).map_err(sonoframe_ir::IrError::from)?,
            );
        }
        let hierarchy = serde_json::to_value(self.document().hierarchy).map_err(sonoframe_ir::IrError::from)?;
        store.set_value(HIERARCHY_KEY, hierarchy);
        debug!(chains = self.chains().len(), "frame settings saved");
        Ok(())
    }

    /// Apply whatever `store` holds for chains that exist. Returns the number of values applied.
    ///
    /// Entries that do not parse are logged and skipped; the rest still apply.
    pub fn restore_settings(&mut self, store: &dyn SettingsStore) -> usize {
        let mut applied = 0;
        for name in self.chain_names() {
            let Ok(chain) = self.chain_mut(&name) else {
                continue;
            };
            let mut touched = false;
            let config = chain.config_mut();

            if let Some(v) = store.get_value(&key(&name, "visible")) {
                match v.as_bool() {
                    Some(b) => {
                        config.visible = b;
                        touched = true;
                    }
                    None => warn!(chain = %name, value = %v, "ignoring stored visibility"),
                }
            }
            if let Some(v) = store.get_value(&key(&name, "highlighted")) {
                match v.as_bool() {
                    Some(b) => {
                        config.highlighted = b;
                        touched = true;
                    }
                    None => warn!(chain = %name, value = %v, "ignoring stored highlight"),
                }
            }
            if let Some(v) = store.get_value(&key(&name, "rgba_color")) {
                match serde_json::from_value::<[f64; 4]>(v) {
                    Ok(c) => {
                        config.color = c;
                        touched = true;
                    }
                    Err(e) => warn!(chain = %name, error = %e, "ignoring stored colour"),
                }
            }
            if let Some(v) = store.get_value(&key(&name, "glline_width")) {
                match v.as_f64() {
                    Some(w) => {
                        config.line_width = w;
                        touched = true;
                    }
                    None => warn!(chain = %name, value = %v, "ignoring stored line width"),
                }
            }
            if let Some(v) = store.get_value(&key(&name, "armature_config_csts")) {
                match serde_json::from_value::<Constants>(v) {
                    Ok(csts) => {
                        config.constants = csts;
                        touched = true;
                    }
                    Err(e) => warn!(chain = %name, error = %e, "ignoring stored constants"),
                }
            }
            if let Some(v) = store.get_value(&key(&name, "joints")) {
                match serde_json::from_value::<Vec<JointConfig>>(v) {
                    Ok(joints) => {
                        config.joints = joints;
                        touched = true;
                    }
                    Err(e) => warn!(chain = %name, error = %e, "ignoring stored joints"),
                }
            }
            if touched {
                chain.invalidate_render();
                applied += 1;
            }
        }
        applied + self.restore_hierarchy(store)
    }

    fn restore_hierarchy(&mut self, store: &dyn SettingsStore) -> usize {
        let Some(v) = store.get_value(HIERARCHY_KEY) else {
            return 0;
        };
        let nodes: Vec<HierarchyNode> = match serde_json::from_value(v) {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(error = %e, "ignoring stored hierarchy");
                return 0;
            }
        };
        let mut applied = 0;
        for entry in flatten_hierarchy(&nodes) {
            if self.chain(&entry.name).is_none() {
                debug!(chain = %entry.name, "stored hierarchy names a missing chain");
                continue;
            }
            match self.set_parent(&entry.name, entry.parent.as_deref()) {
                Ok(()) => applied += 1,
                Err(e) => warn!(chain = %entry.name, error = %e, "stored parent not applied"),
            }
        }
        usize::from(applied > 0)
    }
}

/// Stored value of one chain field, for display.
pub fn stored_chain_value(store: &dyn SettingsStore, chain: &str, field: &str) -> Option<Value> {
    store.get_value(&key(chain, field))
}
