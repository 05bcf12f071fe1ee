//! Persistent key-value settings.
//!
//! Keys are `.`-joined paths (`armature.Mainframe.visible`); values are JSON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{IrError, Result};

/// Join path segments with `.`.
pub fn settings_path(segments: &[&str]) -> String {
    segments.join(".")
}

/// Strip everything but ASCII letters and digits, so a display name can be a path segment.
pub fn clean_name(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// A settings backend.
pub trait SettingsStore {
    /// Stored value at `path`.
    fn get_value(&self, path: &str) -> Option<Value>;

    /// Store `value` at `path`.
    fn set_value(&mut self, path: &str, value: Value);

    /// Delete the value at `path`.
    fn remove(&mut self, path: &str);

    /// Every stored path, sorted.
    fn keys(&self) -> Vec<String>;

    /// Stored value at `path`, writing `default` first when absent.
    fn get(&mut self, path: &str, default: Value) -> Value {
        match self.get_value(path) {
            Some(v) => v,
            None => {
                self.set_value(path, default.clone());
                default
            }
        }
    }

    /// Unique next segments of every key under `prefix` (all first segments when empty).
    fn children(&self, prefix: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for key in self.keys() {
            let rest = if prefix.is_empty() {
                Some(key.as_str())
            } else {
                key.strip_prefix(prefix).and_then(|r| r.strip_prefix('.'))
            };
            if let Some(segment) = rest.and_then(|r| r.split('.').next()) {
                if !segment.is_empty() && !out.iter().any(|s| s == segment) {
                    out.push(segment.to_string());
                }
            }
        }
        out.sort();
        out
    }
}

/// Settings kept in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: BTreeMap<String, Value>,
}

impl MemorySettings {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get_value(&self, path: &str) -> Option<Value> {
        self.values.get(path).cloned()
    }

    fn set_value(&mut self, path: &str, value: Value) {
        self.values.insert(path.to_string(), value);
    }

    fn remove(&mut self, path: &str) {
        self.values.remove(path);
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// Settings persisted as one flat JSON object.
///
/// Writes stay in memory until [`JsonFileSettings::save`].
#[derive(Debug, Clone)]
pub struct JsonFileSettings {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl JsonFileSettings {
    /// Open `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|e| IrError::io(&path, e))?;
            match serde_json::from_str::<Value>(&text)? {
                Value::Object(map) => map.into_iter().collect(),
                _ => return Err(IrError::InvalidSettings(path)),
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = values.len(), "opened settings");
        Ok(Self { path, values })
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write every value back to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| IrError::io(parent, e))?;
        }
        let text = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, text).map_err(|e| IrError::io(&self.path, e))
    }
}

impl SettingsStore for JsonFileSettings {
    fn get_value(&self, path: &str) -> Option<Value> {
        self.values.get(path).cloned()
    }

    fn set_value(&mut self, path: &str, value: Value) {
        self.values.insert(path.to_string(), value);
    }

    fn remove(&mut self, path: &str) {
        self.values.remove(path);
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}
