use serde::{Deserialize, Serialize};

use crate::common::error::ModelError;

/// Per-session tunables of the model core, usually read from the `[model]`
/// table of the application settings file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Number of committed transactions kept for undo
    pub undo_depth: usize,
    /// Initial auto-dependency-type mode of new dependency lines
    pub auto_dependency: bool,
    /// Connect adapters may pick up an existing relationship between the same
    /// two elements when it is not shown on the same diagram yet
    pub reuse_relationships: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            undo_depth: 20,
            auto_dependency: true,
            reuse_relationships: true,
        }
    }
}

impl ModelSettings {
    pub fn from_toml(input: &str) -> Result<Self, ModelError> {
        Ok(toml::from_str(input)?)
    }

    pub fn to_toml(&self) -> Result<String, ModelError> {
        Ok(toml::to_string(self)?)
    }
}
