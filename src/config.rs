use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, TrackingError};

pub const DEFAULT_RUNTIME_URL: &str = "http://localhost:3000/tracking.js";
pub const DEFAULT_RUNTIME_GLOBAL: &str = "tracking";
pub const DEFAULT_TRACKING_DIR: &str = ".tracking";

/// Options accepted by the transform, in the camelCase shape bundler plugin
/// configs use. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackingOptions {
    /// Write `<trackingDir>/<file>-tracking.json` and the summary.
    pub emit_manifests: bool,
    pub tracking_dir: PathBuf,
    /// Source of the side-effect import that loads the tracking runtime.
    pub runtime_url: String,
    /// Property of `window` the runtime installs itself under.
    pub runtime_global: String,
    /// Also write the rewritten source to `<trackingDir>/transformed/`.
    pub output_transformed_files: bool,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            emit_manifests: true,
            tracking_dir: PathBuf::from(DEFAULT_TRACKING_DIR),
            runtime_url: DEFAULT_RUNTIME_URL.to_string(),
            runtime_global: DEFAULT_RUNTIME_GLOBAL.to_string(),
            output_transformed_files: false,
        }
    }
}

impl TrackingOptions {
    /// Parse a plugin config string. An empty string yields the defaults.
    pub fn from_json(config: &str) -> Result<Self> {
        if config.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(config)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| TrackingError::io(path, e))?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&raw).map_err(|e| TrackingError::json(path, e))
    }
}
