//! Command configuration.
//!
//! Read from a TOML file (`partwise.toml` by default):
//!
//! ```toml
//! [upload]
//! part_size = 8388608
//! max_in_flight = 1
//! digest = "sha1-base64"
//! single_request_limit = 20971520
//!
//! [store]
//! root = "partwise-store"
//! max_file_size = 53687091200
//! ```

use std::path::Path;

use partwise_upload::{LocalStoreConfig, UploadOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upload: UploadOptions,

    #[serde(default)]
    pub store: LocalStoreConfig,
}

impl Config {
    /// Loads `path`, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}
