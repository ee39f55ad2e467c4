//! Config model and persistence helpers.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Top-level configuration stored in `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend API endpoint and credentials.
    pub backend: BackendCfg,
    /// Local persistence locations.
    pub storage: StorageCfg,
    /// Autosave debounce tuning.
    pub autosave: AutosaveCfg,
}

/// Backend API related settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendCfg {
    /// Base URL of the backend REST API.
    pub base_url: String,
    /// Bearer token presented on every call.
    pub api_token: String,
}

/// Where local state lives on this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageCfg {
    /// File holding the draft store.
    pub drafts_path: String,
}

/// Autosave behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveCfg {
    /// Quiescence window before an autosave fires, in milliseconds.
    pub debounce_ms: u64,
}

impl Config {
    /// Load from disk or create defaults when missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let s = fs::read_to_string(path)?;
            Ok(toml::from_str(&s)?)
        } else {
            let cfg = Self::default();
            cfg.save(path)?;
            Ok(cfg)
        }
    }

    /// Persist the config as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let s = toml::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendCfg {
                base_url: "".into(),
                api_token: "".into(),
            },
            storage: StorageCfg {
                drafts_path: "drafts.json".into(),
            },
            autosave: AutosaveCfg { debounce_ms: 800 },
        }
    }
}
