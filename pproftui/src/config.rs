//! `pproftui.toml` config loading.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::Result;

pub const DEFAULT_CONFIG_FILE: &str = "pproftui.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Module path identifying project code, e.g. `github.com/acme/app`.
    #[serde(default)]
    pub module_path: String,

    /// Seconds between live polls.
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,

    /// Timeout for one live fetch.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Columns used by the flame graph.
    #[serde(default = "default_flame_width")]
    pub flame_width: usize,

    #[serde(default)]
    pub no_color: bool,

    /// Rows shown by `top` and `diff`.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_refresh_secs() -> u64 {
    5
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_flame_width() -> usize {
    120
}

fn default_limit() -> usize {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            module_path: String::new(),
            refresh_secs: default_refresh_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            flame_width: default_flame_width(),
            no_color: false,
            limit: default_limit(),
        }
    }
}

impl Config {
    /// Parse a config document.
    pub fn from_toml(source: &str) -> Result<Self> {
        Ok(toml::from_str::<Config>(source)?)
    }

    /// Load a config file, falling back to defaults when it is missing or
    /// cannot be used.
    pub fn load_optional(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => match Self::from_toml(&s) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!("failed to parse config {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!("failed to read config {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}
