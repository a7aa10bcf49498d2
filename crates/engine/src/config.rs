//! Engine configuration.
//!
//! Settings are read from a YAML (or JSON) file and then overlaid with
//! environment variables. Every field has a default, so a missing file is not
//! an error. The file is located through `LISTER_CONFIG_PATH`, falling back to
//! `<config dir>/lister/config.yaml` (`~/.config/lister/config.yaml` on most
//! platforms).

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use lister_util::expand_tilde;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "LISTER_CONFIG_PATH";
/// Environment variable overriding the search debounce window in milliseconds.
pub const DEBOUNCE_ENV: &str = "LISTER_DEBOUNCE_MS";
/// Environment variable overriding the API base URL.
pub const API_BASE_ENV: &str = lister_api::API_BASE_ENV;

pub const CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListerConfig {
    /// Quiet period after the last keystroke before a search fetch fires.
    pub debounce_ms: u64,
    /// Rows inspected when inferring an option value key.
    pub inference_sample_size: usize,
    /// Key used when inference finds no convincing identity column.
    pub fallback_value_key: String,
    /// Whether identical requests share cached responses.
    pub cache_enabled: bool,
    /// Request parameter carrying search text when a definition names none.
    pub search_param: String,
    /// Request parameter carrying the targeted column when a definition names none.
    pub search_target_param: String,
    pub base_url: Option<String>,
    /// Definitions file loaded by the CLI when `--definitions` is not given.
    pub definitions_path: Option<PathBuf>,
}

impl Default for ListerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 250,
            inference_sample_size: 10,
            fallback_value_key: "id".to_string(),
            cache_enabled: true,
            search_param: "search".to_string(),
            search_target_param: "searchField".to_string(),
            base_url: None,
            definitions_path: None,
        }
    }
}

impl ListerConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Load configuration from the default location plus environment overrides.
    pub fn load() -> Result<Self> {
        let path = default_config_path();
        let mut config = if path.as_ref().is_some_and(|path| path.exists()) {
            let path = path.unwrap_or_default();
            Self::load_from_path(&path)?
        } else {
            debug!("no configuration file found; using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a configuration file. YAML is accepted, and so is JSON.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Overlay `LISTER_DEBOUNCE_MS` and `LISTER_API_BASE` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = env::var(DEBOUNCE_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(debounce_ms) => self.debounce_ms = debounce_ms,
                Err(error) => warn!(value = %raw, error = %error, "ignoring invalid {}", DEBOUNCE_ENV),
            }
        }
        if let Ok(base_url) = env::var(API_BASE_ENV)
            && !base_url.trim().is_empty()
        {
            self.base_url = Some(base_url.trim().to_string());
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(expand_tilde(trimmed));
        }
    }
    config_dir().map(|dir| dir.join("lister").join(CONFIG_FILE_NAME))
}
