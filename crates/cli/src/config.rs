use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use rerouter_core::config::BridgeConfig;

/// CLI configuration loaded from TOML file.
///
/// Every field is optional; unset fields fall back to the environment
/// (`BRIDGE_ENDPOINT`, `BRIDGE_TIMEOUT_MS`) and then to built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Bridge endpoint of the background process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Reply timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Where to connect and how long to wait, after all overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub endpoint: String,
    pub timeout: Duration,
}

impl CliConfig {
    /// Return the default config directory path: ~/.config/rerouter/
    pub fn default_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("rerouter");
        Ok(config_dir)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }

    /// Load config from the given path, or the default path.
    /// A missing file yields the default config.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if !config_path.exists() {
            debug!(?config_path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        debug!(?config_path, "Loading config");
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read config: {}", config_path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config: {}", config_path.display()))
    }

    /// Priority: CLI flag > config file > environment/defaults.
    pub fn resolve(
        &self,
        env: &BridgeConfig,
        endpoint_override: Option<&str>,
        timeout_override: Option<u64>,
    ) -> Resolved {
        let endpoint = endpoint_override
            .map(str::to_string)
            .or_else(|| self.endpoint.clone())
            .unwrap_or_else(|| env.endpoint.clone());
        let timeout_ms = timeout_override.or(self.timeout_ms).unwrap_or(env.timeout_ms);
        Resolved {
            endpoint,
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}
