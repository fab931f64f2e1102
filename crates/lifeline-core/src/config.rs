//! Configuration management.
//!
//! Settings come from an optional JSON file (explicit path, or
//! `~/.config/lifeline/config.json` when present) and are then overridden by
//! environment variables:
//!
//! - `MONGODB_URI`: store URL
//! - `DEMO_MODE=true`: bypass the store entirely
//! - `NEXT_PUBLIC_DEMO_MODE=true`: bypass outbound HTTP entirely
//! - `NEXT_PUBLIC_API_BASE_URL` (or the older `NEXT_PUBLIC_API_URL`): API host
//! - `LIFELINE_REQUEST_TIMEOUT_MS`, `LIFELINE_RETRIES`, `LIFELINE_CACHE_TTL_MS`

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::connection::ConnectionSettings;

/// Application name used for the config directory
const APP_NAME: &str = "lifeline";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_STORE_URL: &str = "mongodb://localhost:27017/admin_auth";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_url: String,
    /// Skip the store; every read serves fallback data.
    pub demo_mode: bool,
    /// Skip outbound HTTP; every fetch returns a synthetic success.
    pub client_demo_mode: bool,
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub retries: u32,
    pub cache_ttl_ms: u64,
    pub max_connect_attempts: u32,
    pub connect_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
    pub close_timeout_ms: u64,
    pub sweep_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: DEFAULT_STORE_URL.to_string(),
            demo_mode: false,
            client_demo_mode: false,
            api_base_url: String::new(),
            request_timeout_ms: 10_000,
            retries: 2,
            cache_ttl_ms: 300_000,
            max_connect_attempts: 3,
            connect_timeout_ms: 5_000,
            reconnect_delay_ms: 5_000,
            close_timeout_ms: 5_000,
            sweep_interval_ms: 5 * 60 * 1000,
        }
    }
}

impl Config {
    /// Load from `explicit_path` (must exist) or the default location (if it
    /// exists), then apply environment overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Self::config_path()?;
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("MONGODB_URI").filter(|v| !v.trim().is_empty()) {
            self.store_url = url;
        }
        if let Some(flag) = var("DEMO_MODE") {
            self.demo_mode = flag == "true";
        }
        if let Some(flag) = var("NEXT_PUBLIC_DEMO_MODE") {
            self.client_demo_mode = flag == "true";
        }
        if let Some(base) = var("NEXT_PUBLIC_API_BASE_URL").or_else(|| var("NEXT_PUBLIC_API_URL")) {
            self.api_base_url = base;
        }
        parse_into(&var, "LIFELINE_REQUEST_TIMEOUT_MS", &mut self.request_timeout_ms);
        parse_into(&var, "LIFELINE_RETRIES", &mut self.retries);
        parse_into(&var, "LIFELINE_CACHE_TTL_MS", &mut self.cache_ttl_ms);
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            max_attempts: self.max_connect_attempts,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            close_timeout: Duration::from_millis(self.close_timeout_ms),
            ..ConnectionSettings::default()
        }
    }
}

fn parse_into<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut T,
) {
    if let Some(raw) = var(name) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => warn!(var = name, value = %raw, "Ignoring unparseable environment override"),
        }
    }
}
