//! Server configuration
//!
//! Loaded from an optional JSON file (`FERRUMKV_CONFIG`), then overridden by
//! `FERRUMKV_*` environment variables.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::Path;

/// Environment variable naming the JSON configuration file
pub const CONFIG_PATH_VAR: &str = "FERRUMKV_CONFIG";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interface the RESP listener binds to
    pub host: String,

    /// RESP listener port
    pub port: u16,

    /// Number of selectable databases
    pub databases: usize,

    /// Password accepted by AUTH. Not enforced on other commands.
    pub requirepass: Option<String>,

    /// Period of the expired-key sweep
    pub sweep_interval_ms: u64,

    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 6379,
            databases: 16,
            requirepass: None,
            sweep_interval_ms: 100,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load the configuration from the file named by `FERRUMKV_CONFIG` (if any)
    /// and the process environment
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Config::default(),
        };
        config.apply_vars(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse a JSON configuration file; missing fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `FERRUMKV_*` overrides read through `var`
    fn apply_vars<F>(&mut self, var: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("FERRUMKV_HOST") {
            self.host = host;
        }
        if let Some(port) = var("FERRUMKV_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("FERRUMKV_PORT: invalid port '{}'", port))?;
        }
        if let Some(databases) = var("FERRUMKV_DATABASES") {
            self.databases = databases
                .parse()
                .with_context(|| format!("FERRUMKV_DATABASES: invalid count '{}'", databases))?;
        }
        if let Some(password) = var("FERRUMKV_REQUIREPASS") {
            self.requirepass = Some(password).filter(|p| !p.is_empty());
        }
        if let Some(interval) = var("FERRUMKV_SWEEP_INTERVAL_MS") {
            self.sweep_interval_ms = interval
                .parse()
                .with_context(|| format!("FERRUMKV_SWEEP_INTERVAL_MS: invalid value '{}'", interval))?;
        }
        if let Some(level) = var("FERRUMKV_LOG_LEVEL") {
            self.log_level = level;
        }
        self.validate()
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.databases == 0 {
            bail!("databases must be at least 1");
        }
        if self.sweep_interval_ms == 0 {
            bail!("sweep_interval_ms must be at least 1");
        }
        Ok(())
    }

    /// host:port the RESP listener binds to
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.addr(), "127.0.0.1:6379");
        assert_eq!(config.databases, 16);
        assert!(config.requirepass.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let env = vars(&[
            ("FERRUMKV_PORT", "7000"),
            ("FERRUMKV_DATABASES", "4"),
            ("FERRUMKV_REQUIREPASS", "secret"),
        ]);
        let mut config = Config::default();
        config.apply_vars(|name| env.get(name).cloned()).unwrap();

        assert_eq!(config.port, 7000);
        assert_eq!(config.databases, 4);
        assert_eq!(config.requirepass.as_deref(), Some("secret"));
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let env = vars(&[("FERRUMKV_PORT", "seventy")]);
        let mut config = Config::default();
        assert!(config.apply_vars(|name| env.get(name).cloned()).is_err());
    }

    #[test]
    fn test_zero_databases_is_rejected() {
        let env = vars(&[("FERRUMKV_DATABASES", "0")]);
        let mut config = Config::default();
        assert!(config.apply_vars(|name| env.get(name).cloned()).is_err());
    }

    #[test]
    fn test_partial_json() {
        let config: Config = serde_json::from_str(r#"{ "port": 6400, "requirepass": "pw" }"#).unwrap();
        assert_eq!(config.port, 6400);
        assert_eq!(config.requirepass.as_deref(), Some("pw"));
        assert_eq!(config.databases, 16);
    }
}
