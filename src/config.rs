use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_upstream_host")]
    pub upstream_host: String,
    #[serde(default = "default_upstream_port")]
    pub upstream_port: u16,
    /// Dump every payload as hex alongside the decoded view.
    #[serde(default)]
    pub hex_dump: bool,
    /// Upper bound for a plausible result-set column count; lenenc values at
    /// or above this are not treated as column counts.
    #[serde(default = "default_max_columns")]
    pub max_columns: u64,
}

fn default_listen_port() -> u16 {
    3307
}

fn default_upstream_host() -> String {
    "127.0.0.1".to_string()
}

fn default_upstream_port() -> u16 {
    3306
}

fn default_max_columns() -> u64 {
    1000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            upstream_host: default_upstream_host(),
            upstream_port: default_upstream_port(),
            hex_dump: false,
            max_columns: default_max_columns(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}
