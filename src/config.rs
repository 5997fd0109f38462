use crate::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_LISTEN_PORT, DEFAULT_MAX_LINE_LENGTH};
use crate::policy::SizePolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_address: String,
    pub listen_port: u16,
    pub storage_root: String,
    pub credentials_file: String,
    pub chunk_size: usize,
    pub max_line_length: usize,
    pub idle_timeout_secs: Option<u64>, // None blocks indefinitely
    pub issue_session_key: bool,
    pub session_key: Option<String>, // hex; random per session when absent
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub policy: SizePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: String::from("0.0.0.0"),
            listen_port: DEFAULT_LISTEN_PORT,
            storage_root: String::from("server"),
            credentials_file: String::from("users.txt"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            idle_timeout_secs: None,
            issue_session_key: false,
            session_key: None,
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Config {
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(config_str).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        Self::from_toml(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path))
    }

    fn validate(&self) -> Result<()> {
        if self.server.chunk_size == 0 {
            anyhow::bail!("chunk_size must be greater than zero");
        }
        if self.server.max_line_length == 0 {
            anyhow::bail!("max_line_length must be greater than zero");
        }
        if let Some(key) = &self.server.session_key {
            hex::decode(key).context("session_key is not valid hex")?;
        }
        Ok(())
    }
}
