//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// proplock configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub hub: HubConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the TCP listener binds to
    pub bind_addr: String,
    /// Longest request line accepted from a client, in bytes
    pub max_line_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Events queued per connection before it is considered stalled
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5080".to_string(),
            max_line_bytes: 8192,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: 256,
        }
    }
}

const KEYS: [&str; 3] = [
    "server.bind_addr",
    "server.max_line_bytes",
    "hub.outbound_buffer",
];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("PROPLOCK_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("proplock")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location, or defaults if absent
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, or defaults if the file does not exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid server.bind_addr: {}", self.server.bind_addr))?;
        if self.server.max_line_bytes == 0 {
            return Err(anyhow!("server.max_line_bytes must be greater than 0"));
        }
        if self.hub.outbound_buffer == 0 {
            return Err(anyhow!("hub.outbound_buffer must be greater than 0"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "server.bind_addr" => Ok(self.server.bind_addr.clone()),
            "server.max_line_bytes" => Ok(self.server.max_line_bytes.to_string()),
            "hub.outbound_buffer" => Ok(self.hub.outbound_buffer.to_string()),
            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `proplock config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "server.bind_addr" => {
                value
                    .parse::<SocketAddr>()
                    .with_context(|| format!("Invalid bind address: {}", value))?;
                self.server.bind_addr = value.to_string();
            }
            "server.max_line_bytes" => {
                let max: usize = value
                    .parse()
                    .with_context(|| format!("Invalid max_line_bytes value: {}", value))?;
                if max == 0 {
                    return Err(anyhow!("max_line_bytes must be greater than 0"));
                }
                self.server.max_line_bytes = max;
            }
            "hub.outbound_buffer" => {
                let buffer: usize = value
                    .parse()
                    .with_context(|| format!("Invalid outbound_buffer value: {}", value))?;
                if buffer == 0 {
                    return Err(anyhow!("outbound_buffer must be greater than 0"));
                }
                self.hub.outbound_buffer = buffer;
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `proplock config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
