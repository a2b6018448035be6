use crate::constants::{
    DEFAULT_DATA_TIMEOUT_SECS, DEFAULT_GRACE_PERIOD_SECS, DEFAULT_IDLE_TIMEOUT_SECS,
    DEFAULT_LISTEN_PORT, DEFAULT_MAX_CONNECTIONS, DEFAULT_TRANSFER_BUFFER_SIZE,
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_port: u16,
    pub bind_address: String,
    pub pasv_address: String, // Address advertised in 227 replies
    pub root_path: PathBuf,
    pub max_connections: usize,
    pub logging_enabled: bool,
    pub idle_timeout_secs: u64,
    pub grace_period_secs: u64,
    pub data_timeout_secs: u64,
    pub transfer_buffer_size: usize,
    pub allow_anonymous: bool,
    pub users_file: Option<PathBuf>, // None keeps accounts in memory only
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            bind_address: String::from("0.0.0.0"),
            pasv_address: String::from("127.0.0.1"),
            root_path: PathBuf::from("/srv/ftp"),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            logging_enabled: true,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
            data_timeout_secs: DEFAULT_DATA_TIMEOUT_SECS,
            transfer_buffer_size: DEFAULT_TRANSFER_BUFFER_SIZE,
            allow_anonymous: false,
            users_file: Some(PathBuf::from("users.toml")),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_secs)
    }

    /// Rejects values that would refuse every client or end every session
    /// at once.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            bail!("max_connections must be at least 1");
        }
        if self.idle_timeout_secs == 0 {
            bail!("idle_timeout_secs must be at least 1");
        }
        if self.data_timeout_secs == 0 {
            bail!("data_timeout_secs must be at least 1");
        }
        Ok(())
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        Self::from_toml(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))
    }

    pub fn from_toml(config_str: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(config_str)?;

        // A zero buffer would stall every transfer loop
        if config.server.transfer_buffer_size == 0 {
            config.server.transfer_buffer_size = DEFAULT_TRANSFER_BUFFER_SIZE;
        }
        config.server.validate()?;

        Ok(config)
    }
}

// Helper function to log configuration options
pub fn log_config(config: &ServerConfig) {
    log::info!("  Listen Port: {}", config.listen_port);
    log::info!("  Bind Address: {}", config.bind_address);
    log::info!("  PASV Address: {}", config.pasv_address);
    log::info!("  Root Path: {}", config.root_path.display());
    log::info!("  Max Connections: {}", config.max_connections);
    log::info!("  Idle Timeout: {}s", config.idle_timeout_secs);
    log::info!("  Grace Period: {}s", config.grace_period_secs);
    log::info!(
        "  Transfer Buffer Size: {} KB",
        config.transfer_buffer_size / 1024
    );
}
