use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{KeyringError, Result};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct KeyringConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Show testing pairs alongside regular accounts
    #[serde(default)]
    pub dev_mode: bool,
    /// PBKDF2 rounds used when sealing key material
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Leading byte of every encoded address
    pub address_prefix: u8,
}

pub const DEFAULT_ADDRESS_PREFIX: u8 = 42;
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

fn default_db_path() -> String {
    "./data/keyring".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_kdf_iterations() -> u32 {
    DEFAULT_KDF_ITERATIONS
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address_prefix: DEFAULT_ADDRESS_PREFIX,
        }
    }
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            dev_mode: false,
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            network: NetworkConfig::default(),
        }
    }
}

impl KeyringConfig {
    /// Parse a config file, failing on any read or parse error.
    pub fn load(path: &str) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| KeyringError::Config(format!("{}: {}", path, e)))?;
        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| KeyringError::Config(e.to_string()))?;
        if config.kdf_iterations == 0 {
            return Err(KeyringError::Config("kdf_iterations must be non-zero".to_string()));
        }
        Ok(config)
    }

    pub fn load_or_default(path: &str) -> Self {
        if std::path::Path::new(path).exists() {
            match Self::load(path) {
                Ok(c) => {
                    info!("Config loaded from {}", path);
                    c
                }
                Err(e) => {
                    warn!("{}. Using defaults.", e);
                    Self::default()
                }
            }
        } else {
            info!("Config file not found at '{}'. Creating default.", path);
            let config = Self::default();
            if let Ok(s) = toml::to_string_pretty(&config) {
                if let Err(e) = std::fs::write(path, s) {
                    warn!("Could not write default config to {}: {}", path, e);
                }
            }
            config
        }
    }
}
