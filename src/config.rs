//! Service configuration
//!
//! Configuration is read from a TOML file with one section per concern:
//!
//! ```toml
//! [server]
//! port = 8080
//! api_version = "v1"
//!
//! [kms]
//! regions = ["us-west-2", "us-east-1", "eu-west-1"]
//! data_key_size_in_bytes = 32
//!
//! [kms.key_ids]
//! us-west-2 = "alias/rkms-us-west-2"
//! us-east-1 = "alias/rkms-us-east-1"
//! eu-west-1 = "alias/rkms-eu-west-1"
//!
//! [dynamodb]
//! region = "us-west-2"
//! table_name = "rkms-keys"
//!
//! [logger]
//! level = "info"
//! ```
//!
//! Validation happens at load time: the service refuses to start without at
//! least three regions, or with a key-id map whose domain differs from the
//! region list.

use crate::error::{Error, Result};
use crate::resolver::MIN_REGIONS;
use crate::DEFAULT_DATA_KEY_SIZE_IN_BYTES;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Top-level service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Regional KMS settings
    pub kms: KmsConfig,

    /// Store backend settings
    pub dynamodb: DynamoDbConfig,

    /// Logging settings
    #[serde(default)]
    pub logger: LoggerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// TCP port the HTTP server listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Version string embedded in the HTTP path, e.g. `/api/v1/key`
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KmsConfig {
    /// Ordered list of region names; the first region that can generate a
    /// data key becomes its origin region
    pub regions: Vec<String>,

    /// Master key id (or ARN/alias) per region; domain must equal `regions`
    pub key_ids: HashMap<String, String>,

    /// Size of generated data keys in bytes
    #[serde(default = "default_data_key_size")]
    pub data_key_size_in_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DynamoDbConfig {
    /// Region the table lives in
    pub region: String,

    /// Table holding one item per id
    pub table_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggerConfig {
    /// Verbosity threshold (`error`, `warn`, `info`, `debug`, `trace`)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_port() -> u16 {
    8080
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_data_key_size() -> usize {
    DEFAULT_DATA_KEY_SIZE_IN_BYTES
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            api_version: default_api_version(),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Reads and validates the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.kms.regions.len() < MIN_REGIONS {
            return Err(Error::Config(format!(
                "at least {} KMS regions are required, got {}",
                MIN_REGIONS,
                self.kms.regions.len()
            )));
        }

        if self.kms.key_ids.len() != self.kms.regions.len() {
            return Err(Error::Config(format!(
                "number of key ids ({}) does not match number of regions ({})",
                self.kms.key_ids.len(),
                self.kms.regions.len()
            )));
        }

        for region in &self.kms.regions {
            if !self.kms.key_ids.contains_key(region) {
                return Err(Error::Config(format!(
                    "no key id configured for region {}",
                    region
                )));
            }
        }

        if self.kms.data_key_size_in_bytes == 0 {
            return Err(Error::Config(
                "data_key_size_in_bytes must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
