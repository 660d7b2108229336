//! Configuration management for custreg.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::registry::SearchStrategy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "custreg";

/// Default database file name, relative to the working directory.
const DATABASE_FILE_NAME: &str = "customers.db";

/// Default key file name, relative to the working directory.
const KEY_FILE_NAME: &str = "secret.key";

/// Image types the registry accepts.
const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CUSTREG_`, sections split on `__`)
/// 2. TOML config file at `~/.config/custreg/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Search configuration.
    pub search: SearchConfig,
    /// Image configuration.
    pub image: ImageConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `customers.db` in the working directory.
    pub database_path: Option<PathBuf>,
    /// Path to the key file.
    /// Defaults to `secret.key` in the working directory.
    pub key_path: Option<PathBuf>,
}

/// Search-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// How search-by-email finds rows.
    pub strategy: SearchStrategy,
}

/// Image-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Largest accepted image file in bytes.
    pub max_bytes: u64,
    /// Accepted file extensions, lowercase, without the dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            allowed_extensions: SUPPORTED_IMAGE_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl ImageConfig {
    /// Check whether a file extension is accepted, ignoring case.
    #[must_use]
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `CUSTREG_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("CUSTREG_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.image.max_bytes == 0 {
            return Err(Error::ConfigValidation {
                message: "image.max_bytes must be greater than 0".to_string(),
            });
        }

        if self.image.allowed_extensions.is_empty() {
            return Err(Error::ConfigValidation {
                message: "image.allowed_extensions cannot be empty".to_string(),
            });
        }

        for extension in &self.image.allowed_extensions {
            if !SUPPORTED_IMAGE_EXTENSIONS
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(extension))
            {
                return Err(Error::ConfigValidation {
                    message: format!("unsupported image extension: {extension}"),
                });
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME))
    }

    /// Get the key file path, resolving defaults if not set.
    #[must_use]
    pub fn key_path(&self) -> PathBuf {
        self.storage
            .key_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(KEY_FILE_NAME))
    }
}
