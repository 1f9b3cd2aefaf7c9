//! Configuration file of the command line driver.
//!
//! ```toml
//! library = "/var/lib/veo-migration"
//!
//! [service]
//! url = "https://openveo.example.org:3003"
//! client_id = "moodle"
//! client_secret = "secret"
//!
//! [migration]
//! destination_platform = "vimeo"
//! automatic_migration = true
//! file_fields = [{ component = "mod_resource", area = "content" }]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use veo_client::ClientConfig;
use veo_core::MigrationConfig;

pub const DEFAULT_CONFIG_FILE: &str = "veo-migration.toml";

/// Environment variable overriding the service client secret.
pub const CLIENT_SECRET_ENV: &str = "VEO_CLIENT_SECRET";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_library() -> PathBuf {
    PathBuf::from("library")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory of the item library
    #[serde(default = "default_library")]
    pub library: PathBuf,
    /// Publishing service, required to migrate
    #[serde(default)]
    pub service: Option<ClientConfig>,
    #[serde(default)]
    pub migration: MigrationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            library: default_library(),
            service: None,
            migration: MigrationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load the configuration.
    ///
    /// Without an explicit path, `veo-migration.toml` is read from the
    /// current directory when it exists and defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let secret = std::env::var(CLIENT_SECRET_ENV).ok();
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        Ok(config.with_secret(secret))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn with_secret(mut self, secret: Option<String>) -> Self {
        if let (Some(service), Some(secret)) = (self.service.as_mut(), secret) {
            service.client_secret = secret;
        }
        self
    }

    /// Publishing service settings, required by migrations.
    pub fn service(&self) -> Result<&ClientConfig, ConfigError> {
        self.service
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("missing [service] table".to_string()))
    }

    /// Resolve relative paths against the configuration file's directory.
    pub fn relative_to(mut self, base: &Path) -> Self {
        if self.library.is_relative() {
            self.library = base.join(&self.library);
        }
        if let Some(certificate) = self
            .service
            .as_mut()
            .and_then(|service| service.certificate.as_mut())
        {
            if certificate.is_relative() {
                *certificate = base.join(&*certificate);
            }
        }
        self
    }
}
