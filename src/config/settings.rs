//! Configuration settings management
//!
//! This module defines the streamer configuration surface and handles
//! loading it from an optional file source layered with prefixed
//! environment variables.

use crate::error::{Result, StreamSourceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Container used when the configuration does not name one.
pub const DEFAULT_CONTAINER_NAME: &str = "Container";

const DEFAULT_BLOCK_SIZE_MB: usize = 4;

/// Environment variable prefix, e.g. `STREAMSOURCE_BACKEND=filesystem`.
const ENV_PREFIX: &str = "STREAMSOURCE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureBlobConfig {
    /// Opaque connection string for the storage account. Mutually exclusive
    /// with `account`.
    pub connection_string: Option<String>,
    /// Storage account name, resolved through the default credential chain.
    /// Mutually exclusive with `connection_string`.
    pub account: Option<String>,
    #[serde(default = "default_container_name")]
    pub container_name: String,
    /// Size of the staged upload blocks, in mebibytes.
    #[serde(default = "default_block_size_mb")]
    pub block_size_mb: usize,
}

fn default_container_name() -> String {
    DEFAULT_CONTAINER_NAME.to_string()
}

fn default_block_size_mb() -> usize {
    DEFAULT_BLOCK_SIZE_MB
}

impl Default for AzureBlobConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            account: None,
            container_name: default_container_name(),
            block_size_mb: default_block_size_mb(),
        }
    }
}

impl AzureBlobConfig {
    /// Build a configuration around a connection string, keeping the
    /// defaults for everything else.
    pub fn with_connection_string<S: Into<String>>(connection_string: S) -> Self {
        Self {
            connection_string: Some(connection_string.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        match (&self.connection_string, &self.account) {
            (None, None) => {
                return Err(StreamSourceError::config(
                    "Either connection_string or account is required",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(StreamSourceError::config(
                    "connection_string and account are mutually exclusive",
                ))
            }
            _ => {}
        }

        if self.container_name.trim().is_empty() {
            return Err(StreamSourceError::config("Container name is required"));
        }

        if self.block_size_mb == 0 {
            return Err(StreamSourceError::config(
                "block_size_mb must be at least 1",
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    /// Directory all filenames resolve under.
    pub root: PathBuf,
}

impl FsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(StreamSourceError::config("Root directory is required"));
        }

        Ok(())
    }
}

/// Backend selection plus its settings. Internally tagged so a flat
/// configuration file (or environment) only needs a `backend` key next to
/// the backend's own fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StreamerConfig {
    AzureBlob(AzureBlobConfig),
    Filesystem(FsConfig),
}

impl StreamerConfig {
    /// Load configuration from an optional file, layered with
    /// `STREAMSOURCE_*` environment variables (file values lose to the
    /// environment).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::AzureBlob(config) => config.validate(),
            Self::Filesystem(config) => config.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn azure_defaults() {
        let config = AzureBlobConfig::default();
        assert_eq!(config.container_name, "Container");
        assert_eq!(config.block_size_mb, 4);
        assert!(config.connection_string.is_none());
        assert!(config.account.is_none());
    }

    #[test]
    fn azure_requires_a_credential() {
        let config = AzureBlobConfig::default();
        let error = config.validate().unwrap_err();
        assert!(matches!(error, StreamSourceError::ConfigError(_)));
    }

    #[test]
    fn azure_rejects_both_credentials() {
        let config = AzureBlobConfig {
            connection_string: Some("UseDevelopmentStorage=true".to_string()),
            account: Some("devstoreaccount1".to_string()),
            ..AzureBlobConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn azure_rejects_blank_container() {
        let config = AzureBlobConfig {
            container_name: "  ".to_string(),
            ..AzureBlobConfig::with_connection_string("AccountName=a;AccountKey=b")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn fs_requires_root() {
        let config = FsConfig {
            root: PathBuf::new(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_tagged_backend_from_toml() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                backend = "filesystem"
                root = "/var/data/objects"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let parsed: StreamerConfig = settings.try_deserialize().unwrap();
        match parsed {
            StreamerConfig::Filesystem(fs) => {
                assert_eq!(fs.root, PathBuf::from("/var/data/objects"))
            }
            other => panic!("Expected filesystem backend, got {other:?}"),
        }
    }

    #[test]
    fn parses_azure_backend_with_defaults() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                backend = "azure_blob"
                connection_string = "AccountName=demo;AccountKey=secret"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let parsed: StreamerConfig = settings.try_deserialize().unwrap();
        match parsed {
            StreamerConfig::AzureBlob(azure) => {
                assert_eq!(azure.container_name, "Container");
                assert_eq!(azure.block_size_mb, 4);
                assert_eq!(
                    azure.connection_string.as_deref(),
                    Some("AccountName=demo;AccountKey=secret")
                );
            }
            other => panic!("Expected azure backend, got {other:?}"),
        }
    }
}
