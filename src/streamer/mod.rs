//! Stream-based access to named objects
//!
//! This module defines the `Streamer` capability and its backends: Azure
//! Blob Storage and the local filesystem, selected at configuration time.

pub mod azure;
pub mod fs;
pub mod models;

// Re-export commonly used types
pub use azure::BlobStreamer;
pub use fs::FsStreamer;
pub use models::ObjectInfo;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::StreamerConfig;
use crate::error::{Result, StreamSourceError};

/// Stream opened for sequential reading.
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Stream opened for sequential writing. Bytes become durable only once
/// `shutdown()` completes.
pub type ByteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The capability of opening named objects for sequential read or write
/// access.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Streamer: Send + Sync {
    /// Open a stream for reading.
    ///
    /// Fails with `NotFound` when no object with this name exists.
    async fn open_read_stream(&self, filename: &str) -> Result<ByteReader>;

    /// Open a stream for writing.
    ///
    /// With `overwrite` set to false, fails with `AlreadyExists` when an
    /// object with this name is already present; the check happens before
    /// any stream is opened. Callers that do not care should pass true.
    async fn open_write_stream(&self, filename: &str, overwrite: bool) -> Result<ByteWriter>;

    /// Check whether an object with this name exists.
    async fn exists(&self, filename: &str) -> Result<bool>;

    /// Fetch object metadata without opening a stream.
    async fn get_object_info(&self, filename: &str) -> Result<ObjectInfo>;
}

/// Build the streamer selected by the configuration.
pub fn create_streamer(config: &StreamerConfig) -> Result<Box<dyn Streamer>> {
    match config {
        StreamerConfig::AzureBlob(config) => Ok(Box::new(BlobStreamer::new(config.clone())?)),
        StreamerConfig::Filesystem(config) => Ok(Box::new(FsStreamer::new(config.clone())?)),
    }
}

/// Filenames must carry at least one non-whitespace character. Checked
/// before any handle is derived, so a bad name never reaches the network.
pub(crate) fn validate_filename(filename: &str) -> Result<()> {
    if filename.trim().is_empty() {
        return Err(StreamSourceError::invalid_argument(
            "filename must not be empty",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AzureBlobConfig, FsConfig};
    use tokio::io::AsyncReadExt;

    #[test]
    fn blank_filenames_are_rejected() {
        assert!(validate_filename("").is_err());
        assert!(validate_filename("   ").is_err());
        assert!(validate_filename("a.txt").is_ok());
    }

    #[test]
    fn factory_selects_backend() {
        let fs = StreamerConfig::Filesystem(FsConfig {
            root: std::env::temp_dir(),
        });
        assert!(create_streamer(&fs).is_ok());

        let azure = StreamerConfig::AzureBlob(AzureBlobConfig::with_connection_string(
            "DefaultEndpointsProtocol=https;AccountName=demo;AccountKey=c2VjcmV0;EndpointSuffix=core.windows.net",
        ));
        assert!(create_streamer(&azure).is_ok());
    }

    #[test]
    fn factory_rejects_invalid_config() {
        let azure = StreamerConfig::AzureBlob(AzureBlobConfig::default());
        assert!(create_streamer(&azure).is_err());
    }

    #[tokio::test]
    async fn consumers_can_work_against_the_trait() {
        let mut mock = MockStreamer::new();
        mock.expect_open_read_stream()
            .returning(|_| Ok(Box::new(tokio::io::empty()) as ByteReader));

        let streamer: &dyn Streamer = &mock;
        let mut reader = streamer.open_read_stream("a.txt").await.unwrap();
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).await.unwrap();
        assert!(contents.is_empty());
    }
}
