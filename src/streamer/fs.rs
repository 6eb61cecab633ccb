//! Local filesystem streamer
//!
//! The same capability set as the blob streamer, rooted at a directory.
//! Filenames may contain `/` separators and resolve strictly inside the
//! root.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs::{File, OpenOptions};
use tracing::debug;

use crate::config::FsConfig;
use crate::error::{Result, StreamSourceError};
use crate::streamer::models::ObjectInfo;
use crate::streamer::{validate_filename, ByteReader, ByteWriter, Streamer};

/// Streamer over a local directory.
pub struct FsStreamer {
    root: PathBuf,
}

impl FsStreamer {
    pub fn new(config: FsConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self { root: config.root })
    }

    /// Resolve a filename strictly inside the root directory.
    fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let relative = Path::new(filename);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(StreamSourceError::invalid_argument(format!(
                "filename '{filename}' escapes the root directory"
            )));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Streamer for FsStreamer {
    async fn open_read_stream(&self, filename: &str) -> Result<ByteReader> {
        validate_filename(filename)?;
        let path = self.resolve(filename)?;

        debug!(file = filename, "opening file read stream");

        let file = File::open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StreamSourceError::not_found(filename),
            _ => StreamSourceError::from(e),
        })?;

        Ok(Box::new(file))
    }

    async fn open_write_stream(&self, filename: &str, overwrite: bool) -> Result<ByteWriter> {
        validate_filename(filename)?;
        let path = self.resolve(filename)?;

        // Filenames with separators map onto subdirectories.
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut options = OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        debug!(file = filename, overwrite, "opening file write stream");

        let file = options.open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => StreamSourceError::already_exists(filename),
            _ => StreamSourceError::from(e),
        })?;

        Ok(Box::new(file))
    }

    async fn exists(&self, filename: &str) -> Result<bool> {
        validate_filename(filename)?;
        let path = self.resolve(filename)?;

        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_object_info(&self, filename: &str) -> Result<ObjectInfo> {
        validate_filename(filename)?;
        let path = self.resolve(filename)?;

        let metadata = tokio::fs::metadata(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StreamSourceError::not_found(filename),
            _ => StreamSourceError::from(e),
        })?;

        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let content_type = mime_guess::from_path(filename)
            .first_or_octet_stream()
            .to_string();

        Ok(ObjectInfo {
            name: filename.to_string(),
            size: metadata.len(),
            content_type,
            last_modified,
            etag: None,
        })
    }
}
