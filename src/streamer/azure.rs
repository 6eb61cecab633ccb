//! Azure Blob Storage streamer
//!
//! Translates a filename into a byte stream against a blob container,
//! lazily bootstrapping the account connection on first use. All network
//! I/O, authentication, and retry is owned by the Azure storage crates;
//! this module only derives handles and adapts the SDK's chunked
//! transfers to `AsyncRead`/`AsyncWrite`.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use azure_storage::{CloudLocation, ConnectionString, StorageCredentials};
use azure_storage_blobs::blob::{BlobBlockType, BlockList};
use azure_storage_blobs::prelude::*;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use futures::future::BoxFuture;
use futures::{FutureExt, TryStreamExt};
use tokio::io::AsyncWrite;
use tokio::sync::OnceCell;
use tokio_util::io::StreamReader;
use tracing::{debug, info};

use crate::auth::default_token_credential;
use crate::config::AzureBlobConfig;
use crate::error::{Result, StreamSourceError};
use crate::streamer::models::ObjectInfo;
use crate::streamer::{validate_filename, ByteReader, ByteWriter, Streamer};

/// Streamer for reading and writing blobs in an Azure container.
pub struct BlobStreamer {
    config: AzureBlobConfig,
    container: OnceCell<ContainerClient>,
}

impl BlobStreamer {
    pub fn new(config: AzureBlobConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            container: OnceCell::new(),
        })
    }

    /// Resolve the container client, building it on first use. The
    /// initializer runs at most once per instance; concurrent first calls
    /// all observe the same completed client.
    async fn container_client(&self) -> Result<&ContainerClient> {
        self.container
            .get_or_try_init(|| async { self.connect() })
            .await
    }

    fn connect(&self) -> Result<ContainerClient> {
        let container = if let Some(raw) = &self.config.connection_string {
            let parsed = ConnectionString::new(raw).map_err(|e| {
                StreamSourceError::authentication(format!("Invalid connection string: {e}"))
            })?;
            let credentials = parsed.storage_credentials().map_err(|e| {
                StreamSourceError::authentication(format!(
                    "Connection string has no usable credentials: {e}"
                ))
            })?;
            let account = parsed
                .account_name
                .ok_or_else(|| {
                    StreamSourceError::authentication(
                        "Connection string is missing an account name",
                    )
                })?
                .to_string();

            match parsed.blob_endpoint {
                // Explicit endpoints address emulators and sovereign clouds.
                Some(uri) => ClientBuilder::with_location(
                    CloudLocation::Custom {
                        account,
                        uri: uri.to_string(),
                    },
                    credentials,
                )
                .container_client(&self.config.container_name),
                None => BlobServiceClient::new(account, credentials)
                    .container_client(&self.config.container_name),
            }
        } else {
            let account = self.config.account.clone().unwrap_or_default();
            let credentials = StorageCredentials::token_credential(default_token_credential()?);

            BlobServiceClient::new(account, credentials)
                .container_client(&self.config.container_name)
        };

        info!(
            container = %self.config.container_name,
            "connected to blob storage account"
        );

        Ok(container)
    }
}

#[async_trait]
impl Streamer for BlobStreamer {
    async fn open_read_stream(&self, filename: &str) -> Result<ByteReader> {
        validate_filename(filename)?;

        let container = self.container_client().await?;
        let blob_client = container.blob_client(filename);

        // Resolving properties up front surfaces NotFound at open time
        // instead of on the first read.
        let properties = blob_client
            .get_properties()
            .await
            .map_err(|e| StreamSourceError::from_azure(filename, e))?;

        // Ranged downloads of empty blobs fail with HTTP 416.
        if properties.blob.properties.content_length == 0 {
            return Ok(Box::new(tokio::io::empty()));
        }

        debug!(blob = filename, "opening blob read stream");

        let chunks = blob_client
            .get()
            .into_stream()
            .map_ok(|chunk| chunk.data.map_err(into_io_error))
            .map_err(into_io_error)
            .try_flatten();

        Ok(Box::new(StreamReader::new(chunks)))
    }

    async fn open_write_stream(&self, filename: &str, overwrite: bool) -> Result<ByteWriter> {
        validate_filename(filename)?;

        let container = self.container_client().await?;
        let blob_client = container.blob_client(filename);

        if !overwrite && blob_client.exists().await? {
            return Err(StreamSourceError::already_exists(filename));
        }

        let content_type = mime_guess::from_path(filename)
            .first_or_octet_stream()
            .to_string();

        debug!(blob = filename, "opening blob write stream");

        Ok(Box::new(BlockBlobWriter::new(
            blob_client,
            content_type,
            self.config.block_size_mb * 1024 * 1024,
        )))
    }

    async fn exists(&self, filename: &str) -> Result<bool> {
        validate_filename(filename)?;

        let container = self.container_client().await?;
        let exists = container.blob_client(filename).exists().await?;

        Ok(exists)
    }

    async fn get_object_info(&self, filename: &str) -> Result<ObjectInfo> {
        validate_filename(filename)?;

        let container = self.container_client().await?;
        let properties = container
            .blob_client(filename)
            .get_properties()
            .await
            .map_err(|e| StreamSourceError::from_azure(filename, e))?;

        let size = properties.blob.properties.content_length;
        let content_type = properties.blob.properties.content_type.clone();
        let etag = Some(properties.blob.properties.etag.to_string());

        // Convert the response datetime from time::OffsetDateTime
        let last_modified = {
            let timestamp = properties.blob.properties.last_modified.unix_timestamp();
            chrono::DateTime::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now)
        };

        Ok(ObjectInfo {
            name: filename.to_string(),
            size,
            content_type,
            last_modified,
            etag,
        })
    }
}

fn into_io_error(error: azure_core::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, error)
}

/// Block ids must share one length; a zero-padded index keeps them unique
/// and in upload order.
fn block_id(index: usize) -> String {
    STANDARD.encode(format!("{index:08}"))
}

enum WriterState {
    Buffering,
    Staging(BoxFuture<'static, azure_core::Result<String>>),
    Committing(BoxFuture<'static, azure_core::Result<()>>),
    Finished,
}

/// `AsyncWrite` adapter over a block blob. Full blocks are staged with
/// `put_block` as bytes arrive; `shutdown()` stages the remainder and
/// commits the block list, which is when the object becomes visible.
/// Dropping the writer without shutting it down abandons the staged
/// blocks and leaves any previous object untouched.
pub struct BlockBlobWriter {
    blob_client: BlobClient,
    content_type: String,
    block_size: usize,
    buffer: Vec<u8>,
    block_ids: Vec<String>,
    state: WriterState,
}

impl BlockBlobWriter {
    fn new(blob_client: BlobClient, content_type: String, block_size: usize) -> Self {
        Self {
            blob_client,
            content_type,
            block_size,
            buffer: Vec::new(),
            block_ids: Vec::new(),
            state: WriterState::Buffering,
        }
    }

    fn stage_block(&mut self) {
        let id = block_id(self.block_ids.len());
        let body = Bytes::from(std::mem::take(&mut self.buffer));
        let client = self.blob_client.clone();

        self.state = WriterState::Staging(
            async move {
                client.put_block(id.clone(), body).await?;
                Ok(id)
            }
            .boxed(),
        );
    }

    fn commit(&mut self) {
        let block_list = BlockList {
            blocks: self
                .block_ids
                .drain(..)
                .map(|id| BlobBlockType::Latest(BlockId::from(id)))
                .collect(),
        };
        let client = self.blob_client.clone();
        let content_type = self.content_type.clone();

        self.state = WriterState::Committing(
            async move {
                client
                    .put_block_list(block_list)
                    .content_type(content_type)
                    .await?;
                Ok(())
            }
            .boxed(),
        );
    }

    /// Drive whatever upload is in flight. Ready(Ok) means the writer is
    /// either buffering again or finished.
    fn poll_pending(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        loop {
            match &mut self.state {
                WriterState::Buffering | WriterState::Finished => return Poll::Ready(Ok(())),
                WriterState::Staging(fut) => match futures::ready!(fut.as_mut().poll(cx)) {
                    Ok(id) => {
                        self.block_ids.push(id);
                        self.state = WriterState::Buffering;
                    }
                    Err(e) => {
                        self.state = WriterState::Buffering;
                        return Poll::Ready(Err(into_io_error(e)));
                    }
                },
                WriterState::Committing(fut) => match futures::ready!(fut.as_mut().poll(cx)) {
                    Ok(()) => {
                        self.state = WriterState::Finished;
                    }
                    Err(e) => {
                        self.state = WriterState::Finished;
                        return Poll::Ready(Err(into_io_error(e)));
                    }
                },
            }
        }
    }
}

impl AsyncWrite for BlockBlobWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        futures::ready!(this.poll_pending(cx))?;

        if matches!(this.state, WriterState::Finished) {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write after shutdown",
            )));
        }

        let available = this.block_size - this.buffer.len();
        let accepted = available.min(buf.len());
        this.buffer.extend_from_slice(&buf[..accepted]);

        if this.buffer.len() >= this.block_size {
            this.stage_block();
        }

        Poll::Ready(Ok(accepted))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // Flush only drains the in-flight block; a partial buffer stays
        // local until shutdown commits it.
        self.get_mut().poll_pending(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        loop {
            futures::ready!(this.poll_pending(cx))?;

            match this.state {
                WriterState::Finished => return Poll::Ready(Ok(())),
                WriterState::Buffering => {
                    if !this.buffer.is_empty() {
                        this.stage_block();
                    } else {
                        // An empty block list still commits, producing a
                        // zero-length object.
                        this.commit();
                    }
                }
                _ => unreachable!("poll_pending leaves the writer buffering or finished"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    // Azurite's well-known development account; client construction is
    // offline, so these tests never reach a network.
    const DEV_CONNECTION_STRING: &str = "DefaultEndpointsProtocol=http;AccountName=devstoreaccount1;AccountKey=Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==;BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1;";

    fn dev_streamer() -> BlobStreamer {
        BlobStreamer::new(AzureBlobConfig::with_connection_string(DEV_CONNECTION_STRING))
            .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(BlobStreamer::new(AzureBlobConfig::default()).is_err());
    }

    #[tokio::test]
    async fn connect_fails_on_garbage_connection_string() {
        let streamer =
            BlobStreamer::new(AzureBlobConfig::with_connection_string("not a connection string"))
                .unwrap();

        let error = streamer.container_client().await.unwrap_err();
        assert!(matches!(
            error,
            StreamSourceError::AuthenticationError(_)
        ));
    }

    #[tokio::test]
    async fn container_client_is_constructed_once() {
        let streamer = dev_streamer();

        let first = streamer.container_client().await.unwrap() as *const ContainerClient;
        let second = streamer.container_client().await.unwrap() as *const ContainerClient;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn concurrent_first_access_converges_on_one_client() {
        let streamer = Arc::new(dev_streamer());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let streamer = Arc::clone(&streamer);
                tokio::spawn(async move { streamer.container_client().await.is_ok() })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap());
        }

        assert!(streamer.container.get().is_some());
    }

    #[test]
    fn block_ids_share_one_width() {
        let first = block_id(0);
        let middle = block_id(512);
        let last = block_id(99_999_999);
        assert_eq!(first.len(), middle.len());
        assert_eq!(middle.len(), last.len());
        assert_ne!(first, middle);
    }
}
