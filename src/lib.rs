//! streamsource - Stream-Based Object Access
//!
//! A thin adapter that exposes Azure Blob Storage (and the local filesystem)
//! as a generic stream-based file abstraction: open a named object for
//! sequential reading, or for sequential writing with optional overwrite
//! protection. All network I/O, authentication, and retry is delegated to
//! the Azure storage client crates.

pub mod auth;
pub mod config;
pub mod error;
pub mod streamer;

// Re-export commonly used types
pub use error::{Result, StreamSourceError};
pub use streamer::{
    create_streamer, BlobStreamer, ByteReader, ByteWriter, FsStreamer, ObjectInfo, Streamer,
};
