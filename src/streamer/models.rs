//! Data models for streamer operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata about a stored object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
    /// Remote stores report an entity tag; the filesystem backend does not.
    pub etag: Option<String>,
}
