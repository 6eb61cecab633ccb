//! Azure credential resolution
//!
//! Token acquisition, caching, and refresh are owned entirely by the
//! `azure_identity` crate; this module only constructs the credential the
//! storage clients are handed.

use std::sync::Arc;

use azure_core::auth::TokenCredential;
use azure_identity::{DefaultAzureCredential, TokenCredentialOptions};

use crate::error::{Result, StreamSourceError};

/// Build the default Azure token credential chain (environment, managed
/// identity, Azure CLI).
pub fn default_token_credential() -> Result<Arc<dyn TokenCredential>> {
    let credential = DefaultAzureCredential::create(TokenCredentialOptions::default())
        .map_err(|e| {
            StreamSourceError::authentication(format!(
                "Failed to create DefaultAzureCredential: {e}"
            ))
        })?;

    Ok(Arc::new(credential))
}
