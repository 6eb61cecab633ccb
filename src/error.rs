use azure_core::StatusCode;
use thiserror::Error;

/// Main error type for streamsource operations
#[derive(Debug, Error)]
pub enum StreamSourceError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Object not found: {name}")]
    NotFound { name: String },

    #[error("Object already exists: {name}")]
    AlreadyExists { name: String },

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Azure API error: {0}")]
    AzureApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Configuration loading error: {0}")]
    ConfigLoadError(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StreamSourceError {
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found<S: Into<String>>(name: S) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn already_exists<S: Into<String>>(name: S) -> Self {
        Self::AlreadyExists { name: name.into() }
    }

    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::AuthenticationError(msg.into())
    }

    pub fn azure_api<S: Into<String>>(msg: S) -> Self {
        Self::AzureApiError(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Classify an Azure error from an operation on a named object.
    /// HTTP 404 becomes `NotFound`; everything else is surfaced unchanged.
    pub(crate) fn from_azure<S: Into<String>>(name: S, error: azure_core::Error) -> Self {
        if error
            .as_http_error()
            .is_some_and(|e| e.status() == StatusCode::NotFound)
        {
            Self::NotFound { name: name.into() }
        } else {
            Self::AzureApiError(error.to_string())
        }
    }
}

/// Result type alias for streamsource operations
pub type Result<T> = std::result::Result<T, StreamSourceError>;

/// Convert Azure Core errors to StreamSourceError
impl From<azure_core::Error> for StreamSourceError {
    fn from(error: azure_core::Error) -> Self {
        Self::AzureApiError(error.to_string())
    }
}
