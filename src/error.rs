//! Error types for orderbook-fetcher
//!
//! The taxonomy follows the failure classes of the fetch cycle:
//! - Transport errors (connection, timeout) from the HTTP client
//! - Upstream status errors (non-success HTTP status)
//! - Decode errors (malformed body or metadata)
//! - Authentication errors (token refresh failure, missing token)
//! - Storage errors (snapshot file create/write/rename/delete)
//!
//! Errors also map onto HTTP status codes for the status API.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for orderbook-fetcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for orderbook-fetcher
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unreadable configuration
    #[error("configuration error: {message}")]
    Config {
        /// What is wrong
        message: String,
        /// The configuration key that caused the error (e.g., "citadels")
        key: Option<String>,
    },

    /// Transport-level failure (connection refused, timeout, TLS)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("request to {url} returned status {status}")]
    Status {
        /// HTTP status code returned by upstream
        status: u16,
        /// Request URL
        url: String,
    },

    /// Response body or metadata could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Access token could not be obtained or used
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Snapshot file operation failed
    #[error("storage error at {}: {source}", path.display())]
    Storage {
        /// File the operation targeted
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Requested resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Status API failed to bind or serve
    #[error("API server error: {0}")]
    ApiServerError(String),
}

impl Error {
    /// Build a storage error for the given path
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }

    /// Build a configuration error tied to a key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Authentication-related errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// An authenticated request was attempted without a token
    #[error("no access token available")]
    MissingToken,

    /// The token endpoint rejected the refresh
    #[error("token endpoint returned status {status}")]
    Rejected {
        /// HTTP status code returned by the token endpoint
        status: u16,
    },

    /// The token endpoint answered with an unusable payload
    #[error("malformed token response: {0}")]
    MalformedResponse(String),
}

/// JSON error envelope returned by the status API
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "not found: snapshot 10000002_1760000000.csv"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error payload
    pub error: ErrorDetail,
}

/// Code, message and optional context of an API error
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found")
    pub code: String,

    /// Message for humans
    pub message: String,

    /// Structured context (failing URL, file path)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Body with a machine code and a message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// 404 body for a missing location or snapshot
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// 500 body
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Maps crate errors onto status API responses
pub trait ToHttpStatus {
    /// HTTP status to answer with
    fn status_code(&self) -> u16;

    /// Stable snake_case code for clients
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::NotFound(_) => 404,

            Error::Storage { .. } => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::Url(_) => 500,
            Error::ApiServerError(_) => 500,

            // Upstream failures surface as gateway errors
            Error::Network(_) => 502,
            Error::Status { .. } => 502,
            Error::Decode(_) => 502,
            Error::Auth(_) => 502,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Network(_) => "network_error",
            Error::Status { .. } => "upstream_status",
            Error::Decode(_) => "decode_error",
            Error::Auth(e) => match e {
                AuthError::MissingToken => "missing_token",
                AuthError::Rejected { .. } => "token_rejected",
                AuthError::MalformedResponse(_) => "malformed_token_response",
            },
            Error::Storage { .. } => "storage_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Url(_) => "invalid_url",
            Error::NotFound(_) => "not_found",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Status { status, url } => Some(serde_json::json!({
                "status": status,
                "url": url,
            })),
            Error::Storage { path, .. } => Some(serde_json::json!({
                "path": path,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
