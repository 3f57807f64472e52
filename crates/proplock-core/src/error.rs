//! Error types for proplock
//!
//! Lock rejections (already locked, not the owner) are not errors; they are
//! reported as outcome values by the registry. The variants here cover the
//! service shell: malformed requests, dead connections and I/O. Configuration
//! loading reports through `anyhow` instead.

use thiserror::Error;

/// Result type alias using proplock's Error
pub type Result<T> = std::result::Result<T, Error>;

/// proplock error types
#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors (E100-E199)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    // Connection errors (E200-E299)
    #[error("Connection '{0}' is not connected")]
    ConnectionNotFound(String),

    #[error("Connection '{0}' closed its outbound queue")]
    ConnectionClosed(String),

    // Generic errors
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "E100",
            Self::Json(_) => "E101",
            Self::ConnectionNotFound(_) => "E200",
            Self::ConnectionClosed(_) => "E201",
            Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::InvalidRequest(_) | Self::Json(_) => Some(
                r#"Send one JSON object per line, e.g. {"method":"LockProperty","propertyId":"P1"}"#
                    .to_string(),
            ),
            _ => None,
        }
    }
}
