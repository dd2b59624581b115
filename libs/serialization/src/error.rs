//! Serialization errors

use thiserror::Error;

/// Errors raised while encoding or decoding a message body
#[derive(Error, Debug)]
pub enum SerializationError {
    /// Underlying stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON codec failure
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bincode codec failure
    #[error("Bincode codec error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Content-type id is not known to this side
    #[error("Unknown content type id {id}")]
    UnknownContentType { id: u8 },
}

/// Result type alias for serialization operations
pub type Result<T> = std::result::Result<T, SerializationError>;

impl SerializationError {
    /// Get error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            SerializationError::Io(_) => "io",
            SerializationError::Json(_) => "json",
            SerializationError::Bincode(_) => "bincode",
            SerializationError::UnknownContentType { .. } => "unknown_content_type",
        }
    }
}
