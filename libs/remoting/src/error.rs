//! Remoting Error Types
//!
//! Errors surfaced by the exchange client, the idle-check tasks and the
//! codec registry. Steady-state task failures never reach callers; they are
//! logged by the task and retried on its next firing.

use crate::timer::TimerError;
use serialization::SerializationError;
use std::net::SocketAddr;
use thiserror::Error;

/// Main remoting error type
#[derive(Error, Debug)]
pub enum RemotingError {
    /// A construction precondition was not met
    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    /// Channel is unusable for the requested operation
    #[error("Connection error: {message} (remote: {remote_addr:?})")]
    Connection {
        message: String,
        remote_addr: Option<SocketAddr>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Channel was closed or is draining
    #[error("Channel closed: {message} (remote: {remote_addr:?})")]
    Closed {
        message: String,
        remote_addr: Option<SocketAddr>,
    },

    /// Operation did not complete in time
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        key: Option<String>,
    },

    /// Content-type id received from the network was rejected
    #[error("Unexpected serialization id {id} received from network: {message}")]
    Serialization { id: u8, message: String },

    /// Codec failed while reading or writing a body
    #[error("Codec error: {0}")]
    Codec(#[from] SerializationError),

    /// Timer refused a task
    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    /// Generic I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        source: std::io::Error,
    },
}

/// Result type alias for remoting operations
pub type Result<T> = std::result::Result<T, RemotingError>;

impl RemotingError {
    /// Create a precondition error
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>, remote_addr: Option<SocketAddr>) -> Self {
        Self::Connection {
            message: message.into(),
            remote_addr,
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        remote_addr: Option<SocketAddr>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            remote_addr,
            source: Some(Box::new(source)),
        }
    }

    /// Create a closed-channel error
    pub fn closed(message: impl Into<String>, remote_addr: Option<SocketAddr>) -> Self {
        Self::Closed {
            message: message.into(),
            remote_addr,
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, key: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            key: key.map(|k| k.to_string()),
        }
    }

    /// Create a serialization validation error
    pub fn serialization(id: u8, message: impl Into<String>) -> Self {
        Self::Serialization {
            id,
            message: message.into(),
        }
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self {
            RemotingError::Precondition { .. } => false,
            RemotingError::Connection { .. } => true,
            RemotingError::Closed { .. } => false,
            RemotingError::Timeout { .. } => true,
            RemotingError::Configuration { .. } => false,
            RemotingError::Serialization { .. } => false,
            RemotingError::Codec(_) => false,
            RemotingError::Timer(_) => false,
            RemotingError::Io { .. } => true,
        }
    }

    /// Whether the error means the message, not the connection, is bad
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            RemotingError::Serialization { .. } | RemotingError::Codec(_)
        )
    }

    /// Get error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            RemotingError::Precondition { .. } => "precondition",
            RemotingError::Connection { .. } => "connection",
            RemotingError::Closed { .. } => "closed",
            RemotingError::Timeout { .. } => "timeout",
            RemotingError::Configuration { .. } => "configuration",
            RemotingError::Serialization { .. } => "serialization",
            RemotingError::Codec(_) => "codec",
            RemotingError::Timer(_) => "timer",
            RemotingError::Io { .. } => "io",
        }
    }
}

/// Convert standard I/O errors to remoting errors
impl From<std::io::Error> for RemotingError {
    fn from(error: std::io::Error) -> Self {
        RemotingError::Io {
            message: error.to_string(),
            source: error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_connection_error() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)), 20880);
        let err = RemotingError::connection("Failed to send message", Some(addr));

        match err {
            RemotingError::Connection { remote_addr, .. } => {
                assert_eq!(remote_addr, Some(addr));
            }
            _ => panic!("Expected Connection error"),
        }
    }

    #[test]
    fn test_error_categorization() {
        assert_eq!(RemotingError::precondition("test").category(), "precondition");
        assert_eq!(RemotingError::timeout("request", 3000).category(), "timeout");
        assert_eq!(RemotingError::serialization(3, "test").category(), "serialization");
        assert_eq!(
            RemotingError::from(TimerError::Stopped).category(),
            "timer"
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(RemotingError::connection("test", None).is_retryable());
        assert!(RemotingError::timeout("test", 1000).is_retryable());
        assert!(!RemotingError::configuration("test", None).is_retryable());
        assert!(!RemotingError::serialization(7, "test").is_retryable());
        assert!(!RemotingError::closed("test", None).is_retryable());
    }

    #[test]
    fn test_protocol_violation() {
        assert!(RemotingError::serialization(4, "mismatch").is_protocol_violation());
        assert!(!RemotingError::connection("test", None).is_protocol_violation());
    }

    #[test]
    fn test_serialization_message_names_id() {
        let err = RemotingError::serialization(7, "configured codec is json");
        assert!(err.to_string().contains("id 7"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        match RemotingError::from(io_err) {
            RemotingError::Io { message, .. } => assert!(message.contains("reset by peer")),
            _ => panic!("Expected Io error"),
        }
    }
}
