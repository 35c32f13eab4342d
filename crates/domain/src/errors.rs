//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for VoxCal
///
/// Retry policy lives with the callers: only `Network` is ever retried
/// (exponential backoff, bounded attempts). Everything else propagates to
/// the conversation loop as a user-visible message.
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum VoxCalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Could not understand request: {0}")]
    Extraction(String),

    #[error("Calendar changed: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VoxCalError {
    /// True for errors the retry policy may re-attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, VoxCalError::Network(_))
    }
}

/// Result type alias for VoxCal operations
pub type Result<T> = std::result::Result<T, VoxCalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let err = VoxCalError::Conflict("etag mismatch".to_string());
        let json = serde_json::to_value(&err).expect("serialize error");
        assert_eq!(json["type"], "Conflict");
        assert_eq!(json["message"], "etag mismatch");
    }

    #[test]
    fn only_network_is_transient() {
        assert!(VoxCalError::Network("timeout".into()).is_transient());
        assert!(!VoxCalError::Auth("expired token".into()).is_transient());
        assert!(!VoxCalError::Conflict("etag".into()).is_transient());
        assert!(!VoxCalError::Extraction("garbled".into()).is_transient());
    }
}
