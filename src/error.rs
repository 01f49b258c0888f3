/// Error types for the mudcore server
///
/// Every fallible operation in the crate returns `Result<T>`. Errors fall in
/// three groups: transport failures, broken invariants, and bad user input.
/// Only the first two end a session; see `MudError::is_fatal`.

use crate::core::{EntityKind, Id};
use thiserror::Error;

/// Main error type for mudcore operations
#[derive(Error, Debug)]
pub enum MudError {
    // ========================================
    // Transport Errors
    // ========================================

    #[error("Connection closed by remote host")]
    ConnectionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line too long: {length} bytes (max: {max})")]
    LineTooLong {
        length: usize,
        max: usize,
    },

    // ========================================
    // Invariant Violations
    // ========================================

    #[error("No {kind} with id {id}")]
    UnknownEntity {
        id: Id,
        kind: EntityKind,
    },

    #[error("Entity {id} has kind {found}, expected {expected}")]
    KindMismatch {
        id: Id,
        expected: EntityKind,
        found: EntityKind,
    },

    #[error("Item {id} contains itself")]
    ContainmentCycle {
        id: Id,
    },

    #[error("Input task failed: {0}")]
    InputTaskFailed(String),

    // ========================================
    // User Input Errors
    // ========================================

    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid input for field '{field}': {reason}")]
    ValidationError {
        field: String,
        reason: String,
    },

    // ========================================
    // Configuration & Serialization Errors
    // ========================================

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MudError {
    /// Whether this error must end the owning session.
    ///
    /// Transport failures and invariant violations are fatal. Validation
    /// failures are rendered to the user and the session carries on.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            MudError::InvalidInput(_) | MudError::ValidationError { .. }
        )
    }
}

/// Result type alias for mudcore operations
pub type Result<T> = std::result::Result<T, MudError>;

// ========================================
// Unit Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_unknown_entity_error() {
        let id = Id::new();
        let err = MudError::UnknownEntity {
            id,
            kind: EntityKind::Room,
        };

        assert!(err.to_string().contains("room"));
        assert!(err.to_string().contains(&id.to_string()));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_kind_mismatch_error() {
        let err = MudError::KindMismatch {
            id: Id::new(),
            expected: EntityKind::Item,
            found: EntityKind::Template,
        };

        assert!(err.to_string().contains("has kind template, expected item"));
    }

    #[test]
    fn test_line_too_long_error() {
        let err = MudError::LineTooLong {
            length: 2000,
            max: 1024,
        };

        assert!(err.to_string().contains("2000"));
        assert!(err.to_string().contains("1024"));
        assert!(err.is_fatal(), "Flooding the line buffer ends the session");
    }

    #[test]
    fn test_user_errors_are_recoverable() {
        assert!(!MudError::InvalidInput("You can't go that way".to_string()).is_fatal());
        assert!(!MudError::ValidationError {
            field: "name".to_string(),
            reason: "too short".to_string(),
        }
        .is_fatal());
    }

    #[test]
    fn test_transport_errors_are_fatal() {
        assert!(MudError::ConnectionClosed.is_fatal());
        assert!(MudError::from(IoError::new(ErrorKind::BrokenPipe, "pipe")).is_fatal());
        assert!(MudError::InputTaskFailed("panicked".to_string()).is_fatal());
    }

    #[test]
    fn test_error_source_chain() {
        let err = MudError::from(IoError::new(ErrorKind::NotFound, "not found"));

        assert!(std::error::Error::source(&err).is_some());
    }
}
