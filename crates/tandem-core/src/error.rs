//! Error types for bundle loading, stack composition and shared memory.

use std::path::PathBuf;

use thiserror::Error;

/// A bundle descriptor failed structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid bundle: field '{field}' {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while loading a bundle descriptor from disk.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("failed to read bundle '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse bundle '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors raised when composing or decomposing the active stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("bundle '{0}' is already in the stack")]
    Duplicate(String),

    #[error("agent role '{role}' in bundle '{incoming}' conflicts with active bundle '{existing}'")]
    RoleConflict {
        role: String,
        existing: String,
        incoming: String,
    },

    #[error("bundle '{0}' is not in the stack")]
    NotFound(String),
}

/// Errors raised by the shared memory store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("bundle '{bundle_id}' does not own memory category '{category}'")]
    AccessDenied { bundle_id: String, category: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_field() {
        let err = ValidationError::new("memoryCategories", "must be an array");
        assert_eq!(
            err.to_string(),
            "invalid bundle: field 'memoryCategories' must be an array"
        );
    }

    #[test]
    fn bundle_error_wraps_validation_transparently() {
        let err: BundleError = ValidationError::new("id", "must not be empty").into();
        assert_eq!(err.to_string(), "invalid bundle: field 'id' must not be empty");
    }

    #[test]
    fn role_conflict_message() {
        let err = StackError::RoleConflict {
            role: "researcher".into(),
            existing: "a".into(),
            incoming: "c".into(),
        };
        assert!(err.to_string().contains("'researcher'"));
        assert!(err.to_string().contains("'a'"));
    }
}
