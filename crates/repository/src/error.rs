//! Error types for the repository layer.
//!
//! Every store and composite reports failures through [`RepositoryError`].
//! The variants are error *kinds* rather than backend-specific failures, so a
//! caller can react the same way regardless of which store produced them:
//!
//! | Kind | Meaning for the caller |
//! |------|------------------------|
//! | `NotFound` | absent |
//! | `Unsupported`, `InvalidOperation` | programming or configuration error |
//! | `Internal` | infrastructure fault, may be retried |
//! | `Degraded` | results may be incomplete |

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

use crate::types::Bundle;

/// The error type for all repository operations.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The requested resource is absent from the addressed store(s).
    #[error("resource not found: {resource_type}/{id}")]
    NotFound { resource_type: String, id: String },

    /// A create supplied an identifier that is already taken.
    #[error("resource already exists: {resource_type}/{id}")]
    AlreadyExists { resource_type: String, id: String },

    /// The operation cannot be implemented by this store variant.
    #[error("operation '{operation}' not supported by {store}")]
    Unsupported { store: String, operation: String },

    /// An invoke named an operation nobody can process.
    #[error("invalid operation '{operation}': {message}")]
    InvalidOperation { operation: String, message: String },

    /// The resource or bundle handed to a write is malformed.
    #[error("invalid resource: {message}")]
    InvalidResource { message: String },

    /// An I/O or serialization failure distinct from a clean miss.
    #[error("internal error in {store}: {message}")]
    Internal {
        store: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// At least one delegate failed during a fan-out search.
    #[error("degraded result: {} store(s) failed ({})", failures.len(), FailureList(failures))]
    Degraded {
        /// Merged results of every store that succeeded.
        partial: Bundle,
        failures: Vec<StoreFailure>,
    },
}

/// A single delegate failure recorded in a degraded result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    /// Position of the store in the composite (0 is the local store).
    pub index: usize,
    /// Name reported by the failing store.
    pub store: String,
    /// Rendered error message.
    pub message: String,
}

impl fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}: {}", self.index, self.store, self.message)
    }
}

struct FailureList<'a>(&'a [StoreFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

impl RepositoryError {
    /// Builds a `NotFound` error.
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        RepositoryError::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Builds an `Unsupported` error.
    pub fn unsupported(store: impl Into<String>, operation: impl Into<String>) -> Self {
        RepositoryError::Unsupported {
            store: store.into(),
            operation: operation.into(),
        }
    }

    /// Builds an `Internal` error without a source.
    pub fn internal(store: impl Into<String>, message: impl Into<String>) -> Self {
        RepositoryError::Internal {
            store: store.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Builds an `Internal` error wrapping an underlying cause.
    pub fn internal_with_source(
        store: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RepositoryError::Internal {
            store: store.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns `true` for a clean miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }

    /// Returns `true` if the store cannot perform the operation at all.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, RepositoryError::Unsupported { .. })
    }

    /// Returns `true` for a partial fan-out result.
    pub fn is_degraded(&self) -> bool {
        matches!(self, RepositoryError::Degraded { .. })
    }
}

/// Result type alias for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Internal {
            store: "serde_json".to_string(),
            message: format!("serialization error: {}", err),
            source: Some(Box::new(err)),
        }
    }
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        RepositoryError::Internal {
            store: "io".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BundleType;

    #[test]
    fn test_not_found_display() {
        let err = RepositoryError::not_found("Patient", "123");
        assert_eq!(err.to_string(), "resource not found: Patient/123");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_unsupported_display() {
        let err = RepositoryError::unsupported("in-memory", "history");
        assert_eq!(
            err.to_string(),
            "operation 'history' not supported by in-memory"
        );
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_degraded_lists_failures() {
        let err = RepositoryError::Degraded {
            partial: Bundle::new(BundleType::Searchset),
            failures: vec![
                StoreFailure {
                    index: 1,
                    store: "remote".to_string(),
                    message: "connection refused".to_string(),
                },
                StoreFailure {
                    index: 2,
                    store: "directory".to_string(),
                    message: "disk gone".to_string(),
                },
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.starts_with("degraded result: 2 store(s) failed"));
        assert!(rendered.contains("#1 remote: connection refused"));
        assert!(rendered.contains("#2 directory: disk gone"));
        assert!(err.is_degraded());
    }

    #[test]
    fn test_io_error_is_internal() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: RepositoryError = io.into();
        match err {
            RepositoryError::Internal { store, source, .. } => {
                assert_eq!(store, "io");
                assert!(source.is_some());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
