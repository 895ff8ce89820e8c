//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Stored schema tag differs from the one the caller expects
    #[error("Schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    /// Failure reported by the persistent store
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Payload could not be encoded or decoded
    #[error("Corrupt payload: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Operation attempted after `close()`
    #[error("Cache is closed")]
    Closed,

    /// Construction parameters rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Returns true for errors that originate in the persistent store.
    pub fn is_storage(&self) -> bool {
        matches!(self, CacheError::Storage(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_message() {
        let err = CacheError::SchemaMismatch {
            expected: "2.0.0".to_string(),
            found: "1.0.0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Schema mismatch: expected 2.0.0, found 1.0.0"
        );
    }

    #[test]
    fn test_storage_error_from_rusqlite() {
        let err: CacheError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(err.is_storage());
        assert!(!CacheError::Closed.is_storage());
    }
}
