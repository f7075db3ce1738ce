//! Business layer errors
//!
//! Uses anyhow for error aggregation with custom error types.

use thiserror::Error;

/// Business operation errors
#[derive(Debug, Error)]
pub enum BusinessError {
    // === Not found errors ===
    #[error("Matrix record not found: {0}")]
    RecordNotFound(i64),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    // === Write errors ===
    #[error("Customer already exists: {0}")]
    CustomerExists(String),

    #[error("Invalid record key for {entity}: {key}")]
    InvalidKey { entity: String, key: String },

    // === Configuration errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Wrapped errors ===
    #[error("Persistence error: {0}")]
    Persistence(#[from] recaudit_persistence::PersistenceError),

    #[error("Core error: {0}")]
    Core(#[from] recaudit_core::CoreError),
}

/// Result type alias for business operations
pub type BusinessResult<T> = anyhow::Result<T>;

impl BusinessError {
    pub fn invalid_key(entity: &str, key: &str) -> Self {
        Self::InvalidKey {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_key_error() {
        let err = BusinessError::invalid_key("Data.Matrix", "abc");
        assert!(err.to_string().contains("Data.Matrix"));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_persistence_error_converts() {
        let err: BusinessError =
            recaudit_persistence::PersistenceError::not_found("Customer", "CUST001").into();
        assert!(err.to_string().contains("CUST001"));
    }
}
