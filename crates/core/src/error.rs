//! # Error Module
//!
//! Domain errors cho Recaudit sử dụng thiserror.

use thiserror::Error;

/// Core domain errors.
///
/// Raised only for contract violations by the caller (a FAILED operation
/// without error text, a negative record count, an unknown enum code read
/// back from storage). Degraded inputs such as blank fields or malformed
/// dates are never errors at this layer.
#[derive(Debug, Error)]
pub enum CoreError {
    // === Ledger contract errors ===
    #[error("Operation status FAILED requires an error message")]
    MissingErrorMessage,

    #[error("Operation status SUCCESS must not carry an error message: {0}")]
    UnexpectedErrorMessage(String),

    #[error("Record count must be >= 0, got {0}")]
    NegativeRecordCount(i64),

    #[error("Target entity name must not be blank")]
    BlankEntityName,

    // === Code parsing errors ===
    #[error("Invalid operation type: {0}")]
    InvalidOperationType(String),

    #[error("Invalid operation status: {0}")]
    InvalidOperationStatus(String),

    #[error("Invalid error category: {0}")]
    InvalidErrorCategory(String),

    #[error("Invalid column type: {0}")]
    InvalidColumnType(String),

    // === Descriptor errors ===
    #[error("Entity descriptor {entity} has no tracked columns")]
    NoTrackedColumns { entity: String },
}

/// Result type alias với CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Kiểm tra có phải lỗi vi phạm hợp đồng ledger không
    pub fn is_ledger_contract_error(&self) -> bool {
        matches!(
            self,
            CoreError::MissingErrorMessage
                | CoreError::UnexpectedErrorMessage(_)
                | CoreError::NegativeRecordCount(_)
                | CoreError::BlankEntityName
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::NegativeRecordCount(-3);
        assert_eq!(err.to_string(), "Record count must be >= 0, got -3");

        let err = CoreError::InvalidOperationType("MERGE".to_string());
        assert_eq!(err.to_string(), "Invalid operation type: MERGE");
    }

    #[test]
    fn test_error_checks() {
        assert!(CoreError::MissingErrorMessage.is_ledger_contract_error());
        assert!(CoreError::NegativeRecordCount(-1).is_ledger_contract_error());
        assert!(!CoreError::InvalidColumnType("BLOB".into()).is_ledger_contract_error());
    }
}
