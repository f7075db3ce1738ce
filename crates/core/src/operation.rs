//! # Operation Module
//!
//! Operation kinds and terminal statuses stored in the audit ledger.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a mutating (or audited read) operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Insert,
    Update,
    Delete,
    BulkInsert,
    Select,
}

impl OperationType {
    /// Code string cho DB
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Insert => "INSERT",
            OperationType::Update => "UPDATE",
            OperationType::Delete => "DELETE",
            OperationType::BulkInsert => "BULK_INSERT",
            OperationType::Select => "SELECT",
        }
    }

    /// Human-readable label used by the summary view
    pub fn label(&self) -> &'static str {
        match self {
            OperationType::Insert => "Insert",
            OperationType::Update => "Update",
            OperationType::Delete => "Delete",
            OperationType::BulkInsert => "Bulk insert",
            OperationType::Select => "Query",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "INSERT" => Ok(OperationType::Insert),
            "UPDATE" => Ok(OperationType::Update),
            "DELETE" => Ok(OperationType::Delete),
            "BULK_INSERT" => Ok(OperationType::BulkInsert),
            "SELECT" => Ok(OperationType::Select),
            _ => Err(CoreError::InvalidOperationType(s.to_string())),
        }
    }
}

/// Terminal status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Success,
    Failed,
    Partial,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Success => "SUCCESS",
            OperationStatus::Failed => "FAILED",
            OperationStatus::Partial => "PARTIAL",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OperationStatus::Success => "Succeeded",
            OperationStatus::Failed => "Failed",
            OperationStatus::Partial => "Partially applied",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SUCCESS" => Ok(OperationStatus::Success),
            "FAILED" => Ok(OperationStatus::Failed),
            "PARTIAL" => Ok(OperationStatus::Partial),
            _ => Err(CoreError::InvalidOperationStatus(s.to_string())),
        }
    }
}

/// Where the rows of an operation came from (spreadsheet file and sheet).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_file: Option<String>,
    pub sheet_name: Option<String>,
}

impl Provenance {
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            source_file: Some(source_file.into()),
            sheet_name: None,
        }
    }

    pub fn with_sheet(mut self, sheet_name: impl Into<String>) -> Self {
        self.sheet_name = Some(sheet_name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_type_codes() {
        assert_eq!(OperationType::BulkInsert.as_str(), "BULK_INSERT");
        assert_eq!(
            "bulk_insert".parse::<OperationType>().unwrap(),
            OperationType::BulkInsert
        );
        assert!("MERGE".parse::<OperationType>().is_err());
    }

    #[test]
    fn test_operation_status_codes() {
        assert_eq!(OperationStatus::Partial.to_string(), "PARTIAL");
        assert_eq!(
            "failed".parse::<OperationStatus>().unwrap(),
            OperationStatus::Failed
        );
        assert!("DONE".parse::<OperationStatus>().is_err());
    }

    #[test]
    fn test_provenance_builder() {
        let p = Provenance::new("matrix_junio.xlsx").with_sheet("Hoja1");
        assert_eq!(p.source_file.as_deref(), Some("matrix_junio.xlsx"));
        assert_eq!(p.sheet_name.as_deref(), Some("Hoja1"));
    }
}
