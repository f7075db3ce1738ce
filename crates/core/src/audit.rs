//! # Audit Module
//!
//! Write-side shapes of the three audit collections: the operation ledger,
//! column-level change details and validation errors.

use crate::attribution::Attribution;
use crate::entity::ColumnType;
use crate::error::{CoreError, CoreResult};
use crate::operation::{OperationStatus, OperationType, Provenance};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One ledger entry to be written. The log id is assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOperation {
    pub attribution: Attribution,
    pub operation_type: OperationType,
    pub schema_name: Option<String>,
    pub table_name: String,
    pub record_count: i64,
    pub status: OperationStatus,
    pub error_message: Option<String>,
    pub duration_ms: Option<i64>,
    pub provenance: Provenance,
    pub additional_info: Option<serde_json::Value>,
}

impl NewOperation {
    /// SUCCESS operation against `entity` (either `Schema.Table` or `Table`).
    pub fn new(attribution: Attribution, operation_type: OperationType, entity: &str) -> Self {
        let (schema_name, table_name) = split_qualified(entity);
        Self {
            attribution,
            operation_type,
            schema_name,
            table_name,
            record_count: 0,
            status: OperationStatus::Success,
            error_message: None,
            duration_ms: None,
            provenance: Provenance::default(),
            additional_info: None,
        }
    }

    pub fn record_count(mut self, count: i64) -> Self {
        self.record_count = count;
        self
    }

    pub fn status(mut self, status: OperationStatus) -> Self {
        self.status = status;
        self
    }

    /// Mark as FAILED with the captured error text
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.status = OperationStatus::Failed;
        self.error_message = Some(error.into());
        self
    }

    pub fn error_message(mut self, error: impl Into<String>) -> Self {
        self.error_message = Some(error.into());
        self
    }

    pub fn duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn additional_info(mut self, info: serde_json::Value) -> Self {
        self.additional_info = Some(info);
        self
    }

    /// `Schema.Table` when a schema is known
    pub fn qualified_name(&self) -> String {
        match &self.schema_name {
            Some(schema) => format!("{}.{}", schema, self.table_name),
            None => self.table_name.clone(),
        }
    }

    /// Ledger invariants checked before anything is written.
    pub fn validate(&self) -> CoreResult<()> {
        if self.table_name.trim().is_empty() {
            return Err(CoreError::BlankEntityName);
        }
        if self.record_count < 0 {
            return Err(CoreError::NegativeRecordCount(self.record_count));
        }
        let has_error = self
            .error_message
            .as_deref()
            .map_or(false, |e| !e.trim().is_empty());
        match self.status {
            OperationStatus::Failed if !has_error => Err(CoreError::MissingErrorMessage),
            OperationStatus::Success if has_error => Err(CoreError::UnexpectedErrorMessage(
                self.error_message.clone().unwrap_or_default(),
            )),
            _ => Ok(()),
        }
    }
}

fn split_qualified(entity: &str) -> (Option<String>, String) {
    match entity.split_once('.') {
        Some((schema, table)) if !schema.is_empty() => {
            (Some(schema.to_string()), table.to_string())
        }
        _ => (None, entity.to_string()),
    }
}

/// One column-level before/after diff of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnChange {
    pub record_id: String,
    pub column_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub data_type: ColumnType,
}

/// Category of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    DataType,
    Constraint,
    BusinessRule,
    Duplicate,
    Format,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::DataType => "DATA_TYPE",
            ErrorCategory::Constraint => "CONSTRAINT",
            ErrorCategory::BusinessRule => "BUSINESS_RULE",
            ErrorCategory::Duplicate => "DUPLICATE",
            ErrorCategory::Format => "FORMAT",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ErrorCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DATA_TYPE" => Ok(ErrorCategory::DataType),
            "CONSTRAINT" => Ok(ErrorCategory::Constraint),
            "BUSINESS_RULE" => Ok(ErrorCategory::BusinessRule),
            "DUPLICATE" => Ok(ErrorCategory::Duplicate),
            "FORMAT" => Ok(ErrorCategory::Format),
            _ => Err(CoreError::InvalidErrorCategory(s.to_string())),
        }
    }
}

/// One detected problem, to be attached to a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewValidationError {
    pub row_number: Option<i64>,
    pub column_name: Option<String>,
    pub category: ErrorCategory,
    pub description: String,
    pub invalid_value: Option<String>,
    pub expected_format: Option<String>,
}

impl NewValidationError {
    pub fn new(category: ErrorCategory, description: impl Into<String>) -> Self {
        Self {
            row_number: None,
            column_name: None,
            category,
            description: description.into(),
            invalid_value: None,
            expected_format: None,
        }
    }

    pub fn row(mut self, row_number: i64) -> Self {
        self.row_number = Some(row_number);
        self
    }

    pub fn column(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = Some(column_name.into());
        self
    }

    pub fn value(mut self, invalid_value: Option<String>) -> Self {
        self.invalid_value = invalid_value;
        self
    }

    pub fn expected(mut self, expected_format: impl Into<String>) -> Self {
        self.expected_format = Some(expected_format.into());
        self
    }
}
