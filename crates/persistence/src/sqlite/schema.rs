//! Database schema definitions
//!
//! Row types cho sqlx mapping từ SQLite tables.
//! Schema được định nghĩa trong migrations/20261016000000_init.sql

use crate::error::{PersistenceError, PersistenceResult};
use chrono::{DateTime, Utc};
use recaudit_core::{
    CheckFlag, ColumnType, Customer, ErrorCategory, MatrixRecord, OperationStatus, OperationType,
    ValidationStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Row type cho bảng `operation_log`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct OperationLogRow {
    pub log_id: i64,
    pub session_token: Option<String>,
    pub user_id: Option<i64>,
    pub username: String,
    pub operation_type: String,
    pub schema_name: Option<String>,
    pub table_name: String,
    pub record_count: i64,
    pub status: String,
    pub error_message: Option<String>,
    pub duration_ms: Option<i64>,
    pub source_file: Option<String>,
    pub sheet_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub client_address: Option<String>,
    pub additional_info: Option<String>, // JSON stored as TEXT
}

impl OperationLogRow {
    pub fn operation_type(&self) -> PersistenceResult<OperationType> {
        OperationType::from_str(&self.operation_type)
            .map_err(|_| PersistenceError::invalid_enum("operation_type", &self.operation_type))
    }

    pub fn status(&self) -> PersistenceResult<OperationStatus> {
        OperationStatus::from_str(&self.status)
            .map_err(|_| PersistenceError::invalid_enum("status", &self.status))
    }

    pub fn entity_name(&self) -> String {
        match &self.schema_name {
            Some(schema) => format!("{}.{}", schema, self.table_name),
            None => self.table_name.clone(),
        }
    }

    pub fn additional_info(&self) -> PersistenceResult<Option<serde_json::Value>> {
        self.additional_info
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(PersistenceError::from)
    }
}

/// Row type cho bảng `change_details`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ChangeDetailRow {
    pub detail_id: i64,
    pub log_id: i64,
    pub record_id: String,
    pub column_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub data_type: String,
}

impl ChangeDetailRow {
    pub fn data_type(&self) -> PersistenceResult<ColumnType> {
        ColumnType::from_str(&self.data_type)
            .map_err(|_| PersistenceError::invalid_enum("data_type", &self.data_type))
    }
}

/// Row type cho bảng `validation_errors`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ValidationErrorRow {
    pub error_id: i64,
    pub log_id: i64,
    pub row_number: Option<i64>,
    pub column_name: Option<String>,
    pub error_type: String,
    pub error_description: String,
    pub invalid_value: Option<String>,
    pub expected_format: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ValidationErrorRow {
    pub fn category(&self) -> PersistenceResult<ErrorCategory> {
        ErrorCategory::from_str(&self.error_type)
            .map_err(|_| PersistenceError::invalid_enum("error_type", &self.error_type))
    }
}

/// Row type cho view `audit_operation_summary`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct OperationSummaryRow {
    pub log_id: i64,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub session_token: Option<String>,
    pub operation_type: String,
    pub operation_label: String,
    pub entity_name: String,
    pub record_count: i64,
    pub status: String,
    pub status_label: String,
    pub error_message: Option<String>,
    pub duration_ms: Option<i64>,
    pub source_file: Option<String>,
    pub sheet_name: Option<String>,
    pub validation_error_count: i64,
}

/// Row type cho bảng `budget_lines`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct BudgetLineRow {
    pub code: String,
    pub description: String,
}

/// Row type cho bảng `bank_accounts`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct BankAccountRow {
    pub account_number: String,
    pub year: i32,
    pub month: i32,
    pub display_name: String,
}

/// Row type cho bảng `matrix_records`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct MatrixRow {
    pub id: i64,
    pub identity_key: Option<String>,
    pub period: Option<String>,
    pub record_date: Option<String>,
    pub payer_nit: Option<String>,
    pub payer_name: Option<String>,
    pub payee_nit: Option<String>,
    pub payee_name: Option<String>,
    pub movement_amount: Option<String>,
    pub identified_amount: Option<String>,
    pub budget_line_code: Option<String>,
    pub bank_account_number: Option<String>,
    pub packaging_id: Option<String>,
    pub document_id: Option<String>,
    pub budget_line_description: Option<String>,
    pub bank_account_name: Option<String>,
    pub captured_nit: Option<String>,
    pub captured_amount: Option<String>,
    pub nit_check: Option<String>,
    pub amount_check: Option<String>,
    pub document_check: Option<String>,
    pub validation_status: Option<String>,
    pub source_file: Option<String>,
    pub sheet_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Row type cho bảng `customers`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct CustomerRow {
    pub code: String,
    pub company_name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub credit_limit: Option<String>, // Decimal stored as TEXT
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

// === Conversion implementations ===

impl From<MatrixRow> for MatrixRecord {
    fn from(row: MatrixRow) -> Self {
        Self {
            id: row.id,
            identity_key: row.identity_key,
            period: row.period,
            record_date: row.record_date,
            payer_nit: row.payer_nit,
            payer_name: row.payer_name,
            payee_nit: row.payee_nit,
            payee_name: row.payee_name,
            movement_amount: row.movement_amount,
            identified_amount: row.identified_amount,
            budget_line_code: row.budget_line_code,
            bank_account_number: row.bank_account_number,
            packaging_id: row.packaging_id,
            document_id: row.document_id,
            budget_line_description: row.budget_line_description,
            bank_account_name: row.bank_account_name,
            captured_nit: row.captured_nit,
            captured_amount: row.captured_amount,
            // Unknown codes written by other tools read back as unset
            nit_check: row.nit_check.as_deref().and_then(CheckFlag::from_code),
            amount_check: row.amount_check.as_deref().and_then(CheckFlag::from_code),
            document_check: row.document_check.as_deref().and_then(CheckFlag::from_code),
            validation_status: row
                .validation_status
                .as_deref()
                .and_then(ValidationStatus::from_code),
            source_file: row.source_file,
            sheet_name: row.sheet_name,
            created_at: row.created_at,
            modified_at: row.modified_at,
        }
    }
}

impl TryFrom<CustomerRow> for Customer {
    type Error = PersistenceError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let credit_limit = row
            .credit_limit
            .as_deref()
            .map(|v| Decimal::from_str(v).map_err(|e| PersistenceError::InvalidDecimal(e.to_string())))
            .transpose()?;

        Ok(Self {
            code: row.code,
            company_name: row.company_name,
            contact_name: row.contact_name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            city: row.city,
            country: row.country,
            credit_limit,
            created_at: row.created_at,
            modified_at: row.modified_at,
        })
    }
}
