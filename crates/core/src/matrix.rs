//! # Matrix Module
//!
//! Raw ingestion records ("Matrix" rows) exported from spreadsheets.
//!
//! Upstream hands over [`RawMatrixRow`] values with any subset of fields
//! populated. Blank (null or zero-length) fields are normalized to `None`.
//! The derived fields (identity, period, enrichment, check flags) are owned
//! by the reconciliation engine.

use crate::entity::{ColumnType, EntityDescriptor, Tracked, TrackedColumn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Blank = null or zero-length after trimming.
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Per-field check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckFlag {
    Correcto,
    Incorrecto,
}

impl CheckFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckFlag::Correcto => "CORRECTO",
            CheckFlag::Incorrecto => "INCORRECTO",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CORRECTO" => Some(CheckFlag::Correcto),
            "INCORRECTO" => Some(CheckFlag::Incorrecto),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CheckFlag::Correcto)
    }
}

impl fmt::Display for CheckFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Composite validation flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Validado,
    Invalido,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Validado => "VALIDADO",
            ValidationStatus::Invalido => "INVALIDO",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "VALIDADO" => Some(ValidationStatus::Validado),
            "INVALIDO" => Some(ValidationStatus::Invalido),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Row as delivered by the upstream producer. Numbers are accepted as JSON
/// numbers or strings; everything is kept textual until reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMatrixRow {
    #[serde(deserialize_with = "text_or_number")]
    pub identity_key: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub period: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub record_date: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub payer_nit: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub payer_name: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub payee_nit: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub payee_name: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub movement_amount: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub identified_amount: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub budget_line_code: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub bank_account_number: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub packaging_id: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub document_id: Option<String>,
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

/// Persisted Matrix record, input fields plus reconciliation-owned fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixRecord {
    /// Row primary key (assigned by the store)
    pub id: i64,

    // === Input fields ===
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

    // === Enrichment ===
    pub budget_line_description: Option<String>,
    pub bank_account_name: Option<String>,

    // === Pass-through ===
    pub captured_nit: Option<String>,
    pub captured_amount: Option<String>,

    // === Validation flags ===
    pub nit_check: Option<CheckFlag>,
    pub amount_check: Option<CheckFlag>,
    pub document_check: Option<CheckFlag>,
    pub validation_status: Option<ValidationStatus>,

    pub source_file: Option<String>,
    pub sheet_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl MatrixRecord {
    /// New, not-yet-persisted record (id 0) from an upstream row
    pub fn from_raw(raw: RawMatrixRow) -> Self {
        Self {
            id: 0,
            identity_key: non_blank(raw.identity_key),
            period: non_blank(raw.period),
            record_date: non_blank(raw.record_date),
            payer_nit: non_blank(raw.payer_nit),
            payer_name: non_blank(raw.payer_name),
            payee_nit: non_blank(raw.payee_nit),
            payee_name: non_blank(raw.payee_name),
            movement_amount: non_blank(raw.movement_amount),
            identified_amount: non_blank(raw.identified_amount),
            budget_line_code: non_blank(raw.budget_line_code),
            bank_account_number: non_blank(raw.bank_account_number),
            packaging_id: non_blank(raw.packaging_id),
            document_id: non_blank(raw.document_id),
            budget_line_description: None,
            bank_account_name: None,
            captured_nit: None,
            captured_amount: None,
            nit_check: None,
            amount_check: None,
            document_check: None,
            validation_status: None,
            source_file: None,
            sheet_name: None,
            created_at: Utc::now(),
            modified_at: None,
        }
    }

    /// Descriptor of the `Data.Matrix` entity as audited by the capture pipeline.
    pub fn descriptor() -> EntityDescriptor {
        EntityDescriptor {
            schema: "Data".to_string(),
            name: "Matrix".to_string(),
            table: "matrix_records".to_string(),
            key_column: "id".to_string(),
            modified_column: Some("modified_at".to_string()),
            tracked_columns: vec![
                TrackedColumn::new("identity_key", ColumnType::Text),
                TrackedColumn::new("period", ColumnType::Text),
                TrackedColumn::new("record_date", ColumnType::Date),
                TrackedColumn::new("payer_nit", ColumnType::Text),
                TrackedColumn::new("payee_nit", ColumnType::Text),
                TrackedColumn::new("movement_amount", ColumnType::Decimal),
                TrackedColumn::new("identified_amount", ColumnType::Decimal),
                TrackedColumn::new("budget_line_code", ColumnType::Text),
                TrackedColumn::new("bank_account_number", ColumnType::Text),
                TrackedColumn::new("packaging_id", ColumnType::Text),
                TrackedColumn::new("document_id", ColumnType::Text),
                TrackedColumn::new("validation_status", ColumnType::Text),
            ],
        }
    }

    pub fn is_validated(&self) -> bool {
        self.validation_status == Some(ValidationStatus::Validado)
    }
}

impl Tracked for MatrixRecord {
    fn record_key(&self) -> String {
        self.id.to_string()
    }

    fn column_value(&self, column: &str) -> Option<String> {
        let value = match column {
            "identity_key" => self.identity_key.clone(),
            "period" => self.period.clone(),
            "record_date" => self.record_date.clone(),
            "payer_nit" => self.payer_nit.clone(),
            "payer_name" => self.payer_name.clone(),
            "payee_nit" => self.payee_nit.clone(),
            "payee_name" => self.payee_name.clone(),
            "movement_amount" => self.movement_amount.clone(),
            "identified_amount" => self.identified_amount.clone(),
            "budget_line_code" => self.budget_line_code.clone(),
            "budget_line_description" => self.budget_line_description.clone(),
            "bank_account_number" => self.bank_account_number.clone(),
            "bank_account_name" => self.bank_account_name.clone(),
            "packaging_id" => self.packaging_id.clone(),
            "document_id" => self.document_id.clone(),
            "captured_nit" => self.captured_nit.clone(),
            "captured_amount" => self.captured_amount.clone(),
            "nit_check" => self.nit_check.map(|f| f.as_str().to_string()),
            "amount_check" => self.amount_check.map(|f| f.as_str().to_string()),
            "document_check" => self.document_check.map(|f| f.as_str().to_string()),
            "validation_status" => self.validation_status.map(|s| s.as_str().to_string()),
            _ => None,
        };
        non_blank(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_blank() {
        assert!(is_blank(None));
        assert!(is_blank(Some("")));
        assert!(is_blank(Some("   ")));
        assert!(!is_blank(Some("0")));
    }

    #[test]
    fn test_raw_row_accepts_numbers_and_strings() {
        let json = r#"{
            "payer_nit": 899999336,
            "movement_amount": 1500.5,
            "identified_amount": "1500.50",
            "packaging_id": "0020000672302",
            "payee_name": ""
        }"#;
        let raw: RawMatrixRow = serde_json::from_str(json).unwrap();
        assert_eq!(raw.payer_nit.as_deref(), Some("899999336"));
        assert_eq!(raw.movement_amount.as_deref(), Some("1500.5"));
        assert_eq!(raw.identified_amount.as_deref(), Some("1500.50"));
        assert!(raw.identity_key.is_none());

        let record = MatrixRecord::from_raw(raw);
        assert!(record.payee_name.is_none());
        assert_eq!(record.packaging_id.as_deref(), Some("0020000672302"));
        assert!(record.validation_status.is_none());
    }

    #[test]
    fn test_tracked_values() {
        let mut record = MatrixRecord::from_raw(RawMatrixRow {
            payer_nit: Some(" 800 ".into()),
            ..Default::default()
        });
        record.id = 12;
        record.validation_status = Some(ValidationStatus::Invalido);

        assert_eq!(record.record_key(), "12");
        assert_eq!(record.column_value("payer_nit").as_deref(), Some("800"));
        assert_eq!(record.column_value("validation_status").as_deref(), Some("INVALIDO"));
        assert_eq!(record.column_value("unknown"), None);
    }

    #[test]
    fn test_flag_codes() {
        assert_eq!(CheckFlag::from_code("correcto"), Some(CheckFlag::Correcto));
        assert_eq!(ValidationStatus::from_code("INVALIDO"), Some(ValidationStatus::Invalido));
        assert_eq!(ValidationStatus::from_code("PENDING"), None);
    }

    #[test]
    fn test_descriptor_is_valid() {
        let desc = MatrixRecord::descriptor();
        assert_eq!(desc.qualified_name(), "Data.Matrix");
        assert!(desc.validate().is_ok());
        assert!(desc.tracked("movement_amount").is_some());
    }
}
