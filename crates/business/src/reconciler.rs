//! Reconciliation Engine
//!
//! Runs on a Matrix record right after it was written, reading it back by
//! primary key. Phases run strictly in order:
//!
//! 1. derivation (insert only): identity key and period label when blank
//! 2. enrichment: budget-line description and bank-account name (left joins)
//! 3. validation: NIT, amount and document checks plus the composite flag
//!
//! The pass-through fields are then overwritten and the derived fields
//! persisted. Re-running on unchanged inputs and catalogs is a no-op.

use crate::error::{BusinessError, BusinessResult};
use crate::table::WriteHook;
use anyhow::Context;
use async_trait::async_trait;
use recaudit_core::reconcile::{AMOUNT_FORMAT_HINT, DATE_FORMAT_HINT};
use recaudit_core::{
    catalog_period, derive_identity, derive_period, is_blank, parse_amount, parse_record_date,
    validate, ErrorCategory, MatrixRecord, MonthNames, NewValidationError, OperationType,
    ValidationFlags,
};
use recaudit_persistence::{CatalogRepo, MatrixRepo};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePhase {
    /// Derivation, enrichment and validation
    Insert,
    /// Enrichment and validation only
    Update,
}

/// Reference catalog that had no entry for a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentMiss {
    pub catalog: &'static str,
    pub key: String,
}

/// Input value that could not be parsed; the derived field it feeds stays unset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedInput {
    pub column: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl MalformedInput {
    pub fn to_validation_error(&self, row_number: Option<i64>) -> NewValidationError {
        let error = NewValidationError::new(
            ErrorCategory::DataType,
            format!("{} has an unparseable value", self.column),
        )
        .column(self.column)
        .value(Some(self.value.clone()))
        .expected(self.expected);
        match row_number {
            Some(row) => error.row(row),
            None => error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub record_id: i64,
    pub identity_key: Option<String>,
    pub period: Option<String>,
    pub flags: ValidationFlags,
    pub enrichment_misses: Vec<EnrichmentMiss>,
    pub malformed: Vec<MalformedInput>,
    /// The record as persisted
    pub record: MatrixRecord,
}

impl ReconcileReport {
    /// BUSINESS_RULE errors for every INCORRECTO field check
    pub fn rule_violations(&self, row_number: Option<i64>) -> Vec<NewValidationError> {
        self.flags
            .failures()
            .into_iter()
            .map(|(check, _)| {
                let (left, right) = compared_columns(check);
                let error = NewValidationError::new(
                    ErrorCategory::BusinessRule,
                    format!("{} does not match {}", left, right),
                )
                .column(check)
                .value(Some(format!(
                    "{} / {}",
                    self.record_value(left).unwrap_or_default(),
                    self.record_value(right).unwrap_or_default()
                )));
                match row_number {
                    Some(row) => error.row(row),
                    None => error,
                }
            })
            .collect()
    }

    fn record_value(&self, column: &str) -> Option<String> {
        recaudit_core::Tracked::column_value(&self.record, column)
    }
}

fn compared_columns(check: &str) -> (&'static str, &'static str) {
    match check {
        "nit_check" => ("payer_nit", "payee_nit"),
        "amount_check" => ("movement_amount", "identified_amount"),
        _ => ("packaging_id", "document_id"),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    month_names: MonthNames,
}

impl Reconciler {
    pub fn new(month_names: MonthNames) -> Self {
        Self { month_names }
    }

    /// Reconcile one record in place and persist its derived fields
    pub async fn reconcile(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        phase: ReconcilePhase,
    ) -> BusinessResult<ReconcileReport> {
        let mut record: MatrixRecord = MatrixRepo::find(conn, id)
            .await?
            .ok_or(BusinessError::RecordNotFound(id))?
            .into();

        let mut malformed = Vec::new();
        let date = match record.record_date.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                let parsed = parse_record_date(raw);
                if parsed.is_none() {
                    malformed.push(MalformedInput {
                        column: "record_date",
                        value: raw.to_string(),
                        expected: DATE_FORMAT_HINT,
                    });
                }
                parsed
            }
            _ => None,
        };
        for (column, value) in [
            ("movement_amount", record.movement_amount.as_deref()),
            ("identified_amount", record.identified_amount.as_deref()),
        ] {
            if let Some(raw) = value.filter(|v| !v.trim().is_empty()) {
                if parse_amount(raw).is_none() {
                    malformed.push(MalformedInput {
                        column,
                        value: raw.to_string(),
                        expected: AMOUNT_FORMAT_HINT,
                    });
                }
            }
        }

        // === Derivation ===
        if phase == ReconcilePhase::Insert {
            if is_blank(record.identity_key.as_deref()) {
                record.identity_key =
                    derive_identity(record.payer_nit.as_deref(), record.packaging_id.as_deref());
            }
            if is_blank(record.period.as_deref()) {
                record.period = derive_period(record.record_date.as_deref(), self.month_names);
            }
        }

        // === Enrichment ===
        let mut misses = Vec::new();
        record.budget_line_description = match record.budget_line_code.as_deref() {
            Some(code) if !code.trim().is_empty() => {
                let found = CatalogRepo::budget_line_description(conn, code)
                    .await
                    .context("Budget line lookup failed")?;
                if found.is_none() {
                    misses.push(EnrichmentMiss {
                        catalog: "budget_lines",
                        key: code.trim().to_string(),
                    });
                }
                found
            }
            _ => None,
        };

        record.bank_account_name = match (record.bank_account_number.as_deref(), date) {
            (Some(account), Some(date)) if !account.trim().is_empty() => {
                let (year, month) = catalog_period(date);
                let found = CatalogRepo::bank_account_name(conn, account, year, month)
                    .await
                    .context("Bank account lookup failed")?;
                if found.is_none() {
                    misses.push(EnrichmentMiss {
                        catalog: "bank_accounts",
                        key: format!("{}@{}-{:02}", account.trim(), year, month),
                    });
                }
                found
            }
            _ => None,
        };

        for miss in &misses {
            debug!(record_id = id, catalog = miss.catalog, key = %miss.key, "catalog miss");
        }

        // === Validation ===
        let flags = validate(&record);
        flags.apply(&mut record);

        // === Pass-through ===
        record.captured_nit = record.payer_nit.clone();
        record.captured_amount = record.movement_amount.clone();

        MatrixRepo::update_derived(conn, &record)
            .await
            .with_context(|| format!("Failed to persist reconciliation of record {}", id))?;

        debug!(
            record_id = id,
            identity = ?record.identity_key,
            status = %flags.validation_status,
            "record reconciled"
        );

        Ok(ReconcileReport {
            record_id: id,
            identity_key: record.identity_key.clone(),
            period: record.period.clone(),
            flags,
            enrichment_misses: misses,
            malformed,
            record,
        })
    }
}

#[async_trait]
impl WriteHook for Reconciler {
    fn name(&self) -> &str {
        "reconciler"
    }

    async fn after_write(
        &self,
        conn: &mut SqliteConnection,
        operation: OperationType,
        keys: &[String],
    ) -> BusinessResult<()> {
        let phase = match operation {
            OperationType::Insert | OperationType::BulkInsert => ReconcilePhase::Insert,
            OperationType::Update => ReconcilePhase::Update,
            OperationType::Delete | OperationType::Select => return Ok(()),
        };
        for key in keys {
            let id: i64 = key
                .trim()
                .parse()
                .map_err(|_| BusinessError::invalid_key("Data.Matrix", key))?;
            self.reconcile(conn, id, phase).await?;
        }
        Ok(())
    }
}
