//! Audit Recorder
//!
//! Writes ledger entries, column-level change details and validation errors.
//! The ledger row is written first and its id handed back, so detail writes
//! can reference it; a failed detail write never removes the ledger row.

use crate::config::AuditConfig;
use crate::error::BusinessResult;
use anyhow::Context;
use chrono::Utc;
use recaudit_core::{ColumnChange, NewOperation, NewValidationError};
use recaudit_persistence::{ChangeDetailRepo, OperationLogRepo, ValidationErrorRepo};
use sqlx::SqliteConnection;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct AuditRecorder {
    config: AuditConfig,
}

impl AuditRecorder {
    pub fn new(config: AuditConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Append one ledger entry and return its log id
    pub async fn record_operation(
        &self,
        conn: &mut SqliteConnection,
        op: &NewOperation,
    ) -> BusinessResult<i64> {
        let log_id = OperationLogRepo::insert(conn, op, Utc::now())
            .await
            .with_context(|| format!("Failed to record {} on {}", op.operation_type, op.qualified_name()))?;

        info!(
            log_id,
            user = %op.attribution.username,
            operation = %op.operation_type,
            entity = %op.qualified_name(),
            records = op.record_count,
            status = %op.status,
            "operation recorded"
        );
        Ok(log_id)
    }

    /// Write one change detail. No-op when data-change logging is disabled.
    pub async fn record_change(
        &self,
        conn: &mut SqliteConnection,
        log_id: i64,
        change: &ColumnChange,
    ) -> BusinessResult<()> {
        if !self.config.log_data_changes {
            return Ok(());
        }

        ChangeDetailRepo::insert(conn, log_id, change)
            .await
            .with_context(|| {
                format!(
                    "Failed to record change of {}.{} for log {}",
                    change.record_id, change.column_name, log_id
                )
            })?;

        if self.config.detailed_logging {
            debug!(
                log_id,
                record = %change.record_id,
                column = %change.column_name,
                old = ?change.old_value,
                new = ?change.new_value,
                "column change"
            );
        }
        Ok(())
    }

    /// Write every change in order, stopping at the first failure.
    /// Returns the number of detail rows written.
    pub async fn record_changes(
        &self,
        conn: &mut SqliteConnection,
        log_id: i64,
        changes: &[ColumnChange],
    ) -> BusinessResult<usize> {
        if !self.config.log_data_changes {
            return Ok(0);
        }
        for change in changes {
            self.record_change(conn, log_id, change).await?;
        }
        Ok(changes.len())
    }

    pub async fn record_validation_error(
        &self,
        conn: &mut SqliteConnection,
        log_id: i64,
        error: &NewValidationError,
    ) -> BusinessResult<()> {
        ValidationErrorRepo::insert(conn, log_id, error, Utc::now())
            .await
            .with_context(|| format!("Failed to record validation error for log {}", log_id))?;

        debug!(
            log_id,
            row = ?error.row_number,
            column = ?error.column_name,
            category = %error.category,
            "validation error recorded"
        );
        Ok(())
    }
}
