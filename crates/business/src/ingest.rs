//! Bulk ingestion of Matrix rows
//!
//! Input is split into chunks of `max_rows_per_batch`. Each chunk is one
//! transaction covering the raw inserts, reconciliation and the audit
//! writes, and yields one BULK_INSERT ledger entry. A failed chunk is rolled
//! back and a FAILED entry is written in a fresh unit of work.

use crate::capture::{CaptureMode, ChangeCapture};
use crate::config::IngestConfig;
use crate::error::BusinessResult;
use crate::reconciler::{ReconcilePhase, Reconciler};
use crate::recorder::AuditRecorder;
use recaudit_core::{
    effective_identity, insert_changes, Attribution, ErrorCategory, MatrixRecord, NewOperation,
    NewValidationError, OperationStatus, OperationType, Provenance, RawMatrixRow,
};
use recaudit_persistence::MatrixRepo;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{error, info};

/// Result of one chunk
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    /// Ledger entry written for the chunk. `None` when a failed chunk's
    /// FAILED entry could not be written either.
    pub log_id: Option<i64>,
    pub status: OperationStatus,
    pub rows_received: usize,
    pub rows_inserted: usize,
    pub duplicates_skipped: usize,
    pub validation_errors: usize,
    pub record_ids: Vec<i64>,
    pub error: Option<String>,
}

impl IngestOutcome {
    pub fn is_failed(&self) -> bool {
        self.status == OperationStatus::Failed
    }
}

pub struct IngestService {
    pool: SqlitePool,
    capture: ChangeCapture,
    reconciler: Reconciler,
    config: IngestConfig,
}

impl IngestService {
    pub fn new(
        pool: SqlitePool,
        recorder: AuditRecorder,
        reconciler: Reconciler,
        config: IngestConfig,
    ) -> Self {
        Self {
            pool,
            capture: ChangeCapture::new(recorder, CaptureMode::Transactional),
            reconciler,
            config,
        }
    }

    /// Ingest already-shaped rows. One outcome per chunk; empty input writes nothing.
    pub async fn ingest(
        &self,
        attribution: &Attribution,
        provenance: &Provenance,
        rows: Vec<RawMatrixRow>,
    ) -> BusinessResult<Vec<IngestOutcome>> {
        let chunk_size = self.config.max_rows_per_batch.max(1);
        let mut outcomes = Vec::new();

        for (index, chunk) in rows.chunks(chunk_size).enumerate() {
            let first_row = index * chunk_size + 1;
            let started = Instant::now();

            match self.ingest_chunk(attribution, provenance, chunk, first_row, started).await {
                Ok(outcome) => {
                    info!(
                        log_id = ?outcome.log_id,
                        inserted = outcome.rows_inserted,
                        skipped = outcome.duplicates_skipped,
                        status = %outcome.status,
                        "ingest chunk committed"
                    );
                    outcomes.push(outcome);
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    error!(first_row, error = %message, "ingest chunk rolled back");
                    let log_id = match self
                        .record_failure(attribution, provenance, &message, chunk.len(), started)
                        .await
                    {
                        Ok(log_id) => Some(log_id),
                        Err(e) => {
                            error!(
                                first_row,
                                error = %format!("{:#}", e),
                                "failed to record FAILED entry"
                            );
                            None
                        }
                    };
                    outcomes.push(IngestOutcome {
                        log_id,
                        status: OperationStatus::Failed,
                        rows_received: chunk.len(),
                        rows_inserted: 0,
                        duplicates_skipped: 0,
                        validation_errors: 0,
                        record_ids: Vec::new(),
                        error: Some(message),
                    });
                }
            }
        }

        Ok(outcomes)
    }

    async fn ingest_chunk(
        &self,
        attribution: &Attribution,
        provenance: &Provenance,
        chunk: &[RawMatrixRow],
        first_row: usize,
        started: Instant,
    ) -> BusinessResult<IngestOutcome> {
        let desc = MatrixRecord::descriptor();
        let mut tx = self.pool.begin().await?;

        let mut seen = HashSet::new();
        let mut inserted = Vec::new();
        let mut errors = Vec::new();
        let mut duplicates = 0usize;

        for (offset, raw) in chunk.iter().enumerate() {
            let row_number = (first_row + offset) as i64;
            let mut record = MatrixRecord::from_raw(raw.clone());
            record.source_file = provenance.source_file.clone();
            record.sheet_name = provenance.sheet_name.clone();

            if self.config.skip_duplicates {
                if let Some(identity) = effective_identity(&record) {
                    let exists = !seen.insert(identity.clone())
                        || MatrixRepo::identity_exists(&mut *tx, &identity).await?;
                    if exists {
                        duplicates += 1;
                        errors.push(
                            NewValidationError::new(
                                ErrorCategory::Duplicate,
                                "Row skipped: identity already ingested",
                            )
                            .row(row_number)
                            .column("identity_key")
                            .value(Some(identity)),
                        );
                        continue;
                    }
                }
            }

            let id = MatrixRepo::insert(&mut *tx, &record).await?;
            let report = self
                .reconciler
                .reconcile(&mut *tx, id, ReconcilePhase::Insert)
                .await?;

            errors.extend(
                report
                    .malformed
                    .iter()
                    .map(|m| m.to_validation_error(Some(row_number))),
            );
            errors.extend(report.rule_violations(Some(row_number)));
            inserted.push(report.record);
        }

        let status = if duplicates > 0 {
            OperationStatus::Partial
        } else {
            OperationStatus::Success
        };
        let mut op = NewOperation::new(
            attribution.clone(),
            OperationType::BulkInsert,
            &desc.qualified_name(),
        )
        .record_count(inserted.len() as i64)
        .status(status)
        .provenance(provenance.clone())
        .duration_ms(started.elapsed().as_millis() as i64)
        .additional_info(serde_json::json!({
            "first_row": first_row,
            "rows_received": chunk.len(),
            "duplicates_skipped": duplicates,
        }));
        if duplicates > 0 {
            op = op.error_message(format!("{} duplicate rows skipped", duplicates));
        }

        let changes = insert_changes(&desc, &inserted);
        let log_id = self.capture.observe(&mut *tx, &op, &changes).await?;
        for error in &errors {
            self.capture
                .recorder()
                .record_validation_error(&mut *tx, log_id, error)
                .await?;
        }

        tx.commit().await?;

        Ok(IngestOutcome {
            log_id: Some(log_id),
            status,
            rows_received: chunk.len(),
            rows_inserted: inserted.len(),
            duplicates_skipped: duplicates,
            validation_errors: errors.len(),
            record_ids: inserted.iter().map(|r| r.id).collect(),
            error: None,
        })
    }

    /// FAILED entry for a rolled-back chunk, on its own connection
    async fn record_failure(
        &self,
        attribution: &Attribution,
        provenance: &Provenance,
        message: &str,
        rows_received: usize,
        started: Instant,
    ) -> BusinessResult<i64> {
        let op = NewOperation::new(
            attribution.clone(),
            OperationType::BulkInsert,
            &MatrixRecord::descriptor().qualified_name(),
        )
        .failed(message)
        .record_count(0)
        .provenance(provenance.clone())
        .duration_ms(started.elapsed().as_millis() as i64)
        .additional_info(serde_json::json!({ "rows_received": rows_received }));

        let mut conn = self.pool.acquire().await?;
        self.capture.recorder().record_operation(&mut conn, &op).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recaudit_persistence::{init_memory_database, OperationLogRepo, ValidationErrorRepo};

    fn row(payer: &str, packaging: &str) -> RawMatrixRow {
        RawMatrixRow {
            record_date: Some("2024-06-15".to_string()),
            payer_nit: Some(payer.to_string()),
            payee_nit: Some(payer.to_string()),
            movement_amount: Some("100".to_string()),
            identified_amount: Some("100".to_string()),
            packaging_id: Some(packaging.to_string()),
            document_id: Some(packaging.to_string()),
            ..Default::default()
        }
    }

    fn service(pool: SqlitePool, max_rows_per_batch: usize) -> IngestService {
        IngestService::new(
            pool,
            AuditRecorder::default(),
            Reconciler::default(),
            IngestConfig {
                max_rows_per_batch,
                skip_duplicates: true,
            },
        )
    }

    #[tokio::test]
    async fn test_empty_input_writes_nothing() {
        let pool = init_memory_database().await.unwrap();
        let outcomes = service(pool.clone(), 10)
            .ingest(&Attribution::system(), &Provenance::default(), Vec::new())
            .await
            .unwrap();

        assert!(outcomes.is_empty());
        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(OperationLogRepo::count(&mut conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_chunks_get_their_own_entries() {
        let pool = init_memory_database().await.unwrap();
        let rows = (0..5).map(|i| row("900", &format!("P{}", i))).collect();

        let outcomes = service(pool.clone(), 2)
            .ingest(&Attribution::user("loader", None), &Provenance::new("matriz.xlsx"), rows)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(
            outcomes.iter().map(|o| o.rows_inserted).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        assert!(outcomes.iter().all(|o| o.status == OperationStatus::Success));

        let mut conn = pool.acquire().await.unwrap();
        let entry = OperationLogRepo::get_by_id(&mut conn, outcomes[2].log_id.unwrap()).await.unwrap();
        assert_eq!(entry.operation_type().unwrap(), OperationType::BulkInsert);
        assert_eq!(entry.source_file.as_deref(), Some("matriz.xlsx"));
        assert!(entry.duration_ms.is_some());
    }

    #[tokio::test]
    async fn test_duplicates_make_chunk_partial() {
        let pool = init_memory_database().await.unwrap();
        let svc = service(pool.clone(), 100);

        svc.ingest(&Attribution::system(), &Provenance::default(), vec![row("900", "P1")])
            .await
            .unwrap();
        let outcomes = svc
            .ingest(
                &Attribution::system(),
                &Provenance::default(),
                vec![row("900", "P1"), row("900", "P2"), row("900", "P2")],
            )
            .await
            .unwrap();

        let outcome = &outcomes[0];
        assert_eq!(outcome.status, OperationStatus::Partial);
        assert_eq!(outcome.rows_inserted, 1);
        assert_eq!(outcome.duplicates_skipped, 2);

        let mut conn = pool.acquire().await.unwrap();
        let errors = ValidationErrorRepo::get_by_log(&mut conn, outcome.log_id.unwrap()).await.unwrap();
        let rows: Vec<_> = errors.iter().map(|e| e.row_number).collect();
        assert_eq!(rows, vec![Some(1), Some(3)]);
        assert!(errors.iter().all(|e| e.error_type == "DUPLICATE"));
    }

    #[tokio::test]
    async fn test_failed_chunk_rolls_back() {
        let pool = init_memory_database().await.unwrap();
        sqlx::query(
            "CREATE TRIGGER reject_boom BEFORE INSERT ON matrix_records \
             WHEN NEW.payer_nit = 'BOOM' BEGIN SELECT RAISE(ABORT, 'rejected row'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let outcomes = service(pool.clone(), 10)
            .ingest(
                &Attribution::system(),
                &Provenance::default(),
                vec![row("900", "P1"), row("BOOM", "P2")],
            )
            .await
            .unwrap();

        let outcome = &outcomes[0];
        assert!(outcome.is_failed());
        assert!(outcome.error.as_deref().unwrap().contains("rejected row"));

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(MatrixRepo::count(&mut conn).await.unwrap(), 0);
        let entry = OperationLogRepo::get_by_id(&mut conn, outcome.log_id.unwrap()).await.unwrap();
        assert_eq!(entry.record_count, 0);
        assert!(entry.error_message.is_some());
        assert_eq!(OperationLogRepo::count(&mut conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unrecorded_failure_keeps_committed_outcomes() {
        let pool = init_memory_database().await.unwrap();
        sqlx::query(
            "CREATE TRIGGER reject_boom BEFORE INSERT ON matrix_records \
             WHEN NEW.payer_nit = 'BOOM' BEGIN SELECT RAISE(ABORT, 'rejected row'); END",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TRIGGER ledger_rejects_failed BEFORE INSERT ON operation_log \
             WHEN NEW.status = 'FAILED' BEGIN SELECT RAISE(ABORT, 'ledger offline'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let outcomes = service(pool.clone(), 1)
            .ingest(
                &Attribution::system(),
                &Provenance::default(),
                vec![row("900", "P1"), row("BOOM", "P2")],
            )
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].status, OperationStatus::Success);
        assert!(outcomes[0].log_id.is_some());
        assert!(outcomes[1].is_failed());
        assert_eq!(outcomes[1].log_id, None);

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(MatrixRepo::count(&mut conn).await.unwrap(), 1);
        assert_eq!(OperationLogRepo::count(&mut conn).await.unwrap(), 1);
    }
}
