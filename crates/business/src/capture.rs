//! Change-Capture Pipeline
//!
//! Translates monitored-entity mutations into Audit Recorder calls:
//! one ledger entry per batch, then the null-aware column diff.
//!
//! In [`CaptureMode::BestEffort`] audit failures are logged and swallowed so
//! the business mutation still commits. In [`CaptureMode::Transactional`]
//! they propagate and the caller rolls the unit of work back.

use crate::error::BusinessResult;
use crate::recorder::AuditRecorder;
use chrono::Utc;
use recaudit_core::{
    delete_changes, insert_changes, update_changes, Attribution, ColumnChange, EntityDescriptor,
    NewOperation, OperationType, Tracked,
};
use recaudit_persistence::MonitoredTableRepo;
use sqlx::SqliteConnection;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    #[default]
    BestEffort,
    Transactional,
}

#[derive(Debug, Clone)]
pub struct ChangeCapture {
    recorder: AuditRecorder,
    mode: CaptureMode,
}

impl ChangeCapture {
    pub fn new(recorder: AuditRecorder, mode: CaptureMode) -> Self {
        Self { recorder, mode }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn recorder(&self) -> &AuditRecorder {
        &self.recorder
    }

    /// Audit an INSERT batch. Returns the ledger id, or `None` when the batch
    /// was empty or a best-effort write failed.
    pub async fn capture_insert<T: Tracked>(
        &self,
        conn: &mut SqliteConnection,
        attribution: &Attribution,
        desc: &EntityDescriptor,
        records: &[T],
    ) -> BusinessResult<Option<i64>> {
        if records.is_empty() {
            return Ok(None);
        }
        let op = NewOperation::new(attribution.clone(), OperationType::Insert, &desc.qualified_name())
            .record_count(records.len() as i64);
        let changes = insert_changes(desc, records);
        let result = self.observe(conn, &op, &changes).await;
        self.settle(result, &op)
    }

    /// Audit an UPDATE batch and stamp the rows' last-modified column.
    pub async fn capture_update<T: Tracked>(
        &self,
        conn: &mut SqliteConnection,
        attribution: &Attribution,
        desc: &EntityDescriptor,
        old: &[T],
        new: &[T],
    ) -> BusinessResult<Option<i64>> {
        if new.is_empty() {
            return Ok(None);
        }
        let op = NewOperation::new(attribution.clone(), OperationType::Update, &desc.qualified_name())
            .record_count(new.len() as i64);
        let changes = update_changes(desc, old, new);
        let result = self.observe(conn, &op, &changes).await;
        let log_id = self.settle(result, &op)?;

        let keys: Vec<String> = new.iter().map(Tracked::record_key).collect();
        let stamped = self.stamp(conn, desc, &keys).await;
        self.settle(stamped, &op)?;

        Ok(log_id)
    }

    pub async fn capture_delete<T: Tracked>(
        &self,
        conn: &mut SqliteConnection,
        attribution: &Attribution,
        desc: &EntityDescriptor,
        records: &[T],
    ) -> BusinessResult<Option<i64>> {
        if records.is_empty() {
            return Ok(None);
        }
        let op = NewOperation::new(attribution.clone(), OperationType::Delete, &desc.qualified_name())
            .record_count(records.len() as i64);
        let changes = delete_changes(desc, records);
        let result = self.observe(conn, &op, &changes).await;
        self.settle(result, &op)
    }

    /// Ledger entry first, then its change details
    pub async fn observe(
        &self,
        conn: &mut SqliteConnection,
        op: &NewOperation,
        changes: &[ColumnChange],
    ) -> BusinessResult<i64> {
        let log_id = self.recorder.record_operation(conn, op).await?;
        self.recorder.record_changes(conn, log_id, changes).await?;
        Ok(log_id)
    }

    async fn stamp(
        &self,
        conn: &mut SqliteConnection,
        desc: &EntityDescriptor,
        keys: &[String],
    ) -> BusinessResult<()> {
        let Some(modified_column) = desc.modified_column.as_deref() else {
            return Ok(());
        };
        MonitoredTableRepo::stamp_modified(
            conn,
            &desc.table,
            &desc.key_column,
            modified_column,
            keys,
            Utc::now(),
        )
        .await?;
        Ok(())
    }

    fn settle<V>(&self, result: BusinessResult<V>, op: &NewOperation) -> BusinessResult<Option<V>> {
        match (result, self.mode) {
            (Ok(v), _) => Ok(Some(v)),
            (Err(e), CaptureMode::Transactional) => Err(e),
            (Err(e), CaptureMode::BestEffort) => {
                warn!(
                    operation = %op.operation_type,
                    entity = %op.qualified_name(),
                    error = %format!("{:#}", e),
                    "audit capture failed; mutation kept"
                );
                Ok(None)
            }
        }
    }
}
