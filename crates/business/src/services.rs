//! Service wiring
//!
//! [`ServiceContext`] holds the pool and configuration and hands out the
//! engine components configured consistently.

use crate::capture::{CaptureMode, ChangeCapture};
use crate::config::EngineConfig;
use crate::error::{BusinessError, BusinessResult};
use crate::ingest::IngestService;
use crate::reconciler::{ReconcilePhase, ReconcileReport, Reconciler};
use crate::recorder::AuditRecorder;
use crate::table::{AuditedTable, CustomerStore, EntityStore, MatrixStore};
use recaudit_core::{Attribution, MatrixRecord};
use recaudit_persistence::Database;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Context for business operations - database access plus engine config
#[derive(Clone)]
pub struct ServiceContext {
    pool: SqlitePool,
    config: EngineConfig,
}

impl ServiceContext {
    pub fn new(db: &Database, config: EngineConfig) -> Self {
        Self::from_pool(db.pool().clone(), config)
    }

    pub fn from_pool(pool: SqlitePool, config: EngineConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn recorder(&self) -> AuditRecorder {
        AuditRecorder::new(self.config.audit.clone())
    }

    pub fn capture(&self, mode: CaptureMode) -> ChangeCapture {
        ChangeCapture::new(self.recorder(), mode)
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.config.reconcile.month_names)
    }

    /// `Data.Customers` behind the best-effort capture pipeline
    pub fn customers(&self) -> AuditedTable<CustomerStore> {
        AuditedTable::new(
            self.pool.clone(),
            CustomerStore::new(),
            self.capture(CaptureMode::BestEffort),
        )
    }

    /// `Data.Matrix` with the reconciler installed as write hook
    pub fn matrix(&self) -> AuditedTable<MatrixStore> {
        AuditedTable::new(
            self.pool.clone(),
            MatrixStore::new(),
            self.capture(CaptureMode::BestEffort),
        )
        .with_hook(Arc::new(self.reconciler()))
    }

    pub fn ingest(&self) -> IngestService {
        IngestService::new(
            self.pool.clone(),
            self.recorder(),
            self.reconciler(),
            self.config.ingest.clone(),
        )
    }

    /// Re-run reconciliation on a stored record. Changes to tracked derived
    /// columns are audited as an UPDATE.
    pub async fn reconcile_record(
        &self,
        attribution: &Attribution,
        id: i64,
    ) -> BusinessResult<ReconcileReport> {
        let store = MatrixStore::new();
        let mut tx = self.pool.begin().await?;

        let before = store
            .fetch(&mut *tx, &id.to_string())
            .await?
            .ok_or(BusinessError::RecordNotFound(id))?;
        let report = self
            .reconciler()
            .reconcile(&mut *tx, id, ReconcilePhase::Update)
            .await?;

        self.capture(CaptureMode::BestEffort)
            .capture_update::<MatrixRecord>(
                &mut *tx,
                attribution,
                store.descriptor(),
                &[before],
                &[report.record.clone()],
            )
            .await?;

        tx.commit().await?;
        Ok(report)
    }
}
