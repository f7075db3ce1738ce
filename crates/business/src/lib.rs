//! # Recaudit Business
//!
//! Audit Recorder, Change-Capture Pipeline, Reconciliation Engine and bulk
//! ingestion, wired over the SQLite persistence layer.
//!
//! ```text
//! upstream rows ─► IngestService ─► MatrixRepo ─► Reconciler ─► ChangeCapture ─► AuditRecorder
//! business call ─► AuditedTable ─► EntityStore ─► WriteHook  ─► ChangeCapture ─► AuditRecorder
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod ingest;
pub mod reconciler;
pub mod recorder;
pub mod services;
pub mod table;

pub use capture::{CaptureMode, ChangeCapture};
pub use config::{AuditConfig, EngineConfig, IngestConfig, ReconcileConfig};
pub use error::{BusinessError, BusinessResult};
pub use ingest::{IngestOutcome, IngestService};
pub use reconciler::{EnrichmentMiss, MalformedInput, ReconcilePhase, ReconcileReport, Reconciler};
pub use recorder::AuditRecorder;
pub use services::ServiceContext;
pub use table::{AuditedTable, CustomerStore, EntityStore, MatrixStore, WriteHook};
