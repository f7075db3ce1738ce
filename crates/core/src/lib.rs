//! # Recaudit Core
//!
//! Domain types for the audit ledger and the Matrix reconciliation engine.
//! Nothing in this crate touches a database; persistence and orchestration
//! live in `recaudit-persistence` and `recaudit-business`.
//!
//! ## Layout
//!
//! ```text
//! attribution  ── who performed an operation (username, session, SYSTEM fallback)
//! operation    ── OperationType / OperationStatus / Provenance
//! audit        ── NewOperation, ColumnChange, NewValidationError, ErrorCategory
//! entity       ── EntityDescriptor, TrackedColumn, Tracked trait
//! diff         ── null-aware column diff for INSERT / UPDATE / DELETE
//! matrix       ── MatrixRecord, RawMatrixRow, check flags
//! reconcile    ── identity/period derivation, catalog period, validation flags
//! customer     ── Customer master rows (second monitored entity)
//! ```

pub mod attribution;
pub mod audit;
pub mod customer;
pub mod diff;
pub mod entity;
pub mod error;
pub mod matrix;
pub mod operation;
pub mod reconcile;

pub use attribution::{Attribution, IdentityProvider, StaticIdentity, SYSTEM_USER};
pub use audit::{ColumnChange, ErrorCategory, NewOperation, NewValidationError};
pub use customer::Customer;
pub use diff::{delete_changes, insert_changes, update_changes, values_differ};
pub use entity::{ColumnType, EntityDescriptor, Tracked, TrackedColumn};
pub use error::{CoreError, CoreResult};
pub use matrix::{is_blank, CheckFlag, MatrixRecord, RawMatrixRow, ValidationStatus};
pub use operation::{OperationStatus, OperationType, Provenance};
pub use reconcile::{
    catalog_period, check_amount, check_text, derive_identity, derive_period,
    effective_identity, parse_amount, parse_record_date, validate, MonthNames,
    ValidationFlags,
};
