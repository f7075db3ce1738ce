//! # Recaudit Persistence
//!
//! Persistence layer cho Recaudit - SQLite via sqlx.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Database                               │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────────┐ │
//! │  │ Audit ledger│    │  Monitored  │    │    Catalogs     │ │
//! │  │ + details   │    │   tables    │    │  (read-only)    │ │
//! │  └─────────────┘    └─────────────┘    └─────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recaudit_persistence::{Database, OperationLogRepo};
//!
//! let db = Database::init_with_migrations("sqlite:recaudit.db").await?;
//!
//! let mut conn = db.pool().acquire().await?;
//! let entries = OperationLogRepo::recent(&mut conn, 20).await?;
//! ```

pub mod error;
pub mod sqlite;

pub use error::{PersistenceError, PersistenceResult};
pub use sqlite::schema::{
    BankAccountRow, BudgetLineRow, ChangeDetailRow, CustomerRow, MatrixRow, OperationLogRow,
    OperationSummaryRow, ValidationErrorRow,
};
pub use sqlite::{
    init_database, init_memory_database, CatalogRepo, ChangeDetailRepo, CustomerRepo, MatrixRepo,
    MonitoredTableRepo, OperationLogRepo, SummaryRepo, ValidationErrorRepo,
};

use sqlx::SqlitePool;

/// Database facade
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to an existing database
    ///
    /// # Arguments
    /// * `db_url` - SQLite database URL (e.g., "sqlite:recaudit.db")
    pub async fn new(db_url: &str) -> PersistenceResult<Self> {
        let pool = sqlite::create_pool(db_url).await?;
        Ok(Self { pool })
    }

    /// Create the database if missing and apply migrations
    pub async fn init_with_migrations(db_url: &str) -> PersistenceResult<Self> {
        let pool = init_database(db_url).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database, used by tests
    pub async fn in_memory() -> PersistenceResult<Self> {
        let pool = init_memory_database().await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
