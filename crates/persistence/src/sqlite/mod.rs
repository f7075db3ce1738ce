//! SQLite persistence module
//!
//! Repository pattern cho SQLite database access.

pub mod repos;
pub mod schema;

pub use repos::{
    create_pool, init_database, init_memory_database, run_migrations, CatalogRepo,
    ChangeDetailRepo, CustomerRepo, MatrixRepo, MonitoredTableRepo, OperationLogRepo, SummaryRepo,
    ValidationErrorRepo,
};
pub use schema::{
    BankAccountRow, BudgetLineRow, ChangeDetailRow, CustomerRow, MatrixRow, OperationLogRow,
    OperationSummaryRow, ValidationErrorRow,
};
