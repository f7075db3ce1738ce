//! Repository implementations cho SQLite
//!
//! Every repository takes a `&mut SqliteConnection` so the same code runs on
//! a pooled connection or inside a transaction (`&mut *tx`).

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use chrono::{DateTime, Utc};
use recaudit_core::{ColumnChange, Customer, MatrixRecord, NewOperation, NewValidationError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

// ============================================================================
// Operation Log Repository
// ============================================================================

/// Repository cho operation_log table (append-only)
pub struct OperationLogRepo;

impl OperationLogRepo {
    /// Append one ledger entry, returning its log id
    pub async fn insert(
        conn: &mut SqliteConnection,
        op: &NewOperation,
        created_at: DateTime<Utc>,
    ) -> PersistenceResult<i64> {
        op.validate()?;

        let additional_info = op
            .additional_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            INSERT INTO operation_log (
                session_token, user_id, username, operation_type, schema_name, table_name,
                record_count, status, error_message, duration_ms, source_file, sheet_name,
                created_at, client_address, additional_info
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&op.attribution.session_token)
        .bind(op.attribution.user_id)
        .bind(&op.attribution.username)
        .bind(op.operation_type.as_str())
        .bind(&op.schema_name)
        .bind(&op.table_name)
        .bind(op.record_count)
        .bind(op.status.as_str())
        .bind(&op.error_message)
        .bind(op.duration_ms)
        .bind(&op.provenance.source_file)
        .bind(&op.provenance.sheet_name)
        .bind(created_at)
        .bind(&op.attribution.client_address)
        .bind(additional_info)
        .execute(&mut *conn)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Lấy entry theo log id
    pub async fn get_by_id(
        conn: &mut SqliteConnection,
        log_id: i64,
    ) -> PersistenceResult<OperationLogRow> {
        sqlx::query_as::<_, OperationLogRow>("SELECT * FROM operation_log WHERE log_id = ?")
            .bind(log_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("OperationLog", &log_id.to_string()))
    }

    /// Newest entries first
    pub async fn recent(
        conn: &mut SqliteConnection,
        limit: i64,
    ) -> PersistenceResult<Vec<OperationLogRow>> {
        let rows = sqlx::query_as::<_, OperationLogRow>(
            "SELECT * FROM operation_log ORDER BY log_id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Entries for one entity (`schema_name`, `table_name`), oldest first
    pub async fn get_by_entity(
        conn: &mut SqliteConnection,
        schema_name: &str,
        table_name: &str,
    ) -> PersistenceResult<Vec<OperationLogRow>> {
        let rows = sqlx::query_as::<_, OperationLogRow>(
            "SELECT * FROM operation_log WHERE schema_name = ? AND table_name = ? ORDER BY log_id",
        )
        .bind(schema_name)
        .bind(table_name)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Đếm entries
    pub async fn count(conn: &mut SqliteConnection) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM operation_log")
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Change Detail Repository
// ============================================================================

/// Repository cho change_details table
pub struct ChangeDetailRepo;

impl ChangeDetailRepo {
    pub async fn insert(
        conn: &mut SqliteConnection,
        log_id: i64,
        change: &ColumnChange,
    ) -> PersistenceResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO change_details (log_id, record_id, column_name, old_value, new_value, data_type)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log_id)
        .bind(&change.record_id)
        .bind(&change.column_name)
        .bind(&change.old_value)
        .bind(&change.new_value)
        .bind(change.data_type.as_str())
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Lấy tất cả changes của một ledger entry
    pub async fn get_by_log(
        conn: &mut SqliteConnection,
        log_id: i64,
    ) -> PersistenceResult<Vec<ChangeDetailRow>> {
        let rows = sqlx::query_as::<_, ChangeDetailRow>(
            "SELECT * FROM change_details WHERE log_id = ? ORDER BY detail_id",
        )
        .bind(log_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    pub async fn count(conn: &mut SqliteConnection) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM change_details")
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Validation Error Repository
// ============================================================================

/// Repository cho validation_errors table
pub struct ValidationErrorRepo;

impl ValidationErrorRepo {
    pub async fn insert(
        conn: &mut SqliteConnection,
        log_id: i64,
        error: &NewValidationError,
        created_at: DateTime<Utc>,
    ) -> PersistenceResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO validation_errors (
                log_id, row_number, column_name, error_type, error_description,
                invalid_value, expected_format, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log_id)
        .bind(error.row_number)
        .bind(&error.column_name)
        .bind(error.category.as_str())
        .bind(&error.description)
        .bind(&error.invalid_value)
        .bind(&error.expected_format)
        .bind(created_at)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_log(
        conn: &mut SqliteConnection,
        log_id: i64,
    ) -> PersistenceResult<Vec<ValidationErrorRow>> {
        let rows = sqlx::query_as::<_, ValidationErrorRow>(
            "SELECT * FROM validation_errors WHERE log_id = ? ORDER BY error_id",
        )
        .bind(log_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }
}

// ============================================================================
// Summary View Repository
// ============================================================================

/// Repository cho view audit_operation_summary
pub struct SummaryRepo;

impl SummaryRepo {
    pub async fn recent(
        conn: &mut SqliteConnection,
        limit: i64,
    ) -> PersistenceResult<Vec<OperationSummaryRow>> {
        let rows = sqlx::query_as::<_, OperationSummaryRow>(
            "SELECT * FROM audit_operation_summary ORDER BY log_id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    pub async fn get(
        conn: &mut SqliteConnection,
        log_id: i64,
    ) -> PersistenceResult<OperationSummaryRow> {
        sqlx::query_as::<_, OperationSummaryRow>(
            "SELECT * FROM audit_operation_summary WHERE log_id = ?",
        )
        .bind(log_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| PersistenceError::not_found("OperationSummary", &log_id.to_string()))
    }
}

// ============================================================================
// Reference Catalog Repository
// ============================================================================

/// Repository cho budget_lines và bank_accounts (read-only cho engine)
pub struct CatalogRepo;

impl CatalogRepo {
    /// Description of a budget line, `None` on miss
    pub async fn budget_line_description(
        conn: &mut SqliteConnection,
        code: &str,
    ) -> PersistenceResult<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT description FROM budget_lines WHERE code = ?")
                .bind(code.trim())
                .fetch_optional(&mut *conn)
                .await?;
        Ok(row.map(|r| r.0))
    }

    /// Display name of a bank account for a catalog (year, month), `None` on miss
    pub async fn bank_account_name(
        conn: &mut SqliteConnection,
        account_number: &str,
        year: i32,
        month: i32,
    ) -> PersistenceResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT display_name FROM bank_accounts WHERE account_number = ? AND year = ? AND month = ?",
        )
        .bind(account_number.trim())
        .bind(year)
        .bind(month)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.map(|r| r.0))
    }

    pub async fn upsert_budget_line(
        conn: &mut SqliteConnection,
        code: &str,
        description: &str,
    ) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO budget_lines (code, description) VALUES (?, ?)
            ON CONFLICT(code) DO UPDATE SET description = excluded.description
            "#,
        )
        .bind(code)
        .bind(description)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn upsert_bank_account(
        conn: &mut SqliteConnection,
        row: &BankAccountRow,
    ) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bank_accounts (account_number, year, month, display_name) VALUES (?, ?, ?, ?)
            ON CONFLICT(account_number, year, month) DO UPDATE SET display_name = excluded.display_name
            "#,
        )
        .bind(&row.account_number)
        .bind(row.year)
        .bind(row.month)
        .bind(&row.display_name)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn budget_lines(conn: &mut SqliteConnection) -> PersistenceResult<Vec<BudgetLineRow>> {
        let rows = sqlx::query_as::<_, BudgetLineRow>("SELECT * FROM budget_lines ORDER BY code")
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }
}

// ============================================================================
// Matrix Repository
// ============================================================================

/// Repository cho matrix_records table
pub struct MatrixRepo;

impl MatrixRepo {
    /// Insert a raw record, returning its row id
    pub async fn insert(
        conn: &mut SqliteConnection,
        record: &MatrixRecord,
    ) -> PersistenceResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO matrix_records (
                identity_key, period, record_date, payer_nit, payer_name, payee_nit, payee_name,
                movement_amount, identified_amount, budget_line_code, bank_account_number,
                packaging_id, document_id, source_file, sheet_name, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.identity_key)
        .bind(&record.period)
        .bind(&record.record_date)
        .bind(&record.payer_nit)
        .bind(&record.payer_name)
        .bind(&record.payee_nit)
        .bind(&record.payee_name)
        .bind(&record.movement_amount)
        .bind(&record.identified_amount)
        .bind(&record.budget_line_code)
        .bind(&record.bank_account_number)
        .bind(&record.packaging_id)
        .bind(&record.document_id)
        .bind(&record.source_file)
        .bind(&record.sheet_name)
        .bind(record.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(conn: &mut SqliteConnection, id: i64) -> PersistenceResult<MatrixRow> {
        sqlx::query_as::<_, MatrixRow>("SELECT * FROM matrix_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("MatrixRecord", &id.to_string()))
    }

    pub async fn find(conn: &mut SqliteConnection, id: i64) -> PersistenceResult<Option<MatrixRow>> {
        let row = sqlx::query_as::<_, MatrixRow>("SELECT * FROM matrix_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    /// Overwrite the upstream-supplied fields of an existing record
    pub async fn update_inputs(
        conn: &mut SqliteConnection,
        record: &MatrixRecord,
    ) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE matrix_records SET
                identity_key = ?, period = ?, record_date = ?, payer_nit = ?, payer_name = ?,
                payee_nit = ?, payee_name = ?, movement_amount = ?, identified_amount = ?,
                budget_line_code = ?, bank_account_number = ?, packaging_id = ?, document_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.identity_key)
        .bind(&record.period)
        .bind(&record.record_date)
        .bind(&record.payer_nit)
        .bind(&record.payer_name)
        .bind(&record.payee_nit)
        .bind(&record.payee_name)
        .bind(&record.movement_amount)
        .bind(&record.identified_amount)
        .bind(&record.budget_line_code)
        .bind(&record.bank_account_number)
        .bind(&record.packaging_id)
        .bind(&record.document_id)
        .bind(record.id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("MatrixRecord", &record.id.to_string()));
        }
        Ok(())
    }

    /// Persist the reconciliation-owned fields
    pub async fn update_derived(
        conn: &mut SqliteConnection,
        record: &MatrixRecord,
    ) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE matrix_records SET
                identity_key = ?, period = ?, budget_line_description = ?, bank_account_name = ?,
                captured_nit = ?, captured_amount = ?, nit_check = ?, amount_check = ?,
                document_check = ?, validation_status = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.identity_key)
        .bind(&record.period)
        .bind(&record.budget_line_description)
        .bind(&record.bank_account_name)
        .bind(&record.captured_nit)
        .bind(&record.captured_amount)
        .bind(record.nit_check.map(|f| f.as_str()))
        .bind(record.amount_check.map(|f| f.as_str()))
        .bind(record.document_check.map(|f| f.as_str()))
        .bind(record.validation_status.map(|s| s.as_str()))
        .bind(record.id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("MatrixRecord", &record.id.to_string()));
        }
        Ok(())
    }

    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> PersistenceResult<()> {
        let result = sqlx::query("DELETE FROM matrix_records WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("MatrixRecord", &id.to_string()));
        }
        Ok(())
    }

    /// Kiểm tra identity đã tồn tại chưa
    pub async fn identity_exists(
        conn: &mut SqliteConnection,
        identity_key: &str,
    ) -> PersistenceResult<bool> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM matrix_records WHERE identity_key = ?")
                .bind(identity_key)
                .fetch_one(&mut *conn)
                .await?;
        Ok(row.0 > 0)
    }

    pub async fn recent(conn: &mut SqliteConnection, limit: i64) -> PersistenceResult<Vec<MatrixRow>> {
        let rows = sqlx::query_as::<_, MatrixRow>(
            "SELECT * FROM matrix_records ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    pub async fn count(conn: &mut SqliteConnection) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM matrix_records")
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Customer Repository
// ============================================================================

/// Repository cho customers table
pub struct CustomerRepo;

impl CustomerRepo {
    pub async fn insert(conn: &mut SqliteConnection, customer: &Customer) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (
                code, company_name, contact_name, email, phone, address, city, country,
                credit_limit, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&customer.code)
        .bind(&customer.company_name)
        .bind(&customer.contact_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(&customer.city)
        .bind(&customer.country)
        .bind(customer.credit_limit.map(|d| d.to_string()))
        .bind(customer.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn find(
        conn: &mut SqliteConnection,
        code: &str,
    ) -> PersistenceResult<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers WHERE code = ?")
            .bind(code)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(Customer::try_from).transpose()
    }

    pub async fn update(conn: &mut SqliteConnection, customer: &Customer) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE customers SET
                company_name = ?, contact_name = ?, email = ?, phone = ?, address = ?,
                city = ?, country = ?, credit_limit = ?
            WHERE code = ?
            "#,
        )
        .bind(&customer.company_name)
        .bind(&customer.contact_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(&customer.city)
        .bind(&customer.country)
        .bind(customer.credit_limit.map(|d| d.to_string()))
        .bind(&customer.code)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Customer", &customer.code));
        }
        Ok(())
    }

    pub async fn delete(conn: &mut SqliteConnection, code: &str) -> PersistenceResult<()> {
        let result = sqlx::query("DELETE FROM customers WHERE code = ?")
            .bind(code)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Customer", code));
        }
        Ok(())
    }

    pub async fn get_all(conn: &mut SqliteConnection) -> PersistenceResult<Vec<Customer>> {
        let rows = sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers ORDER BY code")
            .fetch_all(&mut *conn)
            .await?;
        rows.into_iter().map(Customer::try_from).collect()
    }
}

// ============================================================================
// Monitored table helpers
// ============================================================================

/// Table-agnostic statements driven by an entity descriptor.
///
/// Table and column names come from trusted descriptors, never from row data.
pub struct MonitoredTableRepo;

impl MonitoredTableRepo {
    /// Set `modified_column = at` on every row whose key is in `keys`
    pub async fn stamp_modified(
        conn: &mut SqliteConnection,
        table: &str,
        key_column: &str,
        modified_column: &str,
        keys: &[String],
        at: DateTime<Utc>,
    ) -> PersistenceResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "UPDATE {} SET {} = ? WHERE {} IN ({})",
            table,
            modified_column,
            key_column,
            placeholders(keys.len())
        );
        let mut query = sqlx::query(&sql).bind(at);
        for key in keys {
            query = query.bind(key);
        }
        let result = query.execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }
}

// ============================================================================
// Database initialization
// ============================================================================

/// Khởi tạo database connection pool
pub async fn create_pool(database_url: &str) -> PersistenceResult<SqlitePool> {
    let pool = SqlitePool::connect(database_url).await?;
    Ok(pool)
}

/// Chạy migrations
pub async fn run_migrations(pool: &SqlitePool) -> PersistenceResult<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// Tạo database mới với schema
pub async fn init_database(database_url: &str) -> PersistenceResult<SqlitePool> {
    // Tạo file nếu chưa có
    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true),
    )
    .await?;

    // Run migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with schema applied.
///
/// The connection is never recycled, since closing it drops the database.
pub async fn init_memory_database() -> PersistenceResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recaudit_core::{
        Attribution, ColumnType, ErrorCategory, OperationStatus, OperationType, Provenance,
        RawMatrixRow,
    };
    use rust_decimal::Decimal;

    async fn memory_pool() -> SqlitePool {
        init_memory_database().await.unwrap()
    }

    fn insert_op() -> NewOperation {
        NewOperation::new(
            Attribution::user("auditor", Some("sess-1")),
            OperationType::Insert,
            "Data.Customers",
        )
        .record_count(2)
    }

    #[tokio::test]
    async fn test_operation_log_insert_and_get() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let op = insert_op()
            .provenance(Provenance::new("clientes.xlsx").with_sheet("Hoja1"))
            .additional_info(serde_json::json!({"chunk": 1}));
        let id = OperationLogRepo::insert(&mut conn, &op, Utc::now()).await.unwrap();

        let row = OperationLogRepo::get_by_id(&mut conn, id).await.unwrap();
        assert_eq!(row.username, "auditor");
        assert_eq!(row.session_token.as_deref(), Some("sess-1"));
        assert_eq!(row.operation_type().unwrap(), OperationType::Insert);
        assert_eq!(row.status().unwrap(), OperationStatus::Success);
        assert_eq!(row.entity_name(), "Data.Customers");
        assert_eq!(row.record_count, 2);
        assert_eq!(row.sheet_name.as_deref(), Some("Hoja1"));
        assert_eq!(row.additional_info().unwrap(), Some(serde_json::json!({"chunk": 1})));
    }

    #[tokio::test]
    async fn test_log_ids_are_monotonic() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let first = OperationLogRepo::insert(&mut conn, &insert_op(), Utc::now()).await.unwrap();
        let second = OperationLogRepo::insert(&mut conn, &insert_op(), Utc::now()).await.unwrap();
        assert!(second > first);
        assert_eq!(OperationLogRepo::count(&mut conn).await.unwrap(), 2);

        let recent = OperationLogRepo::recent(&mut conn, 1).await.unwrap();
        assert_eq!(recent[0].log_id, second);
    }

    #[tokio::test]
    async fn test_failed_without_message_is_rejected() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let op = insert_op().status(OperationStatus::Failed);
        let err = OperationLogRepo::insert(&mut conn, &op, Utc::now()).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Contract(_)));
        assert_eq!(OperationLogRepo::count(&mut conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ledger_is_append_only() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let id = OperationLogRepo::insert(&mut conn, &insert_op(), Utc::now()).await.unwrap();

        let update = sqlx::query("UPDATE operation_log SET record_count = 9 WHERE log_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM operation_log WHERE log_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await;
        assert!(delete.is_err());
    }

    #[tokio::test]
    async fn test_change_detail_requires_ledger_row() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let change = ColumnChange {
            record_id: "CUST006".to_string(),
            column_name: "email".to_string(),
            old_value: None,
            new_value: Some("a@b.com".to_string()),
            data_type: ColumnType::Text,
        };
        assert!(ChangeDetailRepo::insert(&mut conn, 999, &change).await.is_err());

        let id = OperationLogRepo::insert(&mut conn, &insert_op(), Utc::now()).await.unwrap();
        ChangeDetailRepo::insert(&mut conn, id, &change).await.unwrap();

        let details = ChangeDetailRepo::get_by_log(&mut conn, id).await.unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].data_type().unwrap(), ColumnType::Text);
        assert_eq!(details[0].old_value, None);
    }

    #[tokio::test]
    async fn test_summary_view_counts_validation_errors() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let op = NewOperation::new(Attribution::system(), OperationType::BulkInsert, "Data.Matrix")
            .record_count(1)
            .status(OperationStatus::Partial);
        let id = OperationLogRepo::insert(&mut conn, &op, Utc::now()).await.unwrap();

        let error = NewValidationError::new(ErrorCategory::Duplicate, "duplicate identity")
            .row(2)
            .column("identity_key")
            .value(Some("123".to_string()));
        ValidationErrorRepo::insert(&mut conn, id, &error, Utc::now()).await.unwrap();
        ValidationErrorRepo::insert(&mut conn, id, &error, Utc::now()).await.unwrap();

        let summary = SummaryRepo::get(&mut conn, id).await.unwrap();
        assert_eq!(summary.validation_error_count, 2);
        assert_eq!(summary.operation_label, "Bulk insert");
        assert_eq!(summary.status_label, "Partially applied");
        assert_eq!(summary.entity_name, "Data.Matrix");
        assert_eq!(summary.username, "SYSTEM");

        let errors = ValidationErrorRepo::get_by_log(&mut conn, id).await.unwrap();
        assert_eq!(errors[0].category().unwrap(), ErrorCategory::Duplicate);
        assert_eq!(errors[0].row_number, Some(2));
    }

    #[tokio::test]
    async fn test_catalog_lookups() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        CatalogRepo::upsert_budget_line(&mut conn, "BL-01", "Transferencias").await.unwrap();
        CatalogRepo::upsert_bank_account(
            &mut conn,
            &BankAccountRow {
                account_number: "123456".to_string(),
                year: 2024,
                month: 5,
                display_name: "Cuenta Recaudo".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(
            CatalogRepo::budget_line_description(&mut conn, " BL-01 ").await.unwrap(),
            Some("Transferencias".to_string())
        );
        assert_eq!(CatalogRepo::budget_line_description(&mut conn, "nope").await.unwrap(), None);
        assert_eq!(
            CatalogRepo::bank_account_name(&mut conn, "123456", 2024, 5).await.unwrap(),
            Some("Cuenta Recaudo".to_string())
        );
        assert_eq!(CatalogRepo::bank_account_name(&mut conn, "123456", 2024, 6).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_matrix_insert_update_and_identity_lookup() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let mut record = MatrixRecord::from_raw(RawMatrixRow {
            identity_key: Some("ABC".to_string()),
            payer_nit: Some("899999336".to_string()),
            ..Default::default()
        });
        record.id = MatrixRepo::insert(&mut conn, &record).await.unwrap();
        assert!(MatrixRepo::identity_exists(&mut conn, "ABC").await.unwrap());
        assert!(!MatrixRepo::identity_exists(&mut conn, "XYZ").await.unwrap());

        record.captured_nit = record.payer_nit.clone();
        MatrixRepo::update_derived(&mut conn, &record).await.unwrap();

        let loaded: MatrixRecord = MatrixRepo::get_by_id(&mut conn, record.id).await.unwrap().into();
        assert_eq!(loaded.captured_nit.as_deref(), Some("899999336"));

        MatrixRepo::delete(&mut conn, record.id).await.unwrap();
        let err = MatrixRepo::get_by_id(&mut conn, record.id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_customer_crud_and_stamp() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let customer = Customer::new("CUST006", "Acme Ltda")
            .with_credit_limit(Decimal::new(1500000, 2));
        CustomerRepo::insert(&mut conn, &customer).await.unwrap();

        let stamped = MonitoredTableRepo::stamp_modified(
            &mut conn,
            "customers",
            "code",
            "modified_at",
            &["CUST006".to_string(), "MISSING".to_string()],
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(stamped, 1);

        let loaded = CustomerRepo::find(&mut conn, "CUST006").await.unwrap().unwrap();
        assert_eq!(loaded.credit_limit, Some(Decimal::new(1500000, 2)));
        assert!(loaded.modified_at.is_some());

        CustomerRepo::delete(&mut conn, "CUST006").await.unwrap();
        assert!(CustomerRepo::find(&mut conn, "CUST006").await.unwrap().is_none());
        assert!(CustomerRepo::delete(&mut conn, "CUST006").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_init_database_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recaudit.db");
        let url = format!("sqlite:{}", path.display());

        let pool = init_database(&url).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        OperationLogRepo::insert(&mut conn, &insert_op(), Utc::now()).await.unwrap();
        drop(conn);
        pool.close().await;

        assert!(path.exists());

        // Re-running migrations on an existing file is a no-op
        let pool = init_database(&url).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(OperationLogRepo::count(&mut conn).await.unwrap(), 1);
    }
}
