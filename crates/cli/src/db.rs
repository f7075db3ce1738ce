//! Database initialization and status

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Utc};
use recaudit_persistence::{
    BankAccountRow, CatalogRepo, CustomerRepo, Database, MatrixRepo, OperationLogRepo,
};
use std::path::Path;

fn db_url(db_path: &Path) -> String {
    format!("sqlite:{}", db_path.display())
}

/// Open an existing database, applying pending migrations
pub async fn open(db_path: &Path) -> Result<Database> {
    if !db_path.exists() {
        bail!(
            "Database not found at {:?}; run 'recaudit init' first",
            db_path
        );
    }
    Database::init_with_migrations(&db_url(db_path))
        .await
        .context("Failed to open database")
}

/// Create the database with schema, optionally with sample catalogs
pub async fn init_database(db_path: &Path, seed_catalogs: bool) -> Result<()> {
    let db = Database::init_with_migrations(&db_url(db_path))
        .await
        .context("Failed to initialize database")?;

    if seed_catalogs {
        let mut conn = db.pool().acquire().await?;
        seed(&mut conn).await?;
        println!("📚 Sample catalogs loaded");
    }

    db.pool().close().await;
    Ok(())
}

/// Show database status
pub async fn show_status(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        println!("❌ Database not found at {:?}", db_path);
        println!("   Run 'recaudit init' to create the database");
        return Ok(());
    }

    let db = Database::new(&db_url(db_path)).await?;
    let mut conn = db.pool().acquire().await?;

    println!("📊 Database Status");
    println!("   Path: {:?}", db_path);
    println!();

    let ledger = OperationLogRepo::count(&mut conn).await?;
    let records = MatrixRepo::count(&mut conn).await?;
    let customers = CustomerRepo::get_all(&mut conn).await?.len();
    let budget_lines = CatalogRepo::budget_lines(&mut conn).await?.len();

    println!("   Ledger entries:  {}", ledger);
    println!("   Matrix records:  {}", records);
    println!("   Customers:       {}", customers);
    println!("   Budget lines:    {}", budget_lines);

    drop(conn);
    db.pool().close().await;
    Ok(())
}

/// Sample reference data
async fn seed(conn: &mut sqlx::SqliteConnection) -> Result<()> {
    let budget_lines = [
        ("1101", "Recaudo impuesto predial"),
        ("1102", "Recaudo industria y comercio"),
        ("1201", "Transferencias del sistema general de participaciones"),
        ("1301", "Multas y sanciones"),
    ];
    for (code, description) in budget_lines {
        CatalogRepo::upsert_budget_line(conn, code, description).await?;
    }

    let accounts = [
        ("230-01234-5", "Cuenta recaudo principal"),
        ("230-06789-1", "Cuenta transferencias"),
    ];
    let year = Utc::now().year();
    for (account_number, display_name) in accounts {
        for month in 1..=12 {
            CatalogRepo::upsert_bank_account(
                conn,
                &BankAccountRow {
                    account_number: account_number.to_string(),
                    year,
                    month,
                    display_name: display_name.to_string(),
                },
            )
            .await?;
        }
    }
    Ok(())
}
