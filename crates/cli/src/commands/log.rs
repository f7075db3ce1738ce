//! Ledger inspection commands

use anyhow::Result;
use recaudit_business::ServiceContext;
use recaudit_persistence::{ChangeDetailRepo, OperationLogRepo, SummaryRepo, ValidationErrorRepo};

use crate::LogAction;

pub async fn handle(ctx: &ServiceContext, action: LogAction) -> Result<()> {
    let mut conn = ctx.pool().acquire().await?;

    match action {
        LogAction::List { limit } => {
            let rows = SummaryRepo::recent(&mut conn, limit).await?;
            if rows.is_empty() {
                println!("No ledger entries.");
                return Ok(());
            }

            println!(
                "{:>6}  {:<20}  {:<12}  {:<12}  {:<18}  {:>7}  {:<18}  {:>6}",
                "ID", "When", "User", "Operation", "Entity", "Records", "Status", "Errors"
            );
            for row in rows {
                println!(
                    "{:>6}  {:<20}  {:<12}  {:<12}  {:<18}  {:>7}  {:<18}  {:>6}",
                    row.log_id,
                    row.created_at.format("%Y-%m-%d %H:%M:%S"),
                    row.username,
                    row.operation_label,
                    row.entity_name,
                    row.record_count,
                    row.status_label,
                    row.validation_error_count
                );
            }
        }

        LogAction::Show { id } => {
            let entry = OperationLogRepo::get_by_id(&mut conn, id).await?;
            println!("📒 Ledger entry #{}", entry.log_id);
            println!("   When:      {}", entry.created_at);
            println!(
                "   User:      {} (session {})",
                entry.username,
                entry.session_token.as_deref().unwrap_or("-")
            );
            println!("   Operation: {} on {}", entry.operation_type()?, entry.entity_name());
            println!("   Records:   {}", entry.record_count);
            println!("   Status:    {}", entry.status()?.label());
            if let Some(error) = &entry.error_message {
                println!("   Error:     {}", error);
            }
            if let Some(ms) = entry.duration_ms {
                println!("   Duration:  {} ms", ms);
            }
            if let Some(source) = &entry.source_file {
                println!(
                    "   Source:    {} [{}]",
                    source,
                    entry.sheet_name.as_deref().unwrap_or("-")
                );
            }
            if let Some(info) = entry.additional_info()? {
                println!("   Info:      {}", info);
            }

            let details = ChangeDetailRepo::get_by_log(&mut conn, id).await?;
            if !details.is_empty() {
                println!("\n--- Changes ---");
                for d in details {
                    println!(
                        "   [{}] {} ({}): {} -> {}",
                        d.record_id,
                        d.column_name,
                        d.data_type,
                        d.old_value.as_deref().unwrap_or("NULL"),
                        d.new_value.as_deref().unwrap_or("NULL")
                    );
                }
            }

            let errors = ValidationErrorRepo::get_by_log(&mut conn, id).await?;
            if !errors.is_empty() {
                println!("\n--- Validation errors ---");
                for e in errors {
                    println!(
                        "   row {} {} [{}] {}{}",
                        e.row_number.map(|r| r.to_string()).unwrap_or_else(|| "-".into()),
                        e.column_name.as_deref().unwrap_or("-"),
                        e.error_type,
                        e.error_description,
                        e.expected_format
                            .as_deref()
                            .map(|f| format!(" (expected {})", f))
                            .unwrap_or_default()
                    );
                }
            }
        }
    }

    Ok(())
}
