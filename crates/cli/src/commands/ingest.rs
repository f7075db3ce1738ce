//! Ingest and Reconcile commands

use anyhow::{Context, Result};
use recaudit_business::ServiceContext;
use recaudit_core::{Attribution, Provenance, RawMatrixRow};
use std::fs;
use std::path::Path;

/// Bulk-ingest a JSON array of Matrix rows
pub async fn ingest(
    ctx: &ServiceContext,
    attribution: &Attribution,
    file: &Path,
    source_file: Option<String>,
    sheet: Option<String>,
) -> Result<()> {
    let content =
        fs::read_to_string(file).with_context(|| format!("Failed to read {:?}", file))?;
    let rows: Vec<RawMatrixRow> =
        serde_json::from_str(&content).with_context(|| format!("Invalid rows in {:?}", file))?;

    let source = source_file.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string())
    });
    let mut provenance = Provenance::new(source);
    if let Some(sheet) = sheet {
        provenance = provenance.with_sheet(sheet);
    }

    println!("📥 Ingesting {} rows as {}", rows.len(), attribution);
    let outcomes = ctx.ingest().ingest(attribution, &provenance, rows).await?;

    if outcomes.is_empty() {
        println!("   Nothing to ingest.");
        return Ok(());
    }

    for outcome in &outcomes {
        let icon = if outcome.is_failed() { "❌" } else { "✅" };
        let log = outcome
            .log_id
            .map(|id| format!("#{}", id))
            .unwrap_or_else(|| "(not recorded)".to_string());
        println!(
            "{} log {} {}: {} inserted, {} duplicates, {} validation errors",
            icon,
            log,
            outcome.status.label(),
            outcome.rows_inserted,
            outcome.duplicates_skipped,
            outcome.validation_errors
        );
        if let Some(error) = &outcome.error {
            println!("   Error: {}", error);
        }
    }
    Ok(())
}

/// Re-run reconciliation on one record and print the report
pub async fn reconcile(ctx: &ServiceContext, attribution: &Attribution, id: i64) -> Result<()> {
    let report = ctx.reconcile_record(attribution, id).await?;
    let record = &report.record;

    println!("🔁 Record #{}", report.record_id);
    println!("   Identity:        {}", report.identity_key.as_deref().unwrap_or("-"));
    println!("   Period:          {}", report.period.as_deref().unwrap_or("-"));
    println!(
        "   Budget line:     {}",
        record.budget_line_description.as_deref().unwrap_or("-")
    );
    println!("   Bank account:    {}", record.bank_account_name.as_deref().unwrap_or("-"));
    println!("   NIT check:       {}", report.flags.nit_check);
    println!("   Amount check:    {}", report.flags.amount_check);
    println!("   Document check:  {}", report.flags.document_check);
    println!("   Status:          {}", report.flags.validation_status);

    for miss in &report.enrichment_misses {
        println!("   ⚠️  No {} entry for {}", miss.catalog, miss.key);
    }
    for input in &report.malformed {
        println!(
            "   ⚠️  {} = {:?} (expected {})",
            input.column, input.value, input.expected
        );
    }
    Ok(())
}
