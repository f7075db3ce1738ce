//! Customer commands

use anyhow::{Context, Result};
use recaudit_business::{BusinessError, ServiceContext};
use recaudit_core::{Attribution, Customer};
use std::fs;

use crate::CustomerAction;

pub async fn handle(
    ctx: &ServiceContext,
    attribution: &Attribution,
    action: CustomerAction,
) -> Result<()> {
    let customers = ctx.customers();

    match action {
        CustomerAction::Import { file } => {
            let content =
                fs::read_to_string(&file).with_context(|| format!("Failed to read {:?}", file))?;
            let batch: Vec<Customer> = serde_json::from_str(&content)
                .with_context(|| format!("Invalid customers in {:?}", file))?;

            let inserted = customers.insert_batch(attribution, batch).await?;
            println!("✅ Imported {} customers", inserted.len());
            for customer in &inserted {
                println!("   {}", customer);
            }
        }

        CustomerAction::SetEmail { code, email } => {
            let mut customer = customers
                .get(&code)
                .await?
                .ok_or_else(|| BusinessError::CustomerNotFound(code.clone()))?;
            customer.email = Some(email);

            let updated = customers.update_batch(attribution, vec![customer]).await?;
            for customer in &updated {
                println!(
                    "✅ {} email set to {}",
                    customer,
                    customer.email.as_deref().unwrap_or("-")
                );
            }
        }

        CustomerAction::Delete { code } => {
            let deleted = customers.delete_batch(attribution, &[code]).await?;
            for customer in &deleted {
                println!("🗑️  Deleted {}", customer);
            }
        }
    }

    Ok(())
}
