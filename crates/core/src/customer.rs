//! # Customer Module
//!
//! Customer master rows (`Data.Customers`), loaded from customer sheets and
//! audited through the same capture pipeline as Matrix records.

use crate::entity::{ColumnType, EntityDescriptor, Tracked, TrackedColumn};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Business key (CUST006, CUST007, ...)
    pub code: String,
    pub company_name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub credit_limit: Option<Decimal>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

impl Customer {
    pub fn new(code: &str, company_name: &str) -> Self {
        Self {
            code: code.to_string(),
            company_name: company_name.to_string(),
            contact_name: None,
            email: None,
            phone: None,
            address: None,
            city: None,
            country: None,
            credit_limit: None,
            created_at: Utc::now(),
            modified_at: None,
        }
    }

    pub fn with_contact(mut self, contact_name: &str, email: &str) -> Self {
        self.contact_name = Some(contact_name.to_string());
        self.email = Some(email.to_string());
        self
    }

    pub fn with_location(mut self, city: &str, country: &str) -> Self {
        self.city = Some(city.to_string());
        self.country = Some(country.to_string());
        self
    }

    pub fn with_credit_limit(mut self, credit_limit: Decimal) -> Self {
        self.credit_limit = Some(credit_limit);
        self
    }

    pub fn descriptor() -> EntityDescriptor {
        EntityDescriptor {
            schema: "Data".to_string(),
            name: "Customers".to_string(),
            table: "customers".to_string(),
            key_column: "code".to_string(),
            modified_column: Some("modified_at".to_string()),
            tracked_columns: vec![
                TrackedColumn::new("company_name", ColumnType::Text),
                TrackedColumn::new("contact_name", ColumnType::Text),
                TrackedColumn::new("email", ColumnType::Text),
                TrackedColumn::new("phone", ColumnType::Text),
                TrackedColumn::new("city", ColumnType::Text),
                TrackedColumn::new("country", ColumnType::Text),
                TrackedColumn::new("credit_limit", ColumnType::Decimal),
            ],
        }
    }
}

impl Tracked for Customer {
    fn record_key(&self) -> String {
        self.code.clone()
    }

    fn column_value(&self, column: &str) -> Option<String> {
        match column {
            "code" => Some(self.code.clone()),
            "company_name" => Some(self.company_name.clone()),
            "contact_name" => self.contact_name.clone(),
            "email" => self.email.clone(),
            "phone" => self.phone.clone(),
            "address" => self.address.clone(),
            "city" => self.city.clone(),
            "country" => self.country.clone(),
            "credit_limit" => self.credit_limit.map(|d| d.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Customer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.company_name, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_customer_tracked_values() {
        let customer = Customer::new("CUST006", "ABC Corp")
            .with_contact("John Doe", "john@abc.com")
            .with_credit_limit(dec!(2500.00));

        assert_eq!(customer.record_key(), "CUST006");
        assert_eq!(customer.column_value("email").as_deref(), Some("john@abc.com"));
        assert_eq!(customer.column_value("credit_limit").as_deref(), Some("2500.00"));
        assert_eq!(customer.column_value("city"), None);
    }

    #[test]
    fn test_customer_display() {
        let customer = Customer::new("CUST007", "XYZ Industries");
        assert_eq!(customer.to_string(), "XYZ Industries (CUST007)");
    }

    #[test]
    fn test_customer_from_sheet_json() {
        let json = r#"{
            "code": "CUST008",
            "company_name": "Tech Innovations",
            "contact_name": "Bob Johnson",
            "email": "bob@tech.com",
            "phone": "+1-555-1003",
            "address": "789 Pine Rd",
            "city": "San Francisco",
            "country": "USA",
            "credit_limit": "1000"
        }"#;
        let customer: Customer = serde_json::from_str(json).unwrap();
        assert_eq!(customer.city.as_deref(), Some("San Francisco"));
        assert_eq!(customer.credit_limit, Some(dec!(1000)));
        assert!(customer.modified_at.is_none());
    }
}
