//! # Entity Module
//!
//! Schema descriptors for monitored entities. Which columns are audited is
//! configuration: the capture pipeline only ever sees a descriptor and a
//! [`Tracked`] record.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared data type tag stored alongside every change detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    Text,
    Integer,
    Decimal,
    Date,
    DateTime,
    Boolean,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::Date => "DATE",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Boolean => "BOOLEAN",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TEXT" => Ok(ColumnType::Text),
            "INTEGER" => Ok(ColumnType::Integer),
            "DECIMAL" => Ok(ColumnType::Decimal),
            "DATE" => Ok(ColumnType::Date),
            "DATETIME" => Ok(ColumnType::DateTime),
            "BOOLEAN" => Ok(ColumnType::Boolean),
            _ => Err(CoreError::InvalidColumnType(s.to_string())),
        }
    }
}

/// One audited column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedColumn {
    pub name: String,
    pub data_type: ColumnType,
}

impl TrackedColumn {
    pub fn new(name: &str, data_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
        }
    }
}

/// Schema descriptor of a monitored entity.
///
/// `schema`/`name` form the qualified name written to the ledger; `table`,
/// `key_column` and `modified_column` address the physical table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub schema: String,
    pub name: String,
    pub table: String,
    pub key_column: String,
    #[serde(default)]
    pub modified_column: Option<String>,
    pub tracked_columns: Vec<TrackedColumn>,
}

impl EntityDescriptor {
    /// `Schema.Name`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    pub fn tracked(&self, column: &str) -> Option<&TrackedColumn> {
        self.tracked_columns.iter().find(|c| c.name == column)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.tracked_columns.is_empty() {
            return Err(CoreError::NoTrackedColumns {
                entity: self.qualified_name(),
            });
        }
        Ok(())
    }

    /// Load a descriptor from its JSON form
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A record of a monitored entity, as seen by the capture pipeline.
pub trait Tracked {
    /// Primary key rendered as an opaque string
    fn record_key(&self) -> String;

    /// Textual value of a column, `None` for null/blank
    fn column_value(&self, column: &str) -> Option<String>;
}
