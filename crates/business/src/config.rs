//! Engine configuration
//!
//! Every field has a serde default so a partial JSON file is valid.
//! Environment variables override file values.

use crate::error::BusinessError;
use recaudit_core::MonthNames;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for the audit and reconciliation engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Audit recorder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Write ChangeDetail rows (ledger entries are always written)
    #[serde(default = "default_log_data_changes")]
    pub log_data_changes: bool,

    /// Emit one debug line per captured column change
    #[serde(default)]
    pub detailed_logging: bool,
}

/// Bulk ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Rows per transaction (and per ledger entry)
    #[serde(default = "default_max_rows_per_batch")]
    pub max_rows_per_batch: usize,

    /// Skip rows whose identity is already stored or repeated in the batch
    #[serde(default = "default_skip_duplicates")]
    pub skip_duplicates: bool,
}

/// Reconciliation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Calendar convention for derived period labels
    #[serde(default)]
    pub month_names: MonthNames,
}

// Default value functions for serde
fn default_log_data_changes() -> bool {
    true
}

fn default_max_rows_per_batch() -> usize {
    1000
}

fn default_skip_duplicates() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_data_changes: default_log_data_changes(),
            detailed_logging: false,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_rows_per_batch: default_max_rows_per_batch(),
            skip_duplicates: default_skip_duplicates(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Defaults overlaid with process environment variables
    pub fn from_env() -> Result<Self, BusinessError> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup` (an environment accessor).
    ///
    /// Recognized keys: `AUDIT_LOG_DATA_CHANGES`, `AUDIT_DETAILED_LOGGING`,
    /// `INGEST_MAX_ROWS_PER_BATCH`, `INGEST_SKIP_DUPLICATES`, `RECONCILE_MONTH_NAMES`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, BusinessError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("AUDIT_LOG_DATA_CHANGES") {
            self.audit.log_data_changes = parse_bool("AUDIT_LOG_DATA_CHANGES", &v)?;
        }
        if let Some(v) = lookup("AUDIT_DETAILED_LOGGING") {
            self.audit.detailed_logging = parse_bool("AUDIT_DETAILED_LOGGING", &v)?;
        }
        if let Some(v) = lookup("INGEST_MAX_ROWS_PER_BATCH") {
            self.ingest.max_rows_per_batch = v.trim().parse().map_err(|_| {
                BusinessError::InvalidConfig(format!("INGEST_MAX_ROWS_PER_BATCH={}", v))
            })?;
        }
        if let Some(v) = lookup("INGEST_SKIP_DUPLICATES") {
            self.ingest.skip_duplicates = parse_bool("INGEST_SKIP_DUPLICATES", &v)?;
        }
        if let Some(v) = lookup("RECONCILE_MONTH_NAMES") {
            self.reconcile.month_names = MonthNames::from_code(&v).ok_or_else(|| {
                BusinessError::InvalidConfig(format!("RECONCILE_MONTH_NAMES={}", v))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), BusinessError> {
        if self.ingest.max_rows_per_batch == 0 {
            return Err(BusinessError::InvalidConfig(
                "ingest.max_rows_per_batch must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, BusinessError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(BusinessError::InvalidConfig(format!("{}={}", key, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();

        assert!(config.audit.log_data_changes);
        assert!(!config.audit.detailed_logging);
        assert_eq!(config.ingest.max_rows_per_batch, 1000);
        assert!(config.ingest.skip_duplicates);
        assert_eq!(config.reconcile.month_names, MonthNames::Es);
    }

    #[test]
    fn test_config_partial_json() {
        // Missing sections and fields fall back to defaults
        let json = r#"{ "ingest": { "max_rows_per_batch": 50 }, "reconcile": { "month_names": "en" } }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.ingest.max_rows_per_batch, 50);
        assert!(config.ingest.skip_duplicates);
        assert!(config.audit.log_data_changes);
        assert_eq!(config.reconcile.month_names, MonthNames::En);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("AUDIT_LOG_DATA_CHANGES", "false"),
            ("AUDIT_DETAILED_LOGGING", "1"),
            ("INGEST_MAX_ROWS_PER_BATCH", "25"),
            ("RECONCILE_MONTH_NAMES", "EN"),
        ]
        .into_iter()
        .collect();

        let config = EngineConfig::default()
            .with_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert!(!config.audit.log_data_changes);
        assert!(config.audit.detailed_logging);
        assert_eq!(config.ingest.max_rows_per_batch, 25);
        assert!(config.ingest.skip_duplicates);
        assert_eq!(config.reconcile.month_names, MonthNames::En);
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let result = EngineConfig::default()
            .with_env_overrides(|k| (k == "INGEST_SKIP_DUPLICATES").then(|| "maybe".to_string()));
        assert!(matches!(result, Err(BusinessError::InvalidConfig(_))));

        let result = EngineConfig::default()
            .with_env_overrides(|k| (k == "INGEST_MAX_ROWS_PER_BATCH").then(|| "0".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recaudit.json");
        std::fs::write(&path, r#"{ "audit": { "detailed_logging": true } }"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert!(config.audit.detailed_logging);
        assert!(config.audit.log_data_changes);

        std::fs::write(&path, "not json").unwrap();
        assert!(EngineConfig::from_file(&path).is_err());
    }
}
