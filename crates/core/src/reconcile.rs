//! # Reconcile Module
//!
//! Pure reconciliation rules for Matrix records: identity and period
//! derivation, the catalog period used for bank-account enrichment, and the
//! per-field / composite validation flags. Catalog lookups themselves are
//! I/O and live in the business crate.

use crate::matrix::{is_blank, CheckFlag, MatrixRecord, ValidationStatus};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Date formats accepted in `record_date`.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Expected-format hint reported for malformed dates
pub const DATE_FORMAT_HINT: &str = "YYYY-MM-DD";
/// Expected-format hint reported for malformed amounts
pub const AMOUNT_FORMAT_HINT: &str = "decimal number, e.g. 1500.00";

/// Parse a record date. `None` means malformed; callers leave derived fields unset.
pub fn parse_record_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Some(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }
    None
}

pub fn parse_amount(value: &str) -> Option<Decimal> {
    Decimal::from_str(value.trim()).ok()
}

/// Calendar convention for period labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonthNames {
    #[default]
    Es,
    En,
}

impl MonthNames {
    const ES: [&'static str; 12] = [
        "ENERO", "FEBRERO", "MARZO", "ABRIL", "MAYO", "JUNIO", "JULIO", "AGOSTO",
        "SEPTIEMBRE", "OCTUBRE", "NOVIEMBRE", "DICIEMBRE",
    ];
    const EN: [&'static str; 12] = [
        "JANUARY", "FEBRUARY", "MARCH", "APRIL", "MAY", "JUNE", "JULY", "AUGUST",
        "SEPTEMBER", "OCTOBER", "NOVEMBER", "DECEMBER",
    ];

    /// Upper-case month name, `month` in 1..=12
    pub fn name(&self, month: u32) -> Option<&'static str> {
        let idx = month.checked_sub(1)? as usize;
        match self {
            MonthNames::Es => Self::ES.get(idx).copied(),
            MonthNames::En => Self::EN.get(idx).copied(),
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "es" => Some(MonthNames::Es),
            "en" => Some(MonthNames::En),
            _ => None,
        }
    }
}

/// Identity = payer NIT followed by the packaging identifier.
///
/// Only computed when both parts are present.
pub fn derive_identity(payer_nit: Option<&str>, packaging_id: Option<&str>) -> Option<String> {
    if is_blank(payer_nit) || is_blank(packaging_id) {
        return None;
    }
    Some(format!(
        "{}{}",
        payer_nit.unwrap_or_default().trim(),
        packaging_id.unwrap_or_default().trim()
    ))
}

/// Identity the record will carry after insert-time derivation.
pub fn effective_identity(record: &MatrixRecord) -> Option<String> {
    if !is_blank(record.identity_key.as_deref()) {
        return record.identity_key.clone();
    }
    derive_identity(record.payer_nit.as_deref(), record.packaging_id.as_deref())
}

/// Upper-case month name of the record date, `None` when the date is blank or malformed.
pub fn derive_period(record_date: Option<&str>, names: MonthNames) -> Option<String> {
    let date = parse_record_date(record_date?)?;
    names.name(date.month()).map(str::to_string)
}

/// (year, month) key of the bank-account catalog entry that applies to a
/// transaction dated `date`.
///
/// Catalog entries are indexed by the month preceding the transaction month,
/// within the same year: a June record matches the May entry. A January
/// record yields month 0, which no catalog entry carries.
pub fn catalog_period(date: NaiveDate) -> (i32, i32) {
    (date.year(), date.month() as i32 - 1)
}

/// CORRECTO only when both sides are non-blank and equal.
pub fn check_text(a: Option<&str>, b: Option<&str>) -> CheckFlag {
    match (a, b) {
        (Some(a), Some(b)) if !a.trim().is_empty() && a.trim() == b.trim() => CheckFlag::Correcto,
        _ => CheckFlag::Incorrecto,
    }
}

/// Like [`check_text`], comparing numerically when both sides parse as decimals.
pub fn check_amount(a: Option<&str>, b: Option<&str>) -> CheckFlag {
    if is_blank(a) || is_blank(b) {
        return CheckFlag::Incorrecto;
    }
    let (a, b) = (a.unwrap_or_default(), b.unwrap_or_default());
    match (parse_amount(a), parse_amount(b)) {
        (Some(x), Some(y)) if x == y => CheckFlag::Correcto,
        (Some(_), Some(_)) => CheckFlag::Incorrecto,
        _ => check_text(Some(a), Some(b)),
    }
}

/// Flags computed for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFlags {
    pub nit_check: CheckFlag,
    pub amount_check: CheckFlag,
    pub document_check: CheckFlag,
    pub validation_status: ValidationStatus,
}

impl ValidationFlags {
    pub fn apply(&self, record: &mut MatrixRecord) {
        record.nit_check = Some(self.nit_check);
        record.amount_check = Some(self.amount_check);
        record.document_check = Some(self.document_check);
        record.validation_status = Some(self.validation_status);
    }

    /// (column, flag) for every failed field check
    pub fn failures(&self) -> Vec<(&'static str, CheckFlag)> {
        [
            ("nit_check", self.nit_check),
            ("amount_check", self.amount_check),
            ("document_check", self.document_check),
        ]
        .into_iter()
        .filter(|(_, flag)| !flag.is_ok())
        .collect()
    }
}

/// NIT, amount and document checks, then the composite flag.
pub fn validate(record: &MatrixRecord) -> ValidationFlags {
    let nit_check = check_text(record.payer_nit.as_deref(), record.payee_nit.as_deref());
    let amount_check = check_amount(
        record.movement_amount.as_deref(),
        record.identified_amount.as_deref(),
    );
    let document_check = check_text(record.packaging_id.as_deref(), record.document_id.as_deref());

    let validation_status = if nit_check.is_ok() && amount_check.is_ok() && document_check.is_ok()
    {
        ValidationStatus::Validado
    } else {
        ValidationStatus::Invalido
    };

    ValidationFlags {
        nit_check,
        amount_check,
        document_check,
        validation_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::RawMatrixRow;

    fn record() -> MatrixRecord {
        MatrixRecord::from_raw(RawMatrixRow {
            record_date: Some("2024-06-15".into()),
            payer_nit: Some("899999336".into()),
            payee_nit: Some("899999336".into()),
            movement_amount: Some("1500.00".into()),
            identified_amount: Some("1500".into()),
            packaging_id: Some("0020000672302".into()),
            document_id: Some("0020000672302".into()),
            ..Default::default()
        })
    }

    #[test]
    fn test_derive_identity_concatenates() {
        assert_eq!(
            derive_identity(Some("899999336"), Some("0020000672302")).as_deref(),
            Some("8999993360020000672302")
        );
        assert_eq!(derive_identity(Some("899999336"), None), None);
        assert_eq!(derive_identity(Some(""), Some("1")), None);
    }

    #[test]
    fn test_effective_identity_keeps_supplied_value() {
        let mut r = record();
        assert_eq!(effective_identity(&r).as_deref(), Some("8999993360020000672302"));
        r.identity_key = Some("CUSTOM-1".into());
        assert_eq!(effective_identity(&r).as_deref(), Some("CUSTOM-1"));
    }

    #[test]
    fn test_parse_record_date_formats() {
        let june = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(parse_record_date("2024-06-15"), Some(june));
        assert_eq!(parse_record_date("15/06/2024"), Some(june));
        assert_eq!(parse_record_date("2024-06-15 08:30:00"), Some(june));
        assert_eq!(parse_record_date("2024-02-31"), None);
        assert_eq!(parse_record_date("junio"), None);
    }

    #[test]
    fn test_derive_period() {
        assert_eq!(derive_period(Some("2024-06-15"), MonthNames::Es).as_deref(), Some("JUNIO"));
        assert_eq!(derive_period(Some("2024-06-15"), MonthNames::En).as_deref(), Some("JUNE"));
        assert_eq!(derive_period(Some("not a date"), MonthNames::Es), None);
        assert_eq!(derive_period(None, MonthNames::Es), None);
    }

    #[test]
    fn test_catalog_period_is_previous_month() {
        let june = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(catalog_period(june), (2024, 5));
        let june_end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert_eq!(catalog_period(june_end), (2024, 5));
        let january = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(catalog_period(january), (2024, 0));
    }

    #[test]
    fn test_all_checks_pass() {
        let flags = validate(&record());
        assert_eq!(flags.nit_check, CheckFlag::Correcto);
        assert_eq!(flags.amount_check, CheckFlag::Correcto);
        assert_eq!(flags.document_check, CheckFlag::Correcto);
        assert_eq!(flags.validation_status, ValidationStatus::Validado);
        assert!(flags.failures().is_empty());
    }

    #[test]
    fn test_each_mismatch_invalidates() {
        let mut r = record();
        r.payee_nit = Some("800000000".into());
        let flags = validate(&r);
        assert_eq!(flags.nit_check, CheckFlag::Incorrecto);
        assert_eq!(flags.validation_status, ValidationStatus::Invalido);

        let mut r = record();
        r.identified_amount = Some("1499.99".into());
        let flags = validate(&r);
        assert_eq!(flags.amount_check, CheckFlag::Incorrecto);
        assert_eq!(flags.validation_status, ValidationStatus::Invalido);

        let mut r = record();
        r.document_id = Some("0020000672303".into());
        let flags = validate(&r);
        assert_eq!(flags.document_check, CheckFlag::Incorrecto);
        assert_eq!(flags.validation_status, ValidationStatus::Invalido);
        assert_eq!(flags.failures(), vec![("document_check", CheckFlag::Incorrecto)]);
    }

    #[test]
    fn test_blank_sides_are_incorrect() {
        assert_eq!(check_text(None, None), CheckFlag::Incorrecto);
        assert_eq!(check_text(Some(""), Some("")), CheckFlag::Incorrecto);
        assert_eq!(check_amount(None, Some("1")), CheckFlag::Incorrecto);
    }

    #[test]
    fn test_malformed_amounts_compare_as_text() {
        assert_eq!(check_amount(Some("1.500,00"), Some("1.500,00")), CheckFlag::Correcto);
        assert_eq!(check_amount(Some("1.500,00"), Some("1500")), CheckFlag::Incorrecto);
    }

    #[test]
    fn test_month_names() {
        assert_eq!(MonthNames::Es.name(1), Some("ENERO"));
        assert_eq!(MonthNames::En.name(12), Some("DECEMBER"));
        assert_eq!(MonthNames::Es.name(0), None);
        assert_eq!(MonthNames::from_code("EN"), Some(MonthNames::En));
    }
}
