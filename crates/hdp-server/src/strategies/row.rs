//! Row field access and validation primitives
//!
//! A raw row arrives as untyped key/value strings. The helpers here coerce
//! fields into their typed form and collect one error per offending field,
//! so a validation failure reports everything wrong with a row at once.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::types::BigDecimal;
use std::collections::HashMap;
use std::str::FromStr;

/// Parsed column map of one raw row.
pub type RowMap = HashMap<String, String>;

/// A single field-level validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All field errors for one rejected row.
#[derive(Debug, Clone, Default)]
pub struct ValidationFailure {
    pub errors: Vec<FieldError>,
}

impl ValidationFailure {
    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{}", joined)
    }
}

impl std::error::Error for ValidationFailure {}

/// Record a field result, keeping the value and stashing any error.
pub fn collect<T>(failure: &mut ValidationFailure, result: Result<T, FieldError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            failure.push(error);
            None
        }
    }
}

/// A required, non-empty text field.
pub fn text(row: &RowMap, field: &'static str) -> Result<String, FieldError> {
    match row.get(field) {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        Some(_) => Err(FieldError::new(field, "must not be empty")),
        None => Err(FieldError::new(field, "field is required")),
    }
}

/// An optional text field; empty strings collapse to `None`.
pub fn optional_text(row: &RowMap, field: &'static str) -> Option<String> {
    row.get(field).filter(|v| !v.is_empty()).cloned()
}

/// A required decimal field.
pub fn decimal(row: &RowMap, field: &'static str) -> Result<BigDecimal, FieldError> {
    let raw = text(row, field)?;
    BigDecimal::from_str(&raw)
        .map_err(|_| FieldError::new(field, format!("'{}' is not a valid decimal", raw)))
}

/// A required `YYYY-MM-DD` date field.
pub fn date(row: &RowMap, field: &'static str) -> Result<NaiveDate, FieldError> {
    let raw = text(row, field)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|_| FieldError::new(field, format!("'{}' is not a valid date (YYYY-MM-DD)", raw)))
}

/// A required timestamp field.
///
/// Accepts RFC 3339 as well as the bare `YYYY-MM-DD HH:MM:SS` /
/// `YYYY-MM-DDTHH:MM:SS` forms that lab exports use; naive timestamps are
/// interpreted as UTC.
pub fn timestamp(row: &RowMap, field: &'static str) -> Result<DateTime<Utc>, FieldError> {
    let raw = text(row, field)?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(FieldError::new(
        field,
        format!("'{}' is not a valid timestamp", raw),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RowMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_text_required() {
        let r = row(&[("status", "submitted"), ("blank", "")]);
        assert_eq!(text(&r, "status").unwrap(), "submitted");
        assert!(text(&r, "blank").is_err());
        assert!(text(&r, "missing").is_err());
    }

    #[test]
    fn test_optional_text() {
        let r = row(&[("reference_range", ""), ("unit", "mg/dL")]);
        assert_eq!(optional_text(&r, "reference_range"), None);
        assert_eq!(optional_text(&r, "unit").as_deref(), Some("mg/dL"));
        assert_eq!(optional_text(&r, "missing"), None);
    }

    #[test]
    fn test_decimal_parsing() {
        let r = row(&[("amount", "100.50"), ("bad", "1,00")]);
        assert_eq!(decimal(&r, "amount").unwrap(), BigDecimal::from_str("100.50").unwrap());
        assert!(decimal(&r, "bad").is_err());
    }

    #[test]
    fn test_date_parsing() {
        let r = row(&[("service_date", "2023-01-01"), ("bad", "01/01/2023")]);
        assert_eq!(
            date(&r, "service_date").unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
        );
        assert!(date(&r, "bad").is_err());
    }

    #[test]
    fn test_timestamp_parsing() {
        let r = row(&[
            ("rfc", "2023-05-01T10:30:00Z"),
            ("naive_t", "2023-05-01T10:30:00"),
            ("naive_space", "2023-05-01 10:30:00"),
            ("bad", "yesterday"),
        ]);
        let expected = NaiveDateTime::parse_from_str("2023-05-01T10:30:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap()
            .and_utc();
        assert_eq!(timestamp(&r, "rfc").unwrap(), expected);
        assert_eq!(timestamp(&r, "naive_t").unwrap(), expected);
        assert_eq!(timestamp(&r, "naive_space").unwrap(), expected);
        assert!(timestamp(&r, "bad").is_err());
    }

    #[test]
    fn test_failure_display_joins_fields() {
        let mut failure = ValidationFailure::default();
        failure.push(FieldError::new("provider_npi", "must be exactly 10 digits"));
        failure.push(FieldError::new("billing_amount", "must be positive"));
        assert_eq!(
            failure.to_string(),
            "provider_npi: must be exactly 10 digits; billing_amount: must be positive"
        );
    }
}
