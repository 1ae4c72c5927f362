//! Lab result dataset strategy
//!
//! The transformative dataset: glucose results reported in mmol/L are
//! converted to mg/dL, units are case-normalized, and results outside the
//! reported reference range get a flag appended to the test name.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::BigDecimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::str::FromStr;

use super::row::{self, FieldError, RowMap, ValidationFailure};
use super::DomainRecord;

/// Test code for glucose, the one analyte subject to unit conversion.
const GLUCOSE_TEST_CODE: &str = "L001";

/// 1 mmol/L of glucose = 18.0182 mg/dL.
const MMOL_TO_MG_DL: &str = "18.0182";

/// Result values below this imply a data entry error.
const RESULT_VALUE_FLOOR: i64 = -1000;

/// One clinical laboratory test result.
#[derive(Debug, Clone, PartialEq)]
pub struct LabResult {
    pub patient_id: String,
    pub test_code: String,
    pub test_name: String,
    pub result_value: BigDecimal,
    pub result_unit: String,
    pub reference_range: Option<String>,
    pub performed_at: DateTime<Utc>,
}

fn validate_result_value(row: &RowMap) -> Result<BigDecimal, FieldError> {
    let value = row::decimal(row, "result_value")?;
    if value < BigDecimal::from(RESULT_VALUE_FLOOR) {
        Err(FieldError::new(
            "result_value",
            "Result value implies potential error (<-1000)",
        ))
    } else {
        Ok(value)
    }
}

/// Parse a `"low-high"` reference range. Any other shape yields `None`.
fn parse_reference_range(range: &str) -> Option<(BigDecimal, BigDecimal)> {
    let parts: Vec<&str> = range.split('-').collect();
    if parts.len() != 2 {
        return None;
    }
    let low = BigDecimal::from_str(parts[0].trim()).ok()?;
    let high = BigDecimal::from_str(parts[1].trim()).ok()?;
    Some((low, high))
}

#[async_trait]
impl DomainRecord for LabResult {
    const DATASET: &'static str = "labs";
    const ROUTING_PREFIX: &'static str = "labs/";
    const NATURAL_KEY: &'static [&'static str] = &["patient_id", "test_code", "performed_at"];

    fn validate(row: &RowMap) -> Result<Self, ValidationFailure> {
        let mut failure = ValidationFailure::default();

        let patient_id = row::collect(&mut failure, row::text(row, "patient_id"));
        let test_code = row::collect(&mut failure, row::text(row, "test_code"));
        let test_name = row::collect(&mut failure, row::text(row, "test_name"));
        let result_value = row::collect(&mut failure, validate_result_value(row));
        let result_unit = row::collect(&mut failure, row::text(row, "result_unit"));
        let reference_range = row::optional_text(row, "reference_range");
        let performed_at = row::collect(&mut failure, row::timestamp(row, "performed_at"));

        match (
            patient_id,
            test_code,
            test_name,
            result_value,
            result_unit,
            performed_at,
        ) {
            (
                Some(patient_id),
                Some(test_code),
                Some(test_name),
                Some(result_value),
                Some(result_unit),
                Some(performed_at),
            ) if failure.is_empty() => Ok(Self {
                patient_id,
                test_code,
                test_name,
                result_value,
                result_unit,
                reference_range,
                performed_at,
            }),
            _ => Err(failure),
        }
    }

    /// Unit conversion, then case normalization, then range flagging.
    ///
    /// Ordering matters: the conversion predicate tests the original unit
    /// label, and the flag comparison uses the converted value.
    fn transform(mut self) -> Self {
        if self.test_code == GLUCOSE_TEST_CODE && self.result_unit.eq_ignore_ascii_case("mmol/l") {
            if let Ok(factor) = BigDecimal::from_str(MMOL_TO_MG_DL) {
                self.result_value = &self.result_value * &factor;
                self.result_unit = "mg/dL".to_string();
            }
        }

        self.result_unit = self.result_unit.to_uppercase();

        if let Some(range) = self.reference_range.as_deref() {
            if let Some((low, high)) = parse_reference_range(range) {
                if self.result_value < low {
                    self.test_name = format!("{} [LOW]", self.test_name);
                } else if self.result_value > high {
                    self.test_name = format!("{} [HIGH]", self.test_name);
                }
            }
        }

        self
    }

    fn natural_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.patient_id,
            self.test_code,
            self.performed_at.to_rfc3339()
        )
    }

    async fn upsert_batch(pool: &PgPool, records: &[Self]) -> sqlx::Result<()> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO lab_results \
             (patient_id, test_code, test_name, result_value, result_unit, \
              reference_range, performed_at) ",
        );

        builder.push_values(records, |mut b, record| {
            b.push_bind(&record.patient_id)
                .push_bind(&record.test_code)
                .push_bind(&record.test_name)
                .push_bind(&record.result_value)
                .push_bind(&record.result_unit)
                .push_bind(&record.reference_range)
                .push_bind(record.performed_at);
        });

        builder.push(
            " ON CONFLICT (patient_id, test_code, performed_at) DO UPDATE SET \
             test_name = EXCLUDED.test_name, \
             result_value = EXCLUDED.result_value, \
             result_unit = EXCLUDED.result_unit, \
             reference_range = EXCLUDED.reference_range, \
             updated_at = NOW()",
        );

        builder.build().execute(pool).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_row() -> RowMap {
        [
            ("patient_id", "P-1001"),
            ("test_code", "L001"),
            ("test_name", "Glucose"),
            ("result_value", "5.5"),
            ("result_unit", "mmol/L"),
            ("reference_range", "70-100"),
            ("performed_at", "2023-05-01T10:30:00"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_validate_accepts_well_formed_row() {
        let result = LabResult::validate(&valid_row()).unwrap();
        assert_eq!(result.patient_id, "P-1001");
        assert_eq!(result.result_value, BigDecimal::from_str("5.5").unwrap());
        assert_eq!(result.reference_range.as_deref(), Some("70-100"));
    }

    #[test]
    fn test_validate_rejects_extreme_negative_value() {
        let mut row = valid_row();
        row.insert("result_value".to_string(), "-5000".to_string());

        let failure = LabResult::validate(&row).unwrap_err();
        assert!(failure.to_string().contains("potential error"));
    }

    #[test]
    fn test_transform_converts_glucose_mmol_per_l() {
        let result = LabResult::validate(&valid_row()).unwrap().transform();

        // 5.5 mmol/L * 18.0182 = 99.1001 mg/dL
        assert_eq!(result.result_value, BigDecimal::from_str("99.10010").unwrap());
        assert_eq!(result.result_unit, "MG/DL");
        // 99.1001 is inside 70-100, so no flag
        assert_eq!(result.test_name, "Glucose");
    }

    #[test]
    fn test_transform_skips_conversion_for_other_units() {
        let mut row = valid_row();
        row.insert("result_value".to_string(), "95".to_string());
        row.insert("result_unit".to_string(), "mg/dL".to_string());

        let result = LabResult::validate(&row).unwrap().transform();
        assert_eq!(result.result_value, BigDecimal::from_str("95").unwrap());
        assert_eq!(result.result_unit, "MG/DL");
    }

    #[test]
    fn test_transform_skips_conversion_for_other_test_codes() {
        let mut row = valid_row();
        row.insert("test_code".to_string(), "L002".to_string());

        let result = LabResult::validate(&row).unwrap().transform();
        assert_eq!(result.result_value, BigDecimal::from_str("5.5").unwrap());
    }

    #[test]
    fn test_transform_flags_high_result() {
        let mut row = valid_row();
        row.insert("test_code".to_string(), "L002".to_string());
        row.insert("result_value".to_string(), "150".to_string());
        row.insert("result_unit".to_string(), "mg/dL".to_string());

        let result = LabResult::validate(&row).unwrap().transform();
        assert_eq!(result.test_name, "Glucose [HIGH]");
    }

    #[test]
    fn test_transform_flags_low_result() {
        let mut row = valid_row();
        row.insert("test_code".to_string(), "L002".to_string());
        row.insert("result_value".to_string(), "50".to_string());
        row.insert("result_unit".to_string(), "mg/dL".to_string());

        let result = LabResult::validate(&row).unwrap().transform();
        assert_eq!(result.test_name, "Glucose [LOW]");
    }

    #[test]
    fn test_transform_conversion_happens_before_flagging() {
        // 8 mmol/L converts to 144.1456 mg/dL, which is above the 70-100
        // range, so the flag must reflect the converted value.
        let mut row = valid_row();
        row.insert("result_value".to_string(), "8".to_string());

        let result = LabResult::validate(&row).unwrap().transform();
        assert_eq!(result.test_name, "Glucose [HIGH]");
    }

    #[test]
    fn test_unparseable_range_skips_flagging() {
        let mut row = valid_row();
        row.insert("test_code".to_string(), "L002".to_string());
        row.insert("result_value".to_string(), "150".to_string());
        row.insert("reference_range".to_string(), "see chart".to_string());

        let result = LabResult::validate(&row).unwrap().transform();
        assert_eq!(result.test_name, "Glucose");
    }

    #[test]
    fn test_missing_range_skips_flagging() {
        let mut row = valid_row();
        row.remove("reference_range");
        row.insert("test_code".to_string(), "L002".to_string());
        row.insert("result_value".to_string(), "150".to_string());

        let result = LabResult::validate(&row).unwrap().transform();
        assert_eq!(result.test_name, "Glucose");
    }

    #[test]
    fn test_parse_reference_range() {
        assert_eq!(
            parse_reference_range("70-100"),
            Some((BigDecimal::from(70), BigDecimal::from(100)))
        );
        assert_eq!(
            parse_reference_range(" 0.5 - 1.5 "),
            Some((
                BigDecimal::from_str("0.5").unwrap(),
                BigDecimal::from_str("1.5").unwrap()
            ))
        );
        assert_eq!(parse_reference_range("<100"), None);
        assert_eq!(parse_reference_range("70-100-130"), None);
    }
}
