//! Audit (compliance) dataset strategy

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::types::BigDecimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::row::{self, FieldError, RowMap, ValidationFailure};
use super::DomainRecord;

/// One provider billing event from a compliance audit export.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub provider_npi: String,
    pub billing_amount: BigDecimal,
    pub service_date: NaiveDate,
    pub status: String,
}

fn validate_npi(row: &RowMap) -> Result<String, FieldError> {
    let npi = row::text(row, "provider_npi")?;
    // Standard NPI: exactly 10 digits
    if npi.len() == 10 && npi.chars().all(|c| c.is_ascii_digit()) {
        Ok(npi)
    } else {
        Err(FieldError::new(
            "provider_npi",
            "Provider NPI must be exactly 10 digits",
        ))
    }
}

fn validate_amount(row: &RowMap) -> Result<BigDecimal, FieldError> {
    let amount = row::decimal(row, "billing_amount")?;
    if amount > BigDecimal::from(0) {
        Ok(amount)
    } else {
        Err(FieldError::new(
            "billing_amount",
            "Billing amount must be positive",
        ))
    }
}

#[async_trait]
impl DomainRecord for AuditRecord {
    const DATASET: &'static str = "audit";
    const ROUTING_PREFIX: &'static str = "audit/";
    const NATURAL_KEY: &'static [&'static str] =
        &["provider_npi", "service_date", "billing_amount"];

    fn validate(row: &RowMap) -> Result<Self, ValidationFailure> {
        let mut failure = ValidationFailure::default();

        let provider_npi = row::collect(&mut failure, validate_npi(row));
        let billing_amount = row::collect(&mut failure, validate_amount(row));
        let service_date = row::collect(&mut failure, row::date(row, "service_date"));
        let status = row::collect(&mut failure, row::text(row, "status"));

        match (provider_npi, billing_amount, service_date, status) {
            (Some(provider_npi), Some(billing_amount), Some(service_date), Some(status))
                if failure.is_empty() =>
            {
                Ok(Self {
                    provider_npi,
                    billing_amount,
                    service_date,
                    status,
                })
            },
            _ => Err(failure),
        }
    }

    fn natural_key(&self) -> String {
        // The column is NUMERIC(10,2), under which 100.5 and 100.50 are the
        // same value; normalize to the column scale so batch dedupe agrees
        // with the database's conflict target.
        format!(
            "{}|{}|{}",
            self.provider_npi,
            self.service_date,
            self.billing_amount.with_scale(2)
        )
    }

    async fn upsert_batch(pool: &PgPool, records: &[Self]) -> sqlx::Result<()> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO audit_records (provider_npi, billing_amount, service_date, status) ",
        );

        builder.push_values(records, |mut b, record| {
            b.push_bind(&record.provider_npi)
                .push_bind(&record.billing_amount)
                .push_bind(record.service_date)
                .push_bind(&record.status);
        });

        builder.push(
            " ON CONFLICT (provider_npi, service_date, billing_amount) \
             DO UPDATE SET status = EXCLUDED.status, updated_at = NOW()",
        );

        builder.build().execute(pool).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn valid_row() -> RowMap {
        [
            ("provider_npi", "1234567890"),
            ("billing_amount", "100.50"),
            ("service_date", "2023-01-01"),
            ("status", "submitted"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_validate_accepts_well_formed_row() {
        let record = AuditRecord::validate(&valid_row()).unwrap();
        assert_eq!(record.provider_npi, "1234567890");
        assert_eq!(record.billing_amount, BigDecimal::from_str("100.50").unwrap());
        assert_eq!(record.service_date, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(record.status, "submitted");
    }

    #[test]
    fn test_validate_rejects_short_npi() {
        let mut row = valid_row();
        row.insert("provider_npi".to_string(), "123".to_string());

        let failure = AuditRecord::validate(&row).unwrap_err();
        assert!(failure.to_string().contains("Provider NPI must be exactly 10 digits"));
    }

    #[test]
    fn test_validate_rejects_non_numeric_npi() {
        let mut row = valid_row();
        row.insert("provider_npi".to_string(), "12345abcde".to_string());

        assert!(AuditRecord::validate(&row).is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_amount() {
        for amount in ["0", "-5.00"] {
            let mut row = valid_row();
            row.insert("billing_amount".to_string(), amount.to_string());

            let failure = AuditRecord::validate(&row).unwrap_err();
            assert!(failure.to_string().contains("Billing amount must be positive"));
        }
    }

    #[test]
    fn test_validate_collects_all_field_errors() {
        let mut row = valid_row();
        row.insert("provider_npi".to_string(), "123".to_string());
        row.insert("billing_amount".to_string(), "-1".to_string());

        let failure = AuditRecord::validate(&row).unwrap_err();
        assert_eq!(failure.errors.len(), 2);
    }

    #[test]
    fn test_transform_is_identity() {
        let record = AuditRecord::validate(&valid_row()).unwrap();
        assert_eq!(record.clone().transform(), record);
    }

    #[test]
    fn test_natural_key_covers_all_key_fields() {
        let record = AuditRecord::validate(&valid_row()).unwrap();
        let key = record.natural_key();
        assert!(key.contains("1234567890"));
        assert!(key.contains("2023-01-01"));
        assert!(key.contains("100.50"));
    }

    #[test]
    fn test_natural_key_ignores_decimal_rendering() {
        let mut variant = valid_row();
        variant.insert("billing_amount".to_string(), "100.5".to_string());

        let a = AuditRecord::validate(&valid_row()).unwrap();
        let b = AuditRecord::validate(&variant).unwrap();
        assert_eq!(a.natural_key(), b.natural_key());
    }
}
