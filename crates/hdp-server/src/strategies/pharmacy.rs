//! Pharmacy claim dataset strategy

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::types::BigDecimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::row::{self, FieldError, RowMap, ValidationFailure};
use super::DomainRecord;

/// One adjudicated pharmacy claim (financial transaction).
#[derive(Debug, Clone, PartialEq)]
pub struct PharmacyClaim {
    pub claim_id: String,
    pub ncpdp_id: String,
    pub bin_number: String,
    pub service_date: NaiveDate,
    pub total_amount_paid: BigDecimal,
    pub transaction_code: String,
}

fn validate_amount(row: &RowMap) -> Result<BigDecimal, FieldError> {
    let amount = row::decimal(row, "total_amount_paid")?;
    if amount > BigDecimal::from(0) {
        Ok(amount)
    } else {
        Err(FieldError::new(
            "total_amount_paid",
            "Total amount paid must be positive",
        ))
    }
}

#[async_trait]
impl DomainRecord for PharmacyClaim {
    const DATASET: &'static str = "pharmacy";
    const ROUTING_PREFIX: &'static str = "pharmacy/";
    const NATURAL_KEY: &'static [&'static str] = &["claim_id"];

    fn validate(row: &RowMap) -> Result<Self, ValidationFailure> {
        let mut failure = ValidationFailure::default();

        let claim_id = row::collect(&mut failure, row::text(row, "claim_id"));
        let ncpdp_id = row::collect(&mut failure, row::text(row, "ncpdp_id"));
        let bin_number = row::collect(&mut failure, row::text(row, "bin_number"));
        let service_date = row::collect(&mut failure, row::date(row, "service_date"));
        let total_amount_paid = row::collect(&mut failure, validate_amount(row));
        let transaction_code = row::collect(&mut failure, row::text(row, "transaction_code"));

        match (
            claim_id,
            ncpdp_id,
            bin_number,
            service_date,
            total_amount_paid,
            transaction_code,
        ) {
            (
                Some(claim_id),
                Some(ncpdp_id),
                Some(bin_number),
                Some(service_date),
                Some(total_amount_paid),
                Some(transaction_code),
            ) if failure.is_empty() => Ok(Self {
                claim_id,
                ncpdp_id,
                bin_number,
                service_date,
                total_amount_paid,
                transaction_code,
            }),
            _ => Err(failure),
        }
    }

    fn natural_key(&self) -> String {
        self.claim_id.clone()
    }

    async fn upsert_batch(pool: &PgPool, records: &[Self]) -> sqlx::Result<()> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO pharmacy_claims \
             (claim_id, ncpdp_id, bin_number, service_date, total_amount_paid, transaction_code) ",
        );

        builder.push_values(records, |mut b, record| {
            b.push_bind(&record.claim_id)
                .push_bind(&record.ncpdp_id)
                .push_bind(&record.bin_number)
                .push_bind(record.service_date)
                .push_bind(&record.total_amount_paid)
                .push_bind(&record.transaction_code);
        });

        builder.push(
            " ON CONFLICT (claim_id) DO UPDATE SET \
             ncpdp_id = EXCLUDED.ncpdp_id, \
             bin_number = EXCLUDED.bin_number, \
             service_date = EXCLUDED.service_date, \
             total_amount_paid = EXCLUDED.total_amount_paid, \
             transaction_code = EXCLUDED.transaction_code, \
             updated_at = NOW()",
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
            ("claim_id", "CLM-001"),
            ("ncpdp_id", "1234567"),
            ("bin_number", "610014"),
            ("service_date", "2023-03-15"),
            ("total_amount_paid", "45.99"),
            ("transaction_code", "B1"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_validate_accepts_well_formed_row() {
        let claim = PharmacyClaim::validate(&valid_row()).unwrap();
        assert_eq!(claim.claim_id, "CLM-001");
        assert_eq!(claim.total_amount_paid, BigDecimal::from_str("45.99").unwrap());
        assert_eq!(claim.transaction_code, "B1");
    }

    #[test]
    fn test_validate_rejects_non_positive_amount() {
        let mut row = valid_row();
        row.insert("total_amount_paid".to_string(), "0".to_string());

        let failure = PharmacyClaim::validate(&row).unwrap_err();
        assert!(failure.to_string().contains("Total amount paid must be positive"));
    }

    #[test]
    fn test_validate_rejects_missing_claim_id() {
        let mut row = valid_row();
        row.remove("claim_id");

        let failure = PharmacyClaim::validate(&row).unwrap_err();
        assert!(failure.to_string().contains("claim_id"));
    }

    #[test]
    fn test_natural_key_is_claim_id() {
        let claim = PharmacyClaim::validate(&valid_row()).unwrap();
        assert_eq!(claim.natural_key(), "CLM-001");
    }
}
