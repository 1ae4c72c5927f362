//! Per-dataset ingestion strategies
//!
//! A strategy bundles everything the batch processor needs to turn untyped
//! rows into domain records: validation, transformation, the natural
//! (idempotency) key, and a routing predicate over object keys. Datasets are
//! plain structs implementing [`DomainRecord`]; the registry is built from
//! an explicit list at startup rather than any self-registration mechanism,
//! so routing precedence is the declaration order and nothing else.

use async_trait::async_trait;
use sqlx::PgPool;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{AppError, AppResult};

pub mod audit;
pub mod labs;
pub mod pharmacy;
pub mod row;

pub use audit::AuditRecord;
pub use labs::LabResult;
pub use pharmacy::PharmacyClaim;
pub use row::{RowMap, ValidationFailure};

/// A typed destination record for one dataset.
///
/// `validate` and `transform` are pure; all persistence goes through
/// `upsert_batch`, which must be idempotent on [`Self::NATURAL_KEY`]:
/// insert-or-update keyed on the natural-key uniqueness constraint,
/// refreshing only non-key fields on conflict.
#[async_trait]
pub trait DomainRecord: Sized + Send + Sync {
    /// Dataset name used for registry lookups and artifact tagging.
    const DATASET: &'static str;

    /// Object-key prefix this dataset claims (e.g. `"audit/"`).
    const ROUTING_PREFIX: &'static str;

    /// Field names whose combination uniquely identifies a record.
    const NATURAL_KEY: &'static [&'static str];

    /// Coerce an untyped row into a typed record, or report every offending
    /// field.
    fn validate(row: &RowMap) -> Result<Self, ValidationFailure>;

    /// Domain normalization applied after validation (unit conversion, flag
    /// annotation). Defaults to the identity.
    fn transform(self) -> Self {
        self
    }

    /// Rendered natural key, used to de-duplicate within one write batch
    /// (last write wins per key).
    fn natural_key(&self) -> String;

    /// Bulk insert-or-update the batch in a single statement.
    async fn upsert_batch(pool: &PgPool, records: &[Self]) -> sqlx::Result<()>;
}

/// Outcome of validating/loading one row within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Loaded,
    Failed(String),
}

/// Object-safe strategy interface used by the registry and batch processor.
#[async_trait]
pub trait DatasetStrategy: Send + Sync {
    fn dataset(&self) -> &'static str;

    fn natural_key(&self) -> &'static [&'static str];

    /// Capability predicate over a routing key (object path).
    fn matches(&self, routing_key: &str) -> bool;

    /// Validate, transform, and bulk-upsert one batch of rows.
    ///
    /// Returns one outcome per input row, in order. A row that fails
    /// validation is excluded from the write set but never aborts the
    /// batch; an `Err` here means the bulk write itself failed and no row
    /// status should be advanced.
    async fn load_batch(&self, pool: &PgPool, rows: &[RowMap]) -> AppResult<Vec<RowOutcome>>;
}

/// Generic strategy over any [`DomainRecord`].
pub struct Strategy<R> {
    _marker: PhantomData<R>,
}

impl<R> Strategy<R> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<R> Default for Strategy<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: DomainRecord + 'static> DatasetStrategy for Strategy<R> {
    fn dataset(&self) -> &'static str {
        R::DATASET
    }

    fn natural_key(&self) -> &'static [&'static str] {
        R::NATURAL_KEY
    }

    fn matches(&self, routing_key: &str) -> bool {
        routing_key.starts_with(R::ROUTING_PREFIX)
    }

    async fn load_batch(&self, pool: &PgPool, rows: &[RowMap]) -> AppResult<Vec<RowOutcome>> {
        let mut outcomes = Vec::with_capacity(rows.len());
        let mut records: Vec<R> = Vec::new();

        for row in rows {
            match R::validate(row) {
                Ok(record) => {
                    records.push(record.transform());
                    outcomes.push(RowOutcome::Loaded);
                },
                Err(failure) => {
                    outcomes.push(RowOutcome::Failed(format!("Validation failed: {}", failure)));
                },
            }
        }

        // Postgres rejects an INSERT whose ON CONFLICT clause would touch
        // the same row twice, so collapse intra-batch key collisions to the
        // last occurrence before flushing.
        let records = dedupe_last_wins(records);

        if !records.is_empty() {
            R::upsert_batch(pool, &records).await.map_err(AppError::Database)?;
        }

        Ok(outcomes)
    }
}

fn dedupe_last_wins<R: DomainRecord>(records: Vec<R>) -> Vec<R> {
    let mut by_key: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut kept: Vec<Option<R>> = Vec::with_capacity(records.len());

    for record in records {
        let key = record.natural_key();
        if let Some(&idx) = by_key.get(&key) {
            kept[idx] = Some(record);
        } else {
            by_key.insert(key, kept.len());
            kept.push(Some(record));
        }
    }

    kept.into_iter().flatten().collect()
}

/// Process-wide mapping from dataset name to strategy.
///
/// Constructed once at startup from an explicit list; passed by reference
/// into the batch processor and job handlers.
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn DatasetStrategy>>,
}

impl StrategyRegistry {
    /// Build the registry with every known dataset strategy.
    ///
    /// Declaration order fixes routing precedence for overlapping prefixes.
    pub fn with_defaults() -> Self {
        Self {
            strategies: vec![
                Arc::new(Strategy::<AuditRecord>::new()),
                Arc::new(Strategy::<PharmacyClaim>::new()),
                Arc::new(Strategy::<LabResult>::new()),
            ],
        }
    }

    /// Look up a strategy by dataset name.
    pub fn get(&self, dataset: &str) -> Option<Arc<dyn DatasetStrategy>> {
        self.strategies
            .iter()
            .find(|s| s.dataset() == dataset)
            .cloned()
    }

    /// Resolve a routing key (object path) to the first matching strategy.
    ///
    /// An unmatched key is a configuration problem, terminal for that file.
    pub fn resolve_routing_key(&self, routing_key: &str) -> AppResult<Arc<dyn DatasetStrategy>> {
        self.strategies
            .iter()
            .find(|s| s.matches(routing_key))
            .cloned()
            .ok_or_else(|| AppError::NoStrategy(routing_key.to_string()))
    }

    /// Registered dataset names, in declaration order.
    pub fn datasets(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.dataset()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup_by_name() {
        let registry = StrategyRegistry::with_defaults();
        assert!(registry.get("audit").is_some());
        assert!(registry.get("pharmacy").is_some());
        assert!(registry.get("labs").is_some());
        assert!(registry.get("dental").is_none());
    }

    #[test]
    fn test_routing_key_resolution() {
        let registry = StrategyRegistry::with_defaults();

        let strategy = registry.resolve_routing_key("audit/2023.csv").unwrap();
        assert_eq!(strategy.dataset(), "audit");

        let strategy = registry.resolve_routing_key("pharmacy/march.csv").unwrap();
        assert_eq!(strategy.dataset(), "pharmacy");

        let strategy = registry.resolve_routing_key("labs/glucose.csv").unwrap();
        assert_eq!(strategy.dataset(), "labs");
    }

    #[test]
    fn test_unmatched_routing_key_is_terminal() {
        let registry = StrategyRegistry::with_defaults();
        let err = registry.resolve_routing_key("unknown/x.csv").unwrap_err();
        assert!(err.is_terminal());
        assert!(err.to_string().contains("unknown/x.csv"));
    }

    #[test]
    fn test_prefix_must_anchor_at_start() {
        let registry = StrategyRegistry::with_defaults();
        assert!(registry.resolve_routing_key("archive/audit/2023.csv").is_err());
    }

    #[test]
    fn test_datasets_declaration_order() {
        let registry = StrategyRegistry::with_defaults();
        assert_eq!(registry.datasets(), vec!["audit", "pharmacy", "labs"]);
    }

    #[test]
    fn test_dedupe_collapses_scale_variant_keys() {
        use chrono::NaiveDate;
        use sqlx::types::BigDecimal;
        use std::str::FromStr;

        let first = AuditRecord {
            provider_npi: "1234567890".to_string(),
            billing_amount: BigDecimal::from_str("100.5").unwrap(),
            service_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            status: "submitted".to_string(),
        };
        let second = AuditRecord {
            billing_amount: BigDecimal::from_str("100.50").unwrap(),
            status: "approved".to_string(),
            ..first.clone()
        };

        // NUMERIC(10,2) treats both amounts as equal, so a single upsert
        // statement may only carry one of them.
        let kept = dedupe_last_wins(vec![first, second]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].status, "approved");
    }

    #[test]
    fn test_natural_keys_exposed() {
        let registry = StrategyRegistry::with_defaults();
        let audit = registry.get("audit").unwrap();
        assert_eq!(
            audit.natural_key(),
            &["provider_npi", "service_date", "billing_amount"]
        );
        let pharmacy = registry.get("pharmacy").unwrap();
        assert_eq!(pharmacy.natural_key(), &["claim_id"]);
    }
}
