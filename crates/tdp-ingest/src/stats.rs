//! Post-load statistics reporting
//!
//! Read-only aggregate queries over the committed destination table. The
//! reporter never mutates anything and is safe to re-run; it refuses to
//! report while the latest run is not `completed`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::error::{IngestError, Result};
use crate::models::{Dataset, DatasetStatus};

/// Aggregate quality report over one loaded dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub total_transactions: i64,
    pub distinct_cards: i64,
    pub distinct_merchants: i64,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub first_transaction: Option<DateTime<Utc>>,
    pub last_transaction: Option<DateTime<Utc>>,
    pub categories: Vec<CategoryCount>,
    pub fraud_by_category: Vec<CategoryFraudRate>,
}

/// Transaction count for one category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub transactions: i64,
}

/// Flagged-transaction rate for one category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryFraudRate {
    pub category: String,
    pub transactions: i64,
    pub flagged: i64,
    pub fraud_rate_pct: f64,
}

/// Runs the aggregate queries against the destination table.
pub struct StatsReporter {
    pool: PgPool,
}

impl StatsReporter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The most recently started run, if any.
    pub async fn latest_dataset(&self) -> Result<Option<Dataset>> {
        let dataset = sqlx::query_as::<_, Dataset>(
            r#"
            SELECT id, name, filename, status, total_rows, processed_rows,
                   source_checksum, last_error, started_at, completed_at
            FROM datasets
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(dataset)
    }

    /// Report on the latest run, refusing anything not `completed`.
    pub async fn report_latest(&self, min_category_count: i64) -> Result<DatasetReport> {
        let dataset = self.latest_dataset().await?.ok_or(IngestError::NoDataset)?;
        if dataset.status != DatasetStatus::Completed {
            return Err(IngestError::RunNotCompleted(dataset.id, dataset.status));
        }

        self.report(min_category_count).await
    }

    /// Run the aggregate queries. Callers are responsible for only invoking
    /// this after a completed load (the pipeline does, `report_latest`
    /// checks).
    pub async fn report(&self, min_category_count: i64) -> Result<DatasetReport> {
        let total_transactions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;

        let distinct_cards: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT card_id) FROM transactions")
                .fetch_one(&self.pool)
                .await?;

        let distinct_merchants: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT merchant_name) FROM transactions")
                .fetch_one(&self.pool)
                .await?;

        let ranges = sqlx::query(
            r#"
            SELECT MIN(amount)::float8 AS min_amount,
                   MAX(amount)::float8 AS max_amount,
                   MIN(occurred_at) AS first_transaction,
                   MAX(occurred_at) AS last_transaction
            FROM transactions
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let categories = sqlx::query(
            r#"
            SELECT COALESCE(category, 'uncategorized') AS category,
                   COUNT(*) AS transactions
            FROM transactions
            GROUP BY 1
            ORDER BY COUNT(*) DESC, 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| {
            Ok(CategoryCount {
                category: row.try_get("category")?,
                transactions: row.try_get("transactions")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

        let mut fraud_by_category = sqlx::query(
            r#"
            SELECT COALESCE(category, 'uncategorized') AS category,
                   COUNT(*) AS transactions,
                   COUNT(*) FILTER (WHERE is_fraud = 1) AS flagged
            FROM transactions
            GROUP BY 1
            HAVING COUNT(*) >= $1
            "#,
        )
        .bind(min_category_count)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| {
            let transactions: i64 = row.try_get("transactions")?;
            let flagged: i64 = row.try_get("flagged")?;
            Ok(CategoryFraudRate {
                category: row.try_get("category")?,
                transactions,
                flagged,
                fraud_rate_pct: fraud_rate_pct(flagged, transactions),
            })
        })
        .collect::<Result<Vec<_>>>()?;

        fraud_by_category.sort_by(|a, b| {
            b.fraud_rate_pct
                .partial_cmp(&a.fraud_rate_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        info!(
            total_transactions,
            distinct_cards,
            categories = categories.len(),
            "dataset report computed"
        );

        Ok(DatasetReport {
            total_transactions,
            distinct_cards,
            distinct_merchants,
            min_amount: ranges.try_get("min_amount")?,
            max_amount: ranges.try_get("max_amount")?,
            first_transaction: ranges.try_get("first_transaction")?,
            last_transaction: ranges.try_get("last_transaction")?,
            categories,
            fraud_by_category,
        })
    }
}

/// Percentage of flagged rows in a group. Empty groups rate 0.
fn fraud_rate_pct(flagged: i64, total: i64) -> f64 {
    if total <= 0 {
        0.0
    } else {
        (flagged as f64 / total as f64) * 100.0
    }
}
