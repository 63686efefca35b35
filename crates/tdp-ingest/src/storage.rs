//! Bulk writes to the destination table
//!
//! One flush is one multi-row INSERT executed in its own transaction: all
//! rows of a batch commit together or none do. There is no retry here; a
//! failed write is fatal for the run and the error surfaces unchanged.

use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::error::Result;
use crate::mapping::ColumnMapping;
use crate::models::{CanonicalRecord, FieldValue};

/// Destination for flushed batches. The pipeline drives exactly one sink per
/// run, one batch in flight at a time.
pub trait BatchSink {
    /// Commit one batch atomically, in record order. Returns the number of
    /// rows written.
    fn write_batch(
        &mut self,
        batch: &[CanonicalRecord],
    ) -> impl std::future::Future<Output = Result<u64>> + Send;
}

/// PostgreSQL-backed sink for the `transactions` table.
pub struct TransactionStore {
    pool: PgPool,
    mapping: ColumnMapping,
}

impl TransactionStore {
    pub fn new(pool: PgPool, mapping: ColumnMapping) -> Self {
        Self { pool, mapping }
    }

    /// Truncate the destination table. Every run starts from an empty
    /// table; the session owns it exclusively until the run ends.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("TRUNCATE TABLE transactions RESTART IDENTITY")
            .execute(&self.pool)
            .await?;
        debug!("destination table cleared");
        Ok(())
    }
}

impl BatchSink for TransactionStore {
    async fn write_batch(&mut self, batch: &[CanonicalRecord]) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO transactions ({}) ",
            self.mapping.canonical_columns().join(", ")
        ));

        query_builder.push_values(batch.iter(), |mut b, record| {
            for value in record.values() {
                match value {
                    FieldValue::Amount(v) => {
                        b.push_bind(v.clone());
                    }
                    FieldValue::Timestamp(v) => {
                        b.push_bind(*v);
                    }
                    FieldValue::Flag(v) => {
                        b.push_bind(*v);
                    }
                    FieldValue::Code(v) => {
                        b.push_bind(v.clone());
                    }
                    FieldValue::Text(v) => {
                        b.push_bind(v.clone());
                    }
                }
            }
        });

        query_builder.build().execute(&mut *tx).await?;
        tx.commit().await?;

        debug!(rows = batch.len(), "batch committed");
        Ok(batch.len() as u64)
    }
}
