//! Run-progress bookkeeping
//!
//! The progress recorder owns the dataset tracking row for one run: it
//! creates the row before any data is read, counts every flushed batch, and
//! finalizes the row exactly once. In-memory counters are always exact; the
//! persisted row may lag by up to the persistence interval K, which bounds
//! write amplification on large inputs.

use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{DatasetStatus, NewDataset};

/// Persistence operations on the dataset tracking row.
pub trait DatasetStore {
    fn create(
        &self,
        dataset: &NewDataset,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn update_progress(
        &self,
        id: Uuid,
        processed_rows: i64,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn mark_completed(
        &self,
        id: Uuid,
        total_rows: i64,
        processed_rows: i64,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn mark_failed(
        &self,
        id: Uuid,
        processed_rows: i64,
        error: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// PostgreSQL-backed store for the `datasets` table.
#[derive(Clone)]
pub struct PgDatasetStore {
    pool: PgPool,
}

impl PgDatasetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DatasetStore for PgDatasetStore {
    async fn create(&self, dataset: &NewDataset) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO datasets (
                id, name, filename, status, total_rows, processed_rows,
                source_checksum, started_at
            )
            VALUES ($1, $2, $3, $4, 0, 0, $5, $6)
            "#,
        )
        .bind(dataset.id)
        .bind(&dataset.name)
        .bind(&dataset.filename)
        .bind(DatasetStatus::Processing.to_string())
        .bind(&dataset.source_checksum)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_progress(&self, id: Uuid, processed_rows: i64) -> Result<()> {
        sqlx::query("UPDATE datasets SET processed_rows = $2 WHERE id = $1")
            .bind(id)
            .bind(processed_rows)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn mark_completed(&self, id: Uuid, total_rows: i64, processed_rows: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE datasets
            SET status = $2, total_rows = $3, processed_rows = $4, completed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(DatasetStatus::Completed.to_string())
        .bind(total_rows)
        .bind(processed_rows)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, processed_rows: i64, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE datasets
            SET status = $2, processed_rows = $3, last_error = $4, completed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(DatasetStatus::Failed.to_string())
        .bind(processed_rows)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Tracks one run's progress against a [`DatasetStore`].
///
/// Finalization consumes the recorder, so a run can be completed or failed
/// at most once; the status transitions stay monotonic by construction.
pub struct ProgressRecorder<D: DatasetStore> {
    store: D,
    dataset_id: Uuid,
    processed_rows: u64,
    persisted_rows: u64,
    persist_every: u64,
}

impl<D: DatasetStore> ProgressRecorder<D> {
    /// Insert the dataset row with status `processing` and a start
    /// timestamp. Runs before any data record is read.
    pub async fn start(store: D, dataset: NewDataset, persist_every: u64) -> Result<Self> {
        store.create(&dataset).await?;
        info!(dataset_id = %dataset.id, name = %dataset.name, "dataset row created");

        Ok(Self {
            store,
            dataset_id: dataset.id,
            processed_rows: 0,
            persisted_rows: 0,
            persist_every,
        })
    }

    pub fn dataset_id(&self) -> Uuid {
        self.dataset_id
    }

    /// Exact number of rows committed so far.
    pub fn processed_rows(&self) -> u64 {
        self.processed_rows
    }

    /// Count one flushed batch. The counter is persisted only once every
    /// `persist_every` rows; a persistence failure is fatal for the run but
    /// does not roll back batches that already committed.
    pub async fn record_flush(&mut self, written: u64) -> Result<()> {
        self.processed_rows += written;

        if self.processed_rows - self.persisted_rows >= self.persist_every {
            self.store
                .update_progress(self.dataset_id, self.processed_rows as i64)
                .await?;
            self.persisted_rows = self.processed_rows;
            debug!(
                dataset_id = %self.dataset_id,
                processed_rows = self.processed_rows,
                "progress persisted"
            );
        }

        Ok(())
    }

    /// Finalize a clean end-of-stream: total rows, processed rows, status
    /// `completed`, and the completion timestamp in one update.
    pub async fn complete(self) -> Result<()> {
        self.store
            .mark_completed(
                self.dataset_id,
                self.processed_rows as i64,
                self.processed_rows as i64,
            )
            .await?;
        info!(
            dataset_id = %self.dataset_id,
            total_rows = self.processed_rows,
            "dataset completed"
        );

        Ok(())
    }

    /// Finalize a fatal abort: status `failed` with the distinguishing
    /// error. Best effort; the run is already failing for another reason,
    /// so a failure here is logged rather than surfaced.
    pub async fn fail(self, error: &str) {
        if let Err(update_err) = self
            .store
            .mark_failed(self.dataset_id, self.processed_rows as i64, error)
            .await
        {
            warn!(
                dataset_id = %self.dataset_id,
                error = %update_err,
                "failed to record dataset failure"
            );
        } else {
            info!(dataset_id = %self.dataset_id, "dataset marked failed");
        }
    }
}
