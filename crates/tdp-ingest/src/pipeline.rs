//! Ingestion pipeline orchestration
//!
//! Wires the source reader, row mapper, batch accumulator, bulk writer, and
//! progress recorder into one run: a single reader task feeds a bounded
//! channel, a single consumer loop maps, accumulates, and flushes. One batch
//! is in flight at a time; while a flush runs the loop does not poll the
//! channel, so the reader blocks once it fills and peak memory stays bounded
//! by the channel plus one batch.
//!
//! External cancellation mid-run is not supported: no checkpoint exists that
//! would allow a safe resume, so killing the process mid-run leaves the
//! destination table and the dataset row in a non-terminal state. A failed
//! run restarts from a cleared table.

use std::path::Path;

use csv_async::StringRecord;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use tdp_common::checksum::Checksum;

use crate::batch::BatchAccumulator;
use crate::config::IngestConfig;
use crate::error::Result;
use crate::mapping::{ColumnMapping, RowMapper};
use crate::models::NewDataset;
use crate::progress::{DatasetStore, PgDatasetStore, ProgressRecorder};
use crate::reader::CsvSource;
use crate::stats::{DatasetReport, StatsReporter};
use crate::storage::{BatchSink, TransactionStore};

/// Outcome of one successful ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub dataset_id: Uuid,
    pub total_rows: u64,
    pub batches_flushed: usize,
    pub stats: DatasetReport,
}

/// Flush sizes observed during one run, in order.
#[derive(Debug, Default)]
pub struct FlushSummary {
    flushes: Vec<u64>,
}

impl FlushSummary {
    fn record(&mut self, written: u64) {
        self.flushes.push(written);
    }

    pub fn flushes(&self) -> &[u64] {
        &self.flushes
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.len()
    }

    pub fn total_rows(&self) -> u64 {
        self.flushes.iter().sum()
    }
}

/// One ingestion run against PostgreSQL.
pub struct IngestPipeline {
    config: IngestConfig,
    pool: PgPool,
}

impl IngestPipeline {
    pub fn new(config: IngestConfig, pool: PgPool) -> Self {
        Self { config, pool }
    }

    /// Execute a full run: stream the file into the destination table,
    /// finalize the dataset row, and produce the post-load report.
    pub async fn run(&self, path: &Path, name: &str) -> Result<IngestReport> {
        info!(file = %path.display(), name, "starting ingestion run");

        // Step 1/5: open the source and resolve the column mapping. A
        // missing file or unusable header fails here, before any run state
        // exists.
        let source = CsvSource::open(path).await?;
        let mapping = ColumnMapping::transactions();
        let mapper = mapping.resolve(source.headers())?;
        let checksum = Checksum::from_file(path)?;

        // Step 2/5: clear the destination table. The session owns it
        // exclusively for the rest of the run.
        let mut store = TransactionStore::new(self.pool.clone(), mapping);
        store.clear().await?;

        // Step 3/5: create the dataset tracking row.
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let dataset =
            NewDataset::new(name, filename).with_checksum(checksum.to_string());
        let mut recorder = ProgressRecorder::start(
            PgDatasetStore::new(self.pool.clone()),
            dataset,
            self.config.progress_persist_every,
        )
        .await?;
        let dataset_id = recorder.dataset_id();

        // Step 4/5: stream, accumulate, flush.
        let (records, reader) = source.stream(self.config.channel_capacity);
        let summary = match run_stream(
            records,
            &mapper,
            self.config.batch_capacity,
            &mut store,
            &mut recorder,
        )
        .await
        {
            Ok(summary) => summary,
            Err(err) => {
                reader.abort();
                error!(dataset_id = %dataset_id, error = %err, "ingestion run failed");
                recorder.fail(&err.to_string()).await;
                return Err(err);
            }
        };

        let total_rows = recorder.processed_rows();
        recorder.complete().await?;
        info!(
            dataset_id = %dataset_id,
            total_rows,
            batches = summary.flush_count(),
            "ingestion run completed"
        );

        // Step 5/5: post-load statistics over the committed table.
        let stats = StatsReporter::new(self.pool.clone())
            .report(self.config.min_category_count)
            .await?;

        Ok(IngestReport {
            dataset_id,
            total_rows,
            batches_flushed: summary.flush_count(),
            stats,
        })
    }
}

/// Drain the record channel into the sink, one batch in flight at a time.
///
/// Every record that enters a batch is either flushed or the run aborts: a
/// decode error arriving through the channel, a failed write, or a failed
/// progress update all return immediately and no further flush is
/// attempted. At end-of-stream the remaining partial batch is flushed once.
pub async fn run_stream<S, D>(
    mut records: mpsc::Receiver<Result<StringRecord>>,
    mapper: &RowMapper,
    batch_capacity: usize,
    sink: &mut S,
    recorder: &mut ProgressRecorder<D>,
) -> Result<FlushSummary>
where
    S: BatchSink,
    D: DatasetStore,
{
    let mut accumulator = BatchAccumulator::new(batch_capacity);
    let mut summary = FlushSummary::default();

    while let Some(next) = records.recv().await {
        let raw = next?;
        let record = mapper.map(&raw);

        if let Some(batch) = accumulator.push(record) {
            let written = sink.write_batch(&batch).await?;
            recorder.record_flush(written).await?;
            summary.record(written);
        }
    }

    if let Some(batch) = accumulator.finish() {
        let written = sink.write_batch(&batch).await?;
        recorder.record_flush(written).await?;
        summary.record(written);
    }

    Ok(summary)
}
