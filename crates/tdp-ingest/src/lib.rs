//! TDP Ingest Library
//!
//! Streams a delimited transaction export into PostgreSQL under a
//! bounded-memory, backpressure-controlled pipeline, tracking per-run
//! progress in a dataset row and producing post-load quality statistics.
//!
//! Architecture, leaves first:
//! - `mapping` + `coerce`: schema-aware conversion of raw fields into typed
//!   canonical records
//! - `reader`: streaming CSV decode into a bounded channel
//! - `batch`: capacity-bounded accumulation
//! - `storage`: atomic multi-row batch writes
//! - `progress`: dataset row lifecycle and counters
//! - `stats`: read-only aggregates after a completed load
//! - `pipeline`: orchestration of one run
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tdp_ingest::{IngestConfig, IngestPipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::load()?;
//!     let pool = sqlx::PgPool::connect(&config.database.url).await?;
//!     let pipeline = IngestPipeline::new(config, pool);
//!     let report = pipeline.run(Path::new("transactions.csv"), "January export").await?;
//!     tracing::info!(rows = report.total_rows, "load finished");
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod coerce;
pub mod config;
pub mod error;
pub mod mapping;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod reader;
pub mod stats;
pub mod storage;

// Re-export main types
pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use mapping::{ColumnKind, ColumnMapping, RowMapper};
pub use models::{CanonicalRecord, Dataset, DatasetStatus, FieldValue, NewDataset};
pub use pipeline::{IngestPipeline, IngestReport};
pub use progress::{DatasetStore, PgDatasetStore, ProgressRecorder};
pub use reader::CsvSource;
pub use stats::{DatasetReport, StatsReporter};
pub use storage::{BatchSink, TransactionStore};
