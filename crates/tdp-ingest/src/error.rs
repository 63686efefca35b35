//! Error types for the ingestion pipeline

use uuid::Uuid;

use crate::models::DatasetStatus;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Fatal conditions the pipeline can surface to its caller.
///
/// Unparsable field values are deliberately absent: coercion substitutes the
/// column's default and never fails. There is no retry layer anywhere; every
/// variant here terminates the run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV decode error: {0}")]
    Decode(#[from] csv_async::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Column mapping error: {0}")]
    Mapping(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dataset {0} has status '{1}', statistics require a completed run")]
    RunNotCompleted(Uuid, DatasetStatus),

    #[error("No completed dataset found")]
    NoDataset,
}
