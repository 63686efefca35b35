//! Data models for ingestion runs
//!
//! The dataset tracking row is the only channel through which external
//! collaborators (progress polling, export, UI) observe a run; nothing here
//! is read back by the pipeline itself once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

/// Lifecycle status of an ingestion run.
///
/// Transitions are monotonic: `pending` -> `processing` -> `completed` or
/// `failed`. There are no backward transitions and the terminal states are
/// final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum DatasetStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DatasetStatus {
    /// Whether `next` is a legal forward transition from this status.
    pub fn can_transition(self, next: DatasetStatus) -> bool {
        matches!(
            (self, next),
            (DatasetStatus::Pending, DatasetStatus::Processing)
                | (DatasetStatus::Processing, DatasetStatus::Completed)
                | (DatasetStatus::Processing, DatasetStatus::Failed)
        )
    }

    /// Whether this status is final.
    pub fn is_terminal(self) -> bool {
        matches!(self, DatasetStatus::Completed | DatasetStatus::Failed)
    }
}

impl std::fmt::Display for DatasetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetStatus::Pending => write!(f, "pending"),
            DatasetStatus::Processing => write!(f, "processing"),
            DatasetStatus::Completed => write!(f, "completed"),
            DatasetStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DatasetStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DatasetStatus::Pending),
            "processing" => Ok(DatasetStatus::Processing),
            "completed" => Ok(DatasetStatus::Completed),
            "failed" => Ok(DatasetStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid dataset status: {}", s)),
        }
    }
}

/// One ingestion run's tracking row, as stored in the `datasets` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Dataset {
    pub id: Uuid,
    pub name: String,
    pub filename: String,
    pub status: DatasetStatus,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub source_checksum: Option<String>,
    pub last_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Dataset {
    /// Whether the run is still in flight.
    pub fn is_running(&self) -> bool {
        self.status == DatasetStatus::Processing
    }

    /// Whether the run finished cleanly.
    pub fn is_completed(&self) -> bool {
        self.status == DatasetStatus::Completed
    }
}

/// Identity of a run about to start; everything else on the row is filled in
/// by the progress recorder.
#[derive(Debug, Clone)]
pub struct NewDataset {
    pub id: Uuid,
    pub name: String,
    pub filename: String,
    pub source_checksum: Option<String>,
}

impl NewDataset {
    pub fn new(name: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            filename: filename.into(),
            source_checksum: None,
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.source_checksum = Some(checksum.into());
        self
    }
}

/// One coerced field of a canonical record.
///
/// The variant is fixed by the column's semantic kind; the defaults encode
/// the coercion policy (flags default to 0, everything else to NULL).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Amount(Option<BigDecimal>),
    Timestamp(Option<DateTime<Utc>>),
    Flag(i16),
    Code(Option<String>),
    Text(Option<String>),
}

/// One destination row's worth of typed values, in column-mapping order.
///
/// Immutable once produced; owned by whichever batch currently holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    values: Vec<FieldValue>,
}

impl CanonicalRecord {
    pub fn new(values: Vec<FieldValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&FieldValue> {
        self.values.get(index)
    }
}
