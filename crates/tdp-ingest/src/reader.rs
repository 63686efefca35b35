//! Streaming CSV source reader
//!
//! Produces a lazy, finite, non-restartable sequence of raw records: the
//! header is read exactly once at open, then data records flow through a
//! bounded channel in input order. The channel is the flow controller: once
//! it fills, the reader task blocks until the consumer drains it, which
//! bounds buffered rows without any explicit pause/resume bookkeeping.

use std::path::Path;

use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord};
use futures::StreamExt;
use tokio::fs::File;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{IngestError, Result};

/// An open CSV source with its header already decoded.
pub struct CsvSource {
    reader: AsyncReader<File>,
    headers: StringRecord,
}

impl CsvSource {
    /// Open the file and read the header row.
    ///
    /// A missing or unreadable file fails here, before any run state
    /// exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path).await?;
        let mut reader = AsyncReaderBuilder::new()
            .has_headers(true)
            .create_reader(file);
        let headers = reader.headers().await?.clone();

        Ok(Self { reader, headers })
    }

    /// The header field names, in file order.
    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    /// Start streaming data records into a bounded channel of the given
    /// capacity.
    ///
    /// A record that cannot be decoded is forwarded as an error and ends
    /// the stream: malformed input is fatal for the whole run. A cleanly
    /// exhausted source simply closes the channel.
    pub fn stream(self, capacity: usize) -> (mpsc::Receiver<Result<StringRecord>>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);

        let handle = tokio::spawn(async move {
            let mut records = self.reader.into_records();
            while let Some(next) = records.next().await {
                let outcome = next.map_err(IngestError::from);
                let fatal = outcome.is_err();

                if tx.send(outcome).await.is_err() {
                    debug!("record channel closed by consumer, stopping reader");
                    break;
                }
                if fatal {
                    break;
                }
            }
        });

        (rx, handle)
    }
}
