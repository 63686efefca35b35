//! End-to-end pipeline tests over real CSV input
//!
//! Drives the streaming reader, mapper, accumulator, and flow control
//! against a file on disk, with in-memory doubles standing in for the
//! PostgreSQL-backed sink and dataset store.

use std::fmt::Write as _;
use std::io::Write as _;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use uuid::Uuid;

use tdp_ingest::pipeline::run_stream;
use tdp_ingest::progress::{DatasetStore, ProgressRecorder};
use tdp_ingest::storage::BatchSink;
use tdp_ingest::{
    CanonicalRecord, ColumnMapping, CsvSource, FieldValue, IngestError, NewDataset, Result,
};

const HEADER: &str =
    "trans_date_trans_time,cc_num,merchant,category,amt,state,mcc,online_order,is_fraud,trans_num";

fn write_transactions_csv(rows: usize) -> tempfile::NamedTempFile {
    let mut contents = String::from(HEADER);
    contents.push('\n');
    for i in 0..rows {
        writeln!(
            contents,
            "2023-01-05 10:{:02}:{:02},4642894980163913,\"Smith, Jones & Co\",grocery_pos,12.50,NY,5411.0,,{},T{i:05}",
            (i / 60) % 60,
            i % 60,
            i % 2,
        )
        .unwrap();
    }

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// In-memory sink that can fail on a chosen flush.
#[derive(Default)]
struct MemorySink {
    batches: Vec<Vec<CanonicalRecord>>,
    fail_on_batch: Option<usize>,
}

impl BatchSink for MemorySink {
    async fn write_batch(&mut self, batch: &[CanonicalRecord]) -> Result<u64> {
        if self.fail_on_batch == Some(self.batches.len()) {
            return Err(IngestError::Database(sqlx::Error::Protocol(
                "connection reset during batch write".to_string(),
            )));
        }
        self.batches.push(batch.to_vec());
        Ok(batch.len() as u64)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    persisted_rows: Vec<i64>,
    completed: Option<(i64, i64)>,
    failed: Option<(i64, String)>,
}

#[derive(Clone, Default)]
struct MemoryDatasetStore {
    state: Arc<Mutex<StoreState>>,
}

impl DatasetStore for MemoryDatasetStore {
    async fn create(&self, _dataset: &NewDataset) -> Result<()> {
        Ok(())
    }

    async fn update_progress(&self, _id: Uuid, processed_rows: i64) -> Result<()> {
        self.state.lock().unwrap().persisted_rows.push(processed_rows);
        Ok(())
    }

    async fn mark_completed(&self, _id: Uuid, total_rows: i64, processed_rows: i64) -> Result<()> {
        self.state.lock().unwrap().completed = Some((total_rows, processed_rows));
        Ok(())
    }

    async fn mark_failed(&self, _id: Uuid, processed_rows: i64, error: &str) -> Result<()> {
        self.state.lock().unwrap().failed = Some((processed_rows, error.to_string()));
        Ok(())
    }
}

async fn open_stream(
    file: &tempfile::NamedTempFile,
    channel_capacity: usize,
) -> (
    tdp_ingest::RowMapper,
    mpsc::Receiver<Result<csv_async::StringRecord>>,
) {
    let source = CsvSource::open(file.path()).await.unwrap();
    let mapper = ColumnMapping::transactions()
        .resolve(source.headers())
        .unwrap();
    let (records, _handle) = source.stream(channel_capacity);
    (mapper, records)
}

#[tokio::test]
async fn test_2500_records_flush_as_1000_1000_500() {
    let file = write_transactions_csv(2500);
    let (mapper, records) = open_stream(&file, 1000).await;

    let mut sink = MemorySink::default();
    let store = MemoryDatasetStore::default();
    let mut recorder =
        ProgressRecorder::start(store.clone(), NewDataset::new("e2e", "e2e.csv"), 10_000)
            .await
            .unwrap();

    let summary = run_stream(records, &mapper, 1000, &mut sink, &mut recorder)
        .await
        .unwrap();

    assert_eq!(summary.flushes(), &[1000, 1000, 500]);
    assert_eq!(summary.total_rows(), 2500);
    assert_eq!(recorder.processed_rows(), 2500);

    recorder.complete().await.unwrap();
    let state = store.state.lock().unwrap();
    assert_eq!(state.completed, Some((2500, 2500)));
    assert!(state.failed.is_none());
}

#[tokio::test]
async fn test_coerced_values_survive_the_full_path() {
    let file = write_transactions_csv(3);
    let (mapper, records) = open_stream(&file, 16).await;

    let mut sink = MemorySink::default();
    let store = MemoryDatasetStore::default();
    let mut recorder =
        ProgressRecorder::start(store, NewDataset::new("e2e", "e2e.csv"), 10_000)
            .await
            .unwrap();

    run_stream(records, &mapper, 1000, &mut sink, &mut recorder)
        .await
        .unwrap();

    let record = &sink.batches[0][0];
    // Quoted merchant name with an embedded delimiter decodes intact.
    assert_eq!(
        record.get(3),
        Some(&FieldValue::Text(Some("Smith, Jones & Co".to_string())))
    );
    // "5411.0" keeps only its integer prefix.
    assert_eq!(record.get(4), Some(&FieldValue::Code(Some("5411".to_string()))));
    // Empty online_order flag defaults to 0, not NULL.
    assert_eq!(record.get(9), Some(&FieldValue::Flag(0)));
    // Space-separated timestamp normalized to UTC.
    assert!(matches!(
        record.get(2),
        Some(FieldValue::Timestamp(Some(_)))
    ));
}

#[tokio::test]
async fn test_progress_persists_every_interval() {
    let file = write_transactions_csv(2500);
    let (mapper, records) = open_stream(&file, 500).await;

    let mut sink = MemorySink::default();
    let store = MemoryDatasetStore::default();
    let mut recorder =
        ProgressRecorder::start(store.clone(), NewDataset::new("e2e", "e2e.csv"), 1000)
            .await
            .unwrap();

    run_stream(records, &mapper, 500, &mut sink, &mut recorder)
        .await
        .unwrap();

    // Five 500-row flushes with K=1000: persisted after rows 1000 and 2000;
    // the trailing 500 stay in memory until completion.
    assert_eq!(
        store.state.lock().unwrap().persisted_rows,
        vec![1000, 2000]
    );
}

#[tokio::test]
async fn test_write_failure_on_second_flush_stops_the_run() {
    let file = write_transactions_csv(2500);
    let (mapper, records) = open_stream(&file, 1000).await;

    let mut sink = MemorySink {
        fail_on_batch: Some(1),
        ..Default::default()
    };
    let store = MemoryDatasetStore::default();
    let mut recorder =
        ProgressRecorder::start(store.clone(), NewDataset::new("e2e", "e2e.csv"), 10_000)
            .await
            .unwrap();

    let result = run_stream(records, &mapper, 1000, &mut sink, &mut recorder).await;

    assert!(matches!(result, Err(IngestError::Database(_))));
    assert_eq!(sink.batches.len(), 1);
    assert_eq!(recorder.processed_rows(), 1000);

    recorder.fail("connection reset during batch write").await;
    let state = store.state.lock().unwrap();
    assert_eq!(state.failed.as_ref().map(|f| f.0), Some(1000));
    assert!(state.completed.is_none());
}

#[tokio::test]
async fn test_malformed_row_aborts_without_completion() {
    let mut contents = String::from(HEADER);
    contents.push('\n');
    contents.push_str("2023-01-05 10:00:00,1,m,grocery_pos,1.00,NY,5411,,0,T00001\n");
    contents.push_str("too,few,fields\n");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();

    let (mapper, records) = open_stream(&file, 16).await;
    let mut sink = MemorySink::default();
    let store = MemoryDatasetStore::default();
    let mut recorder =
        ProgressRecorder::start(store.clone(), NewDataset::new("e2e", "e2e.csv"), 10_000)
            .await
            .unwrap();

    let result = run_stream(records, &mapper, 1000, &mut sink, &mut recorder).await;

    assert!(matches!(result, Err(IngestError::Decode(_))));
    // Nothing was flushed and the dataset was never finalized.
    assert!(sink.batches.is_empty());
    let state = store.state.lock().unwrap();
    assert!(state.completed.is_none());
    assert!(state.failed.is_none());
}
