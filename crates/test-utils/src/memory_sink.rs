//! In-memory sink with failure injection.
//!
//! [`MemorySink`] is a cheap handle over shared state: clone it before handing
//! it to the code under test, then inspect the clone.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use hydro_common::{RowBatch, TargetRelation, Watermark};
use storage::{RowSink, SinkConnector, StorageError, StorageResult, WatermarkStore};

/// A row as the sink holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub cell_id: i16,
    pub observation_timestamp: DateTime<Utc>,
    pub update_timestamp: DateTime<Utc>,
    pub is_analysis: bool,
    pub values: BTreeMap<String, Option<f64>>,
}

type Table = BTreeMap<(i16, DateTime<Utc>), StoredRow>;

#[derive(Debug, Default)]
struct SinkState {
    tables: HashMap<String, Table>,
    watermarks: HashMap<String, (Watermark, u32)>,
    failing_observations: HashSet<DateTime<Utc>>,
    lost_at: Option<DateTime<Utc>>,
    unavailable: bool,
    fail_state_reads: bool,
    fail_state_writes: bool,
    sessions_opened: usize,
    publish_calls: usize,
    state_writes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<SinkState>>,
}

fn lock(state: &Mutex<SinkState>) -> MutexGuard<'_, SinkState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// New sessions fail, and open sessions fail to publish.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// Reject every batch for this observation timestamp.
    pub fn fail_publish_at(&self, observation: DateTime<Utc>) {
        lock(&self.state).failing_observations.insert(observation);
    }

    /// Go offline when the batch for this observation timestamp arrives.
    pub fn lose_connection_at(&self, observation: DateTime<Utc>) {
        lock(&self.state).lost_at = Some(observation);
    }

    pub fn clear_publish_failures(&self) {
        lock(&self.state).failing_observations.clear();
    }

    pub fn fail_state_reads(&self) {
        lock(&self.state).fail_state_reads = true;
    }

    pub fn fail_state_writes(&self) {
        lock(&self.state).fail_state_writes = true;
    }

    /// Store a watermark as if written by an earlier run.
    pub fn seed_watermark(&self, dataset: &str, watermark: Watermark) {
        lock(&self.state)
            .watermarks
            .insert(dataset.to_string(), (watermark, 0));
    }

    pub fn watermark(&self, dataset: &str) -> Option<Watermark> {
        lock(&self.state).watermarks.get(dataset).map(|(w, _)| *w)
    }

    /// Error count recorded with the dataset's last state write.
    pub fn recorded_errors(&self, dataset: &str) -> Option<u32> {
        lock(&self.state).watermarks.get(dataset).map(|(_, e)| *e)
    }

    /// Rows of `target` ordered by `(cell_id, observation_timestamp)`.
    pub fn rows(&self, target: &TargetRelation) -> Vec<StoredRow> {
        lock(&self.state)
            .tables
            .get(&target.to_string())
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn row_count(&self, target: &TargetRelation) -> usize {
        lock(&self.state)
            .tables
            .get(&target.to_string())
            .map_or(0, BTreeMap::len)
    }

    /// Distinct observation timestamps present in `target`.
    pub fn observations(&self, target: &TargetRelation) -> Vec<DateTime<Utc>> {
        let mut seen: Vec<_> = self
            .rows(target)
            .into_iter()
            .map(|r| r.observation_timestamp)
            .collect();
        seen.sort();
        seen.dedup();
        seen
    }

    pub fn sessions_opened(&self) -> usize {
        lock(&self.state).sessions_opened
    }

    pub fn publish_calls(&self) -> usize {
        lock(&self.state).publish_calls
    }

    pub fn state_writes(&self) -> usize {
        lock(&self.state).state_writes
    }
}

#[async_trait]
impl SinkConnector for MemorySink {
    type Session = MemorySession;

    async fn session(&self) -> StorageResult<MemorySession> {
        let mut state = lock(&self.state);
        if state.unavailable {
            return Err(StorageError::Unavailable("memory sink offline".to_string()));
        }
        state.sessions_opened += 1;
        Ok(MemorySession {
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct MemorySession {
    state: Arc<Mutex<SinkState>>,
}

#[async_trait]
impl WatermarkStore for MemorySession {
    async fn read(&mut self, dataset: &str) -> StorageResult<Option<Watermark>> {
        let state = lock(&self.state);
        if state.fail_state_reads {
            return Err(StorageError::Database("injected state read failure".to_string()));
        }
        Ok(state.watermarks.get(dataset).map(|(w, _)| *w))
    }

    async fn write(
        &mut self,
        dataset: &str,
        watermark: &Watermark,
        error_count: u32,
    ) -> StorageResult<()> {
        let mut state = lock(&self.state);
        if state.fail_state_writes {
            return Err(StorageError::Database("injected state write failure".to_string()));
        }
        state.state_writes += 1;
        state
            .watermarks
            .insert(dataset.to_string(), (*watermark, error_count));
        Ok(())
    }
}

#[async_trait]
impl RowSink for MemorySession {
    async fn publish(&mut self, batch: &RowBatch, target: &TargetRelation) -> StorageResult<()> {
        let mut state = lock(&self.state);
        state.publish_calls += 1;

        if state.lost_at == Some(batch.observation_timestamp) {
            state.unavailable = true;
        }
        if state.unavailable {
            return Err(StorageError::Unavailable("memory sink offline".to_string()));
        }
        if state
            .failing_observations
            .contains(&batch.observation_timestamp)
        {
            return Err(StorageError::Rejected(format!(
                "injected failure for {}",
                batch.observation_timestamp
            )));
        }
        if let Some(column) = batch.columns.iter().find(|c| c.values.len() != batch.len()) {
            return Err(StorageError::Rejected(format!(
                "column {} has {} values for {} rows",
                column.name,
                column.values.len(),
                batch.len()
            )));
        }

        let table = state.tables.entry(target.to_string()).or_default();
        for row in batch.rows() {
            let values = batch
                .column_names()
                .map(str::to_string)
                .zip(row.values.iter().copied())
                .collect();
            table.insert(
                (row.cell_id, row.observation_timestamp),
                StoredRow {
                    cell_id: row.cell_id,
                    observation_timestamp: row.observation_timestamp,
                    update_timestamp: row.update_timestamp,
                    is_analysis: row.is_analysis,
                    values,
                },
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydro_common::Column;

    fn batch(observation: DateTime<Utc>, flow: f64) -> RowBatch {
        RowBatch {
            cell_ids: vec![1, 2],
            observation_timestamp: observation,
            update_timestamp: observation,
            is_analysis: true,
            columns: vec![Column {
                name: "flow_mean".to_string(),
                values: vec![Some(flow), None],
            }],
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_rows() {
        let sink = MemorySink::new();
        let target = TargetRelation::new("hyfaa", "data_test");
        let t = crate::fixtures::day(100.0);

        let mut session = sink.session().await.unwrap();
        session.publish(&batch(t, 1.0), &target).await.unwrap();
        session.publish(&batch(t, 2.0), &target).await.unwrap();

        let rows = sink.rows(&target);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values["flow_mean"], Some(2.0));
        assert_eq!(rows[1].values["flow_mean"], None);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let sink = MemorySink::new();
        let target = TargetRelation::new("hyfaa", "data_test");
        let t = crate::fixtures::day(100.0);
        sink.fail_publish_at(t);

        let mut session = sink.session().await.unwrap();
        assert!(session.publish(&batch(t, 1.0), &target).await.is_err());
        assert_eq!(sink.row_count(&target), 0);

        sink.set_unavailable(true);
        let err = sink.session().await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
