//! Sink-side contracts.

use async_trait::async_trait;

use hydro_common::{RowBatch, TargetRelation, Watermark};

use crate::error::StorageResult;

/// Persistent per-dataset watermark record.
#[async_trait]
pub trait WatermarkStore: Send {
    /// Stored watermark, or `None` if the dataset was never published.
    async fn read(&mut self, dataset: &str) -> StorageResult<Option<Watermark>>;

    /// Create or replace the dataset's record as one atomic write.
    ///
    /// `watermark.last_update_time_seen` carries the last observation time
    /// scanned by the run.
    async fn write(
        &mut self,
        dataset: &str,
        watermark: &Watermark,
        error_count: u32,
    ) -> StorageResult<()>;
}

/// Upsert target for row batches.
#[async_trait]
pub trait RowSink: Send {
    /// Upsert every row of `batch` into `target`, all or nothing.
    ///
    /// Rows are keyed on `(cell_id, observation_timestamp)`; existing rows
    /// take the incoming values for every other column.
    async fn publish(&mut self, batch: &RowBatch, target: &TargetRelation) -> StorageResult<()>;
}

/// Hands out sessions scoped to one dataset's run.
#[async_trait]
pub trait SinkConnector: Send + Sync {
    type Session: WatermarkStore + RowSink + Send;

    /// Acquire a session; failure means the sink is unavailable.
    async fn session(&self) -> StorageResult<Self::Session>;
}
