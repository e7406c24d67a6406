//! Storage layer for the publisher.
//!
//! Defines the two sink-side contracts used by the pipeline:
//! - [`WatermarkStore`]: per-dataset publication state
//! - [`RowSink`]: idempotent, per-time-step atomic upsert of row batches
//!
//! and their PostgreSQL implementation ([`PgSink`] / [`PgSession`]).

pub mod error;
pub mod postgres;
pub mod sink;
pub mod sql;

pub use error::{StorageError, StorageResult};
pub use postgres::{PgSession, PgSink, PgSinkOptions};
pub use sink::{RowSink, SinkConnector, WatermarkStore};
