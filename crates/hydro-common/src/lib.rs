//! Common types and utilities shared across the hydro-publisher workspace.

pub mod dataset;
pub mod error;
pub mod row;
pub mod source;
pub mod time;
pub mod timestep;

pub use dataset::{DatasetDescriptor, TargetRelation, VariableSpec, FIXED_COLUMNS};
pub use error::{DescriptorError, SourceError, SourceResult};
pub use row::{Column, Row, RowBatch};
pub use source::{ArraySource, SourceLayout, SourceOpener, VariableSlice};
pub use time::{Calendar, CalendarError, CalendarResult};
pub use timestep::{TimeStep, Watermark};
