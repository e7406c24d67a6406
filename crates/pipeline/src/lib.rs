//! Watermark-driven publishing pipeline.
//!
//! Moves the time-steps of an array store that changed since the last clean
//! run into a relational sink:
//!
//! - [`select_changes`]: filter the time axis against the stored watermark
//! - [`project_time_step`]: one step's slices as a columnar row batch
//! - [`RunAccumulator`]: per-step outcomes and the next watermark
//! - [`Orchestrator`]: drives datasets through the above with one sink
//!   session each

pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod projector;
pub mod selector;

// Re-exports
pub use error::{PipelineError, Result};
pub use orchestrator::{
    DatasetReport, DatasetStatus, Orchestrator, PublishOptions, RunReport, RunState,
};
pub use outcome::{RunAccumulator, StepOutcome};
pub use projector::project_time_step;
pub use selector::select_changes;
