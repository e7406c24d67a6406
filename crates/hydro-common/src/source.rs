//! Read-only contract over a time-indexed array store.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SourceResult;
use crate::timestep::TimeStep;

/// One variable's values at one time index, one per spatial cell.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSlice {
    pub values: Vec<f64>,
    /// Sentinel marking missing entries, if the variable declares one.
    pub fill_value: Option<f64>,
}

impl VariableSlice {
    pub fn new(values: Vec<f64>, fill_value: Option<f64>) -> Self {
        Self { values, fill_value }
    }

    /// Whether an entry is missing: NaN or equal to the fill value.
    pub fn is_missing(&self, value: f64) -> bool {
        value.is_nan() || self.fill_value.is_some_and(|fill| value == fill)
    }

    /// Values with missing entries mapped to `None`.
    pub fn to_nullable(&self) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|&v| if self.is_missing(v) { None } else { Some(v) })
            .collect()
    }
}

/// Names of the dimensions and reserved variables of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceLayout {
    pub time_dimension: String,
    pub cell_dimension: String,
    /// Observation time per step (day counts).
    pub time_variable: String,
    /// Update time per step (day counts).
    pub update_time_variable: String,
    /// Analysis/forecast flag per step.
    pub analysis_flag_variable: String,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            time_dimension: "n_time".to_string(),
            cell_dimension: "n_cells".to_string(),
            time_variable: "time".to_string(),
            update_time_variable: "time_added_to_hydb".to_string(),
            analysis_flag_variable: "is_analysis".to_string(),
        }
    }
}

/// Read-only accessor over a `[time, cell]` array store.
pub trait ArraySource {
    /// Size of a named dimension.
    fn dimension_size(&self, name: &str) -> SourceResult<usize>;

    /// Size of the spatial dimension.
    fn cell_count(&self) -> SourceResult<usize>;

    fn has_variable(&self, name: &str) -> bool;

    /// Values of `name` at `time_index`, one per cell.
    fn variable_slice(&self, name: &str, time_index: usize) -> SourceResult<VariableSlice>;

    /// All time-steps in storage (index) order.
    fn time_steps(&self) -> SourceResult<Vec<TimeStep>>;

    /// Whether the step at `time_index` is an analysis (vs. a forecast).
    fn analysis_flag(&self, time_index: usize) -> SourceResult<bool>;
}

/// Opens array stores by locator.
pub trait SourceOpener {
    type Source: ArraySource;

    fn open(&self, locator: &Path) -> SourceResult<Self::Source>;
}
