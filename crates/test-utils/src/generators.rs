//! Test data generators for synthetic simulation stores.
//!
//! These generators create predictable, verifiable values so a test can
//! recompute what any row should contain.

use hydro_common::TimeStep;

/// Value stored for `cell` (0-based) at time index `step`.
///
/// Calculated as `step * 1000 + cell`, so a published row can be traced
/// back to its source position.
///
/// # Example
///
/// ```
/// use test_utils::cell_value;
///
/// assert_eq!(cell_value(0, 0), 0.0);
/// assert_eq!(cell_value(2, 7), 2007.0);
/// ```
pub fn cell_value(step: usize, cell: usize) -> f64 {
    (step * 1000 + cell) as f64
}

/// One slice of [`cell_value`]s per time index.
pub fn create_cell_values(steps: usize, cells: usize) -> Vec<Vec<f64>> {
    (0..steps)
        .map(|step| (0..cells).map(|cell| cell_value(step, cell)).collect())
        .collect()
}

/// Daily observation times starting at `first_observation`, with the given
/// update times.
///
/// # Example
///
/// ```
/// use test_utils::create_time_steps;
///
/// let steps = create_time_steps(100.0, &[10.0, 20.0, 30.0]);
/// assert_eq!(steps[2].observation_time, 102.0);
/// assert_eq!(steps[2].update_time, 30.0);
/// ```
pub fn create_time_steps(first_observation: f64, update_times: &[f64]) -> Vec<TimeStep> {
    update_times
        .iter()
        .enumerate()
        .map(|(index, &update)| TimeStep::new(index, first_observation + index as f64, update))
        .collect()
}

/// A slice with `NaN` at the given cells.
pub fn create_values_with_nans(len: usize, value: f64, nan_cells: &[usize]) -> Vec<f64> {
    (0..len)
        .map(|i| if nan_cells.contains(&i) { f64::NAN } else { value })
        .collect()
}
