//! Projection of one time-step into a row batch.

use hydro_common::{ArraySource, Calendar, Column, DatasetDescriptor, RowBatch, TimeStep};

use crate::error::{PipelineError, Result};

/// Build the rows of `step`: one per cell, `cell_id` 1-based.
///
/// Timestamps are converted once and shared by every row. Variable columns
/// follow the descriptor's order; NaN and fill entries become `None`.
pub fn project_time_step<S>(
    source: &S,
    dataset: &DatasetDescriptor,
    step: &TimeStep,
    calendar: &Calendar,
) -> Result<RowBatch>
where
    S: ArraySource + ?Sized,
{
    let cells = source.cell_count()?;
    let last_id = i16::try_from(cells).map_err(|_| PipelineError::TooManyCells(cells))?;

    let observation_timestamp = calendar.to_calendar(step.observation_time)?;
    let update_timestamp = calendar.to_calendar(step.update_time)?;
    let is_analysis = source.analysis_flag(step.index)?;

    let mut columns = Vec::with_capacity(dataset.variables.len());
    for var in &dataset.variables {
        let slice = source.variable_slice(&var.source, step.index)?;
        if slice.values.len() != cells {
            return Err(PipelineError::LengthMismatch {
                variable: var.source.clone(),
                expected: cells,
                actual: slice.values.len(),
            });
        }
        columns.push(Column {
            name: var.column.clone(),
            values: slice.to_nullable(),
        });
    }

    Ok(RowBatch {
        cell_ids: (1..=last_id).collect(),
        observation_timestamp,
        update_timestamp,
        is_analysis,
        columns,
    })
}
