//! In-memory array stores.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use hydro_common::{
    ArraySource, SourceError, SourceLayout, SourceOpener, SourceResult, TimeStep, VariableSlice,
};

use crate::generators::create_cell_values;

#[derive(Debug, Clone, Default)]
struct MemoryVariable {
    per_step: Vec<Vec<f64>>,
    fill_value: Option<f64>,
}

/// A `[time, cell]` store held in memory, built step by step.
///
/// Dimension names follow [`SourceLayout::default`].
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    cells: usize,
    steps: Vec<TimeStep>,
    analysis: Vec<bool>,
    variables: BTreeMap<String, MemoryVariable>,
    failing_reads: HashSet<(String, usize)>,
}

impl MemorySource {
    pub fn new(cells: usize) -> Self {
        Self {
            cells,
            ..Default::default()
        }
    }

    /// Append a time-step. Variables added later cover it.
    pub fn with_step(mut self, observation_time: f64, update_time: f64, is_analysis: bool) -> Self {
        let index = self.steps.len();
        self.steps.push(TimeStep::new(index, observation_time, update_time));
        self.analysis.push(is_analysis);
        self
    }

    /// Add a variable filled with [`cell_value`](crate::cell_value) for every current step.
    pub fn with_variable(self, name: &str) -> Self {
        let values = create_cell_values(self.steps.len(), self.cells);
        self.with_variable_values(name, values)
    }

    /// Add a variable with explicit per-step slices.
    pub fn with_variable_values(mut self, name: &str, per_step: Vec<Vec<f64>>) -> Self {
        self.variables.insert(
            name.to_string(),
            MemoryVariable {
                per_step,
                fill_value: None,
            },
        );
        self
    }

    pub fn with_fill_value(mut self, name: &str, fill_value: f64) -> Self {
        if let Some(var) = self.variables.get_mut(name) {
            var.fill_value = Some(fill_value);
        }
        self
    }

    /// Make reads of `name` at `time_index` fail.
    pub fn with_failing_read(mut self, name: &str, time_index: usize) -> Self {
        self.failing_reads.insert((name.to_string(), time_index));
        self
    }

    pub fn steps(&self) -> &[TimeStep] {
        &self.steps
    }
}

impl ArraySource for MemorySource {
    fn dimension_size(&self, name: &str) -> SourceResult<usize> {
        let layout = SourceLayout::default();
        if name == layout.time_dimension {
            Ok(self.steps.len())
        } else if name == layout.cell_dimension {
            Ok(self.cells)
        } else {
            Err(SourceError::DimensionMissing(name.to_string()))
        }
    }

    fn cell_count(&self) -> SourceResult<usize> {
        Ok(self.cells)
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    fn variable_slice(&self, name: &str, time_index: usize) -> SourceResult<VariableSlice> {
        if time_index >= self.steps.len() {
            return Err(SourceError::IndexOutOfRange {
                index: time_index,
                len: self.steps.len(),
            });
        }
        let var = self
            .variables
            .get(name)
            .ok_or_else(|| SourceError::VariableMissing(name.to_string()))?;

        if self.failing_reads.contains(&(name.to_string(), time_index)) {
            return Err(SourceError::Read {
                variable: name.to_string(),
                message: format!("injected failure at time index {}", time_index),
            });
        }

        let values = var
            .per_step
            .get(time_index)
            .cloned()
            .ok_or_else(|| SourceError::Read {
                variable: name.to_string(),
                message: format!("no data at time index {}", time_index),
            })?;

        Ok(VariableSlice::new(values, var.fill_value))
    }

    fn time_steps(&self) -> SourceResult<Vec<TimeStep>> {
        Ok(self.steps.clone())
    }

    fn analysis_flag(&self, time_index: usize) -> SourceResult<bool> {
        self.analysis
            .get(time_index)
            .copied()
            .ok_or(SourceError::IndexOutOfRange {
                index: time_index,
                len: self.analysis.len(),
            })
    }
}

/// Hands out clones of registered [`MemorySource`]s by path.
///
/// Unregistered paths fail to open with [`SourceError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    sources: HashMap<PathBuf, MemorySource>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, locator: impl Into<PathBuf>, source: MemorySource) -> Self {
        self.sources.insert(locator.into(), source);
        self
    }
}

impl SourceOpener for MemoryOpener {
    type Source = MemorySource;

    fn open(&self, locator: &Path) -> SourceResult<MemorySource> {
        self.sources
            .get(locator)
            .cloned()
            .ok_or_else(|| SourceError::Unavailable {
                locator: locator.display().to_string(),
                message: "no such store".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> MemorySource {
        MemorySource::new(3)
            .with_step(100.0, 10.0, true)
            .with_step(101.0, 20.0, false)
            .with_variable("flow")
    }

    #[test]
    fn test_generated_values() {
        let slice = source().variable_slice("flow", 1).unwrap();
        assert_eq!(slice.values, vec![1000.0, 1001.0, 1002.0]);
        assert_eq!(source().dimension_size("n_time").unwrap(), 2);
        assert!(!source().analysis_flag(1).unwrap());
    }

    #[test]
    fn test_errors() {
        let src = source().with_failing_read("flow", 0);
        assert!(matches!(
            src.variable_slice("flow", 0),
            Err(SourceError::Read { .. })
        ));
        assert!(matches!(
            src.variable_slice("flow", 5),
            Err(SourceError::IndexOutOfRange { index: 5, len: 2 })
        ));
        assert!(matches!(
            src.variable_slice("level", 0),
            Err(SourceError::VariableMissing(_))
        ));
    }

    #[test]
    fn test_opener() {
        let opener = MemoryOpener::new().with_source("a.nc", source());
        assert!(opener.open(Path::new("a.nc")).is_ok());
        assert!(matches!(
            opener.open(Path::new("b.nc")),
            Err(SourceError::Unavailable { .. })
        ));
    }
}
