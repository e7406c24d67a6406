//! [`ArraySource`] over a NetCDF file.

use std::path::{Path, PathBuf};

use hydro_common::{
    ArraySource, SourceError, SourceLayout, SourceOpener, SourceResult, TimeStep, VariableSlice,
};
use tracing::{debug, info};

use crate::native::{fill_value, mask_fill, silence_hdf5_errors, Packing};

/// Opens NetCDF stores with a fixed layout.
#[derive(Debug, Clone, Default)]
pub struct NetCdfOpener {
    pub layout: SourceLayout,
}

impl NetCdfOpener {
    pub fn new(layout: SourceLayout) -> Self {
        Self { layout }
    }
}

impl SourceOpener for NetCdfOpener {
    type Source = NetCdfSource;

    fn open(&self, locator: &Path) -> SourceResult<NetCdfSource> {
        NetCdfSource::open(locator, self.layout.clone())
    }
}

/// An open NetCDF store.
///
/// The per-step variables are small and read once at open; `[time, cell]`
/// variables are read one time index at a time.
pub struct NetCdfSource {
    path: PathBuf,
    file: netcdf::File,
    layout: SourceLayout,
    steps: Vec<TimeStep>,
    analysis: Vec<bool>,
    cells: usize,
}

impl std::fmt::Debug for NetCdfSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetCdfSource")
            .field("path", &self.path)
            .field("time_steps", &self.steps.len())
            .field("cells", &self.cells)
            .finish()
    }
}

impl NetCdfSource {
    /// Open a store and read its time axis.
    pub fn open(path: &Path, layout: SourceLayout) -> SourceResult<Self> {
        silence_hdf5_errors();

        let file = netcdf::open(path).map_err(|e| SourceError::Unavailable {
            locator: path.display().to_string(),
            message: e.to_string(),
        })?;

        let n_time = dimension_len(&file, &layout.time_dimension)?;
        let cells = dimension_len(&file, &layout.cell_dimension)?;

        let observation = read_per_step(&file, &layout.time_variable, n_time)?;
        let update = read_per_step(&file, &layout.update_time_variable, n_time)?;
        let analysis = read_per_step(&file, &layout.analysis_flag_variable, n_time)?
            .into_iter()
            .map(|v| !v.is_nan() && v != 0.0)
            .collect();

        let steps = observation
            .into_iter()
            .zip(update)
            .enumerate()
            .map(|(index, (obs, upd))| TimeStep::new(index, obs, upd))
            .collect();

        info!(
            path = %path.display(),
            time_steps = n_time,
            cells = cells,
            "Opened NetCDF store"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            layout,
            steps,
            analysis,
            cells,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> &SourceLayout {
        &self.layout
    }

    fn check_index(&self, time_index: usize) -> SourceResult<()> {
        if time_index >= self.steps.len() {
            return Err(SourceError::IndexOutOfRange {
                index: time_index,
                len: self.steps.len(),
            });
        }
        Ok(())
    }
}

impl ArraySource for NetCdfSource {
    fn dimension_size(&self, name: &str) -> SourceResult<usize> {
        dimension_len(&self.file, name)
    }

    fn cell_count(&self) -> SourceResult<usize> {
        Ok(self.cells)
    }

    fn has_variable(&self, name: &str) -> bool {
        self.file.variable(name).is_some()
    }

    fn variable_slice(&self, name: &str, time_index: usize) -> SourceResult<VariableSlice> {
        self.check_index(time_index)?;

        let var = self
            .file
            .variable(name)
            .ok_or_else(|| SourceError::VariableMissing(name.to_string()))?;

        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        if dims.len() != 2
            || dims[0] != self.layout.time_dimension
            || dims[1] != self.layout.cell_dimension
        {
            return Err(SourceError::Read {
                variable: name.to_string(),
                message: format!(
                    "expected dimensions [{}, {}], found {:?}",
                    self.layout.time_dimension, self.layout.cell_dimension, dims
                ),
            });
        }

        let mut values: Vec<f64> =
            var.get_values((time_index, ..))
                .map_err(|e| SourceError::Read {
                    variable: name.to_string(),
                    message: e.to_string(),
                })?;

        let fill = fill_value(&var);
        if let Some(packing) = Packing::of(&var) {
            packing.apply(&mut values, fill);
        }

        debug!(variable = %name, time_index = time_index, len = values.len(), "Read slice");

        Ok(VariableSlice::new(values, fill))
    }

    fn time_steps(&self) -> SourceResult<Vec<TimeStep>> {
        Ok(self.steps.clone())
    }

    fn analysis_flag(&self, time_index: usize) -> SourceResult<bool> {
        self.check_index(time_index)?;
        Ok(self.analysis[time_index])
    }
}

fn dimension_len(file: &netcdf::File, name: &str) -> SourceResult<usize> {
    file.dimension(name)
        .map(|d| d.len())
        .ok_or_else(|| SourceError::DimensionMissing(name.to_string()))
}

/// Read a one-dimensional per-step variable, unpacked, with fill entries
/// replaced by NaN.
fn read_per_step(file: &netcdf::File, name: &str, n_time: usize) -> SourceResult<Vec<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| SourceError::VariableMissing(name.to_string()))?;

    let mut values: Vec<f64> = var.get_values(..).map_err(|e| SourceError::Read {
        variable: name.to_string(),
        message: e.to_string(),
    })?;

    if values.len() != n_time {
        return Err(SourceError::Read {
            variable: name.to_string(),
            message: format!("expected {} values, found {}", n_time, values.len()),
        });
    }

    let fill = fill_value(&var);
    if let Some(packing) = Packing::of(&var) {
        packing.apply(&mut values, fill);
    }
    mask_fill(&mut values, fill);

    Ok(values)
}
