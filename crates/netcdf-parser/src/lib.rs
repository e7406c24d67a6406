//! NetCDF reader for time-indexed simulation stores.
//!
//! Stores are laid out as `[time, cell]` variables plus three per-step
//! variables (observation time, update time and analysis flag), as written
//! by the HYFAA/MGB post-processing (`post_processing_portal.nc`). Dimension
//! and reserved variable names come from [`SourceLayout`].
//!
//! Reading goes through the native `netcdf` library (libnetcdf + HDF5).

mod native;
mod source;

pub use hydro_common::SourceLayout;
pub use native::silence_hdf5_errors;
pub use source::{NetCdfOpener, NetCdfSource};
