//! Reads stores written on the fly with the netcdf library.

use std::path::{Path, PathBuf};

use hydro_common::{ArraySource, SourceError, SourceLayout, SourceOpener};
use netcdf_parser::{NetCdfOpener, NetCdfSource};
use test_utils::{assert_approx_eq, create_values_with_nans, temp_test_dir};

const FILL: f64 = -9999.0;

/// Three time-steps over four cells, laid out like a HYFAA portal file.
fn write_store(dir: &Path) -> PathBuf {
    let path = dir.join("post_processing_portal.nc");
    let mut file = netcdf::create(&path).unwrap();

    file.add_dimension("n_time", 3).unwrap();
    file.add_dimension("n_cells", 4).unwrap();

    let mut time = file.add_variable::<f64>("time", &["n_time"]).unwrap();
    time.put_values(&[25963.0, 25964.0, 25965.0], ..).unwrap();

    let mut added = file
        .add_variable::<f64>("time_added_to_hydb", &["n_time"])
        .unwrap();
    added.put_values(&[25970.0, 25970.0, 25971.5], ..).unwrap();

    let mut flag = file.add_variable::<i8>("is_analysis", &["n_time"]).unwrap();
    flag.put_values(&[1i8, 1, 0], ..).unwrap();

    let mut flow = file
        .add_variable::<f64>("streamflow_catchment_mean", &["n_time", "n_cells"])
        .unwrap();
    flow.put_attribute("_FillValue", FILL).unwrap();
    flow.put_values(
        &[
            1.0, 2.0, 3.0, 4.0, //
            5.0, FILL, 7.0, 8.0, //
            9.0, 10.0, f64::NAN, 12.0,
        ],
        ..,
    )
    .unwrap();

    let mut packed = file
        .add_variable::<i16>("water_elevation_catchment_mean", &["n_time", "n_cells"])
        .unwrap();
    packed.put_attribute("scale_factor", 0.5f64).unwrap();
    packed.put_attribute("add_offset", 100.0f64).unwrap();
    packed.put_attribute("missing_value", -32767i16).unwrap();
    packed
        .put_values(
            &[0i16, 2, 4, 6, 8, 10, 12, -32767, 0, 0, 0, 0],
            ..,
        )
        .unwrap();

    drop(file);
    path
}

#[test]
fn test_reads_time_axis() {
    let dir = temp_test_dir();
    let path = write_store(dir.path());

    let source = NetCdfSource::open(&path, SourceLayout::default()).unwrap();
    let steps = source.time_steps().unwrap();

    assert_eq!(steps.len(), 3);
    assert_eq!(steps[0].index, 0);
    assert_eq!(steps[2].observation_time, 25965.0);
    assert_eq!(steps[2].update_time, 25971.5);
    assert!(source.analysis_flag(0).unwrap());
    assert!(!source.analysis_flag(2).unwrap());
}

#[test]
fn test_dimensions() {
    let dir = temp_test_dir();
    let path = write_store(dir.path());

    let source = NetCdfOpener::default().open(&path).unwrap();
    assert_eq!(source.cell_count().unwrap(), 4);
    assert_eq!(source.dimension_size("n_time").unwrap(), 3);
    assert!(matches!(
        source.dimension_size("n_lat"),
        Err(SourceError::DimensionMissing(_))
    ));
}

#[test]
fn test_slice_keeps_fill_and_nan_markers() {
    let dir = temp_test_dir();
    let path = write_store(dir.path());
    let source = NetCdfSource::open(&path, SourceLayout::default()).unwrap();

    let slice = source.variable_slice("streamflow_catchment_mean", 1).unwrap();
    assert_eq!(slice.fill_value, Some(FILL));
    assert_eq!(slice.to_nullable(), vec![Some(5.0), None, Some(7.0), Some(8.0)]);

    let slice = source.variable_slice("streamflow_catchment_mean", 2).unwrap();
    assert_eq!(slice.to_nullable(), vec![Some(9.0), Some(10.0), None, Some(12.0)]);
}

#[test]
fn test_packed_variable_is_unpacked() {
    let dir = temp_test_dir();
    let path = write_store(dir.path());
    let source = NetCdfSource::open(&path, SourceLayout::default()).unwrap();

    let slice = source
        .variable_slice("water_elevation_catchment_mean", 1)
        .unwrap();
    let values = slice.to_nullable();
    assert_approx_eq!(values[0].unwrap(), 104.0, 1e-9);
    assert_approx_eq!(values[1].unwrap(), 105.0, 1e-9);
    assert_approx_eq!(values[2].unwrap(), 106.0, 1e-9);
    assert_eq!(values[3], None);
}

/// Per-step variables with fill entries, as a partially written store has.
fn write_store_with_missing_times(dir: &Path) -> PathBuf {
    const TIME_FILL: f64 = 9.969_209_968_386_869e36;
    let path = dir.join("partial.nc");
    let mut file = netcdf::create(&path).unwrap();

    file.add_dimension("n_time", 3).unwrap();
    file.add_dimension("n_cells", 2).unwrap();

    let mut time = file.add_variable::<f64>("time", &["n_time"]).unwrap();
    time.put_values(&[25963.0, 25964.0, 25965.0], ..).unwrap();

    let mut added = file
        .add_variable::<f64>("time_added_to_hydb", &["n_time"])
        .unwrap();
    added.put_attribute("_FillValue", TIME_FILL).unwrap();
    added.put_values(&[25970.0, TIME_FILL, 25972.0], ..).unwrap();

    let mut flag = file.add_variable::<i8>("is_analysis", &["n_time"]).unwrap();
    flag.put_attribute("_FillValue", -127i8).unwrap();
    flag.put_values(&[1i8, -127, 1], ..).unwrap();

    let mut flow = file
        .add_variable::<f64>("streamflow_catchment_mean", &["n_time", "n_cells"])
        .unwrap();
    flow.put_values(&create_values_with_nans(6, 2.5, &[3]), ..).unwrap();

    drop(file);
    path
}

#[test]
fn test_fill_update_time_reads_as_nan() {
    let dir = temp_test_dir();
    let path = write_store_with_missing_times(dir.path());
    let source = NetCdfSource::open(&path, SourceLayout::default()).unwrap();

    let steps = source.time_steps().unwrap();
    assert_eq!(steps[0].update_time, 25970.0);
    assert!(steps[1].update_time.is_nan());
    assert_eq!(steps[2].update_time, 25972.0);
    assert_eq!(steps[1].observation_time, 25964.0);

    assert!(source.analysis_flag(0).unwrap());
    assert!(!source.analysis_flag(1).unwrap());

    let slice = source.variable_slice("streamflow_catchment_mean", 1).unwrap();
    assert_eq!(slice.to_nullable(), vec![Some(2.5), None]);
}

#[test]
fn test_missing_variable() {
    let dir = temp_test_dir();
    let path = write_store(dir.path());
    let source = NetCdfSource::open(&path, SourceLayout::default()).unwrap();

    assert!(!source.has_variable("streamflow_catchment_mad"));
    let err = source.variable_slice("streamflow_catchment_mad", 0).unwrap_err();
    assert!(matches!(err, SourceError::VariableMissing(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_index_out_of_range() {
    let dir = temp_test_dir();
    let path = write_store(dir.path());
    let source = NetCdfSource::open(&path, SourceLayout::default()).unwrap();

    assert!(matches!(
        source.variable_slice("streamflow_catchment_mean", 3),
        Err(SourceError::IndexOutOfRange { index: 3, len: 3 })
    ));
}

#[test]
fn test_unopenable_store() {
    let dir = temp_test_dir();
    let err = NetCdfSource::open(&dir.path().join("absent.nc"), SourceLayout::default())
        .unwrap_err();
    assert!(matches!(err, SourceError::Unavailable { .. }));
}

#[test]
fn test_custom_layout_missing_reserved_variable() {
    let dir = temp_test_dir();
    let path = write_store(dir.path());
    let layout = SourceLayout {
        update_time_variable: "time_recomputed".to_string(),
        ..SourceLayout::default()
    };

    let err = NetCdfSource::open(&path, layout).unwrap_err();
    assert!(matches!(err, SourceError::VariableMissing(ref v) if v == "time_recomputed"));
}

/// Reads a real HYFAA store when one is available locally.
#[test]
fn test_real_hyfaa_store() {
    let path = test_utils::require_test_file!("post_processing_portal.nc");
    let source = NetCdfOpener::default().open(&path).unwrap();

    let steps = source.time_steps().unwrap();
    assert!(!steps.is_empty());
    assert!(steps.windows(2).all(|w| w[0].index + 1 == w[1].index));

    let cells = source.cell_count().unwrap();
    let slice = source
        .variable_slice("streamflow_catchment_mean", steps.len() - 1)
        .unwrap();
    assert_eq!(slice.values.len(), cells);
}
