//! Common test fixtures for publisher tests.

use chrono::{DateTime, Utc};
use hydro_common::{Calendar, DatasetDescriptor, TargetRelation, VariableSpec};

/// Schema used by fixture descriptors.
pub const SCHEMA: &str = "hyfaa";

/// Variable/column pairs of the MGB standard run.
pub const MGB_VARIABLES: [(&str, &str); 2] = [
    ("water_elevation_catchment_mean", "elevation_mean"),
    ("streamflow_catchment_mean", "flow_mean"),
];

/// Descriptor reading `<name>.nc` into `hyfaa.data_<name>`.
pub fn descriptor(name: &str, variables: &[(&str, &str)]) -> DatasetDescriptor {
    DatasetDescriptor {
        name: name.to_string(),
        source: format!("{}.nc", name).into(),
        variables: variables
            .iter()
            .map(|(source, column)| VariableSpec::new(*source, *column))
            .collect(),
        target: TargetRelation::new(SCHEMA, format!("data_{}", name)),
    }
}

pub fn mgbstandard() -> DatasetDescriptor {
    descriptor("mgbstandard", &MGB_VARIABLES)
}

/// Calendar timestamp of a CNES day count.
pub fn day(day_count: f64) -> DateTime<Utc> {
    Calendar::cnes()
        .to_calendar(day_count)
        .expect("fixture day count out of range")
}
