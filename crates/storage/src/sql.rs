//! SQL text for the PostgreSQL sink.
//!
//! Identifiers are interpolated, never bound, so every builder here expects
//! names already checked with [`is_sql_identifier`].

use hydro_common::dataset::is_sql_identifier;
use hydro_common::{TargetRelation, FIXED_COLUMNS};

use crate::error::{StorageError, StorageResult};

/// Name of the shared watermark table within the schema.
pub const STATE_TABLE: &str = "state";

pub fn check_identifier(identifier: &str) -> StorageResult<()> {
    if is_sql_identifier(identifier) {
        Ok(())
    } else {
        Err(StorageError::InvalidIdentifier(identifier.to_string()))
    }
}

/// Bulk upsert of one time-step.
///
/// Parameters: `$1` cell ids (`smallint[]`), `$2` observation timestamp,
/// `$3` update timestamp, `$4` analysis flag, then one `float8[]` per
/// variable column. Timestamps and flag are bound once and broadcast to
/// every row.
pub fn upsert_rows(target: &TargetRelation, columns: &[&str]) -> String {
    let insert_cols = FIXED_COLUMNS
        .iter()
        .copied()
        .chain(columns.iter().copied())
        .collect::<Vec<_>>()
        .join(", ");

    let select_cols = ["u.cell_id", "$2::timestamp", "$3::timestamp", "$4::boolean"]
        .into_iter()
        .map(str::to_string)
        .chain(columns.iter().map(|c| format!("u.{}", c)))
        .collect::<Vec<_>>()
        .join(", ");

    let unnest_args = std::iter::once("$1::smallint[]".to_string())
        .chain((0..columns.len()).map(|i| format!("${}::double precision[]", i + 5)))
        .collect::<Vec<_>>()
        .join(", ");

    let alias_cols = std::iter::once("cell_id")
        .chain(columns.iter().copied())
        .collect::<Vec<_>>()
        .join(", ");

    // Every column outside the (cell_id, observation_timestamp) key.
    let updates = FIXED_COLUMNS[2..]
        .iter()
        .copied()
        .chain(columns.iter().copied())
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {schema}.{table} ({insert_cols}) \
         SELECT {select_cols} \
         FROM UNNEST({unnest_args}) AS u({alias_cols}) \
         ON CONFLICT (cell_id, observation_timestamp) DO UPDATE SET {updates}",
        schema = target.schema,
        table = target.table,
    )
}

pub fn read_state(schema: &str) -> String {
    format!(
        "SELECT last_update_time_seen::double precision, \
         last_update_time_without_errors::double precision \
         FROM {schema}.{STATE_TABLE} WHERE dataset_name = $1"
    )
}

/// Single-statement create-or-update of a dataset's state row.
pub fn write_state(schema: &str) -> String {
    format!(
        "INSERT INTO {schema}.{STATE_TABLE} (\
         dataset_name, last_update_time_seen, update_errors, \
         last_update_time_without_errors, last_updated_calendar, \
         last_updated_without_errors_calendar) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (dataset_name) DO UPDATE SET \
         last_update_time_seen = EXCLUDED.last_update_time_seen, \
         update_errors = EXCLUDED.update_errors, \
         last_update_time_without_errors = EXCLUDED.last_update_time_without_errors, \
         last_updated_calendar = EXCLUDED.last_updated_calendar, \
         last_updated_without_errors_calendar = EXCLUDED.last_updated_without_errors_calendar"
    )
}

pub fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {schema}")
}

pub fn create_state_table(schema: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {schema}.{STATE_TABLE} (\
         dataset_name TEXT PRIMARY KEY, \
         last_update_time_seen NUMERIC, \
         update_errors INTEGER, \
         last_update_time_without_errors NUMERIC, \
         last_updated_calendar TIMESTAMP, \
         last_updated_without_errors_calendar TIMESTAMP)"
    )
}

pub fn create_data_table(target: &TargetRelation, columns: &[&str]) -> String {
    let value_cols: String = columns.iter().map(|c| format!(", {c} REAL")).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {schema}.{table} (\
         cell_id SMALLINT NOT NULL, \
         observation_timestamp TIMESTAMP NOT NULL, \
         update_timestamp TIMESTAMP, \
         is_analysis BOOLEAN{value_cols}, \
         CONSTRAINT {table}_pk PRIMARY KEY (cell_id, observation_timestamp))",
        schema = target.schema,
        table = target.table,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TargetRelation {
        TargetRelation::new("hyfaa", "data_mgbstandard")
    }

    #[test]
    fn test_upsert_shape() {
        let sql = upsert_rows(&target(), &["elevation_mean", "flow_mean"]);

        assert!(sql.starts_with(
            "INSERT INTO hyfaa.data_mgbstandard (cell_id, observation_timestamp, \
             update_timestamp, is_analysis, elevation_mean, flow_mean)"
        ));
        assert!(sql.contains(
            "FROM UNNEST($1::smallint[], $5::double precision[], $6::double precision[]) \
             AS u(cell_id, elevation_mean, flow_mean)"
        ));
        assert!(sql.contains("SELECT u.cell_id, $2::timestamp, $3::timestamp, $4::boolean, u.elevation_mean, u.flow_mean"));
        assert!(sql.contains("ON CONFLICT (cell_id, observation_timestamp) DO UPDATE SET"));
    }

    #[test]
    fn test_upsert_updates_every_non_key_column() {
        let sql = upsert_rows(&target(), &["flow_mean"]);
        let updates = sql.split("DO UPDATE SET").nth(1).unwrap();

        assert!(updates.contains("update_timestamp = EXCLUDED.update_timestamp"));
        assert!(updates.contains("is_analysis = EXCLUDED.is_analysis"));
        assert!(updates.contains("flow_mean = EXCLUDED.flow_mean"));
        assert!(!updates.contains("cell_id ="));
        assert!(!updates.contains("observation_timestamp ="));
    }

    #[test]
    fn test_state_statements_target_schema() {
        assert!(read_state("hyfaa").contains("FROM hyfaa.state WHERE dataset_name = $1"));
        let write = write_state("hyfaa");
        assert!(write.starts_with("INSERT INTO hyfaa.state ("));
        assert!(write.contains("ON CONFLICT (dataset_name) DO UPDATE SET"));
    }

    #[test]
    fn test_create_data_table() {
        let sql = create_data_table(&target(), &["flow_mean"]);
        assert!(sql.contains("flow_mean REAL"));
        assert!(sql.contains("PRIMARY KEY (cell_id, observation_timestamp)"));
    }

    #[test]
    fn test_check_identifier() {
        assert!(check_identifier("hyfaa").is_ok());
        assert!(matches!(
            check_identifier("hyfaa;--"),
            Err(StorageError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            check_identifier("user"),
            Err(StorageError::InvalidIdentifier(_))
        ));
    }
}
