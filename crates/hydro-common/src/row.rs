//! Relational rows produced from one time-step.
//!
//! A [`RowBatch`] is stored column-wise: the cell identifiers and every
//! variable are dense vectors, while the timestamps and the analysis flag are
//! shared by all rows of the batch and stored once.

use chrono::{DateTime, Utc};

/// One configured variable's values for every cell of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// `None` marks a value that is not available in the source.
    pub values: Vec<Option<f64>>,
}

/// All rows published for a single time-step.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    /// 1-based positional cell identifiers.
    pub cell_ids: Vec<i16>,
    pub observation_timestamp: DateTime<Utc>,
    pub update_timestamp: DateTime<Utc>,
    pub is_analysis: bool,
    /// Variable columns in descriptor order.
    pub columns: Vec<Column>,
}

/// Borrowed view of one row of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<'a> {
    pub cell_id: i16,
    pub observation_timestamp: DateTime<Utc>,
    pub update_timestamp: DateTime<Utc>,
    pub is_analysis: bool,
    pub values: Vec<Option<f64>>,
    batch: &'a RowBatch,
}

impl Row<'_> {
    /// Value of the named column, if the column exists.
    pub fn value(&self, column: &str) -> Option<Option<f64>> {
        self.batch
            .columns
            .iter()
            .position(|c| c.name == column)
            .map(|i| self.values[i])
    }
}

impl RowBatch {
    pub fn len(&self) -> usize {
        self.cell_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_ids.is_empty()
    }

    /// Variable column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Iterate rows in cell order.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.len()).map(move |i| Row {
            cell_id: self.cell_ids[i],
            observation_timestamp: self.observation_timestamp,
            update_timestamp: self.update_timestamp,
            is_analysis: self.is_analysis,
            values: self.columns.iter().map(|c| c.values[i]).collect(),
            batch: self,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn batch() -> RowBatch {
        let t = Utc.with_ymd_and_hms(2021, 1, 31, 0, 0, 0).unwrap();
        RowBatch {
            cell_ids: vec![1, 2, 3],
            observation_timestamp: t,
            update_timestamp: t,
            is_analysis: true,
            columns: vec![
                Column {
                    name: "elevation_mean".into(),
                    values: vec![Some(1.0), None, Some(3.0)],
                },
                Column {
                    name: "flow_mean".into(),
                    values: vec![Some(10.0), Some(20.0), None],
                },
            ],
        }
    }

    #[test]
    fn test_rows_follow_cell_order() {
        let b = batch();
        let rows: Vec<_> = b.rows().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].cell_id, 2);
        assert_eq!(rows[1].values, vec![None, Some(20.0)]);
        assert!(rows.iter().all(|r| r.is_analysis));
    }

    #[test]
    fn test_named_lookup() {
        let b = batch();
        let row = b.rows().nth(2).unwrap();
        assert_eq!(row.value("flow_mean"), Some(None));
        assert_eq!(row.value("elevation_mean"), Some(Some(3.0)));
        assert_eq!(row.value("missing"), None);
        assert_eq!(b.column_names().collect::<Vec<_>>(), vec!["elevation_mean", "flow_mean"]);
    }
}
