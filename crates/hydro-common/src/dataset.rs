//! Dataset descriptors: what to read from a store and where to publish it.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::DescriptorError;

/// Columns every target relation carries ahead of the configured variables,
/// in publication order. `(cell_id, observation_timestamp)` is the key.
pub const FIXED_COLUMNS: [&str; 4] = [
    "cell_id",
    "observation_timestamp",
    "update_timestamp",
    "is_analysis",
];

/// PostgreSQL's identifier length limit (NAMEDATALEN - 1).
const MAX_IDENTIFIER_LEN: usize = 63;

/// PostgreSQL keywords that cannot name a table or column unquoted, sorted.
const RESERVED_KEYWORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric",
    "authorization", "binary", "both", "case", "cast", "check", "collate", "collation",
    "column", "concurrently", "constraint", "create", "cross", "current_catalog",
    "current_date", "current_role", "current_schema", "current_time", "current_timestamp",
    "current_user", "default", "deferrable", "desc", "distinct", "do", "else", "end",
    "except", "false", "fetch", "for", "foreign", "freeze", "from", "full", "grant",
    "group", "having", "ilike", "in", "initially", "inner", "intersect", "into", "is",
    "isnull", "join", "lateral", "leading", "left", "like", "limit", "localtime",
    "localtimestamp", "natural", "not", "notnull", "null", "offset", "on", "only", "or",
    "order", "outer", "overlaps", "placing", "primary", "references", "returning",
    "right", "select", "session_user", "similar", "some", "symmetric", "system_user",
    "table", "tablesample", "then", "to", "trailing", "true", "union", "unique", "user",
    "using", "variadic", "verbose", "when", "where", "window", "with",
];

/// A source variable and the sink column it is published to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Variable name in the array store.
    pub source: String,
    /// Column name in the target relation.
    pub column: String,
}

impl VariableSpec {
    pub fn new(source: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            column: column.into(),
        }
    }
}

/// Schema-qualified target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRelation {
    pub schema: String,
    pub table: String,
}

impl TargetRelation {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TargetRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Static description of one published dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Dataset name, also the key of its watermark row.
    pub name: String,
    /// Location of the array store.
    pub source: PathBuf,
    /// Variables to extract, in column order.
    pub variables: Vec<VariableSpec>,
    /// Relation the rows are upserted into.
    pub target: TargetRelation,
}

impl DatasetDescriptor {
    /// Sink column names after the fixed columns, in descriptor order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.column.as_str())
    }

    /// Check names and identifiers once, before any I/O.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.name.trim().is_empty() {
            return Err(DescriptorError::EmptyName);
        }
        if self.variables.is_empty() {
            return Err(DescriptorError::NoVariables(self.name.clone()));
        }

        let invalid = |identifier: &str| DescriptorError::InvalidIdentifier {
            dataset: self.name.clone(),
            identifier: identifier.to_string(),
        };

        for identifier in [&self.target.schema, &self.target.table] {
            if !is_sql_identifier(identifier) {
                return Err(invalid(identifier));
            }
        }

        let mut seen = HashSet::new();
        for var in &self.variables {
            if !is_sql_identifier(&var.column) {
                return Err(invalid(&var.column));
            }
            if FIXED_COLUMNS
                .iter()
                .any(|fixed| fixed.eq_ignore_ascii_case(&var.column))
            {
                return Err(DescriptorError::ReservedColumn {
                    dataset: self.name.clone(),
                    column: var.column.clone(),
                });
            }
            if !seen.insert(var.column.to_ascii_lowercase()) {
                return Err(DescriptorError::DuplicateColumn {
                    dataset: self.name.clone(),
                    column: var.column.clone(),
                });
            }
        }

        Ok(())
    }

    /// Validate a whole run configuration, including name uniqueness.
    pub fn validate_all(datasets: &[DatasetDescriptor]) -> Result<(), DescriptorError> {
        let mut names = HashSet::new();
        for dataset in datasets {
            dataset.validate()?;
            if !names.insert(dataset.name.as_str()) {
                return Err(DescriptorError::DuplicateDataset(dataset.name.clone()));
            }
        }
        Ok(())
    }
}

/// Unquoted SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes, and
/// not a reserved keyword.
pub fn is_sql_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    s.len() <= MAX_IDENTIFIER_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && RESERVED_KEYWORDS
            .binary_search(&s.to_ascii_lowercase().as_str())
            .is_err()
}
