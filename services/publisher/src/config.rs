//! Publisher configuration.
//!
//! Datasets come from a YAML file (`--config`) or, without one, from the
//! built-in HYFAA layout. YAML content supports `${VAR}` and
//! `${VAR:-default}` environment substitution; dataset paths support `~`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hydro_common::{DatasetDescriptor, DescriptorError, SourceLayout, TargetRelation, VariableSpec};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error("No dataset selected")]
    NoDatasets,

    #[error(transparent)]
    Invalid(#[from] DescriptorError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublisherConfig {
    #[serde(default)]
    pub layout: SourceLayout,
    pub datasets: Vec<DatasetConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    pub name: String,
    /// Store location, relative to the root path unless absolute.
    pub path: String,
    /// Target table; `data_<name>` when omitted.
    #[serde(default)]
    pub table: Option<String>,
    pub variables: Vec<VariableSpec>,
}

impl DatasetConfig {
    fn new(name: &str, path: &str, variables: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            table: Some(format!("data_{}", name)),
            variables: variables
                .iter()
                .map(|(source, column)| VariableSpec::new(*source, *column))
                .collect(),
        }
    }

    fn to_descriptor(&self, rootpath: &Path, schema: &str) -> DatasetDescriptor {
        let path = PathBuf::from(shellexpand::tilde(&self.path).into_owned());
        let source = if path.is_absolute() {
            path
        } else {
            rootpath.join(path)
        };
        let table = self
            .table
            .clone()
            .unwrap_or_else(|| format!("data_{}", self.name));

        DatasetDescriptor {
            name: self.name.clone(),
            source,
            variables: self.variables.clone(),
            target: TargetRelation::new(schema, table),
        }
    }
}

const MGB_VARIABLES: [(&str, &str); 2] = [
    ("water_elevation_catchment_mean", "elevation_mean"),
    ("streamflow_catchment_mean", "flow_mean"),
];

const ASSIMILATED_VARIABLES: [(&str, &str); 8] = [
    ("water_elevation_catchment_mean", "elevation_mean"),
    ("water_elevation_catchment_median", "elevation_median"),
    ("water_elevation_catchment_std", "elevation_stddev"),
    ("water_elevation_catchment_mad", "elevation_mad"),
    ("streamflow_catchment_mean", "flow_mean"),
    ("streamflow_catchment_median", "flow_median"),
    ("streamflow_catchment_std", "flow_stddev"),
    ("streamflow_catchment_mad", "flow_mad"),
];

impl Default for PublisherConfig {
    /// The three HYFAA post-processing stores.
    fn default() -> Self {
        Self {
            layout: SourceLayout::default(),
            datasets: vec![
                DatasetConfig::new(
                    "mgbstandard",
                    "mgbstandard_solution_databases/post_processing_portal.nc",
                    &MGB_VARIABLES,
                ),
                DatasetConfig::new(
                    "forecast",
                    "assimilated_solution_databases/prevision_using_previous_years/post_processing_portal.nc",
                    &ASSIMILATED_VARIABLES,
                ),
                DatasetConfig::new(
                    "assimilated",
                    "assimilated_solution_databases/post_processing_portal.nc",
                    &ASSIMILATED_VARIABLES,
                ),
            ],
        }
    }
}

impl PublisherConfig {
    /// Load a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config from {:?}", path.as_ref()))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        serde_yaml::from_str(&expanded).context("Failed to parse publisher config YAML")
    }

    /// Descriptors for the selected datasets, in configuration order.
    ///
    /// An empty `only` selects every dataset.
    pub fn descriptors(
        &self,
        rootpath: &Path,
        schema: &str,
        only: &[String],
    ) -> std::result::Result<Vec<DatasetDescriptor>, ConfigError> {
        if let Some(unknown) = only
            .iter()
            .find(|name| !self.datasets.iter().any(|d| &d.name == *name))
        {
            return Err(ConfigError::UnknownDataset(unknown.clone()));
        }

        let descriptors: Vec<DatasetDescriptor> = self
            .datasets
            .iter()
            .filter(|d| only.is_empty() || only.contains(&d.name))
            .map(|d| d.to_descriptor(rootpath, schema))
            .collect();

        if descriptors.is_empty() {
            return Err(ConfigError::NoDatasets);
        }
        DatasetDescriptor::validate_all(&descriptors)?;
        Ok(descriptors)
    }
}

/// Expand environment variables in the format `${VAR}` or `${VAR:-default}`.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::new();
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_expr = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}
