//! Settings shared by [`CategoricalCodec`](crate::codec::CategoricalCodec)
//! and [`RangeAndTypeReconciler`](crate::reconcile::RangeAndTypeReconciler).

use std::{collections::HashSet, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

pub const DEFAULT_IDENTITY_COLUMN: &str = "acctsessionid";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissingIdentity {
    /// Remove rows whose identity cell is missing after decoding.
    #[default]
    Drop,
    Keep,
}

/// Names the column that identifies a row and what decoding does with rows
/// where it ends up missing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowIdentityPolicy {
    pub column: String,
    #[serde(default)]
    pub on_missing: MissingIdentity,
}

impl RowIdentityPolicy {
    pub fn drop_missing(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            on_missing: MissingIdentity::Drop,
        }
    }
}

impl Default for RowIdentityPolicy {
    fn default() -> Self {
        Self::drop_missing(DEFAULT_IDENTITY_COLUMN)
    }
}

/// What reconciliation does with columns whose type has no defined cast
/// (booleans, dates, datetimes).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnclassifiedPolicy {
    #[default]
    PassThrough,
    Reject,
}

fn default_row_identity() -> Option<RowIdentityPolicy> {
    Some(RowIdentityPolicy::default())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileConfig {
    pub categorical_columns: Vec<String>,
    #[serde(default = "default_row_identity")]
    pub row_identity: Option<RowIdentityPolicy>,
    #[serde(default)]
    pub unclassified: UnclassifiedPolicy,
}

impl ReconcileConfig {
    pub fn new<I, S>(categorical_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categorical_columns: categorical_columns.into_iter().map(Into::into).collect(),
            row_identity: default_row_identity(),
            unclassified: UnclassifiedPolicy::default(),
        }
    }

    pub fn with_row_identity(mut self, policy: RowIdentityPolicy) -> Self {
        self.row_identity = Some(policy);
        self
    }

    pub fn without_row_identity(mut self) -> Self {
        self.row_identity = None;
        self
    }

    pub fn with_unclassified(mut self, policy: UnclassifiedPolicy) -> Self {
        self.unclassified = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for column in &self.categorical_columns {
            if column.trim().is_empty() {
                return Err(ReconcileError::InvalidConfig(
                    "categorical column names must not be empty".to_string(),
                ));
            }
            if !seen.insert(column.as_str()) {
                return Err(ReconcileError::InvalidConfig(format!(
                    "categorical column '{column}' is listed more than once"
                )));
            }
        }
        if let Some(policy) = &self.row_identity
            && policy.column.trim().is_empty()
        {
            return Err(ReconcileError::InvalidConfig(
                "row identity column name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> AnyResult<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: ReconcileConfig = serde_yaml::from_reader(BufReader::new(file))
            .context("Parsing reconcile config YAML")?;
        config
            .validate()
            .with_context(|| format!("Validating config {path:?}"))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> AnyResult<()> {
        let file = File::create(path).with_context(|| format!("Creating config file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing reconcile config YAML")
    }
}
