use crate::distributed_hashing::{DistributedConsistentHashing, DistributionChoice};
use crate::errors::{LabelerError, Result};
use crate::event::{LabelerEvent, Merge};
use crate::model::config::SparseUpdateMatrixConfig;
use crate::model::utils::ColumnMatcher;

/// Update matrix where every column lists only its own non-zero rows.
#[derive(Debug, Clone)]
pub struct SparseUpdateMatrix {
    column_matcher: ColumnMatcher,
    row_hashings: Vec<DistributedConsistentHashing>,
    random_seed: String,
    rows: Vec<Vec<LabelerEvent>>,
    pass_through_non_matches: bool,
}

impl SparseUpdateMatrix {
    pub fn build(config: &SparseUpdateMatrixConfig) -> Result<Self> {
        if config.columns.is_empty() {
            return Err(LabelerError::model("No column exists in SparseUpdateMatrix"));
        }

        let mut column_attrs = Vec::with_capacity(config.columns.len());
        for (i, column) in config.columns.iter().enumerate() {
            let attrs = column.column_attrs.as_ref().ok_or_else(|| {
                LabelerError::model(format!(
                    "No column_attrs in the column {i} in SparseUpdateMatrix"
                ))
            })?;
            if column.rows.is_empty() {
                return Err(LabelerError::model(format!(
                    "No row exists in the column {i} in SparseUpdateMatrix"
                )));
            }
            if column.rows.len() != column.probabilities.len() {
                return Err(LabelerError::model(format!(
                    "Rows and probabilities are not aligned in the column {i} in SparseUpdateMatrix"
                )));
            }
            column_attrs.push(attrs.clone());
        }

        let column_matcher = ColumnMatcher::build(&column_attrs, config.hash_field_mask.as_ref())?;
        let row_hashings = config
            .columns
            .iter()
            .map(|column| {
                let distribution = column
                    .probabilities
                    .iter()
                    .enumerate()
                    .map(|(row, &p)| DistributionChoice::new(row, f64::from(p)))
                    .collect();
                DistributedConsistentHashing::new(distribution)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            column_matcher,
            row_hashings,
            random_seed: config.random_seed.clone().unwrap_or_default(),
            rows: config.columns.iter().map(|c| c.rows.clone()).collect(),
            pass_through_non_matches: config.pass_through_non_matches.unwrap_or(false),
        })
    }

    pub fn update(&self, event: &mut LabelerEvent) -> Result<()> {
        let selected = self
            .column_matcher
            .select(&self.row_hashings, &self.random_seed, event)?;
        let Some(indexes) = selected else {
            if self.pass_through_non_matches {
                return Ok(());
            }
            return Err(LabelerError::event(format!(
                "No column matching for event: {event:?}"
            )));
        };
        let row = self
            .rows
            .get(indexes.column)
            .and_then(|rows| rows.get(indexes.row))
            .ok_or_else(|| LabelerError::internal("The returned row index is out of range."))?;
        event.merge_from(row);
        Ok(())
    }
}
