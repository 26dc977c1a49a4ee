use crate::distributed_hashing::{DistributedConsistentHashing, DistributionChoice};
use crate::errors::{LabelerError, Result};
use crate::event::{LabelerEvent, Merge};
use crate::model::config::UpdateMatrixConfig;
use crate::model::utils::ColumnMatcher;

/// Dense update matrix: the matching column picks a distribution over the
/// shared rows, and the selected row is merged into the event.
#[derive(Debug, Clone)]
pub struct UpdateMatrix {
    column_matcher: ColumnMatcher,
    row_hashings: Vec<DistributedConsistentHashing>,
    random_seed: String,
    rows: Vec<LabelerEvent>,
    pass_through_non_matches: bool,
}

impl UpdateMatrix {
    pub fn build(config: &UpdateMatrixConfig) -> Result<Self> {
        let (rows, columns) = (config.rows.len(), config.columns.len());
        if rows == 0 {
            return Err(LabelerError::model("No row exists in UpdateMatrix"));
        }
        if columns == 0 {
            return Err(LabelerError::model("No column exists in UpdateMatrix"));
        }
        if rows * columns != config.probabilities.len() {
            return Err(LabelerError::model(format!(
                "Probabilities count must equal to row * column: {} != {rows} * {columns}",
                config.probabilities.len()
            )));
        }

        let column_matcher =
            ColumnMatcher::build(&config.columns, config.hash_field_mask.as_ref())?;
        let row_hashings = (0..columns)
            .map(|column| {
                let distribution = (0..rows)
                    .map(|row| {
                        let p = config.probabilities[row * columns + column];
                        DistributionChoice::new(row, f64::from(p))
                    })
                    .collect();
                DistributedConsistentHashing::new(distribution)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            column_matcher,
            row_hashings,
            random_seed: config.random_seed.clone().unwrap_or_default(),
            rows: config.rows.clone(),
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
            .get(indexes.row)
            .ok_or_else(|| LabelerError::internal("The returned row index is out of range."))?;
        event.merge_from(row);
        Ok(())
    }
}
