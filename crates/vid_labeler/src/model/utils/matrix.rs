use super::HashFieldMaskMatcher;
use crate::distributed_hashing::DistributedConsistentHashing;
use crate::errors::{LabelerError, Result};
use crate::event::LabelerEvent;
use crate::filter::{FieldFilter, FieldFiltersMatcher};
use crate::model::config::FieldMask;

/// Column and row selected from an update matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixIndexes {
    pub column: usize,
    pub row: usize,
}

/// Finds the column of an update matrix matching an event.
#[derive(Debug, Clone)]
pub enum ColumnMatcher {
    /// Exact lookup by the hash of masked fields
    HashFieldMask(HashFieldMaskMatcher),
    /// First column whose set fields all equal the event's
    Filters(FieldFiltersMatcher),
}

impl ColumnMatcher {
    pub fn build(columns: &[LabelerEvent], mask: Option<&FieldMask>) -> Result<Self> {
        match mask {
            Some(mask) => Ok(Self::HashFieldMask(HashFieldMaskMatcher::build(
                columns, mask,
            )?)),
            None => {
                let filters = columns
                    .iter()
                    .map(FieldFilter::from_event)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Filters(FieldFiltersMatcher::from_filters(filters)))
            }
        }
    }

    pub fn get_match(&self, event: &LabelerEvent) -> Result<Option<usize>> {
        match self {
            Self::HashFieldMask(matcher) => matcher.get_match(event),
            Self::Filters(matcher) => Ok(matcher.first_match(event)),
        }
    }

    /// Selects the matching column, then a row of it with the column's
    /// distribution keyed by `random_seed` and the acting fingerprint.
    /// `None` when no column matches.
    pub fn select(
        &self,
        row_hashings: &[DistributedConsistentHashing],
        random_seed: &str,
        event: &LabelerEvent,
    ) -> Result<Option<MatrixIndexes>> {
        let Some(column) = self.get_match(event)? else {
            return Ok(None);
        };
        let hashing = row_hashings
            .get(column)
            .ok_or_else(|| LabelerError::internal("The returned index is out of range."))?;
        let row = hashing.hash(&format!("{random_seed}{}", event.fingerprint()));
        Ok(Some(MatrixIndexes { column, row }))
    }
}
