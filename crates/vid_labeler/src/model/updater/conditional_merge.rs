use crate::errors::{LabelerError, Result};
use crate::event::{LabelerEvent, Merge};
use crate::filter::{FieldFilter, FieldFiltersMatcher};
use crate::model::config::ConditionalMergeConfig;

/// Merges the update of the first matching condition into the event.
#[derive(Debug, Clone)]
pub struct ConditionalMerge {
    matcher: FieldFiltersMatcher,
    updates: Vec<LabelerEvent>,
    pass_through_non_matches: bool,
}

impl ConditionalMerge {
    pub fn build(config: &ConditionalMergeConfig) -> Result<Self> {
        if config.nodes.is_empty() {
            return Err(LabelerError::model("No nodes in ConditionalMerge"));
        }
        let mut filters = Vec::with_capacity(config.nodes.len());
        let mut updates = Vec::with_capacity(config.nodes.len());
        for (i, node) in config.nodes.iter().enumerate() {
            let condition = node.condition.as_ref().ok_or_else(|| {
                LabelerError::model(format!("No condition in the node {i} in ConditionalMerge"))
            })?;
            let update = node.update.as_ref().ok_or_else(|| {
                LabelerError::model(format!("No update in the node {i} in ConditionalMerge"))
            })?;
            filters.push(FieldFilter::new(condition)?);
            updates.push(update.clone());
        }
        Ok(Self {
            matcher: FieldFiltersMatcher::from_filters(filters),
            updates,
            pass_through_non_matches: config.pass_through_non_matches.unwrap_or(false),
        })
    }

    pub fn update(&self, event: &mut LabelerEvent) -> Result<()> {
        let Some(index) = self.matcher.first_match(event) else {
            if self.pass_through_non_matches {
                return Ok(());
            }
            return Err(LabelerError::event(format!(
                "No node matching for event: {event:?}"
            )));
        };
        let update = self
            .updates
            .get(index)
            .ok_or_else(|| LabelerError::internal("The returned index is out of range."))?;
        event.merge_from(update);
        Ok(())
    }
}
