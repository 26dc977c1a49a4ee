use crate::distributed_hashing::{DistributedConsistentHashing, DistributionChoice};
use crate::errors::{LabelerError, Result};
use crate::event::LabelerEvent;
use crate::filter::{FieldFilter, FieldFilterConfig, FieldFiltersMatcher};
use crate::model::config::{BranchConfig, BranchNodeConfig};
use crate::model::multiplicity::Multiplicity;
use crate::model::node::{ModelNode, NodeArena};
use crate::model::updater::AttributesUpdater;

/// How a branch node picks its child
#[derive(Debug, Clone)]
enum Selector {
    /// Weighted by chance, keyed by `random_seed + acting_fingerprint`
    Chance {
        hashing: DistributedConsistentHashing,
        random_seed: String,
    },
    /// First branch whose condition matches
    Condition(FieldFiltersMatcher),
}

/// What a branch node does before descending
#[derive(Debug, Clone)]
enum Action {
    None,
    Updates(Vec<AttributesUpdater>),
    Multiplicity(Multiplicity),
}

enum SelectBy<'a> {
    Chance(f32),
    Condition(&'a FieldFilterConfig),
}

fn select_by(branch: &BranchConfig) -> Result<SelectBy<'_>> {
    match (branch.chance, &branch.condition) {
        (Some(chance), None) => Ok(SelectBy::Chance(chance)),
        (None, Some(condition)) => Ok(SelectBy::Condition(condition)),
        _ => Err(LabelerError::model(
            "BranchNode must have one of chance and condition.",
        )),
    }
}

/// Inner node: runs its updaters or multiplicity, then applies one child.
#[derive(Debug, Clone)]
pub struct BranchNode {
    children: Vec<ModelNode>,
    selector: Selector,
    action: Action,
}

impl BranchNode {
    pub fn build(config: &BranchNodeConfig, arena: &mut NodeArena<'_>) -> Result<Self> {
        if config.branches.is_empty() {
            return Err(LabelerError::model("BranchNode must have at least 1 branch."));
        }

        let children = config
            .branches
            .iter()
            .map(|branch| match (branch.node_index, branch.node.as_deref()) {
                (Some(index), None) => arena.resolve(index),
                (None, Some(node)) => ModelNode::build(node, arena),
                _ => Err(LabelerError::model(
                    "BranchNode must have one of node_index and node.",
                )),
            })
            .collect::<Result<Vec<_>>>()?;

        let select_bys = config
            .branches
            .iter()
            .map(select_by)
            .collect::<Result<Vec<_>>>()?;
        let selector = match select_bys[0] {
            SelectBy::Chance(_) => {
                let distribution = select_bys
                    .iter()
                    .enumerate()
                    .map(|(i, s)| match s {
                        SelectBy::Chance(chance) => {
                            Ok(DistributionChoice::new(i, f64::from(*chance)))
                        }
                        SelectBy::Condition(_) => Err(mixed_select_by()),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Selector::Chance {
                    hashing: DistributedConsistentHashing::new(distribution)?,
                    random_seed: config.random_seed.clone().unwrap_or_default(),
                }
            }
            SelectBy::Condition(_) => {
                let filters = select_bys
                    .iter()
                    .map(|s| match s {
                        SelectBy::Condition(condition) => FieldFilter::new(condition),
                        SelectBy::Chance(_) => Err(mixed_select_by()),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Selector::Condition(FieldFiltersMatcher::from_filters(filters))
            }
        };

        let action = match (&config.updates, &config.multiplicity) {
            (Some(_), Some(_)) => {
                return Err(LabelerError::model(
                    "BranchNode cannot have both updaters and multiplicity.",
                ))
            }
            (Some(updates), None) => Action::Updates(
                updates
                    .updates
                    .iter()
                    .map(|u| AttributesUpdater::build(u, arena))
                    .collect::<Result<Vec<_>>>()?,
            ),
            (None, Some(multiplicity)) => Action::Multiplicity(Multiplicity::build(multiplicity)?),
            (None, None) => Action::None,
        };

        Ok(Self {
            children,
            selector,
            action,
        })
    }

    pub fn apply(&self, event: &mut LabelerEvent) -> Result<()> {
        match &self.action {
            Action::None => self.apply_child(event),
            Action::Updates(updaters) => {
                for updater in updaters {
                    updater.update(event)?;
                }
                self.apply_child(event)
            }
            Action::Multiplicity(multiplicity) => self.apply_multiplicity(multiplicity, event),
        }
    }

    fn select(&self, event: &LabelerEvent) -> Result<usize> {
        match &self.selector {
            Selector::Chance {
                hashing,
                random_seed,
            } => Ok(hashing.hash(&format!("{random_seed}{}", event.fingerprint()))),
            Selector::Condition(matcher) => matcher
                .first_match(event)
                .ok_or_else(|| LabelerError::event("No condition matches the input event.")),
        }
    }

    fn apply_child(&self, event: &mut LabelerEvent) -> Result<()> {
        let index = self.select(event)?;
        self.children
            .get(index)
            .ok_or_else(|| LabelerError::internal("The returned index is out of range."))?
            .apply(event)
    }

    /// Clones the event into independent copies, each with its own
    /// fingerprint and person index, and collects the people of all copies.
    fn apply_multiplicity(&self, multiplicity: &Multiplicity, event: &mut LabelerEvent) -> Result<()> {
        let clone_count = multiplicity.compute_event_multiplicity(event)?;
        if clone_count == 1 {
            multiplicity.set_person_index(event, 0)?;
            return self.apply_child(event);
        }

        let template = event.clone();
        let fingerprint = event.fingerprint();
        for person_index in 0..clone_count {
            let mut clone = template.clone();
            clone.acting_fingerprint =
                Some(multiplicity.fingerprint_for_index(fingerprint, person_index));
            multiplicity.set_person_index(&mut clone, person_index)?;
            self.apply_child(&mut clone)?;
            event
                .virtual_person_activities
                .append(&mut clone.virtual_person_activities);
        }
        Ok(())
    }
}

fn mixed_select_by() -> LabelerError {
    LabelerError::model("All branches should use the same select_by type.")
}
