use crate::distributed_hashing::{DistributedConsistentHashing, DistributionChoice};
use crate::errors::{LabelerError, Result};
use crate::event::{LabelerEvent, Merge, PersonLabelAttributes, QuantumLabel, VirtualPersonActivity};
use crate::hash::fingerprint64;
use crate::model::config::{PopulationNodeConfig, VirtualPersonPool};
use crate::model::utils::VirtualPeopleSelector;

/// Leaf node assigning a virtual person to the event.
#[derive(Debug, Clone)]
pub struct PopulationNode {
    /// `None` for the empty pool, which assigns no id
    selector: Option<VirtualPeopleSelector>,
    random_seed: String,
}

fn is_empty_pool(pools: &[VirtualPersonPool]) -> bool {
    matches!(pools, [only] if only.population_offset == 0 && only.total_population == 0)
}

fn collapse_quantum_label(
    quantum_label: &QuantumLabel,
    seed_suffix: &str,
    output: &mut PersonLabelAttributes,
) -> Result<()> {
    if quantum_label.labels.is_empty() {
        return Err(LabelerError::event("Empty quantum label."));
    }
    if quantum_label.labels.len() != quantum_label.probabilities.len() {
        return Err(LabelerError::event(format!(
            "The sizes of labels and probabilities are different in quantum label: {} != {}",
            quantum_label.labels.len(),
            quantum_label.probabilities.len()
        )));
    }
    let distribution = quantum_label
        .probabilities
        .iter()
        .enumerate()
        .map(|(i, &p)| DistributionChoice::new(i, p))
        .collect();
    let hashing = DistributedConsistentHashing::new(distribution)?;
    let index = hashing.hash(&format!(
        "quantum-label-collapse-{}{seed_suffix}",
        quantum_label.seed.as_deref().unwrap_or_default()
    ));
    let label = quantum_label
        .labels
        .get(index)
        .ok_or_else(|| LabelerError::internal("The returned index is out of range."))?;
    output.merge_from(label);
    Ok(())
}

impl PopulationNode {
    pub fn build(config: &PopulationNodeConfig) -> Result<Self> {
        let selector = if is_empty_pool(&config.pools) {
            None
        } else {
            Some(VirtualPeopleSelector::build(&config.pools)?)
        };
        Ok(Self {
            selector,
            random_seed: config.random_seed.clone().unwrap_or_default(),
        })
    }

    pub fn apply(&self, event: &mut LabelerEvent) -> Result<()> {
        if !event.virtual_person_activities.is_empty() {
            return Err(LabelerError::event(
                "virtual_person_activities should only be created in leaf nodes.",
            ));
        }

        let mut activity = VirtualPersonActivity::default();
        if let Some(selector) = &self.selector {
            let seed = fingerprint64(&format!("{}{}", self.random_seed, event.fingerprint()));
            activity.virtual_person_id = Some(selector.virtual_person_id(seed));
        }

        if let Some(quantum_labels) = &event.quantum_labels {
            let seed_suffix = match activity.virtual_person_id {
                Some(id) => id.to_string(),
                None => event.fingerprint().to_string(),
            };
            let label = activity.label.get_or_insert_with(Default::default);
            for quantum_label in &quantum_labels.quantum_labels {
                collapse_quantum_label(quantum_label, &seed_suffix, label)?;
            }
        }
        if let Some(label) = &event.label {
            activity
                .label
                .get_or_insert_with(Default::default)
                .merge_from(label);
        }

        event.virtual_person_activities.push(activity);
        Ok(())
    }
}
