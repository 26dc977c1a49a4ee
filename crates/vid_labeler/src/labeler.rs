//! The labeling façade
//!
//! A [`Labeler`] owns one compiled model tree. Each input is copied into a
//! fresh [`LabelerEvent`], stamped with identifier fingerprints, and run
//! through the tree; the virtual people the tree assigns become the output.

use crate::errors::Result;
use crate::event::{LabelerEvent, LabelerInput, LabelerOutput};
use crate::hash::fingerprint64;
use crate::model::{CompiledNode, ModelConfig, ModelNode};
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// A compiled model ready to label events.
///
/// Labeling never mutates the model, so one labeler can be shared by any
/// number of threads.
#[derive(Debug, Clone)]
pub struct Labeler {
    root: ModelNode,
    debug_trace: bool,
}

impl Labeler {
    /// Builds a labeler from a root with every child embedded.
    pub fn from_root(root: &CompiledNode) -> Result<Self> {
        debug!("Building labeler from root ({} nodes)", root.subtree_size());
        Ok(Self::new(ModelNode::from_root(root)?))
    }

    /// Builds a labeler from a flat list of indexed nodes.
    pub fn from_nodes(nodes: &[CompiledNode]) -> Result<Self> {
        debug!("Building labeler from {} listed nodes", nodes.len());
        Ok(Self::new(ModelNode::from_nodes(nodes)?))
    }

    pub fn from_model(model: &ModelConfig) -> Result<Self> {
        let labeler = Self::new(ModelNode::from_model(model)?);
        info!("Model built: {} nodes", model.num_nodes());
        Ok(labeler)
    }

    fn new(root: ModelNode) -> Self {
        Self {
            root,
            debug_trace: false,
        }
    }

    /// Fill `serialized_debug_trace` with the final event of every label call.
    pub fn with_debug_trace(mut self, enabled: bool) -> Self {
        self.debug_trace = enabled;
        self
    }

    pub fn root(&self) -> &ModelNode {
        &self.root
    }

    /// Labels one input.
    pub fn label(&self, input: &LabelerInput) -> Result<LabelerOutput> {
        let mut event = LabelerEvent {
            labeler_input: Some(input.clone()),
            ..Default::default()
        };
        stamp_fingerprints(&mut event);
        self.root.apply(&mut event)?;

        let serialized_debug_trace = if self.debug_trace {
            serde_json::to_string_pretty(&event)?
        } else {
            String::new()
        };
        Ok(LabelerOutput {
            people: event.virtual_person_activities,
            serialized_debug_trace,
        })
    }

    /// Labels every input in order. A failed input does not stop the batch.
    pub fn label_batch(&self, inputs: &[LabelerInput]) -> Vec<Result<LabelerOutput>> {
        let outputs: Vec<_> = inputs.iter().map(|input| self.label(input)).collect();
        log_failures(&outputs);
        outputs
    }

    /// Same as [`Labeler::label_batch`], spread over the global rayon pool.
    pub fn label_par(&self, inputs: &[LabelerInput]) -> Vec<Result<LabelerOutput>> {
        let outputs: Vec<_> = inputs.par_iter().map(|input| self.label(input)).collect();
        log_failures(&outputs);
        outputs
    }

    /// Same as [`Labeler::label_par`], on a caller-provided pool.
    pub fn label_par_in(
        &self,
        pool: &rayon::ThreadPool,
        inputs: &[LabelerInput],
    ) -> Vec<Result<LabelerOutput>> {
        pool.install(|| self.label_par(inputs))
    }
}

/// Fingerprints the event id and every profile user id in place. The event
/// id fingerprint also seeds the acting fingerprint.
fn stamp_fingerprints(event: &mut LabelerEvent) {
    let Some(input) = event.labeler_input.as_mut() else {
        return;
    };
    if let Some(event_id) = input.event_id.as_mut() {
        let fp = fingerprint64(event_id.id.as_deref().unwrap_or_default());
        event_id.id_fingerprint = Some(fp);
        event.acting_fingerprint = Some(fp);
    }
    if let Some(profile) = input.profile_info.as_mut() {
        for user_info in profile.user_infos_mut() {
            if let Some(user_id) = &user_info.user_id {
                user_info.user_id_fingerprint = Some(fingerprint64(user_id));
            }
        }
    }
}

fn log_failures(outputs: &[Result<LabelerOutput>]) {
    for (i, output) in outputs.iter().enumerate() {
        if let Err(e) = output {
            warn!("Failed to label input {}: {}", i, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventId, ProfileInfo, UserInfo};
    use crate::filter::FieldFilterConfig;
    use crate::model::{BranchConfig, BranchNodeConfig, PopulationNodeConfig};

    fn input(id: &str) -> LabelerInput {
        LabelerInput {
            event_id: Some(EventId {
                id: Some(id.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn single_population(offset: u64) -> CompiledNode {
        CompiledNode::population(PopulationNodeConfig::new(&[(offset, 1)], "pop"))
    }

    /// Routes event id "a" to person 10 and fails every other event.
    fn strict_router() -> Labeler {
        let root = CompiledNode::branch(BranchNodeConfig {
            branches: vec![BranchConfig::with_condition(
                single_population(10),
                FieldFilterConfig::equal("labeler_input.event_id.id", "a"),
            )],
            ..Default::default()
        });
        Labeler::from_root(&root).unwrap()
    }

    #[test]
    fn event_id_seeds_acting_fingerprint() {
        let mut event = LabelerEvent {
            labeler_input: Some(input("event-1")),
            ..Default::default()
        };
        stamp_fingerprints(&mut event);
        let fp = fingerprint64("event-1");
        assert_eq!(event.acting_fingerprint, Some(fp));
        let event_id = event.labeler_input.unwrap().event_id.unwrap();
        assert_eq!(event_id.id_fingerprint, Some(fp));
    }

    #[test]
    fn empty_event_id_is_fingerprinted() {
        let mut event = LabelerEvent {
            labeler_input: Some(LabelerInput {
                event_id: Some(EventId::default()),
                ..Default::default()
            }),
            ..Default::default()
        };
        stamp_fingerprints(&mut event);
        assert_eq!(event.acting_fingerprint, Some(fingerprint64("")));
    }

    #[test]
    fn missing_event_id_leaves_fingerprint_unset() {
        let mut event = LabelerEvent {
            labeler_input: Some(LabelerInput::default()),
            ..Default::default()
        };
        stamp_fingerprints(&mut event);
        assert_eq!(event.acting_fingerprint, None);
    }

    #[test]
    fn profile_user_ids_are_fingerprinted() {
        let user = |id: Option<&str>| {
            Some(UserInfo {
                user_id: id.map(str::to_string),
                ..Default::default()
            })
        };
        let mut event = LabelerEvent {
            labeler_input: Some(LabelerInput {
                profile_info: Some(ProfileInfo {
                    email_user_info: user(Some("email")),
                    phone_user_info: user(None),
                    proprietary_id_space_1_user_info: user(Some("p1")),
                    proprietary_id_space_7_user_info: user(Some("p7")),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        stamp_fingerprints(&mut event);

        let profile = event.labeler_input.unwrap().profile_info.unwrap();
        let fp_of = |info: Option<UserInfo>| info.unwrap().user_id_fingerprint;
        assert_eq!(fp_of(profile.email_user_info), Some(fingerprint64("email")));
        assert_eq!(fp_of(profile.phone_user_info), None);
        assert_eq!(
            fp_of(profile.proprietary_id_space_1_user_info),
            Some(fingerprint64("p1"))
        );
        assert_eq!(
            fp_of(profile.proprietary_id_space_7_user_info),
            Some(fingerprint64("p7"))
        );
        assert!(profile.logged_in_id_user_info.is_none());
        assert_eq!(event.acting_fingerprint, None);
    }

    #[test]
    fn label_returns_assigned_people() {
        let labeler = Labeler::from_root(&single_population(42)).unwrap();
        let output = labeler.label(&input("x")).unwrap();
        assert_eq!(output.people.len(), 1);
        assert_eq!(output.people[0].virtual_person_id, Some(42));
        assert!(output.serialized_debug_trace.is_empty());
    }

    #[test]
    fn debug_trace_holds_final_event() {
        let labeler = Labeler::from_root(&single_population(42))
            .unwrap()
            .with_debug_trace(true);
        let output = labeler.label(&input("x")).unwrap();
        let event: LabelerEvent = serde_json::from_str(&output.serialized_debug_trace).unwrap();
        assert_eq!(event.acting_fingerprint, Some(fingerprint64("x")));
        assert_eq!(event.virtual_person_activities, output.people);
    }

    #[test]
    fn labeling_is_deterministic() {
        let labeler = Labeler::from_root(&single_population(7))
            .unwrap()
            .with_debug_trace(true);
        assert_eq!(labeler.label(&input("e")).unwrap(), labeler.label(&input("e")).unwrap());
    }

    #[test]
    fn batch_keeps_order_and_isolates_failures() {
        let labeler = strict_router();
        let inputs = [input("a"), input("b"), input("a")];
        let outputs = labeler.label_batch(&inputs);
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0].as_ref().unwrap().people[0].virtual_person_id, Some(10));
        let err = outputs[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("No condition matches the input event."));
        assert!(outputs[2].is_ok());
    }

    #[test]
    fn parallel_matches_sequential() {
        let root = CompiledNode::branch(BranchNodeConfig {
            branches: vec![
                BranchConfig::with_chance(single_population(10), 0.5),
                BranchConfig::with_chance(single_population(20), 0.5),
            ],
            random_seed: Some("seed".into()),
            ..Default::default()
        });
        let labeler = Labeler::from_root(&root).unwrap();
        let inputs: Vec<_> = (0..500).map(|i| input(&i.to_string())).collect();

        let sequential: Vec<_> = labeler
            .label_batch(&inputs)
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        let parallel: Vec<_> = labeler
            .label_par_in(&pool, &inputs)
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(sequential, parallel);
    }
}
