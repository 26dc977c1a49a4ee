//! Compiled model nodes and the index arena used to build them
//!
//! A tree is compiled either from one embedded root or from a flat list of
//! indexed nodes. List builds run in two passes: every indexed node is first
//! collected into a [`NodeArena`], then the tree is wired from the root,
//! consuming each index as it is referenced. Forward references are fine;
//! cycles, dangling or repeated references, and unreachable nodes are not.

use crate::errors::{LabelerError, Result};
use crate::event::LabelerEvent;
use crate::model::branch::BranchNode;
use crate::model::config::{CompiledNode, ModelConfig, NodeConfigKind};
use crate::model::population::PopulationNode;
use std::collections::{HashMap, HashSet};

/// Indexed nodes waiting to be attached to a tree.
#[derive(Debug, Default)]
pub struct NodeArena<'a> {
    pending: HashMap<u32, &'a CompiledNode>,
    building: HashSet<u32>,
}

impl<'a> NodeArena<'a> {
    /// Adds an indexed node; fails on a missing or duplicated index.
    pub fn insert(&mut self, node: &'a CompiledNode) -> Result<()> {
        let index = node.index.ok_or_else(|| {
            LabelerError::model(format!(
                "Only the root node may omit index: {}",
                node.display_name()
            ))
        })?;
        if self.pending.insert(index, node).is_some() {
            return Err(LabelerError::model(format!("Duplicated indexes: {index}")));
        }
        Ok(())
    }

    /// Builds the node stored under `index` and removes it from the arena,
    /// so each index can be attached to exactly one parent.
    pub fn resolve(&mut self, index: u32) -> Result<ModelNode> {
        if self.building.contains(&index) {
            return Err(LabelerError::model(format!(
                "Cycle detected at node index {index}"
            )));
        }
        let config = self.pending.remove(&index).ok_or_else(|| {
            LabelerError::model(format!(
                "The ModelNode object of the child node index {index} is not provided."
            ))
        })?;
        self.building.insert(index);
        let node = ModelNode::build(config, self);
        self.building.remove(&index);
        node
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The single pending node that no pending node references.
    fn find_root(&self) -> Result<u32> {
        let mut referenced = HashSet::new();
        for node in self.pending.values() {
            collect_references(node, &mut referenced);
        }
        let mut roots: Vec<u32> = self
            .pending
            .keys()
            .filter(|index| !referenced.contains(*index))
            .copied()
            .collect();
        roots.sort_unstable();
        match roots.as_slice() {
            [root] => Ok(*root),
            [] => Err(LabelerError::model("Cannot find root node.")),
            _ => Err(LabelerError::model(format!(
                "Only 1 root node is expected, but got {roots:?}"
            ))),
        }
    }
}

/// Indexes referenced anywhere under `node`, including embedded children
/// and update-tree roots.
fn collect_references(node: &CompiledNode, out: &mut HashSet<u32>) {
    let Some(branch) = &node.branch_node else {
        return;
    };
    for b in &branch.branches {
        if let Some(index) = b.node_index {
            out.insert(index);
        }
        if let Some(child) = &b.node {
            collect_references(child, out);
        }
    }
    if let Some(updates) = &branch.updates {
        for root in updates
            .updates
            .iter()
            .filter_map(|u| u.update_tree.as_ref()?.root.as_deref())
        {
            collect_references(root, out);
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Branch(BranchNode),
    Population(PopulationNode),
    Stop,
}

/// A node of a compiled model tree
#[derive(Debug, Clone)]
pub struct ModelNode {
    name: String,
    index: Option<u32>,
    from_model_builder_config: bool,
    kind: NodeKind,
}

impl ModelNode {
    /// Compiles `config`, resolving `node_index` children against `arena`.
    pub fn build(config: &CompiledNode, arena: &mut NodeArena<'_>) -> Result<Self> {
        let kind = match config.kind()? {
            NodeConfigKind::Branch(branch) => NodeKind::Branch(BranchNode::build(branch, arena)?),
            NodeConfigKind::Population(population) => {
                NodeKind::Population(PopulationNode::build(population)?)
            }
            NodeConfigKind::Stop => NodeKind::Stop,
        };
        Ok(Self {
            name: config.name.clone().unwrap_or_default(),
            index: config.index,
            from_model_builder_config: config
                .debug_info
                .as_ref()
                .and_then(|d| d.directly_from_model_builder_config)
                .unwrap_or(false),
            kind,
        })
    }

    /// Compiles a tree with every child embedded.
    pub fn from_root(root: &CompiledNode) -> Result<Self> {
        Self::build(root, &mut NodeArena::default())
    }

    /// Compiles a tree from a flat node list.
    ///
    /// The root is either the single node without index, which must come
    /// last, or the only indexed node no other node references.
    pub fn from_nodes(nodes: &[CompiledNode]) -> Result<Self> {
        let mut arena = NodeArena::default();
        let mut root = None;
        for node in nodes {
            if root.is_some() {
                return Err(LabelerError::model("No node is allowed after the root node."));
            }
            match node.index {
                Some(_) => arena.insert(node)?,
                None => root = Some(node),
            }
        }

        let tree = match root {
            Some(root) => Self::build(root, &mut arena)?,
            None => {
                let index = arena.find_root()?;
                arena.resolve(index)?
            }
        };
        if !arena.is_empty() {
            let mut orphans: Vec<u32> = arena.pending.keys().copied().collect();
            orphans.sort_unstable();
            return Err(LabelerError::model(format!(
                "Some nodes are not in the model tree: {orphans:?}"
            )));
        }
        Ok(tree)
    }

    /// Compiles whichever representation `model` carries.
    pub fn from_model(model: &ModelConfig) -> Result<Self> {
        model.validate()?;
        match &model.root {
            Some(root) => Self::from_root(root),
            None => Self::from_nodes(&model.nodes),
        }
    }

    pub fn apply(&self, event: &mut LabelerEvent) -> Result<()> {
        match &self.kind {
            NodeKind::Branch(branch) => branch.apply(event),
            NodeKind::Population(population) => population.apply(event),
            NodeKind::Stop => Ok(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub fn from_model_builder_config(&self) -> bool {
        self.from_model_builder_config
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::{
        AttributesUpdaters, BranchConfig, BranchNodeConfig, DebugInfo, PopulationNodeConfig,
        UpdateTreeConfig,
    };

    fn population(index: u32, offset: u64) -> CompiledNode {
        CompiledNode::population(PopulationNodeConfig::new(&[(offset, 1)], "pop")).with_index(index)
    }

    fn branch_to(children: &[u32]) -> CompiledNode {
        CompiledNode::branch(BranchNodeConfig {
            branches: children
                .iter()
                .map(|&i| BranchConfig::index_with_chance(i, 1.0 / children.len() as f32))
                .collect(),
            random_seed: Some("seed".into()),
            ..Default::default()
        })
    }

    fn error_of(nodes: &[CompiledNode]) -> String {
        ModelNode::from_nodes(nodes).unwrap_err().to_string()
    }

    fn labeled(node: &ModelNode) -> i64 {
        let mut event = LabelerEvent::default();
        node.apply(&mut event).unwrap();
        event.virtual_person_activities[0].virtual_person_id.unwrap()
    }

    #[test]
    fn stop_node_is_a_no_op() {
        let node = ModelNode::from_root(&CompiledNode::stop().with_name("stop")).unwrap();
        assert_eq!(node.name(), "stop");
        assert!(matches!(node.kind(), NodeKind::Stop));
        let mut event = LabelerEvent::default();
        node.apply(&mut event).unwrap();
        assert_eq!(event, LabelerEvent::default());
    }

    #[test]
    fn metadata_is_kept() {
        let mut config = CompiledNode::stop().with_index(4);
        config.debug_info = Some(DebugInfo {
            directly_from_model_builder_config: Some(true),
        });
        let node = ModelNode::from_nodes(&[config]).unwrap();
        assert_eq!(node.index(), Some(4));
        assert!(node.from_model_builder_config());
    }

    #[test]
    fn unset_node_type_fails() {
        let err = ModelNode::from_root(&CompiledNode::default()).unwrap_err();
        assert!(err.to_string().contains("Node type is not set"));
    }

    #[test]
    fn unindexed_root_last() {
        let nodes = [population(2, 10), population(3, 20), branch_to(&[3])];
        let err = error_of(&nodes);
        assert!(err.contains("Some nodes are not in the model tree: [2]"), "{err}");

        let nodes = [population(2, 10), branch_to(&[2])];
        assert_eq!(labeled(&ModelNode::from_nodes(&nodes).unwrap()), 10);
    }

    #[test]
    fn node_after_root_fails() {
        let nodes = [branch_to(&[2]), population(2, 10)];
        assert!(error_of(&nodes).contains("No node is allowed after the root node."));
    }

    #[test]
    fn duplicated_index_fails() {
        let nodes = [population(2, 10), population(2, 20), branch_to(&[2])];
        assert!(error_of(&nodes).contains("Duplicated indexes: 2"));
    }

    #[test]
    fn indexed_root_is_inferred() {
        // forward references are resolved in the second pass
        let nodes = [branch_to(&[2]).with_index(1), population(2, 30)];
        assert_eq!(labeled(&ModelNode::from_nodes(&nodes).unwrap()), 30);

        let nodes = [population(2, 30), branch_to(&[2]).with_index(1)];
        assert_eq!(labeled(&ModelNode::from_nodes(&nodes).unwrap()), 30);
    }

    #[test]
    fn root_inference_errors() {
        let two_roots = [population(1, 10), population(2, 20)];
        assert!(error_of(&two_roots).contains("Only 1 root node is expected"));

        let cycle = [branch_to(&[2]).with_index(1), branch_to(&[1]).with_index(2)];
        assert!(error_of(&cycle).contains("Cannot find root node."));

        assert!(error_of(&[]).contains("Cannot find root node."));
    }

    #[test]
    fn cycle_below_root_fails() {
        let nodes = [
            branch_to(&[2]).with_index(2),
            branch_to(&[2]).with_index(1),
        ];
        // node 2 references itself, node 1 is the only unreferenced node
        assert!(error_of(&nodes).contains("Cycle detected at node index 2"));
    }

    #[test]
    fn missing_and_reused_indexes_fail() {
        let missing = [population(2, 10), branch_to(&[2, 3])];
        assert!(error_of(&missing).contains("child node index 3 is not provided"));

        let reused = [population(2, 10), branch_to(&[2, 2])];
        assert!(error_of(&reused).contains("child node index 2 is not provided"));
    }

    #[test]
    fn update_tree_references_count_for_root_inference() {
        let mut root = branch_to(&[2]).with_index(1);
        root.branch_node.as_mut().unwrap().updates = Some(AttributesUpdaters {
            updates: vec![UpdateTreeConfig {
                root: Some(Box::new(branch_to(&[3]))),
            }
            .into()],
        });
        let nodes = [root, population(2, 10), CompiledNode::stop().with_index(3)];
        let node = ModelNode::from_nodes(&nodes).unwrap();
        assert_eq!(node.index(), Some(1));
        assert_eq!(labeled(&node), 10);
    }

    #[test]
    fn from_model_picks_representation() {
        let model = ModelConfig::from_nodes(vec![population(2, 10), branch_to(&[2])]);
        assert_eq!(labeled(&ModelNode::from_model(&model).unwrap()), 10);

        let model = ModelConfig::from_root(CompiledNode::population(PopulationNodeConfig::new(
            &[(40, 1)],
            "pop",
        )));
        assert_eq!(labeled(&ModelNode::from_model(&model).unwrap()), 40);

        assert!(ModelNode::from_model(&ModelConfig::default()).is_err());
    }
}
