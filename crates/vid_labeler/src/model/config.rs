//! Model wire format
//!
//! Serde mirrors of the compiled-model schema. A model file is a
//! [`ModelConfig`]: either one embedded root node or a flat list of indexed
//! nodes. Configs are plain data; every semantic check happens when a config
//! is compiled into a [`ModelNode`](super::ModelNode).

use crate::errors::{LabelerError, Result};
use crate::event::LabelerEvent;
use crate::filter::FieldFilterConfig;
use crate::serde_canon::{hash_canonical_hex, to_canonical_json};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directly_from_model_builder_config: Option<bool>,
}

/// One node of a model tree. Exactly one of `branch_node`, `population_node`
/// and `stop_node` must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompiledNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Key used by `node_index` references in list-form models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_node: Option<BranchNodeConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_node: Option<PopulationNodeConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_node: Option<StopNodeConfig>,
}

/// Borrowed view of the node type of a [`CompiledNode`]
#[derive(Debug, Clone, Copy)]
pub enum NodeConfigKind<'a> {
    Branch(&'a BranchNodeConfig),
    Population(&'a PopulationNodeConfig),
    Stop,
}

impl CompiledNode {
    pub fn branch(branch_node: BranchNodeConfig) -> Self {
        Self {
            branch_node: Some(branch_node),
            ..Default::default()
        }
    }

    pub fn population(population_node: PopulationNodeConfig) -> Self {
        Self {
            population_node: Some(population_node),
            ..Default::default()
        }
    }

    pub fn stop() -> Self {
        Self {
            stop_node: Some(StopNodeConfig::default()),
            ..Default::default()
        }
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn kind(&self) -> Result<NodeConfigKind<'_>> {
        match (&self.branch_node, &self.population_node, &self.stop_node) {
            (Some(branch), None, None) => Ok(NodeConfigKind::Branch(branch)),
            (None, Some(population), None) => Ok(NodeConfigKind::Population(population)),
            (None, None, Some(_)) => Ok(NodeConfigKind::Stop),
            (None, None, None) => Err(LabelerError::model(format!(
                "Node type is not set: {}",
                self.display_name()
            ))),
            _ => Err(LabelerError::model(format!(
                "CompiledNode must set exactly one node type: {}",
                self.display_name()
            ))),
        }
    }

    pub(crate) fn display_name(&self) -> String {
        match (&self.name, self.index) {
            (Some(name), Some(index)) => format!("{name} (index {index})"),
            (Some(name), None) => name.clone(),
            (None, Some(index)) => format!("index {index}"),
            (None, None) => "<unnamed>".to_string(),
        }
    }

    /// Number of nodes in this subtree, counting embedded children and
    /// update-tree roots but not index references.
    pub fn subtree_size(&self) -> usize {
        let mut size = 1;
        if let Some(branch) = &self.branch_node {
            for b in &branch.branches {
                size += b.node.as_deref().map_or(0, CompiledNode::subtree_size);
            }
            if let Some(updates) = &branch.updates {
                for u in &updates.updates {
                    if let Some(root) = u.update_tree.as_ref().and_then(|t| t.root.as_deref()) {
                        size += root.subtree_size();
                    }
                }
            }
        }
        size
    }
}

/// A child of a branch node and the way it is selected
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<Box<CompiledNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<FieldFilterConfig>,
}

impl BranchConfig {
    pub fn with_chance(node: CompiledNode, chance: f32) -> Self {
        Self {
            node: Some(Box::new(node)),
            chance: Some(chance),
            ..Default::default()
        }
    }

    pub fn with_condition(node: CompiledNode, condition: FieldFilterConfig) -> Self {
        Self {
            node: Some(Box::new(node)),
            condition: Some(condition),
            ..Default::default()
        }
    }

    pub fn index_with_chance(node_index: u32, chance: f32) -> Self {
        Self {
            node_index: Some(node_index),
            chance: Some(chance),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchNodeConfig {
    pub branches: Vec<BranchConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updates: Option<AttributesUpdaters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplicity: Option<MultiplicityConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributesUpdaters {
    pub updates: Vec<AttributesUpdaterConfig>,
}

/// Exactly one updater variant must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributesUpdaterConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_matrix: Option<UpdateMatrixConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparse_update_matrix: Option<SparseUpdateMatrixConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditional_merge: Option<ConditionalMergeConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditional_assignment: Option<ConditionalAssignmentConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometric_shredder: Option<GeometricShredderConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_tree: Option<UpdateTreeConfig>,
}

#[derive(Debug, Clone, Copy)]
pub enum UpdaterConfigKind<'a> {
    UpdateMatrix(&'a UpdateMatrixConfig),
    SparseUpdateMatrix(&'a SparseUpdateMatrixConfig),
    ConditionalMerge(&'a ConditionalMergeConfig),
    ConditionalAssignment(&'a ConditionalAssignmentConfig),
    GeometricShredder(&'a GeometricShredderConfig),
    UpdateTree(&'a UpdateTreeConfig),
}

impl AttributesUpdaterConfig {
    pub fn kind(&self) -> Result<UpdaterConfigKind<'_>> {
        let mut kinds = Vec::with_capacity(1);
        if let Some(c) = &self.update_matrix {
            kinds.push(UpdaterConfigKind::UpdateMatrix(c));
        }
        if let Some(c) = &self.sparse_update_matrix {
            kinds.push(UpdaterConfigKind::SparseUpdateMatrix(c));
        }
        if let Some(c) = &self.conditional_merge {
            kinds.push(UpdaterConfigKind::ConditionalMerge(c));
        }
        if let Some(c) = &self.conditional_assignment {
            kinds.push(UpdaterConfigKind::ConditionalAssignment(c));
        }
        if let Some(c) = &self.geometric_shredder {
            kinds.push(UpdaterConfigKind::GeometricShredder(c));
        }
        if let Some(c) = &self.update_tree {
            kinds.push(UpdaterConfigKind::UpdateTree(c));
        }
        match kinds.len() {
            0 => Err(LabelerError::model("config.update is not set.")),
            1 => Ok(kinds[0]),
            _ => Err(LabelerError::model(
                "AttributesUpdater must set exactly one update.",
            )),
        }
    }
}

impl From<UpdateMatrixConfig> for AttributesUpdaterConfig {
    fn from(config: UpdateMatrixConfig) -> Self {
        Self {
            update_matrix: Some(config),
            ..Default::default()
        }
    }
}

impl From<SparseUpdateMatrixConfig> for AttributesUpdaterConfig {
    fn from(config: SparseUpdateMatrixConfig) -> Self {
        Self {
            sparse_update_matrix: Some(config),
            ..Default::default()
        }
    }
}

impl From<ConditionalMergeConfig> for AttributesUpdaterConfig {
    fn from(config: ConditionalMergeConfig) -> Self {
        Self {
            conditional_merge: Some(config),
            ..Default::default()
        }
    }
}

impl From<ConditionalAssignmentConfig> for AttributesUpdaterConfig {
    fn from(config: ConditionalAssignmentConfig) -> Self {
        Self {
            conditional_assignment: Some(config),
            ..Default::default()
        }
    }
}

impl From<GeometricShredderConfig> for AttributesUpdaterConfig {
    fn from(config: GeometricShredderConfig) -> Self {
        Self {
            geometric_shredder: Some(config),
            ..Default::default()
        }
    }
}

impl From<UpdateTreeConfig> for AttributesUpdaterConfig {
    fn from(config: UpdateTreeConfig) -> Self {
        Self {
            update_tree: Some(config),
            ..Default::default()
        }
    }
}

/// Paths of the fields included in a masked event hash
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMask {
    pub paths: Vec<String>,
}

/// Dense matrix: `probabilities[row * columns.len() + column]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateMatrixConfig {
    pub columns: Vec<LabelerEvent>,
    pub rows: Vec<LabelerEvent>,
    pub probabilities: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_through_non_matches: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_field_mask: Option<FieldMask>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparseColumnConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_attrs: Option<LabelerEvent>,
    pub rows: Vec<LabelerEvent>,
    pub probabilities: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparseUpdateMatrixConfig {
    pub columns: Vec<SparseColumnConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_through_non_matches: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_field_mask: Option<FieldMask>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionalMergeNodeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<FieldFilterConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<LabelerEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionalMergeConfig {
    pub nodes: Vec<ConditionalMergeNodeConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_through_non_matches: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_field: Option<String>,
}

impl AssignmentConfig {
    pub fn new(source_field: &str, target_field: &str) -> Self {
        Self {
            source_field: Some(source_field.to_string()),
            target_field: Some(target_field.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionalAssignmentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<FieldFilterConfig>,
    pub assignments: Vec<AssignmentConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometricShredderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psi: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub randomness_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateTreeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<Box<CompiledNode>>,
}

/// Clone-count settings of a branch node. Exactly one of
/// `expected_multiplicity` and `expected_multiplicity_field` must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiplicityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_multiplicity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_multiplicity_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap_at_max: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_index_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<String>,
}

/// A contiguous range of virtual person ids
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualPersonPool {
    pub population_offset: u64,
    pub total_population: u64,
}

impl VirtualPersonPool {
    pub fn new(population_offset: u64, total_population: u64) -> Self {
        Self {
            population_offset,
            total_population,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationNodeConfig {
    pub pools: Vec<VirtualPersonPool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<String>,
}

impl PopulationNodeConfig {
    pub fn new(pools: &[(u64, u64)], random_seed: &str) -> Self {
        Self {
            pools: pools
                .iter()
                .map(|&(offset, total)| VirtualPersonPool::new(offset, total))
                .collect(),
            random_seed: Some(random_seed.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopNodeConfig {}

/// A model file: one embedded root, or a flat list of nodes where children
/// are referenced by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<CompiledNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<CompiledNode>,
}

impl ModelConfig {
    pub fn from_root(root: CompiledNode) -> Self {
        Self {
            root: Some(root),
            nodes: Vec::new(),
        }
    }

    pub fn from_nodes(nodes: Vec<CompiledNode>) -> Self {
        Self { root: None, nodes }
    }

    /// Checks that exactly one representation is present. Node semantics are
    /// checked when the model is compiled.
    pub fn validate(&self) -> Result<()> {
        match (&self.root, self.nodes.is_empty()) {
            (Some(_), false) => Err(LabelerError::model(
                "Model must set only one of root and nodes",
            )),
            (None, true) => Err(LabelerError::model("Model has no nodes")),
            _ => Ok(()),
        }
    }

    /// Total number of nodes in the file.
    pub fn num_nodes(&self) -> usize {
        self.root
            .iter()
            .chain(self.nodes.iter())
            .map(CompiledNode::subtree_size)
            .sum()
    }

    /// Serialize to canonical JSON (sorted keys, no whitespace)
    pub fn to_canonical_json(&self) -> Result<String> {
        Ok(to_canonical_json(self)?)
    }

    /// Blake3 hash of the canonical JSON form, hex encoded
    pub fn hash_hex(&self) -> Result<String> {
        Ok(hash_canonical_hex(self)?)
    }

    /// Save as canonical JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_canonical_json()?)?;
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let model: ModelConfig = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_branch_root() -> CompiledNode {
        CompiledNode::branch(BranchNodeConfig {
            branches: vec![
                BranchConfig::with_chance(
                    CompiledNode::population(PopulationNodeConfig::new(&[(10, 1)], "a")),
                    0.4,
                ),
                BranchConfig::with_chance(CompiledNode::stop(), 0.6),
            ],
            random_seed: Some("seed".into()),
            ..Default::default()
        })
        .with_name("root")
    }

    #[test]
    fn test_node_kind() {
        assert!(matches!(
            CompiledNode::stop().kind().unwrap(),
            NodeConfigKind::Stop
        ));
        let err = CompiledNode::default().kind().unwrap_err();
        assert!(err.to_string().contains("Node type is not set"));

        let mut both = CompiledNode::stop();
        both.population_node = Some(PopulationNodeConfig::default());
        assert!(both.kind().is_err());
    }

    #[test]
    fn test_updater_kind() {
        assert!(AttributesUpdaterConfig::default().kind().is_err());
        let config: AttributesUpdaterConfig = GeometricShredderConfig::default().into();
        assert!(matches!(
            config.kind().unwrap(),
            UpdaterConfigKind::GeometricShredder(_)
        ));
    }

    #[test]
    fn test_json_wire_format() {
        let json = r#"{
            "root": {
                "name": "root",
                "branch_node": {
                    "branches": [
                        {"node": {"stop_node": {}}, "chance": 0.5},
                        {"node_index": 3, "chance": 0.5}
                    ],
                    "random_seed": "s"
                }
            }
        }"#;
        let model = ModelConfig::from_json_str(json).unwrap();
        let root = model.root.as_ref().unwrap();
        let branch = root.branch_node.as_ref().unwrap();
        assert_eq!(branch.branches.len(), 2);
        assert_eq!(branch.branches[1].node_index, Some(3));
        assert_eq!(model.num_nodes(), 2);
    }

    #[test]
    fn test_validate_requires_one_representation() {
        assert!(ModelConfig::default().validate().is_err());
        let mut both = ModelConfig::from_root(CompiledNode::stop());
        both.nodes.push(CompiledNode::stop());
        assert!(both.validate().is_err());
        assert!(ModelConfig::from_nodes(vec![CompiledNode::stop()])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_canonical_json_and_hash() {
        let model = ModelConfig::from_root(two_branch_root());
        let json = model.to_canonical_json().unwrap();
        assert!(!json.contains('\n'));
        assert!(json.starts_with(r#"{"root":{"branch_node":"#));

        let hash = model.hash_hex().unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, ModelConfig::from_root(two_branch_root()).hash_hex().unwrap());

        let other = ModelConfig::from_root(two_branch_root().with_name("other"));
        assert_ne!(hash, other.hash_hex().unwrap());
    }

    #[test]
    fn test_save_load_json() {
        use tempfile::NamedTempFile;

        let model = ModelConfig::from_root(two_branch_root());
        let temp_file = NamedTempFile::new().unwrap();
        model.save_json(temp_file.path()).unwrap();

        let loaded = ModelConfig::load_json(temp_file.path()).unwrap();
        assert_eq!(model, loaded);
        assert_eq!(model.hash_hex().unwrap(), loaded.hash_hex().unwrap());
    }
}
