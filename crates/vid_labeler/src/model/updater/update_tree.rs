use crate::errors::{LabelerError, Result};
use crate::event::LabelerEvent;
use crate::model::config::UpdateTreeConfig;
use crate::model::node::{ModelNode, NodeArena};

/// A nested model tree used as an attribute updater.
#[derive(Debug, Clone)]
pub struct UpdateTree {
    root: Box<ModelNode>,
}

impl UpdateTree {
    /// Index references in the nested tree resolve against `arena`.
    pub fn build(config: &UpdateTreeConfig, arena: &mut NodeArena<'_>) -> Result<Self> {
        let root = config
            .root
            .as_deref()
            .ok_or_else(|| LabelerError::model("UpdateTree must set root."))?;
        Ok(Self {
            root: Box::new(ModelNode::build(root, arena)?),
        })
    }

    pub fn update(&self, event: &mut LabelerEvent) -> Result<()> {
        self.root.apply(event)
    }
}
