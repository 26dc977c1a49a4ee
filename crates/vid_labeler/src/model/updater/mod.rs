//! Attribute updaters
//!
//! Updaters run in order on a branch node before it selects a child. Each
//! mutates the event in place and is read-only after it is built.

mod conditional_assignment;
mod conditional_merge;
mod geometric_shredder;
mod sparse_update_matrix;
mod update_matrix;
mod update_tree;

pub use conditional_assignment::ConditionalAssignment;
pub use conditional_merge::ConditionalMerge;
pub use geometric_shredder::GeometricShredder;
pub use sparse_update_matrix::SparseUpdateMatrix;
pub use update_matrix::UpdateMatrix;
pub use update_tree::UpdateTree;

use crate::errors::Result;
use crate::event::LabelerEvent;
use crate::model::config::{AttributesUpdaterConfig, UpdaterConfigKind};
use crate::model::node::NodeArena;

/// A compiled attribute updater
#[derive(Debug, Clone)]
pub enum AttributesUpdater {
    UpdateMatrix(UpdateMatrix),
    SparseUpdateMatrix(SparseUpdateMatrix),
    ConditionalMerge(ConditionalMerge),
    ConditionalAssignment(ConditionalAssignment),
    GeometricShredder(GeometricShredder),
    UpdateTree(UpdateTree),
}

impl AttributesUpdater {
    pub fn build(config: &AttributesUpdaterConfig, arena: &mut NodeArena<'_>) -> Result<Self> {
        Ok(match config.kind()? {
            UpdaterConfigKind::UpdateMatrix(c) => Self::UpdateMatrix(UpdateMatrix::build(c)?),
            UpdaterConfigKind::SparseUpdateMatrix(c) => {
                Self::SparseUpdateMatrix(SparseUpdateMatrix::build(c)?)
            }
            UpdaterConfigKind::ConditionalMerge(c) => {
                Self::ConditionalMerge(ConditionalMerge::build(c)?)
            }
            UpdaterConfigKind::ConditionalAssignment(c) => {
                Self::ConditionalAssignment(ConditionalAssignment::build(c)?)
            }
            UpdaterConfigKind::GeometricShredder(c) => {
                Self::GeometricShredder(GeometricShredder::build(c)?)
            }
            UpdaterConfigKind::UpdateTree(c) => Self::UpdateTree(UpdateTree::build(c, arena)?),
        })
    }

    pub fn update(&self, event: &mut LabelerEvent) -> Result<()> {
        match self {
            Self::UpdateMatrix(u) => u.update(event),
            Self::SparseUpdateMatrix(u) => u.update(event),
            Self::ConditionalMerge(u) => u.update(event),
            Self::ConditionalAssignment(u) => u.update(event),
            Self::GeometricShredder(u) => u.update(event),
            Self::UpdateTree(u) => u.update(event),
        }
    }
}
