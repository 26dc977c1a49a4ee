//! Model trees: wire configs and their compiled, evaluable form
//!
//! A [`ModelConfig`] is compiled once into a [`ModelNode`] tree. Building
//! checks everything that can be checked without an event; the compiled
//! tree is immutable and can be shared across threads, while
//! [`ModelNode::apply`] mutates only the event it is given.
//!
//! Node kinds:
//! - branch: runs attribute updaters or expands the event by multiplicity,
//!   then applies one child chosen by chance or by condition
//! - population: assigns a virtual person id and collapses labels
//! - stop: does nothing

mod branch;
pub mod config;
mod multiplicity;
mod node;
mod population;
mod serializer;
pub mod updater;
pub mod utils;

pub use branch::BranchNode;
pub use config::{
    AttributesUpdaterConfig, BranchConfig, BranchNodeConfig, CompiledNode, ModelConfig,
    MultiplicityConfig, PopulationNodeConfig, VirtualPersonPool,
};
pub use multiplicity::Multiplicity;
pub use node::{ModelNode, NodeArena, NodeKind};
pub use population::PopulationNode;
pub use serializer::to_node_list;
pub use updater::AttributesUpdater;
