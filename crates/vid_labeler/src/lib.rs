//! Deterministic virtual-people labeler
//!
//! Assigns each incoming event to one or more virtual people by walking a
//! compiled model tree. Every probabilistic choice is driven by hashes of
//! the event, so the same model and event always produce the same people.
//!
//! Modules:
//! - `hash`, `consistent_hash`, `distributed_hashing`: hash primitives
//! - `event`: typed event schema with path-based field access
//! - `filter`: field conditions evaluated against events
//! - `model`: model wire format, compiled node tree, attribute updaters
//! - `labeler`: input stamping and batch labeling on top of a model
//! - `config`: runtime settings for the labeler and its CLI
//! - `serde_canon`: canonical JSON and model hashing

pub mod config;
pub mod consistent_hash;
pub mod distributed_hashing;
pub mod errors;
pub mod event;
pub mod filter;
pub mod hash;
pub mod labeler;
pub mod model;
pub mod serde_canon;

pub use config::{LabelerConfig, LogFormat};
pub use errors::{LabelerError, Result};
pub use event::{LabelerEvent, LabelerInput, LabelerOutput, VirtualPersonActivity};
pub use labeler::Labeler;
pub use model::{to_node_list, CompiledNode, ModelConfig, ModelNode};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
