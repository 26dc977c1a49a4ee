//! Conversion from the embedded tree representation to a node list

use crate::errors::{LabelerError, Result};
use crate::model::config::CompiledNode;

/// Flattens a tree whose children are all embedded into a node list.
///
/// Nodes are emitted children first, depth first, with indexes counting up
/// from 0; the root comes last. Every branch is rewritten to reference its
/// child by `node_index`. Update-tree roots stay embedded.
pub fn to_node_list(root: &CompiledNode) -> Result<Vec<CompiledNode>> {
    let mut nodes = Vec::with_capacity(root.subtree_size());
    push_subtree(root.clone(), &mut nodes)?;
    Ok(nodes)
}

fn push_subtree(mut node: CompiledNode, nodes: &mut Vec<CompiledNode>) -> Result<u32> {
    if let Some(branch_node) = node.branch_node.as_mut() {
        for branch in &mut branch_node.branches {
            if branch.node_index.is_some() {
                return Err(LabelerError::model(format!(
                    "Single node representation shouldn't use node_index: {branch:?}"
                )));
            }
            let child = branch.node.take().ok_or_else(|| {
                LabelerError::model(format!("branch child_node is not set: {branch:?}"))
            })?;
            branch.node_index = Some(push_subtree(*child, nodes)?);
        }
    }
    let index = u32::try_from(nodes.len())
        .map_err(|_| LabelerError::model("Too many nodes for node_index"))?;
    node.index = Some(index);
    nodes.push(node);
    Ok(index)
}
