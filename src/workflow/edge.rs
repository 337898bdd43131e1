//! Workflow edge definitions for connecting nodes.
//!
//! Edges define the execution flow between nodes, supporting conditional
//! branching through source handles ("true"/"false" for condition nodes).

use crate::{
    model::EdgeModel,
    workflow::node::NodeId,
};

/// Runtime edge representation connecting two nodes.
#[derive(Debug, Clone)]
pub struct Edge {
    /// ID of the source node.
    pub source: NodeId,
    /// ID of the target node.
    pub target: NodeId,
    /// Which output branch this edge connects from, when the source is
    /// a condition node.
    pub source_handle: Option<String>,
    /// Free-form annotation from the editor.
    pub condition: Option<String>,
}

impl From<&EdgeModel> for Edge {
    fn from(model: &EdgeModel) -> Self {
        Self {
            source: model.source.clone(),
            target: model.target.clone(),
            source_handle: model.source_handle.clone(),
            condition: model.condition.clone(),
        }
    }
}
