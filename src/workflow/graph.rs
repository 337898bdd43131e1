//! Runtime workflow representation using a directed graph.
//!
//! Wraps the workflow model in a petgraph `DiGraph` for traversal during
//! execution. The graph is read-only once built; all execution state is
//! recorded in the [`ExecutionContext`](crate::ExecutionContext).

use std::collections::HashMap;

use petgraph::{
    Direction,
    graph::DiGraph,
    visit::EdgeRef,
};

use crate::{
    NodeflowError, Result, ShareLock, WorkflowModel,
    workflow::{
        edge::Edge,
        node::{Node, NodeId, NodeKind},
    },
};

/// Runtime workflow as a directed graph of nodes and edges.
#[derive(Clone)]
pub struct Workflow {
    graph: ShareLock<DiGraph<Node, Edge>>,
}

impl Workflow {
    /// Output a human-readable representation of the workflow graph
    pub fn schema(&self) -> String {
        let graph = self.graph.read().unwrap();
        let mut lines = Vec::new();

        lines.push(format!("Nodes: {}, Edges: {}", graph.node_count(), graph.edge_count()));
        for idx in graph.node_indices() {
            let node = &graph[idx];
            let outgoing: Vec<String> = graph
                .edges_directed(idx, Direction::Outgoing)
                .map(|e| {
                    let target = &graph[e.target()].id;
                    let edge = e.weight();
                    match (&edge.source_handle, &edge.condition) {
                        (Some(handle), _) => format!("{}({})", target, handle),
                        (None, Some(note)) => format!("{} /* {} */", target, note),
                        (None, None) => target.clone(),
                    }
                })
                .collect();

            let label = if node.name.is_empty() { node.type_name.clone() } else { format!("{}: {}", node.type_name, node.name) };
            if outgoing.is_empty() {
                lines.push(format!("{} [{}] -> (end)", node.id, label));
            } else {
                lines.push(format!("{} [{}] -> {}", node.id, label, outgoing.join(", ")));
            }
        }

        lines.join("\n")
    }

    /// Finds the unique trigger node the run starts from.
    ///
    /// Fails with a configuration error when the graph has no trigger
    /// node or more than one.
    pub fn trigger_node(&self) -> Result<Node> {
        let graph = self.graph.read().unwrap();
        let mut triggers = graph.node_indices().filter(|idx| graph[*idx].kind == NodeKind::Trigger);

        let first = triggers.next().ok_or_else(|| NodeflowError::Config("workflow has no trigger node".to_string()))?;
        if triggers.next().is_some() {
            return Err(NodeflowError::Config("workflow has more than one trigger node".to_string()));
        }
        Ok(graph[first].clone())
    }

    /// get node by id
    pub fn get_node(
        &self,
        id: &NodeId,
    ) -> Option<Node> {
        let graph = self.graph.read().unwrap();
        graph.node_indices().find(|idx| graph[*idx].id.eq(id)).map(|idx| graph[idx].clone())
    }

    /// Get all outgoing edges from a node
    pub fn get_outgoing_edges(
        &self,
        nid: &NodeId,
    ) -> Vec<Edge> {
        let graph = self.graph.read().unwrap();
        graph
            .node_indices()
            .find(|idx| graph[*idx].id.eq(nid))
            .map(|src_idx| graph.edges_directed(src_idx, Direction::Outgoing).map(|edge_ref| edge_ref.weight().clone()).collect())
            .unwrap_or_default()
    }

    /// Get the source node ids of all edges targeting a node, in edge
    /// insertion order. Used by merge nodes to gather predecessor outputs.
    pub fn get_predecessors(
        &self,
        nid: &NodeId,
    ) -> Vec<NodeId> {
        let graph = self.graph.read().unwrap();
        graph
            .node_indices()
            .find(|idx| graph[*idx].id.eq(nid))
            .map(|dst_idx| {
                let mut sources: Vec<NodeId> = graph.edges_directed(dst_idx, Direction::Incoming).map(|edge_ref| edge_ref.weight().source.clone()).collect();
                sources.reverse();
                sources
            })
            .unwrap_or_default()
    }
}

impl TryFrom<&WorkflowModel> for Workflow {
    type Error = NodeflowError;

    fn try_from(model: &WorkflowModel) -> Result<Self> {
        let mut graph: DiGraph<Node, Edge> = DiGraph::new();

        let mut nodes = HashMap::new();

        for node_model in model.nodes.iter() {
            let node = Node::from(node_model);
            if nodes.contains_key(&node.id) {
                return Err(NodeflowError::Node(format!("duplicate node id '{}'", node.id)));
            }
            let nid = node.id.clone();
            let node_idx = graph.add_node(node);
            nodes.insert(nid, node_idx);
        }
        for edge_model in model.edges.iter() {
            let edge = Edge::from(edge_model);
            let source = nodes.get(&edge.source).ok_or(NodeflowError::Edge(format!("source node {} not found", edge.source)))?;
            let target = nodes.get(&edge.target).ok_or(NodeflowError::Edge(format!("target node {} not found", edge.target)))?;
            graph.add_edge(*source, *target, edge);
        }
        Ok(Self {
            graph: ShareLock::new(graph.into()),
        })
    }
}
