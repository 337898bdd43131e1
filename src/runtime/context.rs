//! Execution context: the single piece of state mutated during a run.
//!
//! The context is an append-only map from node id to the record of that
//! node's execution, plus a fixed trigger-data entry. It is exclusively
//! owned by one run; sibling branches executing concurrently write
//! distinct entries, so records live in a thread-safe cache.

use std::sync::Arc;

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{utils, workflow::node::NodeId};

/// Final status of a node within one run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Success,
    Failed,
    Skipped,
}

/// Record of one node execution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub output: Value,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub executed_at: String,
}

/// Per-run execution context.
///
/// Cloning is cheap and shares the underlying state; every clone
/// belongs to the same run.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    trigger_data: Arc<Value>,
    records: Cache<NodeId, NodeRecord>,
    /// Node ids in the order their records were written.
    order: Arc<std::sync::RwLock<Vec<NodeId>>>,
}

impl ExecutionContext {
    pub fn new(trigger_data: Value) -> Self {
        Self {
            trigger_data: Arc::new(trigger_data),
            // Unbounded: records are append-only and must never be evicted
            records: Cache::builder().build(),
            order: Arc::new(std::sync::RwLock::new(Vec::new())),
        }
    }

    /// The payload supplied by the external trigger, addressable in
    /// templates as `trigger.data`.
    pub fn trigger_data(&self) -> &Value {
        &self.trigger_data
    }

    /// Appends the record for a node. Each node writes exactly once per
    /// run, before any of its downstream nodes execute.
    pub fn record(
        &self,
        nid: NodeId,
        status: NodeStatus,
        output: Value,
        error: Option<String>,
    ) {
        let record = NodeRecord {
            output,
            status,
            error,
            executed_at: utils::time::now_iso(),
        };
        self.order.write().unwrap().push(nid.clone());
        self.records.insert(nid, record);
    }

    /// get a node's record by id
    pub fn get(
        &self,
        nid: &NodeId,
    ) -> Option<NodeRecord> {
        self.records.get(nid)
    }

    /// All node records in execution order.
    pub fn entries(&self) -> Vec<(NodeId, NodeRecord)> {
        let order = self.order.read().unwrap();
        order.iter().filter_map(|nid| self.records.get(nid).map(|r| (nid.clone(), r))).collect()
    }

    /// Number of node records written so far.
    pub fn len(&self) -> usize {
        self.order.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records with status `failed`, used by error-handler nodes.
    pub fn failed_entries(&self) -> Vec<(NodeId, NodeRecord)> {
        self.entries().into_iter().filter(|(_, r)| r.status == NodeStatus::Failed).collect()
    }

    /// Resolves a dot-separated context path such as `trigger.data.email`
    /// or `step1.output.result`. Returns `None` when any segment is
    /// missing.
    pub fn resolve_path(
        &self,
        path: &str,
    ) -> Option<Value> {
        let mut segments = path.split('.');
        let head = segments.next()?;

        let mut current = if head == "trigger" {
            serde_json::json!({ "data": self.trigger_data.as_ref().clone() })
        } else {
            serde_json::to_value(self.records.get(&head.to_string())?).ok()?
        };

        for segment in segments {
            current = current.get(segment)?.clone();
        }
        Some(current)
    }

    /// The full context as one JSON object: the trigger entry plus one
    /// entry per executed node. Fed to LLM prompts and returned to the
    /// caller for persistence.
    pub fn snapshot(&self) -> Value {
        let mut map = Map::new();
        map.insert("trigger".to_string(), serde_json::json!({ "data": self.trigger_data.as_ref().clone() }));
        for (nid, record) in self.entries() {
            if let Ok(value) = serde_json::to_value(&record) {
                map.insert(nid, value);
            }
        }
        Value::Object(map)
    }
}
