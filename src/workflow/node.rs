use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{NodeModel, OnError};

/// node id
pub type NodeId = String;

/// Default number of attempts when `retryOnFail` is set.
pub const DEFAULT_MAX_TRIES: u32 = 3;
/// Default wait between retry attempts in milliseconds.
pub const DEFAULT_RETRY_WAIT_MS: u64 = 1000;

/// The closed set of node kinds the executor has dedicated semantics for.
///
/// Dispatch over this enum is an exhaustive match; kinds without
/// dedicated behavior (`Schedule`, `Custom`) fail softly by echoing
/// `{type, params}`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeKind {
    Trigger,
    Fetch,
    Action,
    Process,
    Condition,
    Filter,
    Loop,
    Delay,
    Merge,
    Split,
    Transform,
    Aggregate,
    Schedule,
    Error,
    Http,
    Webhook,
    /// Any type string not in the closed set.
    #[default]
    #[strum(disabled)]
    Custom,
}

impl NodeKind {
    /// Parses a type string, mapping unknown strings to `Custom`
    /// instead of failing (permissive default).
    pub fn parse(s: &str) -> Self {
        NodeKind::from_str(s).unwrap_or(NodeKind::Custom)
    }

    /// Kinds dispatched to the external integration registry.
    pub fn is_integration(&self) -> bool {
        matches!(self, NodeKind::Fetch | NodeKind::Action | NodeKind::Http | NodeKind::Webhook)
    }
}

/// Runtime node representation.
///
/// Immutable for the lifetime of a run; execution state lives in the
/// [`ExecutionContext`](crate::ExecutionContext), not on the node.
#[derive(Debug, Clone)]
pub struct Node {
    /// node id
    pub id: NodeId,
    /// resolved node kind
    pub kind: NodeKind,
    /// raw type string from the definition, kept for soft outputs
    pub type_name: String,
    /// display name
    pub name: String,
    /// opaque parameters, interpreted per kind
    pub parameters: Value,
    /// skipped without executing downstream when set
    pub disabled: bool,
    pub continue_on_fail: bool,
    pub retry_on_fail: bool,
    max_tries: Option<u32>,
    wait_between_tries: Option<u64>,
    pub always_output_data: bool,
    on_error: OnError,
}

impl Node {
    /// Number of attempts the engine makes before the failure is final.
    pub fn max_tries(&self) -> u32 {
        if !self.retry_on_fail {
            return 1;
        }
        self.max_tries.unwrap_or(DEFAULT_MAX_TRIES).max(1)
    }

    /// Milliseconds to wait between attempts.
    pub fn wait_between_tries(&self) -> u64 {
        self.wait_between_tries.unwrap_or(DEFAULT_RETRY_WAIT_MS)
    }

    /// Error policy for the final failed attempt.
    ///
    /// `continueOnFail` is authoring shorthand for
    /// `onError: continueRegularOutput`.
    pub fn on_error(&self) -> OnError {
        if self.on_error == OnError::StopWorkflow && self.continue_on_fail {
            return OnError::ContinueRegularOutput;
        }
        self.on_error
    }
}

impl From<&NodeModel> for Node {
    fn from(model: &NodeModel) -> Self {
        Self {
            id: model.id.clone(),
            kind: NodeKind::parse(&model.node_type),
            type_name: model.node_type.clone(),
            name: model.name.clone(),
            parameters: Value::Object(model.parameters.clone()),
            disabled: model.disabled,
            continue_on_fail: model.continue_on_fail,
            retry_on_fail: model.retry_on_fail,
            max_tries: model.max_tries,
            wait_between_tries: model.wait_between_tries,
            always_output_data: model.always_output_data,
            on_error: model.on_error,
        }
    }
}
