use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error policy applied when a node's final attempt fails.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum OnError {
    /// Abort the run, propagating the error to the caller.
    #[default]
    StopWorkflow,
    /// Continue downstream, passing `null` as this node's output.
    ContinueRegularOutput,
    /// Continue downstream, passing `{"error": message}` as this node's output.
    ContinueErrorOutput,
}

/// A node as authored in the workflow definition.
///
/// Field names follow the camelCase authoring format produced by the
/// workflow editor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeModel {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub name: String,
    /// Opaque key-value parameters, interpreted per node type.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Disabled nodes record `skipped` and terminate their branch.
    #[serde(default)]
    pub disabled: bool,
    /// Shorthand for `onError: continueRegularOutput`.
    #[serde(default)]
    pub continue_on_fail: bool,
    #[serde(default)]
    pub retry_on_fail: bool,
    /// Maximum attempts when `retryOnFail` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tries: Option<u32>,
    /// Milliseconds to wait between retry attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_between_tries: Option<u64>,
    #[serde(default)]
    pub execute_once: bool,
    /// When set, a node that produced no data still outputs an empty object.
    #[serde(default)]
    pub always_output_data: bool,
    #[serde(default)]
    pub on_error: OnError,
}
