use serde::{Deserialize, Serialize};

/// An edge as authored in the workflow definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeModel {
    pub source: String,
    pub target: String,
    /// Selects a condition branch ("true"/"false") when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Free-form annotation carried by the editor; not evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}
