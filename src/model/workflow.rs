use serde::{Deserialize, Serialize};

use crate::{
    NodeflowError, Result,
    model::{EdgeModel, NodeModel},
};

/// Optional workflow-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_order: Option<String>,
    #[serde(default)]
    pub save_execution_progress: bool,
    /// Id of a workflow to run when this one fails; dispatching it is the
    /// caller's responsibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_workflow: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// The full static workflow definition: node set, edge set and settings.
///
/// Read-only after authoring; one model can back any number of
/// independent executions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowModel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<NodeModel>,
    pub edges: Vec<EdgeModel>,
    #[serde(default)]
    pub settings: WorkflowSettings,
}

impl WorkflowModel {
    /// Parses a workflow definition from JSON, validating its shape
    /// against the definition schema first.
    pub fn from_json(s: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(s).map_err(|e| NodeflowError::Workflow(format!("{}", e)))?;
        jsonschema::validate(&Self::schema(), &value)?;
        serde_json::from_value(value).map_err(|e| NodeflowError::Workflow(format!("{}", e)))
    }

    /// JSON Schema for the authoring format.
    pub fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["id", "nodes", "edges"],
            "properties": {
                "id": { "type": "string" },
                "name": { "type": "string" },
                "nodes": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["id", "type"],
                        "properties": {
                            "id": { "type": "string" },
                            "type": { "type": "string" },
                            "name": { "type": "string" },
                            "parameters": { "type": "object" },
                            "disabled": { "type": "boolean" },
                            "continueOnFail": { "type": "boolean" },
                            "retryOnFail": { "type": "boolean" },
                            "maxTries": { "type": "integer", "minimum": 1 },
                            "waitBetweenTries": { "type": "integer", "minimum": 0 },
                            "executeOnce": { "type": "boolean" },
                            "alwaysOutputData": { "type": "boolean" },
                            "onError": {
                                "type": "string",
                                "enum": ["stopWorkflow", "continueRegularOutput", "continueErrorOutput"]
                            }
                        }
                    }
                },
                "edges": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["source", "target"],
                        "properties": {
                            "source": { "type": "string" },
                            "target": { "type": "string" },
                            "sourceHandle": { "type": ["string", "null"] },
                            "condition": { "type": ["string", "null"] }
                        }
                    }
                },
                "settings": {
                    "type": "object",
                    "properties": {
                        "executionOrder": { "type": "string" },
                        "saveExecutionProgress": { "type": "boolean" },
                        "errorWorkflow": { "type": "string" },
                        "timezone": { "type": "string" }
                    }
                }
            }
        })
    }
}
