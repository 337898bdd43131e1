//! Error types for Nodeflow.
//!
//! All errors in Nodeflow are represented by the `NodeflowError` enum,
//! which provides specific variants for different error categories.

use std::io::ErrorKind;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Nodeflow operations.
///
/// Each variant represents a specific category of error that can occur
/// during workflow definition, execution, or integration dispatch.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum NodeflowError {
    /// Engine-level errors (missing trigger, malformed graph references).
    #[error("{0}")]
    Config(String),

    /// Workflow definition errors.
    #[error("{0}")]
    Workflow(String),

    /// Node definition or execution errors.
    #[error("{0}")]
    Node(String),

    /// Edge definition errors.
    #[error("{0}")]
    Edge(String),

    /// Integration dispatch errors (missing credentials, unknown action,
    /// handler failures).
    #[error("{0}")]
    Integration(String),

    /// LLM completion errors.
    #[error("{0}")]
    Llm(String),

    /// Expression parse or evaluation errors.
    #[error("{0}")]
    Expression(String),

    /// Data conversion errors (JSON, templates).
    #[error("{0}")]
    Convert(String),

    /// Runtime execution errors.
    #[error("{0}")]
    Runtime(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),
}

impl From<NodeflowError> for String {
    fn from(val: NodeflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for NodeflowError {
    fn from(error: std::io::Error) -> Self {
        NodeflowError::IoError(error.to_string())
    }
}

impl From<NodeflowError> for std::io::Error {
    fn from(val: NodeflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<serde_json::Error> for NodeflowError {
    fn from(error: serde_json::Error) -> Self {
        NodeflowError::Convert(error.to_string())
    }
}

impl From<jsonschema::ValidationError<'_>> for NodeflowError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        NodeflowError::Workflow(error.to_string())
    }
}

impl From<reqwest::Error> for NodeflowError {
    fn from(error: reqwest::Error) -> Self {
        NodeflowError::Llm(error.to_string())
    }
}
