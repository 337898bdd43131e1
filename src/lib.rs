//! # Nodeflow
//!
//! Nodeflow is a graph-based workflow execution engine written in Rust.
//! It is designed to be embedded in applications that let users wire
//! typed automation steps into a directed graph and run it on demand.
//!
//! ## Core Features
//!
//! - **Typed Nodes**: trigger, fetch/action, process (LLM), condition,
//!   filter, loop, delay, merge, split, transform, aggregate and more
//! - **Async Execution**: powered by `tokio`, sibling branches fan out
//!   concurrently after each completed node
//! - **Template Variables**: `{{step1.output.result}}`-style references
//!   resolved from prior node outputs before each node runs
//! - **Injected Integrations**: external providers are called through a
//!   handler registry built at startup, never through global state
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nodeflow::{EngineBuilder, WorkflowModel, CredentialStore};
//!
//! let engine = EngineBuilder::new().build()?;
//! let workflow = WorkflowModel::from_json(json_str)?;
//! let ctx = engine
//!     .execute(&workflow, CredentialStore::new(), serde_json::json!({}))
//!     .await?;
//! ```

mod builder;
mod config;
mod engine;
mod error;
mod integration;
mod llm;
mod model;
mod runtime;
mod utils;
mod workflow;

use std::sync::{Arc, RwLock};

pub use builder::EngineBuilder;
pub use config::{Config, EngineSettings, LlmConfig};
pub use engine::Engine;
pub use error::NodeflowError;
pub use integration::{CredentialStore, HandlerRegistry, IntegrationHandler, handler_fn};
pub use model::*;
pub use runtime::{ExecutionContext, NodeRecord, NodeStatus};
pub use workflow::node::NodeKind;

/// Result type alias for Nodeflow operations.
pub type Result<T> = std::result::Result<T, NodeflowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
