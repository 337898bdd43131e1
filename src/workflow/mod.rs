pub mod edge;
pub mod expr;
mod graph;
pub mod node;
pub mod template;

pub use graph::Workflow;
