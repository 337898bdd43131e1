mod edge;
mod node;
mod workflow;

pub use edge::EdgeModel;
pub use node::{NodeModel, OnError};
pub use workflow::{WorkflowModel, WorkflowSettings};
