mod context;
mod executor;

pub use context::{ExecutionContext, NodeRecord, NodeStatus};
pub(crate) use executor::NodeExecutor;
