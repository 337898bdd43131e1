//! Workflow engine - the main entry point for Nodeflow.
//!
//! One call to [`Engine::execute`] performs one traversal of the node
//! graph from its trigger node, applying per-node retry and error
//! policy, and returns the populated execution context. The caller is
//! responsible for persisting `{status, output, error, duration_ms}`
//! once the call settles.

use std::{
    collections::HashSet,
    sync::Arc,
    time::Duration,
};

use futures::future::{BoxFuture, FutureExt, join_all};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{
    NodeflowError, Result, ShareLock,
    config::Config,
    integration::{CredentialStore, HandlerRegistry},
    model::{OnError, WorkflowModel},
    runtime::{ExecutionContext, NodeExecutor, NodeStatus},
    workflow::{
        Workflow,
        node::{Node, NodeId, NodeKind},
    },
};

/// The workflow engine.
///
/// Holds the injected integration registry and engine configuration.
/// One engine serves any number of independent executions; per-run
/// state lives in the [`ExecutionContext`] created by each call.
pub struct Engine {
    registry: Arc<HandlerRegistry>,
    config: Arc<Config>,
}

impl Engine {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            registry,
            config,
        }
    }

    /// Executes a workflow once, from its trigger node.
    ///
    /// Requires exactly one trigger node in the graph. Returns the
    /// populated context; on abort the error carries the failing node's
    /// message while the context written so far is discarded with the
    /// run (callers needing partial context should use
    /// [`Engine::execute_with_context`]).
    pub async fn execute(
        &self,
        model: &WorkflowModel,
        credentials: CredentialStore,
        trigger_data: Value,
    ) -> Result<ExecutionContext> {
        let ctx = ExecutionContext::new(trigger_data);
        self.execute_with_context(model, credentials, ctx.clone()).await?;
        Ok(ctx)
    }

    /// Like [`Engine::execute`], but runs against a caller-supplied
    /// context so partial results survive an aborted run.
    pub async fn execute_with_context(
        &self,
        model: &WorkflowModel,
        credentials: CredentialStore,
        ctx: ExecutionContext,
    ) -> Result<()> {
        let workflow = Workflow::try_from(model)?;
        let trigger = workflow.trigger_node()?;

        debug!(workflow = %model.id, trigger = %trigger.id, "starting execution");
        debug!(graph = %workflow.schema(), "workflow graph");

        let run = Run {
            workflow: Arc::new(workflow),
            ctx,
            executor: Arc::new(NodeExecutor::new(self.registry.clone(), credentials, self.config.clone())),
            visited: ShareLock::new(HashSet::new().into()),
        };

        run.execute_node(trigger.id.clone()).await?;

        info!(workflow = %model.id, nodes = run.ctx.len(), "execution finished");
        Ok(())
    }
}

/// One in-flight execution: the graph, the context it owns, and the
/// visited set guarding at-most-once node execution.
struct Run {
    workflow: Arc<Workflow>,
    ctx: ExecutionContext,
    executor: Arc<NodeExecutor>,
    visited: ShareLock<HashSet<NodeId>>,
}

impl Run {
    /// Marks a node visited; false when it already ran this run.
    fn visit(
        &self,
        nid: &NodeId,
    ) -> bool {
        self.visited.write().unwrap().insert(nid.clone())
    }

    /// Executes one node and, on completion, its downstream nodes.
    ///
    /// Re-entry for an already-visited node returns immediately: this
    /// guards cyclic graphs against unbounded recursion and gives
    /// diamond descendants single-winner semantics (the first
    /// predecessor to arrive runs them; there is no join barrier).
    fn execute_node(
        &self,
        nid: NodeId,
    ) -> BoxFuture<'_, Result<()>> {
        async move {
            if !self.visit(&nid) {
                return Ok(());
            }

            let node = self
                .workflow
                .get_node(&nid)
                .ok_or_else(|| NodeflowError::Config(format!("edge references unknown node '{}'", nid)))?;

            if node.disabled {
                debug!(node = %nid, "node disabled, skipping branch");
                self.ctx.record(nid, NodeStatus::Skipped, Value::Null, None);
                // A disabled node terminates its branch
                return Ok(());
            }

            match self.attempt(&node).await {
                Ok(mut output) => {
                    if output.is_null() && node.always_output_data {
                        output = json!({});
                    }
                    debug!(node = %nid, "node succeeded");
                    self.ctx.record(nid, NodeStatus::Success, output.clone(), None);
                    self.dispatch_downstream(&node, &output).await
                }
                Err(err) => {
                    let message = err.to_string();
                    match node.on_error() {
                        OnError::StopWorkflow => {
                            self.ctx.record(nid, NodeStatus::Failed, Value::Null, Some(message));
                            Err(err)
                        }
                        OnError::ContinueRegularOutput => {
                            warn!(node = %nid, error = %message, "node failed, continuing with null output");
                            self.ctx.record(nid, NodeStatus::Failed, Value::Null, Some(message));
                            self.dispatch_downstream(&node, &Value::Null).await
                        }
                        OnError::ContinueErrorOutput => {
                            warn!(node = %nid, error = %message, "node failed, continuing with error output");
                            let output = json!({ "error": message });
                            self.ctx.record(nid, NodeStatus::Failed, output.clone(), Some(message));
                            self.dispatch_downstream(&node, &output).await
                        }
                    }
                }
            }
        }
        .boxed()
    }

    /// Runs node logic up to `max_tries` times. Retries are local and
    /// transparent; only the final attempt's failure escapes.
    async fn attempt(
        &self,
        node: &Node,
    ) -> Result<Value> {
        let max_tries = node.max_tries();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.executor.run(node, &self.ctx, &self.workflow).await {
                Ok(output) => return Ok(output),
                Err(err) => {
                    if attempt >= max_tries {
                        return Err(err);
                    }
                    warn!(node = %node.id, attempt, error = %err, "node failed, retrying");
                    tokio::time::sleep(Duration::from_millis(node.wait_between_tries())).await;
                }
            }
        }
    }

    /// Executes all downstream targets of a completed node concurrently.
    ///
    /// Condition nodes follow only the edge whose handle matches the
    /// output's branch; every other kind follows all outgoing edges.
    /// Sibling errors do not cancel siblings already in flight, but the
    /// first error propagates once all complete.
    async fn dispatch_downstream(
        &self,
        node: &Node,
        output: &Value,
    ) -> Result<()> {
        let mut edges = self.workflow.get_outgoing_edges(&node.id);

        if node.kind == NodeKind::Condition {
            if let Some(branch) = output.get("branch").and_then(Value::as_str) {
                edges.retain(|edge| edge.source_handle.as_deref() == Some(branch));
            }
        }

        if edges.is_empty() {
            return Ok(());
        }

        let results = join_all(edges.into_iter().map(|edge| self.execute_node(edge.target))).await;
        results.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(())
    }
}
