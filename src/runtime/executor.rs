//! Per-kind node semantics.
//!
//! The executor implements the observable behavior of every node kind,
//! given the accumulated context, the injected integration registry and
//! the per-run credential store. Dispatch is an exhaustive match over
//! [`NodeKind`]; kinds without dedicated behavior fail softly by
//! echoing `{type, params}`.

use std::{sync::Arc, time::Duration};

use serde_json::{Map, Number, Value, json};
use tracing::warn;

use crate::{
    NodeflowError, Result,
    config::Config,
    integration::{CredentialStore, HandlerRegistry},
    llm::LlmClient,
    runtime::context::ExecutionContext,
    workflow::{
        Workflow, expr,
        node::{Node, NodeKind},
        template,
    },
};

/// Default delay node duration in milliseconds.
const DEFAULT_DELAY_MS: u64 = 1000;

pub(crate) struct NodeExecutor {
    registry: Arc<HandlerRegistry>,
    credentials: CredentialStore,
    llm: LlmClient,
    config: Arc<Config>,
}

impl NodeExecutor {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        credentials: CredentialStore,
        config: Arc<Config>,
    ) -> Self {
        let llm = LlmClient::new(config.llm.base_url.clone());
        Self {
            registry,
            credentials,
            llm,
            config,
        }
    }

    /// Runs one node's logic and returns its output.
    pub async fn run(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
        workflow: &Workflow,
    ) -> Result<Value> {
        let params = template::resolve_value(ctx, &node.parameters);

        match node.kind {
            NodeKind::Trigger => Ok(ctx.trigger_data().clone()),
            NodeKind::Fetch | NodeKind::Action | NodeKind::Http | NodeKind::Webhook => self.run_integration(node, &params, ctx).await,
            NodeKind::Process => self.run_process(node, &params, ctx).await,
            NodeKind::Condition => Ok(self.run_condition(&params, ctx)),
            NodeKind::Filter => self.run_filter(&params, ctx),
            NodeKind::Loop => self.run_loop(&params, ctx),
            NodeKind::Delay => Ok(self.run_delay(&params).await),
            NodeKind::Merge => Ok(self.run_merge(node, &params, ctx, workflow)),
            NodeKind::Split => self.run_split(&params),
            NodeKind::Transform => self.run_transform(&params, ctx),
            NodeKind::Aggregate => self.run_aggregate(&params),
            NodeKind::Error => Ok(self.run_error_handler(ctx)),
            // No dedicated semantics; fail softly with the raw definition
            NodeKind::Schedule | NodeKind::Custom => Ok(json!({ "type": node.type_name, "params": params })),
        }
    }

    /// fetch/action/http/webhook: dispatch to an external integration
    /// handler with fully resolved parameters.
    async fn run_integration(
        &self,
        node: &Node,
        params: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value> {
        let integration = params
            .get("integration")
            .and_then(Value::as_str)
            .ok_or_else(|| NodeflowError::Node(format!("node '{}' requires an 'integration' parameter", node.id)))?;
        let action = params
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| NodeflowError::Node(format!("node '{}' requires an 'action' parameter", node.id)))?;

        let credentials = self
            .credentials
            .get(integration)
            .ok_or_else(|| NodeflowError::Integration(format!("integration '{}' is not configured", integration)))?;
        let handler = self
            .registry
            .get(integration, action)
            .ok_or_else(|| NodeflowError::Integration(format!("action '{}' is not supported by integration '{}'", action, integration)))?;

        handler
            .call(&credentials, params, ctx)
            .await
            .map_err(|e| NodeflowError::Integration(format!("{}.{} failed: {}", integration, action, e)))
    }

    /// process: one chat completion over the accumulated context, or a
    /// plain parameter echo when `use_llm` is explicitly false.
    async fn run_process(
        &self,
        node: &Node,
        params: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value> {
        let use_llm = params.get("use_llm").and_then(Value::as_bool).unwrap_or(true);
        if !use_llm {
            let mut output = Map::new();
            output.insert("processed".to_string(), Value::Bool(true));
            if let Value::Object(obj) = params {
                for (k, v) in obj {
                    output.insert(k.clone(), v.clone());
                }
            }
            return Ok(Value::Object(output));
        }

        // User-supplied credential wins over the engine default
        let api_key = self
            .credentials
            .get("openai")
            .and_then(|blob| blob.get("api_key").and_then(Value::as_str).map(str::to_string))
            .or_else(|| self.config.llm.api_key())
            .ok_or_else(|| NodeflowError::Config(format!("process node '{}' has no OpenAI-compatible credential configured", node.id)))?;

        let model = params.get("model").and_then(Value::as_str).unwrap_or(self.config.llm.model.as_str());
        let system_prompt = params.get("systemPrompt").and_then(Value::as_str).unwrap_or(self.config.llm.system_prompt.as_str());
        let temperature = params.get("temperature").and_then(Value::as_f64).map(|t| t as f32).unwrap_or(self.config.llm.temperature);
        let prompt_base = params
            .get("llm_prompt")
            .or_else(|| params.get("prompt"))
            .and_then(Value::as_str)
            .unwrap_or("Process the following workflow data.");

        let context_json = serde_json::to_string_pretty(&ctx.snapshot())?;
        let prompt = format!("{}\n\nContext:\n{}", prompt_base, context_json);

        let completion = self.llm.complete(&api_key, model, system_prompt, &prompt, temperature).await?;

        // Structured responses flow through as data; anything else as text
        let processed: Value = serde_json::from_str(&completion.content).unwrap_or(Value::String(completion.content.clone()));

        Ok(json!({
            "processed_data": processed,
            "llm_response": completion.content,
            "raw_response": completion.raw,
        }))
    }

    /// condition: free-form expression or structured comparison; the
    /// resulting branch drives downstream edge selection.
    fn run_condition(
        &self,
        params: &Value,
        ctx: &ExecutionContext,
    ) -> Value {
        let (result, description) = if let Some(expression) = params.get("expression").and_then(Value::as_str) {
            let scope = ctx.snapshot();
            let result = match expr::evaluate_bool(expression, &scope) {
                Ok(b) => b,
                Err(e) => {
                    // Bad user expressions choose the false branch
                    warn!(expression, error = %e, "condition expression failed, treating as false");
                    false
                }
            };
            (result, expression.to_string())
        } else {
            let value1 = params.get("value1").cloned().unwrap_or(Value::Null);
            let value2 = params.get("value2").cloned().unwrap_or(Value::Null);
            let operator = params.get("operator").and_then(Value::as_str).unwrap_or("==");
            let result = match expr::compare(operator, &value1, &value2) {
                Ok(b) => b,
                Err(e) => {
                    warn!(operator, error = %e, "condition comparison failed, treating as false");
                    false
                }
            };
            (result, format!("{} {} {}", value1, operator, value2))
        };

        json!({
            "branch": if result { "true" } else { "false" },
            "result": result,
            "condition": description,
        })
    }

    /// filter: keep array items whose expression evaluates truthy.
    fn run_filter(
        &self,
        params: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value> {
        let input = params.get("input").cloned().unwrap_or(Value::Null);
        let items = input.as_array().ok_or_else(|| NodeflowError::Node("filter node requires an array input".to_string()))?;
        let expression = params.get("expression").and_then(Value::as_str);

        let base_scope = ctx.snapshot();
        let mut filtered = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let keep = match expression {
                Some(expression) => {
                    let scope = item_scope(&base_scope, item, index, items.len());
                    // Expression errors drop the item rather than fail the run
                    expr::evaluate_bool(expression, &scope).unwrap_or(false)
                }
                None => true,
            };
            if keep {
                filtered.push(item.clone());
            }
        }

        Ok(json!({
            "filtered": filtered,
            "originalCount": items.len(),
            "filteredCount": filtered.len(),
        }))
    }

    /// loop: enumeration only. Items are listed as `{index, item}`
    /// pairs up to the iteration cap; no nested subgraph is executed.
    fn run_loop(
        &self,
        params: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value> {
        let input = params.get("input").cloned().unwrap_or(Value::Null);
        let items = input.as_array().ok_or_else(|| NodeflowError::Node("loop node requires an array input".to_string()))?;
        let cap = params.get("maxIterations").and_then(Value::as_u64).unwrap_or(self.config.engine.max_loop_iterations) as usize;
        let expression = params.get("expression").and_then(Value::as_str);

        let base_scope = ctx.snapshot();
        let count = items.len().min(cap);
        let mut iterations = Vec::with_capacity(count);
        for (index, item) in items.iter().take(count).enumerate() {
            let mut pair = json!({ "index": index, "item": item });
            if let Some(expression) = expression {
                let scope = item_scope(&base_scope, item, index, count);
                if let Ok(value) = expr::evaluate(expression, &scope) {
                    pair["result"] = value;
                }
            }
            iterations.push(pair);
        }

        Ok(json!({ "iterations": iterations, "count": count }))
    }

    /// delay: cooperative sleep blocking only this branch.
    async fn run_delay(
        &self,
        params: &Value,
    ) -> Value {
        let duration = params
            .get("delayMs")
            .or_else(|| params.get("delay"))
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_DELAY_MS);
        tokio::time::sleep(Duration::from_millis(duration)).await;
        json!({ "delayed": true, "duration": duration })
    }

    /// merge: gather recorded outputs of all predecessor nodes.
    ///
    /// Predecessors that have not executed yet (single-winner diamond
    /// semantics) contribute nothing.
    fn run_merge(
        &self,
        node: &Node,
        params: &Value,
        ctx: &ExecutionContext,
        workflow: &Workflow,
    ) -> Value {
        let inputs: Vec<Value> = workflow.get_predecessors(&node.id).iter().filter_map(|pid| ctx.get(pid).map(|r| r.output)).collect();

        match params.get("mode").and_then(Value::as_str) {
            Some("combine") => {
                let mut combined = Vec::new();
                for input in &inputs {
                    match input {
                        Value::Array(arr) => combined.extend(arr.iter().cloned()),
                        other => combined.push(other.clone()),
                    }
                }
                json!({ "combined": combined, "count": combined.len() })
            }
            Some("object") => {
                // Last write wins on key collision
                let mut merged = Map::new();
                for input in &inputs {
                    if let Value::Object(obj) = input {
                        for (k, v) in obj {
                            merged.insert(k.clone(), v.clone());
                        }
                    }
                }
                Value::Object(merged)
            }
            _ => json!({ "inputs": inputs, "count": inputs.len() }),
        }
    }

    /// split: pass an array through, or extract a named property.
    fn run_split(
        &self,
        params: &Value,
    ) -> Result<Value> {
        let input = params.get("input").cloned().unwrap_or(Value::Null);
        match params.get("mode").and_then(Value::as_str).unwrap_or("items") {
            "property" => {
                let field = params
                    .get("property")
                    .or_else(|| params.get("field"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| NodeflowError::Node("split node in property mode requires a 'property' parameter".to_string()))?;
                Ok(json!({ "items": input.get(field).cloned().unwrap_or(Value::Null) }))
            }
            _ => {
                let items = input.as_array().ok_or_else(|| NodeflowError::Node("split node requires an array input".to_string()))?;
                Ok(json!({ "items": items, "count": items.len() }))
            }
        }
    }

    /// transform: map / jsonParse / jsonStringify; unknown modes pass
    /// the input through unchanged.
    fn run_transform(
        &self,
        params: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value> {
        let input = params.get("input").cloned().unwrap_or(Value::Null);
        let mode = params.get("mode").and_then(Value::as_str).unwrap_or("");

        let result = match mode {
            "map" => {
                let items = input.as_array().ok_or_else(|| NodeflowError::Node("transform node in map mode requires an array input".to_string()))?;
                let expression = params
                    .get("expression")
                    .and_then(Value::as_str)
                    .ok_or_else(|| NodeflowError::Node("transform node in map mode requires an 'expression' parameter".to_string()))?;

                let base_scope = ctx.snapshot();
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let scope = item_scope(&base_scope, item, index, items.len());
                        // Expression errors pass the item through unchanged
                        expr::evaluate(expression, &scope).unwrap_or_else(|_| item.clone())
                    })
                    .collect::<Vec<_>>()
                    .into()
            }
            "jsonParse" => {
                let text = input.as_str().ok_or_else(|| NodeflowError::Node("transform node in jsonParse mode requires a string input".to_string()))?;
                serde_json::from_str(text)?
            }
            "jsonStringify" => Value::String(serde_json::to_string(&input)?),
            _ => input,
        };

        Ok(json!({ "result": result, "mode": mode }))
    }

    /// aggregate: count/sum/average/min/max over a numeric field.
    fn run_aggregate(
        &self,
        params: &Value,
    ) -> Result<Value> {
        let input = params.get("input").cloned().unwrap_or(Value::Null);
        let items = input.as_array().ok_or_else(|| NodeflowError::Node("aggregate node requires an array input".to_string()))?;
        let field = params.get("field").and_then(Value::as_str).unwrap_or("");
        let mode = params.get("mode").and_then(Value::as_str).unwrap_or("count");

        let numbers: Vec<f64> = items.iter().filter_map(|item| item.get(field).and_then(Value::as_f64)).collect();

        let result = match mode {
            "sum" => number(numbers.iter().sum()),
            "average" => {
                if numbers.is_empty() {
                    Value::Null
                } else {
                    number(numbers.iter().sum::<f64>() / numbers.len() as f64)
                }
            }
            "min" => numbers.iter().cloned().fold(None::<f64>, |acc, n| Some(acc.map_or(n, |a| a.min(n)))).map(number).unwrap_or(Value::Null),
            "max" => numbers.iter().cloned().fold(None::<f64>, |acc, n| Some(acc.map_or(n, |a| a.max(n)))).map(number).unwrap_or(Value::Null),
            // Unrecognized modes default to count
            _ => json!(items.len()),
        };

        let mode = if matches!(mode, "sum" | "average" | "min" | "max" | "count") { mode } else { "count" };
        Ok(json!({ "result": result, "type": mode, "field": field }))
    }

    /// error: structured report of everything that failed so far.
    fn run_error_handler(
        &self,
        ctx: &ExecutionContext,
    ) -> Value {
        let errors: Vec<Value> = ctx
            .failed_entries()
            .into_iter()
            .map(|(nid, record)| {
                json!({
                    "nodeId": nid,
                    "error": record.error,
                    "executedAt": record.executed_at,
                })
            })
            .collect();
        json!({ "errors": errors, "count": errors.len() })
    }
}

/// Extends the context scope with per-item bindings.
fn item_scope(
    base: &Value,
    item: &Value,
    index: usize,
    len: usize,
) -> Value {
    let mut scope = base.as_object().cloned().unwrap_or_default();
    scope.insert("$item".to_string(), item.clone());
    scope.insert("$index".to_string(), json!(index));
    scope.insert("$first".to_string(), json!(index == 0));
    scope.insert("$last".to_string(), json!(index + 1 == len));
    Value::Object(scope)
}

/// Emit whole numbers as integers so `sum` of integer fields stays an
/// integer in the output.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}
