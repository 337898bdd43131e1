//! End-to-end engine scenarios: graph traversal, branching, retry and
//! error policy against an in-memory handler registry.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use serde_json::{Value, json};

use nodeflow::{
    CredentialStore, Engine, EngineBuilder, ExecutionContext, NodeStatus, NodeflowError, WorkflowModel, handler_fn,
};

fn gmail_credentials() -> CredentialStore {
    let mut store = CredentialStore::new();
    store.insert("gmail", json!({"token": "secret"}));
    store
}

fn gmail_engine() -> Engine {
    EngineBuilder::new()
        .handler("gmail", "read_emails", handler_fn(|_creds, _params| async { Ok(json!([{"subject": "hi"}])) }))
        .build()
        .unwrap()
}

fn model(definition: Value) -> WorkflowModel {
    WorkflowModel::from_json(&definition.to_string()).unwrap()
}

#[tokio::test]
async fn linear_run_visits_every_node_once() {
    let engine = gmail_engine();
    let workflow = model(json!({
        "id": "wf",
        "nodes": [
            { "id": "start", "type": "trigger" },
            { "id": "emails", "type": "fetch",
              "parameters": { "integration": "gmail", "action": "read_emails" } },
            { "id": "summarize", "type": "process",
              "parameters": { "use_llm": false, "source": "{{emails.output}}" } }
        ],
        "edges": [
            { "source": "start", "target": "emails" },
            { "source": "emails", "target": "summarize" }
        ]
    }));

    let ctx = engine.execute(&workflow, gmail_credentials(), json!({"email": "a@b.com"})).await.unwrap();

    let entries = ctx.entries();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|(_, r)| r.status == NodeStatus::Success));

    assert_eq!(ctx.get(&"emails".to_string()).unwrap().output, json!([{"subject": "hi"}]));
    let processed = ctx.get(&"summarize".to_string()).unwrap().output;
    assert_eq!(processed["processed"], json!(true));
    assert_eq!(processed["source"], json!([{"subject": "hi"}]));
}

#[tokio::test]
async fn missing_credentials_abort_the_run() {
    let engine = gmail_engine();
    let workflow = model(json!({
        "id": "wf",
        "nodes": [
            { "id": "start", "type": "trigger" },
            { "id": "emails", "type": "fetch",
              "parameters": { "integration": "gmail", "action": "read_emails" } },
            { "id": "after", "type": "process", "parameters": { "use_llm": false } }
        ],
        "edges": [
            { "source": "start", "target": "emails" },
            { "source": "emails", "target": "after" }
        ]
    }));

    let ctx = ExecutionContext::new(json!({}));
    let err = engine.execute_with_context(&workflow, CredentialStore::new(), ctx.clone()).await.unwrap_err();
    assert!(err.to_string().contains("not configured"));

    // Trigger plus the failed fetch; nothing downstream ran
    assert_eq!(ctx.len(), 2);
    let record = ctx.get(&"emails".to_string()).unwrap();
    assert_eq!(record.status, NodeStatus::Failed);
    assert!(ctx.get(&"after".to_string()).is_none());
}

#[tokio::test]
async fn unknown_action_is_not_supported() {
    let engine = gmail_engine();
    let workflow = model(json!({
        "id": "wf",
        "nodes": [
            { "id": "start", "type": "trigger" },
            { "id": "emails", "type": "fetch",
              "parameters": { "integration": "gmail", "action": "delete_everything" } }
        ],
        "edges": [ { "source": "start", "target": "emails" } ]
    }));

    let err = engine.execute(&workflow, gmail_credentials(), json!({})).await.unwrap_err();
    assert!(err.to_string().contains("not supported"));
}

#[tokio::test]
async fn retry_runs_exactly_max_tries_attempts() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let engine = EngineBuilder::new()
        .handler(
            "gmail",
            "read_emails",
            handler_fn(move |_creds, _params| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(NodeflowError::Integration("gmail API unavailable".to_string()))
                }
            }),
        )
        .build()
        .unwrap();

    let workflow = model(json!({
        "id": "wf",
        "nodes": [
            { "id": "start", "type": "trigger" },
            { "id": "emails", "type": "fetch",
              "parameters": { "integration": "gmail", "action": "read_emails" },
              "retryOnFail": true, "maxTries": 4, "waitBetweenTries": 1 }
        ],
        "edges": [ { "source": "start", "target": "emails" } ]
    }));

    let ctx = ExecutionContext::new(json!({}));
    let err = engine.execute_with_context(&workflow, gmail_credentials(), ctx.clone()).await.unwrap_err();

    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    assert!(err.to_string().contains("gmail.read_emails failed"));
    assert_eq!(ctx.get(&"emails".to_string()).unwrap().status, NodeStatus::Failed);
}

#[tokio::test]
async fn disabled_node_halts_its_branch() {
    let engine = EngineBuilder::new().build().unwrap();
    let workflow = model(json!({
        "id": "wf",
        "nodes": [
            { "id": "start", "type": "trigger" },
            { "id": "gate", "type": "delay", "disabled": true, "parameters": { "delayMs": 1 } },
            { "id": "behind", "type": "process", "parameters": { "use_llm": false } }
        ],
        "edges": [
            { "source": "start", "target": "gate" },
            { "source": "gate", "target": "behind" }
        ]
    }));

    let ctx = engine.execute(&workflow, CredentialStore::new(), json!({})).await.unwrap();

    let record = ctx.get(&"gate".to_string()).unwrap();
    assert_eq!(record.status, NodeStatus::Skipped);
    assert_eq!(record.output, Value::Null);
    assert!(ctx.get(&"behind".to_string()).is_none());
}

#[tokio::test]
async fn condition_follows_only_the_matching_branch() {
    let engine = EngineBuilder::new().build().unwrap();
    let workflow = model(json!({
        "id": "wf",
        "nodes": [
            { "id": "start", "type": "trigger" },
            { "id": "check", "type": "condition",
              "parameters": { "value1": "{{trigger.data.amount}}", "operator": ">", "value2": 10 } },
            { "id": "big", "type": "process", "parameters": { "use_llm": false } },
            { "id": "small", "type": "process", "parameters": { "use_llm": false } }
        ],
        "edges": [
            { "source": "start", "target": "check" },
            { "source": "check", "target": "big", "sourceHandle": "true" },
            { "source": "check", "target": "small", "sourceHandle": "false" }
        ]
    }));

    let ctx = engine.execute(&workflow, CredentialStore::new(), json!({"amount": 42})).await.unwrap();

    assert_eq!(ctx.get(&"check".to_string()).unwrap().output["branch"], json!("true"));
    assert!(ctx.get(&"big".to_string()).is_some());
    assert!(ctx.get(&"small".to_string()).is_none());
}

#[tokio::test]
async fn diamond_descendant_executes_once_for_the_first_predecessor() {
    let engine = EngineBuilder::new().build().unwrap();
    // The slow branch delays before reaching the shared descendant, so
    // the fast branch deterministically wins the race.
    let workflow = model(json!({
        "id": "wf",
        "nodes": [
            { "id": "start", "type": "trigger" },
            { "id": "fast", "type": "process", "parameters": { "use_llm": false } },
            { "id": "pause", "type": "delay", "parameters": { "delayMs": 100 } },
            { "id": "slow", "type": "process", "parameters": { "use_llm": false } },
            { "id": "join", "type": "merge" }
        ],
        "edges": [
            { "source": "start", "target": "fast" },
            { "source": "start", "target": "pause" },
            { "source": "pause", "target": "slow" },
            { "source": "fast", "target": "join" },
            { "source": "slow", "target": "join" }
        ]
    }));

    let ctx = engine.execute(&workflow, CredentialStore::new(), json!({})).await.unwrap();

    // Every node ran exactly once
    assert_eq!(ctx.len(), 5);
    // The merge ran when only the fast predecessor had produced output;
    // there is no join barrier waiting for the slow branch.
    let join = ctx.get(&"join".to_string()).unwrap();
    assert_eq!(join.output["count"], json!(1));
    assert_eq!(join.output["inputs"][0]["processed"], json!(true));
}

#[tokio::test]
async fn continue_regular_output_passes_null_downstream() {
    let engine = EngineBuilder::new()
        .handler("gmail", "read_emails", handler_fn(|_creds, _params| async { Err(NodeflowError::Integration("boom".to_string())) }))
        .build()
        .unwrap();

    let workflow = model(json!({
        "id": "wf",
        "nodes": [
            { "id": "start", "type": "trigger" },
            { "id": "flaky", "type": "fetch",
              "parameters": { "integration": "gmail", "action": "read_emails" },
              "continueOnFail": true },
            { "id": "after", "type": "transform", "parameters": { "input": "{{flaky.output}}" } }
        ],
        "edges": [
            { "source": "start", "target": "flaky" },
            { "source": "flaky", "target": "after" }
        ]
    }));

    let ctx = engine.execute(&workflow, gmail_credentials(), json!({})).await.unwrap();

    assert_eq!(ctx.get(&"flaky".to_string()).unwrap().status, NodeStatus::Failed);
    let after = ctx.get(&"after".to_string()).unwrap();
    assert_eq!(after.status, NodeStatus::Success);
    assert_eq!(after.output["result"], Value::Null);
}

#[tokio::test]
async fn continue_error_output_passes_the_error_downstream() {
    let engine = EngineBuilder::new()
        .handler("gmail", "read_emails", handler_fn(|_creds, _params| async { Err(NodeflowError::Integration("boom".to_string())) }))
        .build()
        .unwrap();

    let workflow = model(json!({
        "id": "wf",
        "nodes": [
            { "id": "start", "type": "trigger" },
            { "id": "flaky", "type": "fetch",
              "parameters": { "integration": "gmail", "action": "read_emails" },
              "onError": "continueErrorOutput" },
            { "id": "report", "type": "error" }
        ],
        "edges": [
            { "source": "start", "target": "flaky" },
            { "source": "flaky", "target": "report" }
        ]
    }));

    let ctx = engine.execute(&workflow, gmail_credentials(), json!({})).await.unwrap();

    let flaky = ctx.get(&"flaky".to_string()).unwrap();
    assert_eq!(flaky.status, NodeStatus::Failed);
    assert!(flaky.output["error"].as_str().unwrap().contains("boom"));

    let report = ctx.get(&"report".to_string()).unwrap();
    assert_eq!(report.output["count"], json!(1));
    assert_eq!(report.output["errors"][0]["nodeId"], json!("flaky"));
}

#[tokio::test]
async fn workflow_without_trigger_is_a_config_error() {
    let engine = EngineBuilder::new().build().unwrap();
    let workflow = model(json!({
        "id": "wf",
        "nodes": [ { "id": "a", "type": "delay" } ],
        "edges": []
    }));

    let err = engine.execute(&workflow, CredentialStore::new(), json!({})).await.unwrap_err();
    assert!(err.to_string().contains("trigger"));
}

#[tokio::test]
async fn aggregate_pipeline_over_fetched_rows() {
    let engine = EngineBuilder::new()
        .handler("billing", "list_invoices", handler_fn(|_creds, _params| async {
            Ok(json!([{"amount": 2}, {"amount": 3}, {"amount": 7}]))
        }))
        .build()
        .unwrap();

    let mut credentials = CredentialStore::new();
    credentials.insert("billing", json!({"key": "k"}));

    let workflow = model(json!({
        "id": "wf",
        "nodes": [
            { "id": "start", "type": "trigger" },
            { "id": "invoices", "type": "fetch",
              "parameters": { "integration": "billing", "action": "list_invoices" } },
            { "id": "expensive", "type": "filter",
              "parameters": { "input": "{{invoices.output}}", "expression": "$item.amount > 2" } },
            { "id": "total", "type": "aggregate",
              "parameters": { "input": "{{expensive.output.filtered}}", "mode": "sum", "field": "amount" } }
        ],
        "edges": [
            { "source": "start", "target": "invoices" },
            { "source": "invoices", "target": "expensive" },
            { "source": "expensive", "target": "total" }
        ]
    }));

    let ctx = engine.execute(&workflow, credentials, json!({})).await.unwrap();

    let filtered = ctx.get(&"expensive".to_string()).unwrap().output;
    assert_eq!(filtered["filteredCount"], json!(2));

    let total = ctx.get(&"total".to_string()).unwrap().output;
    assert_eq!(total, json!({"result": 10, "type": "sum", "field": "amount"}));
}
