//! Template variable resolution for node parameters.
//!
//! All string parameter values are scanned for `{{...}}` placeholders
//! before a node runs. Recognized forms:
//!
//! - `{{$now}}` — current ISO-8601 UTC timestamp
//! - `{{$random}}` — short random token
//! - `{{env.NAME}}` — process environment variable
//! - `{{trigger.data.email}}`, `{{step1.output.result}}` — dot-path
//!   traversal of the execution context
//!
//! Unresolvable placeholders stay as literal text. Resolution is
//! non-recursive per placeholder and applies uniformly through nested
//! parameter objects and arrays. A string that is exactly one
//! placeholder resolves to the structured value; embedded placeholders
//! stringify.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::{runtime::ExecutionContext, utils};

/// Placeholder pattern: `{{path.to.value}}`, `{{$now}}`, `{{env.NAME}}`.
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").unwrap());

/// Resolve a single placeholder reference to a value, or `None` when
/// the reference cannot be resolved.
fn resolve_reference(
    ctx: &ExecutionContext,
    reference: &str,
) -> Option<Value> {
    match reference {
        "$now" => Some(Value::String(utils::time::now_iso())),
        "$random" => Some(Value::String(utils::short_token())),
        _ => {
            if let Some(var_name) = reference.strip_prefix("env.") {
                return std::env::var(var_name).ok().map(Value::String);
            }
            ctx.resolve_path(reference)
        }
    }
}

/// Render a resolved value into a template string.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        // Objects and arrays embed as JSON text
        v => v.to_string(),
    }
}

/// Resolve all placeholders in a string.
///
/// When the whole string is a single placeholder, the structured value
/// is returned; otherwise placeholders are replaced in-place and the
/// result stays a string.
pub fn resolve_str(
    ctx: &ExecutionContext,
    template: &str,
) -> Value {
    // Whole-string placeholder keeps the structured value, so array and
    // object outputs can flow into inputs like filter/aggregate.
    if let Some(caps) = PLACEHOLDER_RE.captures(template) {
        if caps.get(0).map(|m| m.as_str().len()) == Some(template.len()) {
            return match resolve_reference(ctx, &caps[1]) {
                Some(value) => value,
                None => Value::String(template.to_string()),
            };
        }
    }

    let mut result = template.to_string();
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let full_match = &caps[0];
        if let Some(value) = resolve_reference(ctx, &caps[1]) {
            result = result.replace(full_match, &value_to_string(&value));
        }
        // Missing references stay as literal placeholder text
    }
    Value::String(result)
}

/// Resolve placeholders recursively through a JSON value.
pub fn resolve_value(
    ctx: &ExecutionContext,
    value: &Value,
) -> Value {
    match value {
        Value::String(s) => resolve_str(ctx, s),
        Value::Array(arr) => Value::Array(arr.iter().map(|v| resolve_value(ctx, v)).collect()),
        Value::Object(obj) => Value::Object(obj.iter().map(|(k, v)| (k.clone(), resolve_value(ctx, v))).collect()),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::runtime::{ExecutionContext, NodeStatus};

    fn create_test_context() -> ExecutionContext {
        let ctx = ExecutionContext::new(json!({"email": "a@b.com", "count": 3}));
        ctx.record("step1".to_string(), NodeStatus::Success, json!({"result": "done", "items": [1, 2]}), None);
        ctx
    }

    // ==================== resolve_str tests ====================

    #[test]
    fn test_resolve_no_placeholder_unchanged() {
        let ctx = create_test_context();
        assert_eq!(resolve_str(&ctx, "hello world"), json!("hello world"));
    }

    #[test]
    fn test_resolve_trigger_data_path() {
        let ctx = create_test_context();
        assert_eq!(resolve_str(&ctx, "{{trigger.data.email}}"), json!("a@b.com"));
    }

    #[test]
    fn test_resolve_node_output_path() {
        let ctx = create_test_context();
        assert_eq!(resolve_str(&ctx, "{{step1.output.result}}"), json!("done"));
    }

    #[test]
    fn test_resolve_embedded_stringifies() {
        let ctx = create_test_context();
        assert_eq!(resolve_str(&ctx, "result: {{step1.output.result}}"), json!("result: done"));
        assert_eq!(resolve_str(&ctx, "n={{trigger.data.count}}"), json!("n=3"));
    }

    #[test]
    fn test_resolve_whole_placeholder_keeps_structure() {
        let ctx = create_test_context();
        assert_eq!(resolve_str(&ctx, "{{step1.output.items}}"), json!([1, 2]));
    }

    #[test]
    fn test_resolve_missing_path_stays_literal() {
        let ctx = create_test_context();
        assert_eq!(resolve_str(&ctx, "{{step9.output.nope}}"), json!("{{step9.output.nope}}"));
        assert_eq!(resolve_str(&ctx, "x {{step9.output.nope}} y"), json!("x {{step9.output.nope}} y"));
    }

    #[test]
    fn test_resolve_now_and_random() {
        let ctx = create_test_context();
        let now = resolve_str(&ctx, "{{$now}}");
        assert!(now.as_str().unwrap().contains('T'));

        let token = resolve_str(&ctx, "{{$random}}");
        assert_eq!(token.as_str().unwrap().len(), 10);
    }

    #[test]
    fn test_resolve_env_variable() {
        let ctx = create_test_context();
        // SAFETY: test-local variable, no concurrent env readers care
        unsafe { std::env::set_var("NODEFLOW_TEST_VAR", "hello") };
        assert_eq!(resolve_str(&ctx, "{{env.NODEFLOW_TEST_VAR}}"), json!("hello"));
    }

    #[test]
    fn test_resolve_missing_env_stays_literal() {
        let ctx = create_test_context();
        assert_eq!(resolve_str(&ctx, "{{env.NODEFLOW_NO_SUCH_VAR}}"), json!("{{env.NODEFLOW_NO_SUCH_VAR}}"));
    }

    #[test]
    fn test_resolve_not_recursive() {
        let ctx = ExecutionContext::new(json!({"inner": "{{trigger.data.inner}}"}));
        // The resolved text contains a placeholder but is not re-resolved
        assert_eq!(resolve_str(&ctx, "{{trigger.data.inner}}"), json!("{{trigger.data.inner}}"));
    }

    // ==================== resolve_value tests ====================

    #[test]
    fn test_resolve_value_nested_object() {
        let ctx = create_test_context();
        let input = json!({
            "to": "{{trigger.data.email}}",
            "body": { "text": "got {{step1.output.result}}" },
            "tags": ["{{step1.output.result}}", "fixed"]
        });
        let resolved = resolve_value(&ctx, &input);
        assert_eq!(
            resolved,
            json!({
                "to": "a@b.com",
                "body": { "text": "got done" },
                "tags": ["done", "fixed"]
            })
        );
    }

    #[test]
    fn test_resolve_value_non_string_passthrough() {
        let ctx = create_test_context();
        assert_eq!(resolve_value(&ctx, &json!(42)), json!(42));
        assert_eq!(resolve_value(&ctx, &json!(true)), json!(true));
        assert_eq!(resolve_value(&ctx, &Value::Null), Value::Null);
    }
}
