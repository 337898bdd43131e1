//! External integration seam.
//!
//! Integrations (Gmail, Slack, ...) are opaque collaborators: given
//! credentials and resolved parameters, perform an action and return a
//! result or fail. The engine never looks them up through global state;
//! a [`HandlerRegistry`] is built at startup and injected, and a
//! [`CredentialStore`] is populated per run from whatever integrations
//! are active for the invoking user.

use std::{collections::HashMap, future::Future, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::{Result, runtime::ExecutionContext};

/// A single integration action.
///
/// Implementations are expected to fail with a human-readable message;
/// the executor wraps it with an `integration.action failed:` prefix.
#[async_trait]
pub trait IntegrationHandler: Send + Sync {
    async fn call(
        &self,
        credentials: &Value,
        params: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value>;
}

/// Lookup table `(provider, action) -> handler`, constructed at startup
/// and injected into the engine.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(String, String), Arc<dyn IntegrationHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a `(provider, action)` pair, replacing
    /// any previous registration.
    pub fn register(
        &mut self,
        provider: impl Into<String>,
        action: impl Into<String>,
        handler: Arc<dyn IntegrationHandler>,
    ) {
        self.handlers.insert((provider.into(), action.into()), handler);
    }

    pub fn get(
        &self,
        provider: &str,
        action: &str,
    ) -> Option<Arc<dyn IntegrationHandler>> {
        self.handlers.get(&(provider.to_string(), action.to_string())).cloned()
    }
}

/// Per-run credential store: provider id → credentials blob.
#[derive(Default, Clone)]
pub struct CredentialStore {
    credentials: HashMap<String, Value>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        provider: impl Into<String>,
        credentials: Value,
    ) {
        self.credentials.insert(provider.into(), credentials);
    }

    pub fn get(
        &self,
        provider: &str,
    ) -> Option<Value> {
        self.credentials.get(provider).cloned()
    }
}

impl FromIterator<(String, Value)> for CredentialStore {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            credentials: iter.into_iter().collect(),
        }
    }
}

struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> IntegrationHandler for FnHandler<F>
where
    F: Fn(Value, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn call(
        &self,
        credentials: &Value,
        params: &Value,
        _ctx: &ExecutionContext,
    ) -> Result<Value> {
        (self.f)(credentials.clone(), params.clone()).await
    }
}

/// Wraps an async closure `(credentials, params) -> Result<Value>` as a
/// handler. Convenient for small integrations and tests.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn IntegrationHandler>
where
    F: Fn(Value, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler {
        f,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_registry_lookup_and_call() {
        let mut registry = HandlerRegistry::new();
        registry.register("gmail", "read_emails", handler_fn(|_creds, _params| async { Ok(json!([{"subject": "hi"}])) }));

        assert!(registry.get("gmail", "read_emails").is_some());
        assert!(registry.get("gmail", "send_email").is_none());
        assert!(registry.get("slack", "read_emails").is_none());

        let handler = registry.get("gmail", "read_emails").unwrap();
        let ctx = ExecutionContext::new(json!({}));
        let result = handler.call(&json!({}), &json!({}), &ctx).await.unwrap();
        assert_eq!(result, json!([{"subject": "hi"}]));
    }

    #[test]
    fn test_credential_store() {
        let mut store = CredentialStore::new();
        store.insert("gmail", json!({"token": "t"}));
        assert_eq!(store.get("gmail").unwrap()["token"], json!("t"));
        assert!(store.get("slack").is_none());
    }
}
