use std::sync::Arc;

use crate::{
    Engine, Result,
    config::Config,
    integration::{HandlerRegistry, IntegrationHandler},
};

/// Builder for [`Engine`] instances.
///
/// Collects the integration handler table and engine configuration
/// before the engine is constructed; after `build` the registry is
/// immutable.
#[derive(Default)]
pub struct EngineBuilder {
    config: Config,
    registry: HandlerRegistry,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    /// Registers an integration handler for a `(provider, action)` pair.
    pub fn handler(
        mut self,
        provider: impl Into<String>,
        action: impl Into<String>,
        handler: Arc<dyn IntegrationHandler>,
    ) -> Self {
        self.registry.register(provider, action, handler);
        self
    }

    /// Replaces the whole registry, for callers that assemble it
    /// elsewhere.
    pub fn registry(
        mut self,
        registry: HandlerRegistry,
    ) -> Self {
        self.registry = registry;
        self
    }

    pub fn build(self) -> Result<Engine> {
        Ok(Engine::new(Arc::new(self.registry), Arc::new(self.config)))
    }
}
