//! Provider registry
//!
//! Holds at most one adapter per [`ProviderKind`], always iterated in
//! `ProviderKind::ALL` order so that `auto` resolution is reproducible.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::{build_provider, ModelProvider, ProviderKind};
use crate::config::ServerConfig;
use crate::error::ProviderError;

/// Shared reference to a ProviderRegistry
pub type SharedProviderRegistry = Arc<ProviderRegistry>;

#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ModelProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every provider that has configuration
    pub fn from_config(config: &ServerConfig) -> Result<Self, ProviderError> {
        // Per-call deadlines are enforced by the invocation unit; this is a backstop
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(3600))
            .build()?;

        let mut registry = Self::new();
        for kind in ProviderKind::ALL {
            if let Some(provider_config) = config.providers.get(&kind) {
                let provider = build_provider(kind, provider_config.clone(), http.clone());
                if provider.is_available() {
                    info!("Registered provider {}", kind.friendly_name());
                } else {
                    debug!("Provider {} configured but not usable", kind);
                }
                registry = registry.with_provider(provider);
            }
        }
        Ok(registry)
    }

    /// Register an adapter, replacing any existing one of the same kind
    pub fn with_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn register(&mut self, provider: Arc<dyn ModelProvider>) {
        let kind = provider.kind();
        self.providers.retain(|p| p.kind() != kind);
        self.providers.push(provider);
        self.providers.sort_by_key(|p| p.kind());
    }

    /// Create a shared reference to this registry
    pub fn shared(self) -> SharedProviderRegistry {
        Arc::new(self)
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ModelProvider>> {
        self.providers.iter().find(|p| p.kind() == kind).cloned()
    }

    /// Adapters with usable credentials, in priority order
    pub fn available(&self) -> Vec<Arc<dyn ModelProvider>> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .cloned()
            .collect()
    }

    pub fn has_available(&self) -> bool {
        self.providers.iter().any(|p| p.is_available())
    }

    pub fn available_kinds(&self) -> Vec<ProviderKind> {
        self.available().iter().map(|p| p.kind()).collect()
    }
}
