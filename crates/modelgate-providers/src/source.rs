//! Module sources — where provider code comes from.
//!
//! The registry only knows the [`ModuleSource`] trait. A source resolves an
//! identifier to a [`ProviderModule`], which can construct a fresh
//! [`Provider`]. [`StaticSource`] is the in-process implementation: a table
//! of statically linked modules, with the built-in specs pre-registered.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::SourceError;
use crate::http_client::HttpClientFactory;
use crate::identifier::ProviderIdentifier;
use crate::provider::Provider;
use crate::spec::{ProviderSpec, PROVIDERS};
use crate::traits::ClientFactory;

// ─────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────

/// Resolves identifiers to loadable provider modules.
#[async_trait]
pub trait ModuleSource: Send + Sync {
    /// Fetch the module named by `identifier`.
    ///
    /// `SourceError::Unreachable` when it cannot be fetched,
    /// `SourceError::Invalid` when it does not expose a provider.
    async fn resolve(
        &self,
        identifier: &ProviderIdentifier,
    ) -> Result<Arc<dyn ProviderModule>, SourceError>;
}

/// A loaded unit exposing a zero-argument provider constructor.
pub trait ProviderModule: Send + Sync {
    /// Module name, for logs.
    fn name(&self) -> &str;

    /// Build a new, unconfigured provider.
    fn construct(&self) -> Result<Provider, SourceError>;
}

// ─────────────────────────────────────────────
// SpecModule
// ─────────────────────────────────────────────

/// A module whose provider is fully described by a [`ProviderSpec`].
pub struct SpecModule {
    spec: ProviderSpec,
    factory: Arc<dyn ClientFactory>,
}

impl SpecModule {
    pub fn new(spec: ProviderSpec, factory: Arc<dyn ClientFactory>) -> Self {
        Self { spec, factory }
    }

    /// A built-in spec talking HTTP.
    pub fn builtin(spec: &'static ProviderSpec) -> Self {
        Self::new(spec.clone(), Arc::new(HttpClientFactory))
    }
}

impl ProviderModule for SpecModule {
    fn name(&self) -> &str {
        self.spec.name
    }

    fn construct(&self) -> Result<Provider, SourceError> {
        if self.spec.capabilities.is_empty() {
            return Err(SourceError::invalid(
                self.spec.name,
                "provider declares no capabilities",
            ));
        }
        Ok(Provider::new(self.spec.clone(), Arc::clone(&self.factory)))
    }
}

// ─────────────────────────────────────────────
// StaticSource
// ─────────────────────────────────────────────

/// In-process module table keyed by identifier.
#[derive(Default)]
pub struct StaticSource {
    modules: HashMap<ProviderIdentifier, Arc<dyn ProviderModule>>,
}

impl StaticSource {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding every built-in spec under `builtin:<name>`.
    pub fn with_builtins() -> Self {
        let mut source = Self::new();
        for spec in PROVIDERS {
            source.register(ProviderIdentifier::builtin(spec.name), Arc::new(SpecModule::builtin(spec)));
        }
        source
    }

    /// Register `module` under `identifier`, replacing any previous entry.
    pub fn register(&mut self, identifier: ProviderIdentifier, module: Arc<dyn ProviderModule>) {
        debug!(identifier = %identifier, module = module.name(), "registered provider module");
        self.modules.insert(identifier, module);
    }

    /// Registered identifiers, sorted for determinism.
    pub fn identifiers(&self) -> Vec<ProviderIdentifier> {
        let mut ids: Vec<_> = self.modules.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl ModuleSource for StaticSource {
    async fn resolve(
        &self,
        identifier: &ProviderIdentifier,
    ) -> Result<Arc<dyn ProviderModule>, SourceError> {
        self.modules.get(identifier).cloned().ok_or_else(|| {
            SourceError::unreachable(identifier.as_str(), "no module registered for this identifier")
        })
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{find_by_name, ResolutionPolicy};

    #[test]
    fn test_builtins_are_registered() {
        let source = StaticSource::with_builtins();
        let ids: Vec<String> = source.identifiers().iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["builtin:litellm", "builtin:openrouter"]);
    }

    #[tokio::test]
    async fn test_resolve_builtin_constructs_unconfigured_provider() {
        let source = StaticSource::with_builtins();
        let module = source
            .resolve(&ProviderIdentifier::builtin("openrouter"))
            .await
            .unwrap();
        assert_eq!(module.name(), "openrouter");

        let provider = module.construct().unwrap();
        assert_eq!(provider.name(), "OpenRouter");
        assert!(!provider.is_configured());
    }

    #[tokio::test]
    async fn test_resolve_unknown_is_unreachable() {
        let source = StaticSource::with_builtins();
        let err = source
            .resolve(&ProviderIdentifier::builtin("missing"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::Unreachable { .. }));
    }

    #[test]
    fn test_spec_without_capabilities_is_invalid() {
        let spec = ProviderSpec {
            name: "empty",
            capabilities: &[],
            resolution: ResolutionPolicy::Strict,
            ..find_by_name("litellm").unwrap().clone()
        };
        let module = SpecModule::new(spec, Arc::new(HttpClientFactory));
        assert!(matches!(module.construct(), Err(SourceError::Invalid { .. })));
    }
}
