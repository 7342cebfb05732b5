//! Provider registry — identifier → live `Provider` cache.
//!
//! Lookup order:
//! 1. Validate the identifier (no I/O on failure)
//! 2. Check the record cache
//! 3. Join the in-flight load for this identifier, or start one
//!
//! A load runs in its own task and publishes one outcome on a `watch`
//! channel shared by every waiter, so all racing callers observe the same
//! provider or the same failure. Failures are not cached.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, SourceError};
use crate::identifier::ProviderIdentifier;
use crate::provider::Provider;
use crate::source::{ModuleSource, StaticSource};

type LoadOutcome = Result<Arc<Provider>, RegistryError>;
type Pending = HashMap<ProviderIdentifier, watch::Receiver<Option<LoadOutcome>>>;

// ─────────────────────────────────────────────
// ProviderRecord
// ─────────────────────────────────────────────

/// One cached provider. Replaced whole on reload, never mutated.
#[derive(Clone, Debug)]
pub struct ProviderRecord {
    pub identifier: ProviderIdentifier,
    pub provider: Arc<Provider>,
    pub loaded_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────
// ProviderRegistry
// ─────────────────────────────────────────────

/// Explicitly owned registry; construct one at the composition root and
/// share it.
///
/// Thread-safe via `parking_lot` locks. Neither lock is held across an
/// `.await`.
pub struct ProviderRegistry {
    source: Arc<dyn ModuleSource>,
    records: Arc<RwLock<HashMap<ProviderIdentifier, ProviderRecord>>>,
    pending: Arc<Mutex<Pending>>,
}

impl ProviderRegistry {
    pub fn new(source: Arc<dyn ModuleSource>) -> Self {
        Self {
            source,
            records: Arc::new(RwLock::new(HashMap::new())),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registry over the built-in modules (`builtin:openrouter`, ...).
    pub fn with_builtins() -> Self {
        Self::new(Arc::new(StaticSource::with_builtins()))
    }

    /// Resolve `identifier` to its provider, loading it at most once.
    ///
    /// Never returns a partially constructed provider. A caller that is
    /// cancelled while waiting does not cancel the load for the others.
    pub async fn get_provider(&self, identifier: &str) -> Result<Arc<Provider>, RegistryError> {
        let id = ProviderIdentifier::parse(identifier)?;

        if let Some(provider) = self.cached(&id) {
            debug!(identifier = %id, "Provider cache hit");
            return Ok(provider);
        }

        let mut rx = {
            let mut pending = self.pending.lock();
            // A load may have finished between the cache check and taking the lock.
            if let Some(provider) = self.cached(&id) {
                return Ok(provider);
            }
            match pending.get(&id) {
                Some(rx) => {
                    debug!(identifier = %id, "Joining in-flight provider load");
                    rx.clone()
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    pending.insert(id.clone(), rx.clone());
                    self.spawn_load(id.clone(), tx);
                    rx
                }
            }
        };

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| {
            Err(RegistryError::LoadFailure {
                identifier: id.to_string(),
                cause: SourceError::unreachable(id.as_str(), "load task ended without a result"),
            })
        })
    }

    fn cached(&self, id: &ProviderIdentifier) -> Option<Arc<Provider>> {
        self.records
            .read()
            .get(id)
            .map(|record| Arc::clone(&record.provider))
    }

    fn spawn_load(&self, id: ProviderIdentifier, tx: watch::Sender<Option<LoadOutcome>>) {
        let source = Arc::clone(&self.source);
        let records = Arc::clone(&self.records);
        let in_flight = InFlight {
            pending: Arc::clone(&self.pending),
            identifier: id.clone(),
        };

        tokio::spawn(async move {
            let outcome = load(source.as_ref(), &id).await;

            match &outcome {
                Ok(provider) => {
                    info!(identifier = %id, provider = provider.name(), "Provider loaded");
                    records.write().insert(
                        id.clone(),
                        ProviderRecord {
                            identifier: id.clone(),
                            provider: Arc::clone(provider),
                            loaded_at: Utc::now(),
                        },
                    );
                }
                Err(e) => warn!(identifier = %id, error = %e, "Provider load failed"),
            }

            // Record first, then clear the in-flight entry, then wake waiters:
            // a newcomer sees either the record or the pending load.
            drop(in_flight);
            tx.send_replace(Some(outcome));
        });
    }

    // ── Lifecycle ──

    /// Clone of the record for `identifier`, if loaded.
    pub fn record(&self, identifier: &str) -> Option<ProviderRecord> {
        let id = ProviderIdentifier::parse(identifier).ok()?;
        self.records.read().get(&id).cloned()
    }

    /// Loaded identifiers, sorted.
    pub fn identifiers(&self) -> Vec<ProviderIdentifier> {
        let mut ids: Vec<_> = self.records.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Drop the record for `identifier`; the next `get_provider` reloads.
    ///
    /// Holders of the old `Arc<Provider>` keep a working instance.
    pub fn evict(&self, identifier: &str) -> Option<ProviderRecord> {
        let id = ProviderIdentifier::parse(identifier).ok()?;
        let removed = self.records.write().remove(&id);
        if removed.is_some() {
            info!(identifier = %id, "Provider evicted");
        }
        removed
    }

    /// Drop every record.
    pub fn clear(&self) {
        let count = {
            let mut records = self.records.write();
            let count = records.len();
            records.clear();
            count
        };
        debug!(count, "Provider registry cleared");
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("loaded", &self.identifiers())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

async fn load(source: &dyn ModuleSource, id: &ProviderIdentifier) -> LoadOutcome {
    let failure = |cause: SourceError| RegistryError::LoadFailure {
        identifier: id.to_string(),
        cause,
    };

    let module = source.resolve(id).await.map_err(failure)?;
    debug!(identifier = %id, module = module.name(), "Module resolved");
    let provider = module.construct().map_err(failure)?;
    Ok(Arc::new(provider))
}

/// Removes the pending entry when the load task ends, panics included.
struct InFlight {
    pending: Arc<Mutex<Pending>>,
    identifier: ProviderIdentifier,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.identifier);
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::spec::find_by_name;
    use crate::test_support::CountingSource;

    const ID: &str = "https://github.com/acme/openrouter-provider";

    fn counting(source: CountingSource) -> (Arc<CountingSource>, Arc<ProviderRegistry>) {
        let source = Arc::new(source);
        let registry = Arc::new(ProviderRegistry::new(Arc::clone(&source) as Arc<dyn ModuleSource>));
        (source, registry)
    }

    fn openrouter_source() -> CountingSource {
        CountingSource::new(find_by_name("openrouter").unwrap())
    }

    #[tokio::test]
    async fn test_concurrent_requests_load_once() {
        let (source, registry) = counting(openrouter_source().delayed(Duration::from_millis(50)));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.get_provider(ID).await })
            })
            .collect();

        let mut providers = Vec::new();
        for handle in handles {
            providers.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(source.loads(), 1);
        assert!(providers.iter().all(|p| Arc::ptr_eq(p, &providers[0])));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_shared_and_not_cached() {
        let cause = SourceError::unreachable(ID, "connection refused");
        let (source, registry) = counting(
            openrouter_source()
                .delayed(Duration::from_millis(30))
                .failing(cause.clone()),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.get_provider(ID).await })
            })
            .collect();

        let expected = RegistryError::LoadFailure {
            identifier: ID.to_string(),
            cause,
        };
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap_err(), expected);
        }
        assert_eq!(source.loads(), 1);
        assert!(registry.is_empty());

        // Retried from scratch.
        assert_eq!(registry.get_provider(ID).await.unwrap_err(), expected);
        assert_eq!(source.loads(), 2);
    }

    #[tokio::test]
    async fn test_invalid_identifier_never_loads() {
        let (source, registry) = counting(openrouter_source());

        for bad in ["", "   ", "not a url", "https://"] {
            let err = registry.get_provider(bad).await.unwrap_err();
            assert!(matches!(err, RegistryError::InvalidIdentifier { .. }), "{bad:?}: {err:?}");
        }
        assert_eq!(source.loads(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_load() {
        let (source, registry) = counting(openrouter_source());

        let first = registry.get_provider(ID).await.unwrap();
        let second = registry.get_provider(&format!("  {ID}  ")).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.loads(), 1);

        let record = registry.record(ID).unwrap();
        assert_eq!(record.identifier.as_str(), ID);
        assert!(Arc::ptr_eq(&record.provider, &first));
        assert!(record.loaded_at <= Utc::now());
        assert_eq!(registry.identifiers(), vec![ProviderIdentifier::parse(ID).unwrap()]);
    }

    #[tokio::test]
    async fn test_evict_forces_reload() {
        let (source, registry) = counting(openrouter_source());

        let first = registry.get_provider(ID).await.unwrap();
        assert!(registry.evict(ID).is_some());
        assert!(registry.record(ID).is_none());

        let second = registry.get_provider(ID).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(source.loads(), 2);

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.evict(ID).is_none());
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_strand_load() {
        let (source, registry) = counting(openrouter_source().delayed(Duration::from_millis(100)));

        let cancelled = tokio::time::timeout(Duration::from_millis(10), registry.get_provider(ID)).await;
        assert!(cancelled.is_err());

        let provider = registry.get_provider(ID).await.unwrap();
        assert_eq!(provider.name(), "OpenRouter");
        assert_eq!(source.loads(), 1);
    }

    #[tokio::test]
    async fn test_builtin_registry() {
        let registry = ProviderRegistry::with_builtins();

        let provider = registry.get_provider("builtin:openrouter").await.unwrap();
        assert_eq!(provider.name(), "OpenRouter");
        assert!(!provider.is_configured());

        let err = registry.get_provider("builtin:missing").await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::LoadFailure {
                cause: SourceError::Unreachable { .. },
                ..
            }
        ));
        assert_eq!(registry.len(), 1);
    }
}
