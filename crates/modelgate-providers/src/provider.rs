//! Provider — one running adapter over a single upstream API.
//!
//! A provider owns its configuration, the upstream client built from it, and
//! a [`ModelCatalog`] filled by background discovery. Every `configure` bumps
//! a generation counter; a discovery pass only commits if the generation it
//! started under is still current, so passes from a superseded configuration
//! can never overwrite newer results. Within one generation, passes are
//! numbered in start order and a pass never commits over a later-started one.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use modelgate_core::config::ProviderConfig;
use modelgate_core::types::{CapabilityTag, ModelDescriptor};
use modelgate_core::utils::clean_api_key;

use crate::catalog::ModelCatalog;
use crate::discovery::{self, DiscoveryOutcome, DiscoveryReport, DiscoveryTask};
use crate::error::{DiscoveryError, ProviderError};
use crate::model::ModelHandle;
use crate::spec::{ProviderSpec, ResolutionPolicy};
use crate::traits::{ClientFactory, UpstreamClient};

// ─────────────────────────────────────────────
// State
// ─────────────────────────────────────────────

/// Where a provider is in its configuration lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderPhase {
    /// Constructed, no credentials yet.
    Unconfigured,
    /// A client is built. Discovery may still be running, or may have failed.
    Configured,
}

/// Client and config of one configuration generation.
#[derive(Clone)]
struct Session {
    config: Arc<ProviderConfig>,
    client: Arc<dyn UpstreamClient>,
}

#[derive(Default)]
struct State {
    generation: u64,
    /// Discovery passes started so far, across all generations.
    passes: u64,
    /// Pass number of the snapshot currently in the catalog.
    committed_pass: u64,
    session: Option<Session>,
    last_discovery: Option<DiscoveryReport>,
}

/// The parts discovery tasks need after `configure` has returned.
#[derive(Default)]
struct Shared {
    catalog: ModelCatalog,
    state: RwLock<State>,
}

impl Shared {
    /// Commit or drop one finished discovery pass.
    ///
    /// Runs under the state write lock so it cannot interleave with a
    /// `configure` bumping the generation. Lock order: state, then catalog.
    fn finish_discovery(
        &self,
        provider: &'static str,
        generation: u64,
        pass: u64,
        result: Result<Vec<ModelDescriptor>, DiscoveryError>,
    ) -> DiscoveryOutcome {
        let mut state = self.state.write();

        if state.generation != generation {
            debug!(
                provider,
                generation,
                current = state.generation,
                "Discarding discovery results from superseded configuration"
            );
            return DiscoveryOutcome::Superseded { generation };
        }
        if pass < state.committed_pass {
            debug!(
                provider,
                generation,
                pass,
                committed = state.committed_pass,
                "Discarding discovery results older than the committed catalog"
            );
            return DiscoveryOutcome::Superseded { generation };
        }

        let outcome = match result {
            Ok(models) => {
                let count = models.len();
                self.catalog.replace_all(models);
                state.committed_pass = pass;
                info!(provider, generation, models = count, "Model catalog updated");
                DiscoveryOutcome::Committed {
                    generation,
                    models: count,
                }
            }
            Err(error) => {
                warn!(provider, generation, error = %error, "Model discovery failed, keeping previous catalog");
                DiscoveryOutcome::Failed { generation, error }
            }
        };

        state.last_discovery = Some(DiscoveryReport::from_outcome(&outcome));
        outcome
    }
}

// ─────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────

/// One running adapter instance.
///
/// Constructed unconfigured by a module; shared as `Arc<Provider>` by the
/// registry. All methods take `&self`.
pub struct Provider {
    spec: ProviderSpec,
    factory: Arc<dyn ClientFactory>,
    shared: Arc<Shared>,
}

impl Provider {
    pub fn new(spec: ProviderSpec, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            spec,
            factory,
            shared: Arc::new(Shared::default()),
        }
    }

    /// Human-readable provider name.
    pub fn name(&self) -> &'static str {
        self.spec.display_name
    }

    pub fn spec(&self) -> &ProviderSpec {
        &self.spec
    }

    /// The fixed capability set declared at construction.
    pub fn capabilities(&self) -> &'static [CapabilityTag] {
        self.spec.capabilities
    }

    pub fn phase(&self) -> ProviderPhase {
        if self.shared.state.read().session.is_some() {
            ProviderPhase::Configured
        } else {
            ProviderPhase::Unconfigured
        }
    }

    pub fn is_configured(&self) -> bool {
        self.phase() == ProviderPhase::Configured
    }

    /// Current configuration generation. 0 until the first `configure`.
    pub fn generation(&self) -> u64 {
        self.shared.state.read().generation
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.shared.catalog
    }

    fn session(&self) -> Option<Session> {
        self.shared.state.read().session.clone()
    }

    // ── Configuration ──

    /// Install `config`, build a fresh client, and start discovery.
    ///
    /// Returns once the client is built; discovery runs detached. A caller
    /// querying the catalog right after this returns may see it empty or
    /// still holding the previous generation's models. The returned task can
    /// be awaited or dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn configure(&self, config: ProviderConfig) -> Result<DiscoveryTask, ProviderError> {
        if !config.is_configured() {
            return Err(ProviderError::MissingCredentials);
        }
        let runtime = Handle::try_current().map_err(|_| {
            ProviderError::InvalidConfig("configure must run inside a tokio runtime".into())
        })?;

        let client = self.factory.build(&self.spec, &config)?;
        let config = Arc::new(config);

        let (generation, pass) = {
            let mut state = self.shared.state.write();
            state.generation += 1;
            state.passes += 1;
            state.session = Some(Session {
                config: Arc::clone(&config),
                client: Arc::clone(&client),
            });
            (state.generation, state.passes)
        };

        info!(provider = self.name(), generation, "Provider configured");
        Ok(self.spawn_discovery(&runtime, generation, pass, client, &config))
    }

    /// Configure from the provider's credential env var (e.g. `OPENROUTER_API_KEY`).
    ///
    /// `Ok(None)` when the variable is unset or blank.
    pub fn configure_from_env(&self) -> Result<Option<DiscoveryTask>, ProviderError> {
        let Ok(raw) = std::env::var(self.spec.env_key) else {
            return Ok(None);
        };
        match clean_api_key(&raw) {
            Some(key) => {
                debug!(provider = self.name(), env = self.spec.env_key, "Using out-of-band credentials");
                self.configure(ProviderConfig::with_api_key(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Start another discovery pass under the current generation.
    ///
    /// Overlapping refreshes are allowed. If an earlier refresh finishes after
    /// a later one has committed, its results are dropped as `Superseded`.
    pub fn refresh_models(&self) -> Result<DiscoveryTask, ProviderError> {
        let runtime = Handle::try_current().map_err(|_| {
            ProviderError::InvalidConfig("refresh must run inside a tokio runtime".into())
        })?;
        let (generation, pass, session) = {
            let mut state = self.shared.state.write();
            let Some(session) = state.session.clone() else {
                return Err(ProviderError::NotConfigured(self.name().to_string()));
            };
            state.passes += 1;
            (state.generation, state.passes, session)
        };
        Ok(self.spawn_discovery(&runtime, generation, pass, session.client, &session.config))
    }

    fn spawn_discovery(
        &self,
        runtime: &Handle,
        generation: u64,
        pass: u64,
        client: Arc<dyn UpstreamClient>,
        config: &ProviderConfig,
    ) -> DiscoveryTask {
        let shared = Arc::clone(&self.shared);
        let provider = self.spec.display_name;
        let declared = self.spec.capabilities;
        let timeout = config.discovery_timeout();

        debug!(provider, generation, pass, "Starting model discovery");
        let handle = runtime.spawn(async move {
            let result = discovery::fetch_models(client.as_ref(), declared, timeout).await;
            shared.finish_discovery(provider, generation, pass, result)
        });
        DiscoveryTask::new(generation, handle)
    }

    // ── Availability ──

    /// Live probe against the upstream. `Err` carries the reason.
    ///
    /// Bounded by the configured probe timeout. Never panics on network
    /// failure.
    pub async fn check_availability(&self) -> Result<(), String> {
        let Some(session) = self.session() else {
            return Err("not configured".to_string());
        };

        let timeout = session.config.probe_timeout();
        match tokio::time::timeout(timeout, session.client.check_connection()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                debug!(provider = self.name(), error = %e, "Availability probe failed");
                Err(e.to_string())
            }
            Err(_) => {
                debug!(provider = self.name(), ?timeout, "Availability probe timed out");
                Err(format!("probe timed out after {timeout:?}"))
            }
        }
    }

    /// Whether the upstream is reachable with the current credentials.
    pub async fn is_available(&self) -> bool {
        self.check_availability().await.is_ok()
    }

    // ── Catalog queries ──

    /// Catalog entries supporting `tag`. Empty, not an error, when nothing
    /// has been discovered or the provider does not declare `tag`.
    pub fn get_models_for_capability(&self, tag: CapabilityTag) -> Vec<ModelDescriptor> {
        if !self.spec.declares(tag) {
            return Vec::new();
        }
        self.shared.catalog.by_capability(tag)
    }

    /// Catalog entry for `model_id`, if discovered.
    pub fn describe_model(&self, model_id: &str) -> Option<ModelDescriptor> {
        self.shared.catalog.by_id(model_id)
    }

    pub fn get_free_models(&self) -> Vec<ModelDescriptor> {
        self.shared.catalog.free_models()
    }

    /// Known and free. Models missing from the catalog report `false`.
    pub fn is_model_free(&self, model_id: &str) -> bool {
        self.shared.catalog.is_free(model_id)
    }

    /// Whether `get_model(model_id)` would hand out a handle.
    ///
    /// Always `true` under [`ResolutionPolicy::Optimistic`].
    pub fn supports_model(&self, model_id: &str) -> bool {
        match self.spec.resolution {
            ResolutionPolicy::Optimistic => true,
            ResolutionPolicy::Strict => self.shared.catalog.contains(model_id),
        }
    }

    // ── Models ──

    /// A handle for `model_id`, bound to the current client.
    ///
    /// Under the optimistic policy the id is not checked against the catalog;
    /// an unknown id fails on the first `generate` with `ModelNotFound`.
    pub fn get_model(&self, model_id: &str) -> Result<ModelHandle, ProviderError> {
        let session = self
            .session()
            .ok_or_else(|| ProviderError::NotConfigured(self.name().to_string()))?;

        if !self.supports_model(model_id) {
            return Err(ProviderError::ModelNotFound(model_id.to_string()));
        }
        Ok(ModelHandle::new(self.spec.name, model_id, session.client))
    }

    // ── Status ──

    /// Outcome of the most recent discovery pass of the current generation.
    pub fn last_discovery(&self) -> Option<DiscoveryReport> {
        self.shared.state.read().last_discovery.clone()
    }

    /// Snapshot for status reporting. Runs a live availability probe.
    pub async fn service_status(&self) -> ServiceStatus {
        let availability = self.check_availability().await;
        let (phase, generation, last_discovery) = {
            let state = self.shared.state.read();
            let phase = if state.session.is_some() {
                ProviderPhase::Configured
            } else {
                ProviderPhase::Unconfigured
            };
            (phase, state.generation, state.last_discovery.clone())
        };

        ServiceStatus {
            provider: self.name().to_string(),
            phase,
            generation,
            available: availability.is_ok(),
            reason: availability.err(),
            models: self.shared.catalog.len(),
            free_models: self.shared.catalog.free_models().len(),
            capabilities: self.spec.capabilities.to_vec(),
            last_discovery,
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.spec.name)
            .field("phase", &self.phase())
            .field("generation", &self.generation())
            .field("models", &self.shared.catalog.len())
            .finish()
    }
}

/// Serializable provider status, as returned by [`Provider::service_status`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub provider: String,
    pub phase: ProviderPhase,
    pub generation: u64,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub models: usize,
    pub free_models: usize,
    pub capabilities: Vec<CapabilityTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_discovery: Option<DiscoveryReport>,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
