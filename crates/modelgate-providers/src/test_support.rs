//! Scripted fakes shared by the unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use modelgate_core::config::ProviderConfig;
use modelgate_core::types::{Generation, GenerationMetadata, GenerationOptions, RawModel};

use crate::error::{ProviderError, SourceError, UpstreamError};
use crate::identifier::ProviderIdentifier;
use crate::source::{ModuleSource, ProviderModule, SpecModule};
use crate::spec::ProviderSpec;
use crate::traits::{ClientFactory, UpstreamClient};

// ─────────────────────────────────────────────
// ScriptedClient
// ─────────────────────────────────────────────

/// Upstream client answering from fixed data.
pub(crate) struct ScriptedClient {
    listing: Result<Vec<RawModel>, UpstreamError>,
    delay: Duration,
    /// Per-call listings, consumed in call order before falling back to `listing`.
    script: Mutex<VecDeque<(Duration, Vec<RawModel>)>>,
    connection: Result<(), UpstreamError>,
    known: Option<HashSet<String>>,
    generation_error: Option<UpstreamError>,
    list_calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn with_models(models: Vec<RawModel>) -> Self {
        Self {
            listing: Ok(models),
            delay: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            connection: Ok(()),
            known: None,
            generation_error: None,
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Listing always fails with `err`.
    pub fn failing(err: UpstreamError) -> Self {
        Self {
            listing: Err(err),
            ..Self::with_models(Vec::new())
        }
    }

    /// Delay every listing by `delay`.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answer the next unscripted listing call with `models` after `delay`.
    pub fn then(self, delay: Duration, models: Vec<RawModel>) -> Self {
        self.script.lock().push_back((delay, models));
        self
    }

    /// Probe result.
    pub fn connection(mut self, result: Result<(), UpstreamError>) -> Self {
        self.connection = result;
        self
    }

    /// Only these ids generate; anything else is `ModelNotFound`.
    pub fn knowing(mut self, ids: &[&str]) -> Self {
        self.known = Some(ids.iter().map(|id| id.to_string()).collect());
        self
    }

    pub fn generation_error(mut self, err: UpstreamError) -> Self {
        self.generation_error = Some(err);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamClient for ScriptedClient {
    async fn list_models(&self) -> Result<Vec<RawModel>, UpstreamError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().pop_front();
        if let Some((delay, models)) = scripted {
            tokio::time::sleep(delay).await;
            return Ok(models);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.listing.clone()
    }

    async fn generate(
        &self,
        model_id: &str,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<Generation, UpstreamError> {
        if let Some(err) = &self.generation_error {
            return Err(err.clone());
        }
        if let Some(known) = &self.known {
            if !known.contains(model_id) {
                return Err(UpstreamError::ModelNotFound(model_id.to_string()));
            }
        }
        Ok(Generation {
            content: format!("{model_id}: {prompt}"),
            metadata: GenerationMetadata {
                model: model_id.to_string(),
                processing_time_ms: 1,
                finish_reason: Some("stop".into()),
                usage: None,
            },
        })
    }

    async fn check_connection(&self) -> Result<(), UpstreamError> {
        self.connection.clone()
    }
}

// ─────────────────────────────────────────────
// ScriptedFactory
// ─────────────────────────────────────────────

/// Hands out a pre-built client per API key.
#[derive(Default)]
pub(crate) struct ScriptedFactory {
    clients: HashMap<String, Arc<ScriptedClient>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(mut self, api_key: &str, client: Arc<ScriptedClient>) -> Self {
        self.clients.insert(api_key.to_string(), client);
        self
    }
}

impl ClientFactory for ScriptedFactory {
    fn build(
        &self,
        _spec: &ProviderSpec,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn UpstreamClient>, ProviderError> {
        match self.clients.get(&config.api_key) {
            Some(client) => Ok(Arc::clone(client) as Arc<dyn UpstreamClient>),
            None => Err(ProviderError::InvalidConfig(format!(
                "no scripted client for key '{}'",
                config.api_key
            ))),
        }
    }
}

// ─────────────────────────────────────────────
// CountingSource
// ─────────────────────────────────────────────

/// Module source that counts resolutions and can be slowed down or broken.
pub(crate) struct CountingSource {
    module: Arc<dyn ProviderModule>,
    delay: Duration,
    failure: Option<SourceError>,
    loads: AtomicUsize,
}

impl CountingSource {
    pub fn new(spec: &'static ProviderSpec) -> Self {
        Self {
            module: Arc::new(SpecModule::builtin(spec)),
            delay: Duration::ZERO,
            failure: None,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, err: SourceError) -> Self {
        self.failure = Some(err);
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModuleSource for CountingSource {
    async fn resolve(
        &self,
        _identifier: &ProviderIdentifier,
    ) -> Result<Arc<dyn ProviderModule>, SourceError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(Arc::clone(&self.module)),
        }
    }
}
