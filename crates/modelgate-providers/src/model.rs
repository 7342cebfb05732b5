//! Model handles returned by `Provider::get_model`.

use std::sync::Arc;

use tracing::{debug, warn};

use modelgate_core::types::{Generation, GenerationOptions};

use crate::error::ProviderError;
use crate::traits::UpstreamClient;

/// A `{provider, model id}` pair bound to the client of the configuration
/// generation it was created under.
///
/// Cheap to clone and never cached by the provider. A handle obtained before
/// a re-`configure` keeps using the old client.
#[derive(Clone)]
pub struct ModelHandle {
    provider: &'static str,
    model_id: String,
    client: Arc<dyn UpstreamClient>,
}

impl ModelHandle {
    pub(crate) fn new(
        provider: &'static str,
        model_id: impl Into<String>,
        client: Arc<dyn UpstreamClient>,
    ) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            client,
        }
    }

    pub fn provider(&self) -> &str {
        self.provider
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Run one generation.
    ///
    /// This is where an id the upstream does not know is first detected, as
    /// `ProviderError::ModelNotFound`.
    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, ProviderError> {
        debug!(provider = self.provider, model = %self.model_id, "Generating");
        self.client
            .generate(&self.model_id, prompt, options)
            .await
            .map_err(|e| {
                warn!(provider = self.provider, model = %self.model_id, error = %e, "Generation failed");
                ProviderError::from(e)
            })
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("provider", &self.provider)
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}
