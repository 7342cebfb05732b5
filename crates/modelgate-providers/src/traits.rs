//! Upstream client traits — the seam between a `Provider` and the HTTP API.
//!
//! `HttpUpstreamClient` in `http_client.rs` is the production implementation;
//! tests substitute scripted clients through `ClientFactory`.

use std::sync::Arc;

use async_trait::async_trait;
use modelgate_core::config::ProviderConfig;
use modelgate_core::types::{Generation, GenerationOptions, RawModel};

use crate::error::{ProviderError, UpstreamError};
use crate::spec::ProviderSpec;

/// Authenticated access to the unified-LLM API.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Full model listing, unnormalized.
    async fn list_models(&self) -> Result<Vec<RawModel>, UpstreamError>;

    /// Run one generation against `model_id`.
    ///
    /// Unknown ids surface as `UpstreamError::ModelNotFound`.
    async fn generate(
        &self,
        model_id: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, UpstreamError>;

    /// Connectivity + credential probe.
    async fn check_connection(&self) -> Result<(), UpstreamError>;

    /// [`check_connection`](Self::check_connection) flattened to a boolean.
    /// Never fails.
    async fn test_connection(&self) -> bool {
        self.check_connection().await.is_ok()
    }
}

/// Builds a client for one configuration generation.
///
/// Called synchronously from `Provider::configure`.
pub trait ClientFactory: Send + Sync {
    fn build(
        &self,
        spec: &ProviderSpec,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn UpstreamClient>, ProviderError>;
}
