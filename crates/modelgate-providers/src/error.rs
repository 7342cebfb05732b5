//! Error types for the provider layer.
//!
//! Loading errors (`SourceError`, `RegistryError`) are `Clone` because a single
//! load outcome is fanned out to every caller waiting on the same identifier.

use std::time::Duration;

use thiserror::Error;

/// Failure to resolve or construct a provider module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The identifier could not be fetched.
    #[error("source unreachable for '{identifier}': {reason}")]
    Unreachable { identifier: String, reason: String },

    /// The identifier was fetched but does not expose a usable provider.
    #[error("source invalid for '{identifier}': {reason}")]
    Invalid { identifier: String, reason: String },
}

impl SourceError {
    pub fn unreachable(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        SourceError::Unreachable {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        SourceError::Invalid {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by `ProviderRegistry::get_provider`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Rejected before any load was attempted.
    #[error("invalid provider identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    /// Loading or constructing the provider failed. Never cached.
    #[error("failed to load provider '{identifier}': {cause}")]
    LoadFailure {
        identifier: String,
        #[source]
        cause: SourceError,
    },
}

/// Errors from the upstream HTTP API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// Network failure, connection refused, request timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// Credentials rejected (401/403).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The upstream does not know this model id.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// 429 from the upstream; `retry_after` in seconds when advertised.
    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    /// Any other non-success status.
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The body could not be decoded.
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

/// Why a discovery pass was abandoned. Logged, never returned to callers of
/// `configure`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// A descriptor could not be normalized.
    #[error("malformed model listing: {0}")]
    Parse(String),

    #[error("discovery timed out after {0:?}")]
    TimedOut(Duration),
}

/// Errors surfaced by `Provider` operations and model handles.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// `configure` was called without credential material. Not retried.
    #[error("missing credentials: an API key is required")]
    MissingCredentials,

    /// The operation needs a configured client.
    #[error("provider '{0}' is not configured")]
    NotConfigured(String),

    /// The configuration could not be turned into a client.
    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network, status, or decoding failure talking to the upstream.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<UpstreamError> for ProviderError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::ModelNotFound(model) => ProviderError::ModelNotFound(model),
            UpstreamError::RateLimited { retry_after } => ProviderError::RateLimited { retry_after },
            UpstreamError::Auth(msg) => ProviderError::Auth(msg),
            other => ProviderError::Transport(other.to_string()),
        }
    }
}
