//! Provider layer for Modelgate.
//!
//! Resolves provider identifiers to running providers and keeps each
//! provider's model catalog filled from the upstream API.
//!
//! # Architecture
//!
//! - [`registry::ProviderRegistry`] — identifier → provider cache, one load per identifier
//! - [`source`] — where providers come from ([`source::ModuleSource`], [`source::StaticSource`])
//! - [`provider::Provider`] — configuration lifecycle, availability, catalog queries
//! - [`catalog::ModelCatalog`] — atomically swapped snapshot of discovered models
//! - [`discovery`] — background listing + normalization
//! - [`http_client::HttpUpstreamClient`] — OpenAI-compatible HTTP client
//! - [`model::ModelHandle`] — `{provider, model id}` pair used for generation

pub mod catalog;
pub mod discovery;
pub mod error;
pub mod http_client;
pub mod identifier;
pub mod model;
pub mod provider;
pub mod registry;
pub mod source;
pub mod spec;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types for convenience
pub use catalog::ModelCatalog;
pub use discovery::{DiscoveryOutcome, DiscoveryReport, DiscoveryTask};
pub use error::{DiscoveryError, ProviderError, RegistryError, SourceError, UpstreamError};
pub use http_client::{HttpClientFactory, HttpUpstreamClient};
pub use identifier::ProviderIdentifier;
pub use model::ModelHandle;
pub use provider::{Provider, ProviderPhase, ServiceStatus};
pub use registry::{ProviderRecord, ProviderRegistry};
pub use source::{ModuleSource, ProviderModule, SpecModule, StaticSource};
pub use spec::{ProviderSpec, ResolutionPolicy, PROVIDERS};
pub use traits::{ClientFactory, UpstreamClient};
