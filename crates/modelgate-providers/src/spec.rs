//! Static provider specs — how to reach each supported upstream.
//!
//! A `ProviderSpec` is the fixed, construction-time description of a provider:
//! endpoints, credential env var, the capability set it declares, and its
//! model resolution policy.

use modelgate_core::config::ProviderConfig;
use modelgate_core::types::CapabilityTag;

// ─────────────────────────────────────────────
// Resolution policy
// ─────────────────────────────────────────────

/// How `Provider::get_model` treats ids that are not in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Any id resolves to a handle; an unknown id fails on first generation
    /// with `ModelNotFound`. The upstream catalog may be stale or incomplete,
    /// so availability wins over early validation.
    Optimistic,
    /// Only ids present in the discovered catalog resolve.
    Strict,
}

/// Policy used by the built-in specs.
pub const DEFAULT_RESOLUTION_POLICY: ResolutionPolicy = ResolutionPolicy::Optimistic;

// ─────────────────────────────────────────────
// ProviderSpec
// ─────────────────────────────────────────────

/// Fixed description of one upstream provider.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Internal name (e.g. `"openrouter"`), also the `builtin:` identifier suffix.
    pub name: &'static str,
    /// Human-readable name for logs and status. E.g. `"OpenRouter"`.
    pub display_name: &'static str,
    /// Environment variable holding out-of-band credentials.
    pub env_key: &'static str,
    /// API base used when the config does not override it.
    pub default_api_base: &'static str,
    /// Path of the model listing, relative to the API base.
    pub models_path: &'static str,
    /// Path of the chat completions endpoint.
    pub completions_path: &'static str,
    /// Path hit by availability probes. Must require valid credentials.
    pub probe_path: &'static str,
    /// Capabilities this provider declares. Fixed for its lifetime.
    pub capabilities: &'static [CapabilityTag],
    pub resolution: ResolutionPolicy,
}

impl ProviderSpec {
    /// API base for `config`: override first, then the spec default, without a
    /// trailing slash.
    pub fn api_base(&self, config: &ProviderConfig) -> String {
        config
            .api_base
            .as_deref()
            .filter(|base| !base.trim().is_empty())
            .unwrap_or(self.default_api_base)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn declares(&self, tag: CapabilityTag) -> bool {
        self.capabilities.contains(&tag)
    }
}

// ─────────────────────────────────────────────
// Built-in providers
// ─────────────────────────────────────────────

/// Provider specs shipped with the crate, addressable as `builtin:<name>`.
pub static PROVIDERS: &[ProviderSpec] = &[
    // Unified gateway over 200+ upstream models.
    ProviderSpec {
        name: "openrouter",
        display_name: "OpenRouter",
        env_key: "OPENROUTER_API_KEY",
        default_api_base: "https://openrouter.ai/api/v1",
        models_path: "/models",
        completions_path: "/chat/completions",
        probe_path: "/auth/key",
        capabilities: &[CapabilityTag::TextToText, CapabilityTag::ImageToText],
        resolution: DEFAULT_RESOLUTION_POLICY,
    },
    // Self-hosted LiteLLM proxy. Its listing only carries ids, and `/models`
    // already requires the key, so it doubles as the probe.
    ProviderSpec {
        name: "litellm",
        display_name: "LiteLLM Proxy",
        env_key: "LITELLM_API_KEY",
        default_api_base: "http://localhost:4000/v1",
        models_path: "/models",
        completions_path: "/chat/completions",
        probe_path: "/models",
        capabilities: &[CapabilityTag::TextToText],
        resolution: DEFAULT_RESOLUTION_POLICY,
    },
];

/// Find a built-in spec by exact name.
pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|spec| spec.name == name)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
