//! Configuration schema.
//!
//! Hierarchy: `Config` → `ProviderConfig`, `DefaultsConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.modelgate/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub defaults: DefaultsConfig,
}

// ─────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────

/// Everything a provider needs to talk to the upstream API.
///
/// Supplied to `Provider::configure`; immutable for the lifetime of one
/// configuration generation.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// API key for Bearer authentication.
    pub api_key: String,
    /// Custom API base URL (overrides the provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Application name, sent as `X-Title`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    /// Application URL, sent as `HTTP-Referer`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_url: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
    /// Upper bound for one model discovery pass.
    pub discovery_timeout_secs: u64,
    /// Upper bound for one availability probe.
    pub probe_timeout_secs: u64,
    /// Upper bound for one HTTP request (generation included).
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            app_name: None,
            app_url: None,
            extra_headers: None,
            discovery_timeout_secs: 30,
            probe_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

impl ProviderConfig {
    /// Config carrying only an API key; everything else defaulted.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Whether credential material is present.
    pub fn is_configured(&self) -> bool {
        crate::utils::clean_api_key(&self.api_key).is_some()
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// Keeps the API key out of logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &if self.is_configured() { "<set>" } else { "<empty>" })
            .field("api_base", &self.api_base)
            .field("app_name", &self.app_name)
            .field("app_url", &self.app_url)
            .field("discovery_timeout_secs", &self.discovery_timeout_secs)
            .field("probe_timeout_secs", &self.probe_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

// ─────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────

/// What the CLI uses when nothing is given on the command line.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefaultsConfig {
    /// Provider identifier resolved through the registry.
    pub provider: String,
    /// Default model id.
    pub model: String,
    /// Maximum tokens to generate per response.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: "builtin:openrouter".to_string(),
            model: "openrouter/auto".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
