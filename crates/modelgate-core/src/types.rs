//! Core types for Modelgate.
//!
//! Two families live here:
//! - **Domain types** ([`CapabilityTag`], [`ModelDescriptor`], [`Pricing`], …) that the
//!   provider layer indexes and hands to the host.
//! - **Wire types** ([`RawModel`], [`ChatCompletionRequest`], …) that model the upstream
//!   unified-LLM HTTP API (`/models` listing and OpenAI-compatible `/chat/completions`).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

// ─────────────────────────────────────────────
// Capabilities
// ─────────────────────────────────────────────

/// A kind of transformation a provider or model supports.
///
/// Closed set: a provider declares the subset it supports when it is
/// constructed and that subset never changes at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapabilityTag {
    /// Text prompt in, text completion out.
    TextToText,
    /// Image (plus optional text) in, text out.
    ImageToText,
    /// Text in, image out.
    TextToImage,
}

impl CapabilityTag {
    /// Every tag, in declaration order.
    pub const ALL: [CapabilityTag; 3] = [
        CapabilityTag::TextToText,
        CapabilityTag::ImageToText,
        CapabilityTag::TextToImage,
    ];

    /// Canonical `SCREAMING_SNAKE_CASE` name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityTag::TextToText => "TEXT_TO_TEXT",
            CapabilityTag::ImageToText => "IMAGE_TO_TEXT",
            CapabilityTag::TextToImage => "TEXT_TO_IMAGE",
        }
    }
}

impl fmt::Display for CapabilityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityTag {
    type Err = String;

    /// Accepts the canonical name, any case, with `-` or `_` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        CapabilityTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == normalized)
            .ok_or_else(|| format!("unknown capability '{s}'"))
    }
}

// ─────────────────────────────────────────────
// Model descriptors
// ─────────────────────────────────────────────

/// Per-token pricing for one model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    /// Cost per input (prompt) token.
    pub input_cost: f64,
    /// Cost per output (completion) token.
    pub output_cost: f64,
    /// ISO currency code, always `"USD"` for the upstream listing.
    pub currency: String,
}

impl Pricing {
    /// Pricing in USD.
    pub fn usd(input_cost: f64, output_cost: f64) -> Self {
        Self {
            input_cost,
            output_cost,
            currency: "USD".to_string(),
        }
    }

    /// Both input and output cost are zero.
    ///
    /// Only meaningful for pricing that was actually reported; a model with no
    /// pricing block has `pricing: None` and is never free (see
    /// [`ModelDescriptor::is_free`]).
    pub fn is_free(&self) -> bool {
        self.input_cost == 0.0 && self.output_cost == 0.0
    }
}

/// Value type of a generation parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Number,
    Integer,
    Boolean,
    String,
}

/// Schema for one generation parameter: type, bounds, default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

/// A model known to a provider's catalog.
///
/// `id` is the natural key (e.g. `"vendor/model-name[:variant]"`). Descriptors
/// are immutable once inserted; a later discovery pass replaces them whole.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub capabilities: BTreeSet<CapabilityTag>,
    #[serde(default)]
    pub parameter_schema: BTreeMap<String, ParameterSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u64>,
}

impl ModelDescriptor {
    /// A text-to-text descriptor with no pricing and an empty parameter schema.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        ModelDescriptor {
            display_name: id.clone(),
            id,
            description: String::new(),
            capabilities: BTreeSet::from([CapabilityTag::TextToText]),
            parameter_schema: BTreeMap::new(),
            pricing: None,
            context_length: None,
        }
    }

    /// Builder-style pricing setter.
    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Whether the capability set contains `tag`.
    pub fn supports(&self, tag: CapabilityTag) -> bool {
        self.capabilities.contains(&tag)
    }

    /// Free means pricing is known and both costs are zero.
    ///
    /// A descriptor with no pricing block at all is deliberately not free: the
    /// upstream said nothing about cost, which is different from a block whose
    /// individual prices were missing or malformed (those read as zero).
    pub fn is_free(&self) -> bool {
        self.pricing.as_ref().is_some_and(Pricing::is_free)
    }
}

// ─────────────────────────────────────────────
// Upstream model listing (wire format)
// ─────────────────────────────────────────────

/// Body of `GET /models`.
#[derive(Debug, Deserialize)]
pub struct ModelListResponse {
    pub data: Vec<RawModel>,
}

/// One model as reported by the upstream listing, before normalization.
///
/// Decoding never fails on a single bad field: a mistyped optional field is
/// dropped with a warning, a pricing block that is not an object reads as a
/// block with both prices missing, and a missing or non-string `id` becomes
/// empty (which normalization rejects).
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct RawModel {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_pricing")]
    pub pricing: Option<RawPricing>,
    #[serde(default, deserialize_with = "lenient")]
    pub context_length: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub architecture: Option<RawArchitecture>,
    #[serde(default, deserialize_with = "lenient")]
    pub supported_parameters: Option<Vec<String>>,
}

/// Upstream pricing block. Prices are usually decimal strings (`"0.000002"`)
/// but numbers and `$`-prefixed strings show up too, so they stay untyped here.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct RawPricing {
    #[serde(default)]
    pub prompt: Option<serde_json::Value>,
    #[serde(default)]
    pub completion: Option<serde_json::Value>,
}

/// Optional field that is dropped, not fatal, when it has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(raw) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(serde_json::from_value(raw)
        .map_err(|e| warn!(error = %e, "Dropping malformed field in model listing"))
        .ok())
}

fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(id)) => Ok(id),
        Some(other) => {
            warn!(id = %other, "Model id is not a string");
            Ok(String::new())
        }
        None => Ok(String::new()),
    }
}

fn lenient_pricing<'de, D>(deserializer: D) -> Result<Option<RawPricing>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Value::Object(mut block)) => {
            let mut price = |name: &str| block.remove(name).filter(|v| !v.is_null());
            Ok(Some(RawPricing {
                prompt: price("prompt"),
                completion: price("completion"),
            }))
        }
        Some(other) => {
            warn!(pricing = %other, "Pricing block is not an object, treating prices as missing");
            Ok(Some(RawPricing::default()))
        }
    }
}

/// Upstream modality information (e.g. `"text+image->text"`).
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct RawArchitecture {
    #[serde(default)]
    pub modality: Option<String>,
    #[serde(default)]
    pub input_modalities: Option<Vec<String>>,
    #[serde(default)]
    pub output_modalities: Option<Vec<String>>,
}

// ─────────────────────────────────────────────
// Messages (OpenAI chat completions format)
// ─────────────────────────────────────────────

/// A chat message in the OpenAI format.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role")]
pub enum Message {
    #[serde(rename = "system")]
    System { content: String },

    #[serde(rename = "user")]
    User { content: String },

    #[serde(rename = "assistant")]
    Assistant { content: String },
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }
}

/// Request body for an OpenAI-compatible chat completion API.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

/// Raw chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<UsageInfo>,
}

/// A single choice in a chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: AssistantMessage,
    pub finish_reason: Option<String>,
}

/// The assistant message within a chat completion choice.
#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    pub content: Option<String>,
}

/// Token usage statistics.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UsageInfo {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// ─────────────────────────────────────────────
// Generation (host-facing)
// ─────────────────────────────────────────────

/// Knobs for a single generation call. `None` leaves the upstream default.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerationOptions {
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
}

impl GenerationOptions {
    /// Build the message list for `prompt`, prepending the system prompt if set.
    pub fn messages_for(&self, prompt: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(prompt));
        messages
    }
}

/// Result of one generation call.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub content: String,
    pub metadata: GenerationMetadata,
}

/// Metadata attached to a [`Generation`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    /// Model that actually served the request (upstream may route).
    pub model: String,
    /// Wall-clock time of the upstream call.
    pub processing_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageInfo>,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
