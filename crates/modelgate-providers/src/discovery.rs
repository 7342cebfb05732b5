//! Model discovery — fetch the upstream listing and normalize it into
//! [`ModelDescriptor`]s.
//!
//! Normalization is lenient about pricing (bad prices become zero) but
//! strict about identity: a descriptor without an id fails the whole pass so
//! the provider keeps its previous catalog.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use modelgate_core::types::{
    CapabilityTag, ModelDescriptor, ParameterKind, ParameterSpec, Pricing, RawArchitecture,
    RawModel,
};

use crate::error::DiscoveryError;
use crate::traits::UpstreamClient;

/// Parameters assumed when the listing does not report `supported_parameters`.
const DEFAULT_PARAMETERS: &[&str] = &["temperature", "top_p", "max_tokens"];

// ─────────────────────────────────────────────
// Fetch + normalize
// ─────────────────────────────────────────────

/// One full discovery pass, not yet committed.
///
/// `declared` is the provider's fixed capability set; derived capabilities
/// outside it are dropped.
pub async fn fetch_models(
    client: &dyn UpstreamClient,
    declared: &[CapabilityTag],
    timeout: Duration,
) -> Result<Vec<ModelDescriptor>, DiscoveryError> {
    let raw = tokio::time::timeout(timeout, client.list_models())
        .await
        .map_err(|_| DiscoveryError::TimedOut(timeout))??;

    raw.into_iter()
        .map(|model| normalize(model, declared))
        .collect()
}

/// Turn one upstream descriptor into a [`ModelDescriptor`].
pub fn normalize(raw: RawModel, declared: &[CapabilityTag]) -> Result<ModelDescriptor, DiscoveryError> {
    let id = raw.id.trim().to_string();
    if id.is_empty() {
        return Err(DiscoveryError::Parse(format!(
            "model without id (name: {})",
            raw.name.as_deref().unwrap_or("?")
        )));
    }

    let pricing = raw.pricing.as_ref().map(|p| {
        Pricing::usd(
            price_field(&id, "prompt", p.prompt.as_ref()),
            price_field(&id, "completion", p.completion.as_ref()),
        )
    });

    let capabilities = derive_capabilities(raw.architecture.as_ref())
        .into_iter()
        .filter(|tag| declared.contains(tag))
        .collect();

    let display_name = raw
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| id.clone());

    Ok(ModelDescriptor {
        parameter_schema: parameter_schema(raw.supported_parameters.as_deref()),
        display_name,
        description: raw.description.unwrap_or_default(),
        capabilities,
        pricing,
        context_length: raw.context_length,
        id,
    })
}

/// Parse one price. Accepts decimal strings, `$`-prefixed strings, and numbers.
pub fn parse_price(value: &Value) -> Result<f64, String> {
    let parsed = match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("unrepresentable number {n}"))?,
        Value::String(s) => {
            let cleaned = s.trim().trim_start_matches('$').trim();
            cleaned
                .parse::<f64>()
                .map_err(|_| format!("not a number: {s:?}"))?
        }
        other => return Err(format!("unexpected price value {other}")),
    };

    if parsed.is_finite() && parsed >= 0.0 {
        Ok(parsed)
    } else {
        Err(format!("out of range: {parsed}"))
    }
}

fn price_field(model_id: &str, field: &str, value: Option<&Value>) -> f64 {
    let result = match value {
        Some(v) => parse_price(v),
        None => Err("missing".to_string()),
    };
    result.unwrap_or_else(|reason| {
        warn!(model = model_id, field, reason = %reason, "Unusable price, assuming zero");
        0.0
    })
}

/// Capabilities implied by the reported modalities. No information means a
/// plain text model.
fn derive_capabilities(arch: Option<&RawArchitecture>) -> BTreeSet<CapabilityTag> {
    let (inputs, outputs) = arch.map(modalities).unwrap_or_default();

    let mut tags = BTreeSet::new();
    let text_in = inputs.iter().any(|m| m == "text");
    let image_in = inputs.iter().any(|m| m == "image");
    let text_out = outputs.iter().any(|m| m == "text");
    let image_out = outputs.iter().any(|m| m == "image");

    if text_in && text_out {
        tags.insert(CapabilityTag::TextToText);
    }
    if image_in && text_out {
        tags.insert(CapabilityTag::ImageToText);
    }
    if text_in && image_out {
        tags.insert(CapabilityTag::TextToImage);
    }
    if tags.is_empty() && inputs.is_empty() && outputs.is_empty() {
        tags.insert(CapabilityTag::TextToText);
    }
    tags
}

/// `(inputs, outputs)` from explicit lists, else from a `"a+b->c"` string.
fn modalities(arch: &RawArchitecture) -> (Vec<String>, Vec<String>) {
    let lower = |list: &[String]| list.iter().map(|m| m.trim().to_lowercase()).collect::<Vec<_>>();

    if let (Some(inputs), Some(outputs)) = (&arch.input_modalities, &arch.output_modalities) {
        return (lower(inputs.as_slice()), lower(outputs.as_slice()));
    }

    match arch.modality.as_deref().and_then(|m| m.split_once("->")) {
        Some((inputs, outputs)) => {
            let split = |side: &str| {
                side.split('+')
                    .map(|m| m.trim().to_lowercase())
                    .filter(|m| !m.is_empty())
                    .collect::<Vec<_>>()
            };
            (split(inputs), split(outputs))
        }
        None => (Vec::new(), Vec::new()),
    }
}

/// Schema for the well-known generation parameters.
fn known_parameter(name: &str) -> Option<ParameterSpec> {
    let spec = |kind, min: Option<f64>, max: Option<f64>, default: Option<Value>| ParameterSpec {
        kind,
        min,
        max,
        default,
    };

    Some(match name {
        "temperature" => spec(ParameterKind::Number, Some(0.0), Some(2.0), Some(json!(1.0))),
        "top_p" => spec(ParameterKind::Number, Some(0.0), Some(1.0), Some(json!(1.0))),
        "top_k" => spec(ParameterKind::Integer, Some(0.0), None, Some(json!(0))),
        "max_tokens" => spec(ParameterKind::Integer, Some(1.0), None, None),
        "frequency_penalty" => spec(ParameterKind::Number, Some(-2.0), Some(2.0), Some(json!(0.0))),
        "presence_penalty" => spec(ParameterKind::Number, Some(-2.0), Some(2.0), Some(json!(0.0))),
        "repetition_penalty" => spec(ParameterKind::Number, Some(0.0), Some(2.0), Some(json!(1.0))),
        "seed" => spec(ParameterKind::Integer, None, None, None),
        _ => return None,
    })
}

fn parameter_schema(supported: Option<&[String]>) -> BTreeMap<String, ParameterSpec> {
    let names: Vec<&str> = match supported {
        Some(list) => list.iter().map(String::as_str).collect(),
        None => DEFAULT_PARAMETERS.to_vec(),
    };

    names
        .into_iter()
        .filter_map(|name| match known_parameter(name) {
            Some(spec) => Some((name.to_string(), spec)),
            None => {
                debug!(parameter = name, "Skipping unknown parameter");
                None
            }
        })
        .collect()
}

// ─────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────

/// How a discovery pass ended.
#[derive(Clone, Debug, PartialEq)]
pub enum DiscoveryOutcome {
    /// The catalog now holds this pass's models.
    Committed { generation: u64, models: usize },
    /// Finished, but a newer `configure` had already happened; results dropped.
    Superseded { generation: u64 },
    /// Abandoned; the previous catalog stands.
    Failed { generation: u64, error: DiscoveryError },
}

impl DiscoveryOutcome {
    pub fn generation(&self) -> u64 {
        match self {
            DiscoveryOutcome::Committed { generation, .. }
            | DiscoveryOutcome::Superseded { generation }
            | DiscoveryOutcome::Failed { generation, .. } => *generation,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, DiscoveryOutcome::Committed { .. })
    }
}

/// Last discovery result recorded for the current generation, for status reporting.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    pub generation: u64,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DiscoveryReport {
    pub fn from_outcome(outcome: &DiscoveryOutcome) -> Self {
        let (models, error) = match outcome {
            DiscoveryOutcome::Committed { models, .. } => (Some(*models), None),
            DiscoveryOutcome::Failed { error, .. } => (None, Some(error.to_string())),
            DiscoveryOutcome::Superseded { .. } => (None, Some("superseded".to_string())),
        };
        DiscoveryReport {
            generation: outcome.generation(),
            finished_at: Utc::now(),
            models,
            error,
        }
    }
}

/// Handle to a detached discovery pass.
///
/// Dropping it does not cancel the pass; awaiting it is optional.
#[derive(Debug)]
pub struct DiscoveryTask {
    generation: u64,
    handle: JoinHandle<DiscoveryOutcome>,
}

impl DiscoveryTask {
    pub(crate) fn new(generation: u64, handle: JoinHandle<DiscoveryOutcome>) -> Self {
        Self { generation, handle }
    }

    /// Configuration generation this pass runs under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the pass to end.
    pub async fn finished(self) -> DiscoveryOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => DiscoveryOutcome::Failed {
                generation: self.generation,
                error: DiscoveryError::Parse(format!("discovery task aborted: {e}")),
            },
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
