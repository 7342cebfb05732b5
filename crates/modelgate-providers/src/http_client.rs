//! HTTP client for the unified-LLM API.
//!
//! Talks to three endpoints relative to the API base: the model listing, the
//! OpenAI-compatible `/chat/completions`, and a credential-checking probe.
//! Status codes are mapped onto [`UpstreamError`] here so the rest of the
//! crate never sees `reqwest` types.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::StatusCode;
use tracing::{debug, error, warn};

use modelgate_core::config::ProviderConfig;
use modelgate_core::types::{
    ChatCompletionRequest, ChatCompletionResponse, Generation, GenerationMetadata,
    GenerationOptions, ModelListResponse, RawModel,
};
use modelgate_core::utils::{clean_api_key, truncate_string};

use crate::error::{ProviderError, UpstreamError};
use crate::spec::ProviderSpec;
use crate::traits::{ClientFactory, UpstreamClient};

/// Longest upstream error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Phrases the upstream uses in a 400 body when the model id is unknown.
const UNKNOWN_MODEL_MARKERS: &[&str] = &[
    "not a valid model",
    "model not found",
    "unknown model",
    "no endpoints found",
];

// ─────────────────────────────────────────────
// HttpUpstreamClient
// ─────────────────────────────────────────────

/// An [`UpstreamClient`] backed by `reqwest`.
///
/// One instance per configuration generation; rebuilt on every `configure`.
pub struct HttpUpstreamClient {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL without trailing slash (e.g. `"https://openrouter.ai/api/v1"`).
    api_base: String,
    /// API key for Bearer authentication.
    api_key: String,
    /// Identification and extra headers sent with each request.
    headers: HeaderMap,
    /// Display name of the provider, for logs.
    provider: &'static str,
    models_path: &'static str,
    completions_path: &'static str,
    probe_path: &'static str,
}

impl std::fmt::Debug for HttpUpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpUpstreamClient")
            .field("api_base", &self.api_base)
            .field("provider", &self.provider)
            .finish()
    }
}

impl HttpUpstreamClient {
    /// Build a client for `spec` using the credentials and overrides in `config`.
    ///
    /// Headers that are not valid HTTP are skipped with a warning.
    pub fn new(spec: &ProviderSpec, config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        if let Some(ref extra) = config.extra_headers {
            for (key, value) in extra {
                insert_header(&mut headers, key, value);
            }
        }
        if let Some(ref url) = config.app_url {
            insert_header(&mut headers, "HTTP-Referer", url);
        }
        if let Some(ref name) = config.app_name {
            insert_header(&mut headers, "X-Title", name);
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ProviderError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(HttpUpstreamClient {
            client,
            api_base: spec.api_base(config),
            api_key: clean_api_key(&config.api_key).unwrap_or_default().to_string(),
            headers,
            provider: spec.display_name,
            models_path: spec.models_path,
            completions_path: spec.completions_path,
            probe_path: spec.probe_path,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .headers(self.headers.clone())
    }
}

fn insert_header(headers: &mut HeaderMap, key: &str, value: &str) {
    match (
        HeaderName::from_bytes(key.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(val)) => {
            headers.insert(name, val);
        }
        _ => warn!("Invalid header: {}={}", key, value),
    }
}

fn transport(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Transport(format!("request timed out: {err}"))
    } else {
        UpstreamError::Transport(err.to_string())
    }
}

/// Map a non-success response onto an [`UpstreamError`].
///
/// `model` is the id a generation was issued against, if any; only then can
/// a 404/400 mean "unknown model".
async fn error_from_response(response: reqwest::Response, model: Option<&str>) -> UpstreamError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    let body = truncate_string(&body, MAX_ERROR_BODY_CHARS);

    match (status, model) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => UpstreamError::Auth(body),
        (StatusCode::TOO_MANY_REQUESTS, _) => UpstreamError::RateLimited { retry_after },
        (StatusCode::NOT_FOUND, Some(model)) => UpstreamError::ModelNotFound(model.to_string()),
        (StatusCode::BAD_REQUEST, Some(model)) if names_unknown_model(&body) => {
            UpstreamError::ModelNotFound(model.to_string())
        }
        _ => UpstreamError::Status {
            status: status.as_u16(),
            body,
        },
    }
}

fn names_unknown_model(body: &str) -> bool {
    let lower = body.to_lowercase();
    UNKNOWN_MODEL_MARKERS.iter().any(|m| lower.contains(m))
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn list_models(&self) -> Result<Vec<RawModel>, UpstreamError> {
        debug!(provider = self.provider, "Listing upstream models");

        let response = self
            .get(self.models_path)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let err = error_from_response(response, None).await;
            error!(provider = self.provider, error = %err, "Model listing failed");
            return Err(err);
        }

        let listing: ModelListResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;

        debug!(provider = self.provider, models = listing.data.len(), "Model listing received");
        Ok(listing.data)
    }

    async fn generate(
        &self,
        model_id: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, UpstreamError> {
        debug!(
            provider = self.provider,
            model = model_id,
            prompt_chars = prompt.chars().count(),
            "Calling LLM"
        );

        let request_body = ChatCompletionRequest {
            model: model_id.to_string(),
            messages: options.messages_for(prompt),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(self.url(self.completions_path))
            .bearer_auth(&self.api_key)
            .headers(self.headers.clone())
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = self.provider, error = %e, "HTTP request failed");
                transport(e)
            })?;

        if !response.status().is_success() {
            let err = error_from_response(response, Some(model_id)).await;
            error!(provider = self.provider, model = model_id, error = %err, "API error");
            return Err(err);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;
        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let served_by = completion.model.unwrap_or_else(|| model_id.to_string());
        let usage = completion.usage;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::Decode("no choices in response".to_string()))?;

        debug!(
            provider = self.provider,
            model = %served_by,
            elapsed_ms = processing_time_ms,
            finish_reason = choice.finish_reason.as_deref().unwrap_or("?"),
            "LLM response received"
        );

        Ok(Generation {
            content: choice.message.content.unwrap_or_default(),
            metadata: GenerationMetadata {
                model: served_by,
                processing_time_ms,
                finish_reason: choice.finish_reason,
                usage,
            },
        })
    }

    async fn check_connection(&self) -> Result<(), UpstreamError> {
        let response = self
            .get(self.probe_path)
            .send()
            .await
            .map_err(transport)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response, None).await)
        }
    }
}

// ─────────────────────────────────────────────
// Factory
// ─────────────────────────────────────────────

/// Builds [`HttpUpstreamClient`]s. The default factory for built-in specs.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpClientFactory;

impl ClientFactory for HttpClientFactory {
    fn build(
        &self,
        spec: &ProviderSpec,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn UpstreamClient>, ProviderError> {
        Ok(Arc::new(HttpUpstreamClient::new(spec, config)?))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::find_by_name;
    use std::collections::HashMap;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_config(api_key: &str, api_base: &str) -> ProviderConfig {
        ProviderConfig {
            api_base: Some(api_base.to_string()),
            ..ProviderConfig::with_api_key(api_key)
        }
    }

    fn openrouter_client(api_key: &str, api_base: &str) -> HttpUpstreamClient {
        let spec = find_by_name("openrouter").unwrap();
        HttpUpstreamClient::new(spec, &make_config(api_key, api_base)).unwrap()
    }

    // ── Unit tests ──

    #[test]
    fn test_url_joins_paths() {
        let client = openrouter_client("key", "https://openrouter.ai/api/v1/");
        assert_eq!(client.url("/models"), "https://openrouter.ai/api/v1/models");
        assert_eq!(client.url("chat/completions"), "https://openrouter.ai/api/v1/chat/completions");
    }

    #[test]
    fn test_identification_headers() {
        let spec = find_by_name("openrouter").unwrap();
        let mut extra = HashMap::new();
        extra.insert("X-Custom".to_string(), "1".to_string());
        extra.insert("bad header".to_string(), "x".to_string());
        let config = ProviderConfig {
            app_name: Some("modelgate".into()),
            app_url: Some("https://example.org".into()),
            extra_headers: Some(extra),
            ..ProviderConfig::with_api_key("key")
        };

        let client = HttpUpstreamClient::new(spec, &config).unwrap();
        assert_eq!(client.headers.get("x-title").unwrap(), "modelgate");
        assert_eq!(client.headers.get("http-referer").unwrap(), "https://example.org");
        assert!(client.headers.contains_key("x-custom"));
        assert_eq!(client.headers.len(), 3);
    }

    #[test]
    fn test_debug_omits_api_key() {
        let client = openrouter_client("sk-or-secret", "https://openrouter.ai/api/v1");
        assert!(!format!("{client:?}").contains("sk-or-secret"));
    }

    #[test]
    fn test_unknown_model_markers() {
        assert!(names_unknown_model(r#"{"error":{"message":"foo/bar is not a valid model ID"}}"#));
        assert!(!names_unknown_model(r#"{"error":{"message":"max_tokens too large"}}"#));
    }

    // ── list_models ──

    #[tokio::test]
    async fn test_list_models_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "id": "a/m1", "name": "M1", "pricing": { "prompt": "0", "completion": "0" } },
                    { "id": "a/m2" }
                ]
            })))
            .mount(&server)
            .await;

        let client = openrouter_client("test-key", &server.uri());
        let models = client.list_models().await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name.as_deref(), Some("M1"));
    }

    #[tokio::test]
    async fn test_list_models_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = openrouter_client("key", &server.uri());
        let err = client.list_models().await.unwrap_err();
        assert_eq!(
            err,
            UpstreamError::Status {
                status: 503,
                body: "overloaded".into()
            }
        );
    }

    #[tokio::test]
    async fn test_list_models_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"data\": [ {\"id\": "))
            .mount(&server)
            .await;

        let client = openrouter_client("key", &server.uri());
        assert!(matches!(client.list_models().await, Err(UpstreamError::Decode(_))));
    }

    #[tokio::test]
    async fn test_list_models_tolerates_mistyped_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "id": "a/m1", "pricing": { "prompt": "0", "completion": "0" } },
                    { "id": "a/m2", "pricing": "n/a" },
                    { "id": "a/m3", "pricing": { "prompt": "free", "completion": null } },
                    { "id": "a/m4", "context_length": "128000", "architecture": "text->text" }
                ]
            })))
            .mount(&server)
            .await;

        let client = openrouter_client("key", &server.uri());
        let models = client.list_models().await.unwrap();
        assert_eq!(models.len(), 4);
        assert!(models[1].pricing.as_ref().unwrap().prompt.is_none());
        assert!(models[2].pricing.as_ref().unwrap().completion.is_none());
        assert_eq!(models[3].context_length, None);
        assert_eq!(models[3].architecture, None);
    }

    #[tokio::test]
    async fn test_api_key_whitespace_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/key"))
            .and(header("Authorization", "Bearer sk-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": {} })))
            .mount(&server)
            .await;

        let client = openrouter_client("  sk-1 \n", &server.uri());
        assert!(client.check_connection().await.is_ok());
    }

    // ── generate ──

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "a/m1",
                "max_tokens": 64,
                "messages": [{ "role": "user", "content": "Hello" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "gen-1",
                "model": "a/m1-2025",
                "choices": [{ "message": { "content": "Hi there" }, "finish_reason": "stop" }],
                "usage": { "prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5 }
            })))
            .mount(&server)
            .await;

        let client = openrouter_client("test-key", &server.uri());
        let options = GenerationOptions {
            max_tokens: Some(64),
            ..Default::default()
        };
        let generation = client.generate("a/m1", "Hello", &options).await.unwrap();

        assert_eq!(generation.content, "Hi there");
        assert_eq!(generation.metadata.model, "a/m1-2025");
        assert_eq!(generation.metadata.finish_reason.as_deref(), Some("stop"));
        assert_eq!(generation.metadata.usage.unwrap().total_tokens, 5);
    }

    #[tokio::test]
    async fn test_generate_unknown_model_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "message": "nonexistent-id is not a valid model ID", "code": 400 }
            })))
            .mount(&server)
            .await;

        let client = openrouter_client("key", &server.uri());
        let err = client
            .generate("nonexistent-id", "hi", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, UpstreamError::ModelNotFound("nonexistent-id".into()));
    }

    #[tokio::test]
    async fn test_generate_unknown_model_404() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = openrouter_client("key", &server.uri());
        let err = client
            .generate("gone/model", "hi", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, UpstreamError::ModelNotFound("gone/model".into()));
    }

    #[tokio::test]
    async fn test_generate_other_400_is_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("max_tokens too large"))
            .mount(&server)
            .await;

        let client = openrouter_client("key", &server.uri());
        let err = client
            .generate("a/m1", "hi", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_generate_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let client = openrouter_client("key", &server.uri());
        let err = client
            .generate("a/m1", "hi", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, UpstreamError::RateLimited { retry_after: Some(7) });
    }

    #[tokio::test]
    async fn test_generate_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "gen-empty",
                "choices": []
            })))
            .mount(&server)
            .await;

        let client = openrouter_client("key", &server.uri());
        let err = client
            .generate("a/m1", "hi", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
    }

    #[tokio::test]
    async fn test_generate_network_error() {
        // Point to a port that's not listening
        let client = openrouter_client("key", "http://127.0.0.1:1");
        let err = client
            .generate("a/m1", "hi", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Transport(_)));
    }

    // ── probe ──

    #[tokio::test]
    async fn test_probe_success_sends_title() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/key"))
            .and(header("X-Title", "modelgate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": {} })))
            .mount(&server)
            .await;

        let spec = find_by_name("openrouter").unwrap();
        let config = ProviderConfig {
            app_name: Some("modelgate".into()),
            ..make_config("key", &server.uri())
        };
        let client = HttpUpstreamClient::new(spec, &config).unwrap();
        assert!(client.check_connection().await.is_ok());
        assert!(client.test_connection().await);
    }

    #[tokio::test]
    async fn test_probe_bad_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/key"))
            .respond_with(ResponseTemplate::new(401).set_body_string("No auth credentials found"))
            .mount(&server)
            .await;

        let client = openrouter_client("bad", &server.uri());
        assert!(matches!(client.check_connection().await, Err(UpstreamError::Auth(_))));
        assert!(!client.test_connection().await);
    }

    #[tokio::test]
    async fn test_probe_unreachable_is_false() {
        let client = openrouter_client("key", "http://127.0.0.1:1");
        assert!(!client.test_connection().await);
    }

    #[test]
    fn test_factory_builds_client() {
        let spec = find_by_name("litellm").unwrap();
        let config = ProviderConfig::with_api_key("key");
        assert!(HttpClientFactory.build(spec, &config).is_ok());
    }
}
