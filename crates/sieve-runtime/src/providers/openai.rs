//! OpenAI chat-completions provider.
//!
//! Works against any OpenAI-compatible endpoint. The HTTP call needs the
//! `openai` feature; building requests and reading replies does not, so both
//! are covered by tests without network access.

#![cfg_attr(not(feature = "openai"), allow(dead_code))]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
#[cfg(feature = "openai")]
use std::time::Duration;

use super::secrets::{ApiCredential, CredentialSource};
use super::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use crate::config::{RuntimeConfig, DEFAULT_BASE_URL};

/// Environment variable holding the API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable holding the optional organization id.
pub const OPENAI_ORG_ENV: &str = "OPENAI_ORG";

const KEY_NAME: &str = "OpenAI API key";
const ORG_NAME: &str = "OpenAI organization";

const FEATURE_REQUIRED: &str = "OpenAI provider requires the 'openai' feature";

pub struct OpenAiProvider {
    credential: ApiCredential,
    organization: Option<ApiCredential>,
    base_url: String,
    #[cfg(feature = "openai")]
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("credential", &self.credential)
            .field("organization", &self.organization)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(
            ApiCredential::new(api_key, CredentialSource::Programmatic, KEY_NAME),
            None,
            DEFAULT_BASE_URL,
        )
    }

    /// Read `OPENAI_API_KEY` and, if set, `OPENAI_ORG`.
    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self::with_credential(
            ApiCredential::from_env(OPENAI_API_KEY_ENV, KEY_NAME)?,
            ApiCredential::from_env_optional(OPENAI_ORG_ENV, ORG_NAME),
            DEFAULT_BASE_URL,
        ))
    }

    /// Credentials from the environment, endpoint from `config`.
    ///
    /// Fails with `NotConfigured` before touching the environment when the
    /// crate was built without the `openai` feature.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, ProviderError> {
        if !cfg!(feature = "openai") {
            return Err(ProviderError::NotConfigured(FEATURE_REQUIRED.to_string()));
        }
        Ok(Self::from_env()?.with_base_url(&config.base_url))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(ApiCredential::new(
            organization,
            CredentialSource::Programmatic,
            ORG_NAME,
        ));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn with_credential(
        credential: ApiCredential,
        organization: Option<ApiCredential>,
        base_url: &str,
    ) -> Self {
        Self {
            credential,
            organization,
            base_url: base_url.trim_end_matches('/').to_string(),
            #[cfg(feature = "openai")]
            client: reqwest::Client::new(),
        }
    }
}

/// Chat-completions request body.
#[derive(Debug, Serialize)]
pub(crate) struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<JsonValue>,
}

impl OpenAiRequest {
    pub(crate) fn new(messages: Vec<ChatMessage>, config: &CompletionConfig) -> Self {
        Self {
            model: config.model.clone(),
            messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            response_format: config.response_format.to_request_value(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    model: String,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

impl OpenAiResponse {
    /// Take the first choice's text. A refusal is an error, not content.
    pub(crate) fn into_completion(self) -> Result<CompletionResponse, ProviderError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("response contained no choices".to_string()))?;

        if let Some(refusal) = choice.message.refusal {
            return Err(ProviderError::Refused(refusal));
        }
        let content = choice.message.content.ok_or_else(|| {
            ProviderError::ParseError("response message had no content".to_string())
        })?;

        let usage = self
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage,
            model: self.model,
            stop_reason: choice.finish_reason,
        })
    }
}

/// Message from an error body, or the body itself when it is not the usual
/// `{"error": {"message": ...}}` shape.
fn error_message(body: &str) -> String {
    serde_json::from_str::<OpenAiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    #[cfg(feature = "openai")]
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = OpenAiRequest::new(messages, config);

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.credential.expose()))
            .header("Content-Type", "application/json")
            .timeout(config.timeout)
            .json(&request);
        if let Some(org) = &self.organization {
            builder = builder.header("OpenAI-Organization", org.expose());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(config.timeout)
            } else {
                ProviderError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::AuthError);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "OpenAI API error");
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let body: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        body.into_completion()
    }

    #[cfg(not(feature = "openai"))]
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::NotConfigured(FEATURE_REQUIRED.to_string()))
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ResponseFormat;

    fn reply(body: serde_json::Value) -> OpenAiResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_request_body_with_schema_format() {
        let config = CompletionConfig {
            model: "gpt-4o-mini".to_string(),
            response_format: ResponseFormat::JsonSchema {
                name: "weather_alert".to_string(),
                schema: serde_json::json!({ "type": "object" }),
                strict: true,
            },
            ..Default::default()
        };
        let request = OpenAiRequest::new(
            vec![
                ChatMessage::system("Reply in JSON."),
                ChatMessage::user("Chicago storms"),
            ],
            &config,
        );
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Chicago storms");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "weather_alert");
    }

    #[test]
    fn test_text_format_omits_response_format() {
        let request = OpenAiRequest::new(vec![ChatMessage::user("hi")], &CompletionConfig::default());
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_reply_content_and_usage() {
        let completion = reply(serde_json::json!({
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "{\"id\": 1}", "refusal": null },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 42, "completion_tokens": 7, "total_tokens": 49 }
        }))
        .into_completion()
        .unwrap();

        assert_eq!(completion.content, "{\"id\": 1}");
        assert_eq!(completion.usage.total(), 49);
        assert_eq!(completion.model, "gpt-4o-mini-2024-07-18");
        assert_eq!(completion.stop_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_refusal_is_an_error() {
        let err = reply(serde_json::json!({
            "model": "gpt-4o",
            "choices": [{
                "message": { "role": "assistant", "content": null, "refusal": "I can't help with that." },
                "finish_reason": "stop"
            }]
        }))
        .into_completion()
        .unwrap_err();
        assert!(matches!(err, ProviderError::Refused(ref r) if r == "I can't help with that."));
    }

    #[test]
    fn test_empty_choices_is_parse_error() {
        let err = reply(serde_json::json!({ "model": "gpt-4o", "choices": [] }))
            .into_completion()
            .unwrap_err();
        assert!(matches!(err, ProviderError::ParseError(_)));
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error": {"message": "Invalid schema for response_format", "type": "invalid_request_error"}}"#;
        assert_eq!(error_message(body), "Invalid schema for response_format");
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret = "sk-proj-super-secret-12345";
        let provider = OpenAiProvider::new(secret).with_organization("org-hidden-777");
        let debug = format!("{:?}", provider);
        assert!(!debug.contains(secret), "API key was exposed in Debug output!");
        assert!(!debug.contains("org-hidden-777"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = OpenAiProvider::new("k").with_base_url("http://localhost:8080/v1/");
        assert_eq!(provider.base_url(), "http://localhost:8080/v1");
        assert_eq!(provider.name(), "openai");
    }

    #[tokio::test]
    async fn test_health_check_requires_key() {
        assert!(OpenAiProvider::new("sk-test").health_check().await);
        assert!(!OpenAiProvider::new("").health_check().await);
    }

    #[cfg(not(feature = "openai"))]
    #[tokio::test]
    async fn test_complete_without_feature_is_not_configured() {
        let err = OpenAiProvider::new("sk-test")
            .complete(vec![ChatMessage::user("hi")], &CompletionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[cfg(not(feature = "openai"))]
    #[test]
    fn test_from_config_without_feature_names_the_feature() {
        let err = OpenAiProvider::from_config(&RuntimeConfig::default()).unwrap_err();
        match err {
            ProviderError::NotConfigured(message) => assert!(message.contains("'openai' feature")),
            other => panic!("expected NotConfigured, got {:?}", other),
        }
    }
}
