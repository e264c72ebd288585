//! Structured requests: prompt a model, then validate what comes back.
//!
//! The client never trusts the reply. Even in strict JSON Schema mode the
//! raw text goes through [`Outcome::assess`] before anything typed is
//! produced.

use chrono::{DateTime, Utc};
use sieve_core::{
    catalog, DegradePolicy, Outcome, ResponseError, SchemaDescriptor, SchemaError,
    StructuredRecord, ValidatedRecord,
};
use std::fmt;
use std::sync::Arc;

use crate::config::{OutputMode, RuntimeConfig};
use crate::prompts;
use crate::providers::{ChatMessage, LlmProvider, ProviderError, ResponseFormat, TokenUsage};
use crate::RuntimeError;

/// A descriptor plus the messages that ask for a matching reply.
#[derive(Debug, Clone)]
pub struct StructuredTask {
    pub schema: SchemaDescriptor,
    pub messages: Vec<ChatMessage>,
}

impl StructuredTask {
    pub fn new(schema: SchemaDescriptor, messages: Vec<ChatMessage>) -> Self {
        Self { schema, messages }
    }

    /// Weather alert for a situation, e.g. "a severe thunderstorm in Chicago".
    pub fn weather_alert(situation: &str) -> Self {
        let schema = catalog::weather_alert().clone();
        let messages = vec![
            ChatMessage::system(prompts::system_prompt(&schema)),
            ChatMessage::user(prompts::weather_alert_prompt(situation)),
        ];
        Self::new(schema, messages)
    }

    pub fn tech_analysis(concept: &str) -> Self {
        let schema = catalog::tech_analysis().clone();
        let messages = vec![
            ChatMessage::system(prompts::system_prompt(&schema)),
            ChatMessage::user(prompts::tech_analysis_prompt(concept)),
        ];
        Self::new(schema, messages)
    }

    /// Exam study notes summarizing `content`.
    pub fn study_notes(content: &str) -> Self {
        let schema = catalog::note_collection().clone();
        let system = format!(
            "{}\n\n{}",
            prompts::study_notes_prompt(content, catalog::MAX_NOTES),
            prompts::field_guide(&schema)
        );
        let messages = vec![
            ChatMessage::system(system),
            ChatMessage::user(prompts::STUDY_NOTES_REQUEST),
        ];
        Self::new(schema, messages)
    }
}

/// A model reply and what validation made of it.
#[derive(Debug, Clone)]
pub struct StructuredReply {
    /// Text exactly as the model returned it
    pub raw: String,
    pub outcome: Outcome,
    pub usage: TokenUsage,
    pub model: String,
    pub mode: OutputMode,
    pub received_at: DateTime<Utc>,
}

impl StructuredReply {
    pub fn record(&self) -> Option<&ValidatedRecord> {
        self.outcome.record()
    }

    /// Convert to a typed record. Degraded replies return their error.
    pub fn into_typed<T: StructuredRecord>(self) -> Result<T, RuntimeError> {
        match self.outcome {
            Outcome::Validated(record) => Ok(T::from_record(record).map_err(ResponseError::from)?),
            Outcome::Degraded { error, .. } => Err(ResponseError::from(error).into()),
            Outcome::Unstructured { error, .. } => Err(ResponseError::from(error).into()),
        }
    }

    pub fn violation_count(&self) -> usize {
        match &self.outcome {
            Outcome::Degraded { error, .. } => error.violations.len(),
            _ => 0,
        }
    }
}

/// One line of a [`ModeComparison`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSummary {
    pub mode: OutputMode,
    /// `validated`, `degraded` or `unstructured`
    pub outcome: &'static str,
    pub violations: usize,
    pub total_tokens: u32,
}

impl fmt::Display for ModeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<12} {}", self.mode.as_str(), self.outcome)?;
        if self.violations > 0 {
            write!(f, " ({} violations)", self.violations)?;
        }
        write!(f, ", {} tokens", self.total_tokens)
    }
}

/// The same task sent once in JSON-object mode and once with a strict schema.
#[derive(Debug, Clone)]
pub struct ModeComparison {
    pub json_object: StructuredReply,
    pub json_schema: StructuredReply,
}

impl ModeComparison {
    pub fn summaries(&self) -> [ModeSummary; 2] {
        [summarize(&self.json_object), summarize(&self.json_schema)]
    }

    pub fn both_validated(&self) -> bool {
        self.json_object.outcome.is_validated() && self.json_schema.outcome.is_validated()
    }
}

fn summarize(reply: &StructuredReply) -> ModeSummary {
    ModeSummary {
        mode: reply.mode,
        outcome: reply.outcome.label(),
        violations: reply.violation_count(),
        total_tokens: reply.usage.total(),
    }
}

/// Sends structured tasks to a provider and validates the replies.
pub struct StructuredClient {
    provider: Arc<dyn LlmProvider>,
    config: RuntimeConfig,
}

impl StructuredClient {
    pub fn new(provider: Arc<dyn LlmProvider>, config: RuntimeConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// `response_format` for `schema` in `mode`.
    ///
    /// Strict mode compiles the exported JSON Schema first so a broken
    /// descriptor fails here rather than at the API.
    pub fn response_format(
        schema: &SchemaDescriptor,
        mode: OutputMode,
    ) -> Result<ResponseFormat, SchemaError> {
        match mode {
            OutputMode::JsonObject => Ok(ResponseFormat::JsonObject),
            OutputMode::JsonSchema => {
                schema.compile_json_schema(true)?;
                let mut exported = schema.to_json_schema(true);
                if let Some(object) = exported.as_object_mut() {
                    object.remove("$schema");
                }
                Ok(ResponseFormat::JsonSchema {
                    name: schema.name.clone(),
                    schema: exported,
                    strict: true,
                })
            }
        }
    }

    /// Run `task` with the configured mode and policy.
    pub async fn request(&self, task: &StructuredTask) -> Result<StructuredReply, RuntimeError> {
        self.run(task, self.config.mode, self.config.policy).await
    }

    pub async fn request_with_mode(
        &self,
        task: &StructuredTask,
        mode: OutputMode,
    ) -> Result<StructuredReply, RuntimeError> {
        self.run(task, mode, self.config.policy).await
    }

    /// Send `task` in both modes. Validation failures are kept as degraded
    /// outcomes so both replies can be reported; provider errors still fail.
    pub async fn compare_modes(&self, task: &StructuredTask) -> Result<ModeComparison, RuntimeError> {
        let json_object = self
            .run(task, OutputMode::JsonObject, DegradePolicy::Degrade)
            .await?;
        let json_schema = self
            .run(task, OutputMode::JsonSchema, DegradePolicy::Degrade)
            .await?;
        Ok(ModeComparison {
            json_object,
            json_schema,
        })
    }

    async fn run(
        &self,
        task: &StructuredTask,
        mode: OutputMode,
        policy: DegradePolicy,
    ) -> Result<StructuredReply, RuntimeError> {
        let format = Self::response_format(&task.schema, mode)?;
        let completion_config = self.config.completion_config(format);
        let timeout = self.config.timeout;

        tracing::info!(
            provider = self.provider.name(),
            schema = %task.schema.name,
            mode = mode.as_str(),
            model = %self.config.model,
            "Requesting structured reply"
        );

        let call = self.provider.complete(task.messages.clone(), &completion_config);
        let response = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(provider = self.provider.name(), error = %e, "Completion failed");
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(provider = self.provider.name(), timeout = ?timeout, "Completion timed out");
                return Err(ProviderError::Timeout(timeout).into());
            }
        };

        let outcome = Outcome::assess(&response.content, &task.schema, policy).inspect_err(|e| {
            tracing::warn!(schema = %task.schema.name, error = %e, "Reply rejected");
        })?;

        tracing::info!(
            schema = %task.schema.name,
            outcome = outcome.label(),
            tokens = response.usage.total(),
            "Structured reply received"
        );

        Ok(StructuredReply {
            raw: response.content,
            outcome,
            usage: response.usage,
            model: response.model,
            mode,
            received_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CompletionConfig, CompletionResponse};
    use async_trait::async_trait;
    use sieve_core::{NoteCollection, Severity, WeatherAlert};
    use std::sync::Mutex;
    use std::time::Duration;

    const ALERT: &str = r#"{"location": "Chicago", "severity": "high", "alert_type": "Severe Thunderstorm Warning",
        "description": "Storms with 70 mph gusts.", "advice": "Stay indoors.", "expires_at": null}"#;

    /// Replies with canned text per call and records each request config.
    struct MockProvider {
        replies: Mutex<Vec<String>>,
        seen: Mutex<Vec<CompletionConfig>>,
        delay: Option<Duration>,
    }

    impl MockProvider {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        fn formats(&self) -> Vec<ResponseFormat> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.response_format.clone())
                .collect()
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.seen.lock().unwrap().push(config.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let content = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ProviderError::HttpError("no reply queued".to_string()))?;
            Ok(CompletionResponse {
                content,
                usage: TokenUsage {
                    prompt_tokens: 20,
                    completion_tokens: 10,
                },
                model: "mock-model".to_string(),
                stop_reason: Some("stop".to_string()),
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn client(provider: MockProvider, config: RuntimeConfig) -> (StructuredClient, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        (StructuredClient::new(provider.clone(), config), provider)
    }

    #[tokio::test]
    async fn test_request_validates_reply() {
        let (client, provider) = client(MockProvider::new(&[ALERT]), RuntimeConfig::default());

        let reply = client
            .request(&StructuredTask::weather_alert("a severe thunderstorm in Chicago"))
            .await
            .unwrap();

        assert!(reply.outcome.is_validated());
        assert_eq!(reply.model, "mock-model");
        assert_eq!(reply.usage.total(), 30);
        assert_eq!(reply.mode, OutputMode::JsonSchema);

        match &provider.formats()[0] {
            ResponseFormat::JsonSchema { name, schema, strict } => {
                assert_eq!(name, "weather_alert");
                assert!(*strict);
                assert!(schema.get("$schema").is_none());
                assert_eq!(schema["additionalProperties"], false);
            }
            other => panic!("expected json_schema format, got {:?}", other),
        }

        let alert: WeatherAlert = reply.into_typed().unwrap();
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.expires_at, None);
    }

    #[tokio::test]
    async fn test_strict_policy_surfaces_validation_error() {
        let (client, _) = client(
            MockProvider::new(&[r#"{"location": "Chicago", "severity": "apocalyptic"}"#]),
            RuntimeConfig::default().with_mode(OutputMode::JsonObject),
        );

        let err = client
            .request(&StructuredTask::weather_alert("a blizzard in Denver"))
            .await
            .unwrap_err();

        match err {
            RuntimeError::Response(e) => {
                assert!(e.is_validation());
                assert_eq!(e.violations()[0].path, "severity");
            }
            other => panic!("expected response error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_degrade_policy_keeps_reply() {
        let config = RuntimeConfig::default().with_policy(DegradePolicy::Degrade);
        let (client, _) = client(MockProvider::new(&["Sorry, I can only answer in prose."]), config);

        let reply = client
            .request_with_mode(&StructuredTask::tech_analysis("Rust lifetimes"), OutputMode::JsonObject)
            .await
            .unwrap();

        assert_eq!(reply.outcome.label(), "unstructured");
        assert_eq!(reply.raw, "Sorry, I can only answer in prose.");
        let err = reply.into_typed::<sieve_core::TechAnalysis>().unwrap_err();
        assert!(matches!(err, RuntimeError::Response(ref e) if e.is_parse()));
    }

    #[tokio::test]
    async fn test_compare_modes() {
        let loose = r#"{"location": "Chicago", "severity": "severe", "description": "Storms"}"#;
        let (client, provider) = client(MockProvider::new(&[loose, ALERT]), RuntimeConfig::default());

        let comparison = client
            .compare_modes(&StructuredTask::weather_alert("a severe thunderstorm in Chicago"))
            .await
            .unwrap();

        assert!(!comparison.both_validated());
        let [object, schema] = comparison.summaries();
        assert_eq!(object.mode, OutputMode::JsonObject);
        assert_eq!(object.outcome, "degraded");
        assert_eq!(object.violations, 4);
        assert_eq!(schema.outcome, "validated");
        assert_eq!(schema.to_string(), "json_schema  validated, 30 tokens");
        assert_eq!(
            object.to_string(),
            "json_object  degraded (4 violations), 30 tokens"
        );

        let formats = provider.formats();
        assert_eq!(formats[0], ResponseFormat::JsonObject);
        assert!(matches!(formats[1], ResponseFormat::JsonSchema { .. }));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let (client, _) = client(MockProvider::new(&[]), RuntimeConfig::default());
        let err = client
            .request(&StructuredTask::study_notes("Limits and continuity."))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Provider(ProviderError::HttpError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let mut provider = MockProvider::new(&[ALERT]);
        provider.delay = Some(Duration::from_secs(60));
        let (client, _) = client(provider, RuntimeConfig::default());

        let err = client
            .request(&StructuredTask::weather_alert("fog in London"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Provider(ProviderError::Timeout(d)) if d == Duration::from_secs(30)
        ));
    }

    #[tokio::test]
    async fn test_study_notes_round_trip() {
        let reply = r#"{"notes": [
            {"id": 1, "heading": "Limits", "summary": "The value f(x) approaches as x approaches a.", "page_ref": 3},
            {"id": 2, "heading": "Derivatives", "summary": "Instantaneous rate of change.", "page_ref": null}
        ]}"#;
        let (client, _) = client(MockProvider::new(&[reply]), RuntimeConfig::default());

        let notes: NoteCollection = client
            .request(&StructuredTask::study_notes("Calculus basics"))
            .await
            .unwrap()
            .into_typed()
            .unwrap();
        assert_eq!(notes.notes.len(), 2);
        assert_eq!(notes.notes[0].page_ref, Some(3));
    }

    #[test]
    fn test_task_messages() {
        let task = StructuredTask::study_notes("Derivatives measure change.");
        assert_eq!(task.schema.name, "note_collection");
        assert_eq!(task.messages.len(), 2);
        assert!(task.messages[0].content.contains("Derivatives measure change."));
        assert!(task.messages[0].content.contains("each note has:"));
        assert_eq!(task.messages[1].content, prompts::STUDY_NOTES_REQUEST);

        let task = StructuredTask::tech_analysis("Async/Await in Python");
        assert_eq!(task.messages[0].role, "system");
        assert!(task.messages[1].content.contains("Async/Await in Python"));
    }

    #[test]
    fn test_response_format_json_object() {
        let format =
            StructuredClient::response_format(catalog::note(), OutputMode::JsonObject).unwrap();
        assert_eq!(format, ResponseFormat::JsonObject);
    }
}
