//! # sieve-runtime
//!
//! Optional model-calling layer for Sieve.
//!
//! Validation lives in `sieve-core` and never touches the network. This
//! crate asks an OpenAI-compatible endpoint for structured output and feeds
//! every reply through that validator before handing anything back.
//!
//! The HTTP client is behind the `openai` feature. Without it
//! [`OpenAiProvider`] reports itself as not configured, while prompts,
//! request building and the validation flow still work against any
//! [`LlmProvider`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use sieve_runtime::{OpenAiProvider, RuntimeConfig, StructuredClient, StructuredTask};
//! use sieve_core::WeatherAlert;
//!
//! let config = RuntimeConfig::default();
//! let provider = Arc::new(OpenAiProvider::from_config(&config)?);
//! let client = StructuredClient::new(provider, config);
//!
//! let reply = client
//!     .request(&StructuredTask::weather_alert("a severe thunderstorm in Chicago"))
//!     .await?;
//! let alert: WeatherAlert = reply.into_typed()?;
//! ```

pub mod config;
pub mod prompts;
pub mod providers;
pub mod structured;

pub use config::{ConfigError, OutputMode, RuntimeConfig, DEFAULT_BASE_URL};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, CompletionResponse, CredentialSource,
    LlmProvider, OpenAiProvider, ProviderError, ResponseFormat, TokenUsage, OPENAI_API_KEY_ENV,
    OPENAI_ORG_ENV,
};
pub use structured::{ModeComparison, ModeSummary, StructuredClient, StructuredReply, StructuredTask};

use sieve_core::{ResponseError, SchemaError};
use thiserror::Error;

/// Errors from the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Provider call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Schema cannot be requested: {0}")]
    Schema(#[from] SchemaError),

    /// The reply was rejected; see [`ResponseError::is_parse`]
    #[error("Reply rejected: {0}")]
    Response(#[from] ResponseError),
}

impl RuntimeError {
    /// Whether asking again could help: the model answered, but badly.
    pub fn is_reply_error(&self) -> bool {
        matches!(self, RuntimeError::Response(_))
    }
}
