//! Text-generation backends
//!
//! Design: every provider implements [`Backend`]. Stage and batch code only
//! see the trait, so providers are interchangeable behind the `--provider`
//! flag.

mod anthropic;
mod openai;

pub use anthropic::AnthropicBackend;
pub use openai::OpenAiBackend;

use crate::config::Settings;
use crate::error::BackendError;
use crate::types::{GenerateOptions, GenerateRequest, TaskKind};
use async_trait::async_trait;
use std::str::FromStr;
use std::time::Duration;

/// Whole-request timeout; large spreadsheets take minutes to generate
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Connect timeout
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest error body kept in [`BackendError::HttpStatus`]
const ERROR_BODY_LIMIT: usize = 500;

/// A service that turns an instruction into generated text
#[async_trait]
pub trait Backend: Send + Sync {
    /// Identifier for logging
    fn name(&self) -> &'static str;

    /// True if the backend can be asked for a JSON object answer directly
    fn supports_structured_output(&self) -> bool;

    /// Default model, temperature and output size for a kind of task
    fn default_options(&self, kind: TaskKind) -> GenerateOptions;

    /// Submit one instruction and return the generated text
    async fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError>;
}

/// Backend provider selected on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Provider {
    /// OpenAI chat completions
    #[default]
    OpenAi,
    /// Anthropic messages
    Claude,
}

impl Provider {
    /// Build the backend for this provider from settings
    pub fn backend(&self, settings: &Settings) -> Result<Box<dyn Backend>, BackendError> {
        match self {
            Provider::OpenAi => {
                let key = settings
                    .openai_api_key
                    .clone()
                    .ok_or(BackendError::MissingApiKey("OPENAI_API_KEY"))?;
                Ok(Box::new(OpenAiBackend::new(key, &settings.openai_base_url)?))
            }
            Provider::Claude => {
                let key = settings
                    .anthropic_api_key
                    .clone()
                    .ok_or(BackendError::MissingApiKey("ANTHROPIC_API_KEY"))?;
                Ok(Box::new(AnthropicBackend::new(
                    key,
                    &settings.anthropic_base_url,
                )?))
            }
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "claude" | "anthropic" => Ok(Provider::Claude),
            other => Err(BackendError::UnknownProvider(other.to_string()).to_string()),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Claude => write!(f, "claude"),
        }
    }
}

/// Build the shared HTTP client for a backend
pub(crate) fn build_client() -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(BackendError::ClientBuildError)
}

/// Turn a non-success response into [`BackendError::HttpStatus`]
pub(crate) async fn status_error(response: reqwest::Response) -> BackendError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    BackendError::HttpStatus { status, body }
}

/// Join an API root and an endpoint without doubling slashes
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
