//! Anthropic messages backend

use super::{build_client, endpoint, status_error, Backend};
use crate::error::BackendError;
use crate::types::{GenerateOptions, GenerateRequest, TaskKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const API_VERSION: &str = "2023-06-01";

/// Appended to the system prompt when a JSON answer is wanted
const JSON_ONLY_SUFFIX: &str = " Respond only in JSON.";

/// Anthropic backend
///
/// Has no native JSON mode; structured requests are steered through the
/// system prompt and recovered by the converter's brace extraction.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicBackend {
    /// Create a backend for the given key and API root
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_client()?,
            api_key: api_key.into(),
            base_url: base_url.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl Backend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn supports_structured_output(&self) -> bool {
        false
    }

    fn default_options(&self, kind: TaskKind) -> GenerateOptions {
        match kind {
            TaskKind::Analysis => GenerateOptions {
                model: DEFAULT_MODEL.to_string(),
                temperature: 0.7,
                max_tokens: 8192,
                structured: true,
            },
            TaskKind::Spreadsheet => GenerateOptions {
                model: DEFAULT_MODEL.to_string(),
                temperature: 0.0,
                max_tokens: 8192,
                structured: false,
            },
        }
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError> {
        let mut system = request.system.clone();
        if request.options.structured {
            system.push_str(JSON_ONLY_SUFFIX);
        }

        let body = MessagesRequest {
            model: &request.options.model,
            max_tokens: request.options.max_tokens,
            temperature: request.options.temperature,
            system,
            messages: [Message {
                role: "user",
                content: &request.instruction,
            }],
        };

        tracing::debug!(model = %request.options.model, "Sending message");

        let response = self
            .client
            .post(endpoint(&self.base_url, "messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(BackendError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidEnvelope(e.to_string()))?;

        parsed
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .and_then(|block| block.text)
            .filter(|text| !text.is_empty())
            .ok_or(BackendError::EmptyCompletion)
    }
}
