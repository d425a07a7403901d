//! OpenAI chat-completions backend

use super::{build_client, endpoint, status_error, Backend};
use crate::error::BackendError;
use crate::types::{GenerateOptions, GenerateRequest, TaskKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI backend
///
/// Uses `response_format: json_object` when structured output is requested.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiBackend {
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
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl Backend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn supports_structured_output(&self) -> bool {
        true
    }

    fn default_options(&self, kind: TaskKind) -> GenerateOptions {
        match kind {
            TaskKind::Analysis => GenerateOptions {
                model: DEFAULT_MODEL.to_string(),
                temperature: 0.7,
                max_tokens: 4096,
                structured: true,
            },
            TaskKind::Spreadsheet => GenerateOptions {
                model: DEFAULT_MODEL.to_string(),
                temperature: 0.0,
                max_tokens: 16384,
                structured: false,
            },
        }
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError> {
        let body = ChatRequest {
            model: &request.options.model,
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.instruction,
                },
            ],
            response_format: request.options.structured.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        tracing::debug!(model = %request.options.model, "Sending chat completion");

        let response = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(BackendError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidEnvelope(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(BackendError::EmptyCompletion)
    }
}
