//! Core types shared by backends and the staged converter

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Label used when a structured record carries no usable classification
pub const UNDETERMINED_LABEL: &str = "nd";

/// Kind of work a request performs; backends pick their defaults from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Free-form analysis returning a structured record
    Analysis,
    /// Meticulous tabular conversion returning raw text
    Spreadsheet,
}

/// Sampling and sizing options for one generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    /// Target model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum number of output tokens
    pub max_tokens: u32,
    /// Ask the backend for a JSON object answer
    pub structured: bool,
}

/// Uniform request submitted to any backend
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// System prompt framing the persona
    pub system: String,
    /// Rendered instruction, payload included
    pub instruction: String,
    /// Generation options
    pub options: GenerateOptions,
}

/// Backend answer after structure extraction
#[derive(Debug, Clone, PartialEq)]
pub enum BackendResponse {
    /// A JSON object was recovered from the answer
    Structured(Map<String, Value>),
    /// No structure could be recovered; the raw answer
    Text(String),
}

/// Classification of a report summary, used as output filename prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// The report recommends buying, selling or rebalancing something
    HasRecommendation,
    /// Summary only
    NoRecommendation,
    /// Label missing or outside the vocabulary
    Undetermined,
}

impl Classification {
    /// Filename prefix for this classification
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::HasRecommendation => "com-recomendacao",
            Classification::NoRecommendation => "sem-recomendacao",
            Classification::Undetermined => UNDETERMINED_LABEL,
        }
    }
}

impl FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "com-recomendacao" => Ok(Classification::HasRecommendation),
            "sem-recomendacao" => Ok(Classification::NoRecommendation),
            UNDETERMINED_LABEL => Ok(Classification::Undetermined),
            other => Err(format!("Unknown classification label: {}", other)),
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured answer of the report summarization stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportSummary {
    /// "com-recomendacao" or "sem-recomendacao"
    #[serde(rename = "fileNamePrefix", default)]
    pub file_name_prefix: String,

    /// Markdown body
    #[serde(default)]
    pub result: String,
}

impl ReportSummary {
    /// Build a summary from a structured backend record
    ///
    /// Missing keys default: the label to [`UNDETERMINED_LABEL`], the body to empty.
    pub fn from_record(record: &Map<String, Value>) -> Self {
        let file_name_prefix = record
            .get("fileNamePrefix")
            .and_then(Value::as_str)
            .unwrap_or(UNDETERMINED_LABEL)
            .to_string();
        let result = match record.get("result") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Self {
            file_name_prefix,
            result,
        }
    }

    /// Classification parsed from the label; off-vocabulary labels are undetermined
    pub fn classification(&self) -> Classification {
        self.file_name_prefix
            .parse()
            .unwrap_or(Classification::Undetermined)
    }
}
