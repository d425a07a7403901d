//! Error types for DigestKit

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a text-generation backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// No API key configured for the selected provider
    #[error("Missing API key: set {0}")]
    MissingApiKey(&'static str),

    /// Unknown provider flag
    #[error("Unknown provider '{0}': expected openai or claude")]
    UnknownProvider(String),

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuildError(#[source] reqwest::Error),

    /// Backend did not answer in time
    #[error("Request timed out waiting for the backend")]
    Timeout,

    /// Failed to connect to backend
    #[error("Failed to connect to backend")]
    ConnectError(#[source] reqwest::Error),

    /// Other transport error
    #[error("Request failed: {0}")]
    RequestError(String),

    /// Backend answered with a non-success status (rate limits included)
    #[error("Backend returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Response body is not the documented envelope
    #[error("Unexpected response envelope: {0}")]
    InvalidEnvelope(String),

    /// Envelope parsed but carried no generated text
    #[error("Backend returned no content")]
    EmptyCompletion,
}

impl BackendError {
    /// Create an error from a reqwest error
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_connect() {
            BackendError::ConnectError(err)
        } else {
            BackendError::RequestError(err.to_string())
        }
    }
}

/// Errors raised while driving a browser session
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Browser process could not be started
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// Bounded wait elapsed
    #[error("Timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    /// Element detached between lookup and use
    #[error("Stale element: {0}")]
    StaleElement(String),

    /// Another element would receive the click
    #[error("Click intercepted on {0}")]
    ClickIntercepted(String),

    /// Window or tab is gone
    #[error("No such window: {0}")]
    NoSuchWindow(String),

    /// Navigation failed
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Script evaluation failed or returned an unexpected value
    #[error("Script evaluation failed: {0}")]
    Script(String),
}

/// Top-level error for pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Text-generation backend failure
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Browser automation failure
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// Filesystem failure
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input directory does not exist
    #[error("Input not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// Structured response could not be parsed, natively or by brace extraction
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    /// Archive could not be written
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}
