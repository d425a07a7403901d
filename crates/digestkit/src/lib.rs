//! DigestKit - scrape investment content and digest it with an LLM
//!
//! This crate drives a browser to capture investment reports and portfolio
//! tables as HTML, then converts them into Markdown summaries and CSV files
//! through an interchangeable text-generation backend.
//!
//! ## Pipeline
//!
//! Every stage hands off through the filesystem:
//!
//! ```text
//! browser ─► raw HTML ─► Markdown ─► CSV
//!   sites      jobs        jobs
//! ```
//!
//! - [`sites`] script the source sites through a [`BrowserSession`]
//! - [`StagedConverter`] renders a fixed instruction per [`Stage`] and
//!   shapes the [`Backend`] answer
//! - [`BatchDriver`] runs a stage over a directory, skipping inputs whose
//!   output already exists and isolating per-item failures
//!
//! Built-in backends:
//! - [`OpenAiBackend`] - chat completions with native JSON mode
//! - [`AnthropicBackend`] - messages API, JSON recovered from text

pub mod archive;
mod artifact;
pub mod backends;
mod batch;
pub mod browser;
mod clean;
mod config;
mod converter;
mod error;
mod identity;
pub mod jobs;
pub mod sites;
mod types;

pub use artifact::{
    creation_date, date_stamp, write_whole_file, Artifact, ArtifactKind, CollisionPolicy,
    WriteOutcome,
};
pub use backends::{AnthropicBackend, Backend, OpenAiBackend, Provider};
pub use batch::{
    BatchDriver, BatchItem, BatchReport, CompletionRule, FsLedger, InputSelection, ItemOutput,
    ItemReport, ItemStatus, MemoryLedger, StatusLedger,
};
pub use browser::{
    BrowserSession, Capture, ChromeSession, ContentExtractor, ElementRef, Locator, Pacing,
    WindowHandle,
};
pub use clean::{clean_html, strip_attributes};
pub use config::{Credentials, Settings, SettingsBuilder};
pub use converter::{parse_structured, strip_code_fence, Stage, StagedConverter};
pub use error::{BackendError, BrowserError, PipelineError};
pub use identity::{base_name, derive_identity, is_uncertain, mark_uncertain, UNCERTAIN_PREFIX};
pub use types::{
    BackendResponse, Classification, GenerateOptions, GenerateRequest, ReportSummary, TaskKind,
};
