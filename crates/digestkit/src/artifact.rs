//! Artifacts: immutable pipeline payloads persisted as whole files

use crate::error::PipelineError;
use chrono::{DateTime, Local, NaiveDate};
use std::fs::Metadata;
use std::path::{Path, PathBuf};

/// Pipeline stage an artifact belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Captured page markup
    RawHtml,
    /// Backend-produced Markdown
    Markdown,
    /// Backend-produced CSV
    Csv,
}

impl ArtifactKind {
    /// File extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::RawHtml => "html",
            ArtifactKind::Markdown => "md",
            ArtifactKind::Csv => "csv",
        }
    }

    /// Kind implied by a file name; anything but HTML or CSV is Markdown
    pub fn from_name(name: &str) -> Self {
        let extension = Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if extension == "htm" {
            return ArtifactKind::RawHtml;
        }
        [ArtifactKind::RawHtml, ArtifactKind::Csv]
            .into_iter()
            .find(|kind| kind.extension() == extension)
            .unwrap_or(ArtifactKind::Markdown)
    }
}

/// What to do when an artifact's file already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Keep the existing file and report [`WriteOutcome::Kept`]
    #[default]
    Keep,
    /// Replace the existing file
    Overwrite,
}

/// Result of persisting an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// File written
    Written(PathBuf),
    /// File already existed and was left alone
    Kept(PathBuf),
}

impl WriteOutcome {
    /// Path of the file on disk
    pub fn path(&self) -> &Path {
        match self {
            WriteOutcome::Written(p) | WriteOutcome::Kept(p) => p,
        }
    }
}

/// One unit of content at one pipeline stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File name, derived from the source URL or input name
    pub name: String,
    /// Pipeline stage
    pub kind: ArtifactKind,
    /// UTF-8 content
    pub payload: String,
}

impl Artifact {
    /// Create an artifact
    pub fn new(name: impl Into<String>, kind: ArtifactKind, payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            payload: payload.into(),
        }
    }

    /// Write the artifact into `dir` as one whole file
    pub async fn persist(
        &self,
        dir: &Path,
        policy: CollisionPolicy,
    ) -> Result<WriteOutcome, PipelineError> {
        write_whole_file(dir, &self.name, &self.payload, policy).await
    }
}

/// Write `content` to `dir/name`, creating `dir` if needed
///
/// The content is written to a temporary sibling and renamed into place, so
/// readers never observe a partial file.
pub async fn write_whole_file(
    dir: &Path,
    name: &str,
    content: &str,
    policy: CollisionPolicy,
) -> Result<WriteOutcome, PipelineError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| PipelineError::io(dir, e))?;

    let path = dir.join(name);
    if policy == CollisionPolicy::Keep && tokio::fs::try_exists(&path).await.unwrap_or(false) {
        tracing::warn!(file = %path.display(), "Artifact already exists, keeping it");
        return Ok(WriteOutcome::Kept(path));
    }

    let partial = dir.join(format!(".{}.partial", name));
    tokio::fs::write(&partial, content)
        .await
        .map_err(|e| PipelineError::io(&partial, e))?;
    tokio::fs::rename(&partial, &path)
        .await
        .map_err(|e| PipelineError::io(&path, e))?;

    Ok(WriteOutcome::Written(path))
}

/// Local calendar day a file was created
///
/// Falls back to the modification time on filesystems without birth time.
pub fn creation_date(metadata: &Metadata) -> Option<NaiveDate> {
    let time = metadata.created().or_else(|_| metadata.modified()).ok()?;
    Some(DateTime::<Local>::from(time).date_naive())
}

/// Date formatted the way artifact names embed it
pub fn date_stamp(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
