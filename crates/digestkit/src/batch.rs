//! Idempotent batch driver
//!
//! Design: a batch enumerates input files, asks a [`StatusLedger`] whether
//! each one is already complete, converts the rest one at a time and
//! records a status per item. A failing item is logged and recorded; it
//! never stops the batch. The next run retries it because completion is
//! judged on outputs, not on attempts.

use crate::artifact::{creation_date, Artifact, ArtifactKind, CollisionPolicy, WriteOutcome};
use crate::error::PipelineError;
use crate::identity::{base_name, is_uncertain};
use chrono::{Local, NaiveDate};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Predicate selecting input files from a directory
#[derive(Debug, Clone, Default)]
pub struct InputSelection {
    extension: Option<String>,
    created_on: Option<NaiveDate>,
    name_suffix: Option<String>,
}

impl InputSelection {
    /// Select every regular, non-hidden file
    pub fn new() -> Self {
        Self::default()
    }

    /// Require this extension (without the dot, case-insensitive)
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into().to_lowercase());
        self
    }

    /// Require the file to have been created on this day
    pub fn created_on(mut self, date: NaiveDate) -> Self {
        self.created_on = Some(date);
        self
    }

    /// Require the file name to end with this suffix
    pub fn name_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.name_suffix = Some(suffix.into());
        self
    }

    fn matches(&self, path: &Path, metadata: &std::fs::Metadata) -> bool {
        if !metadata.is_file() {
            return false;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if name.starts_with('.') {
            return false;
        }

        if let Some(ref ext) = self.extension {
            let actual = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if &actual != ext {
                return false;
            }
        }

        if let Some(ref suffix) = self.name_suffix {
            if !name.ends_with(suffix.as_str()) {
                return false;
            }
        }

        if let Some(date) = self.created_on {
            if creation_date(metadata) != Some(date) {
                return false;
            }
        }

        true
    }
}

/// Processing status of one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    /// Selected, not yet attempted
    Pending,
    /// Output written
    Done { output: PathBuf },
    /// Output already existed
    Skipped,
    /// Attempt failed; the reason is the error's display text
    Failed(String),
}

/// Per-identity status record and completion check
pub trait StatusLedger {
    /// True if the output for `identity` already exists
    fn is_complete(&self, identity: &str) -> bool;

    /// Record the latest status of `identity`
    fn record(&mut self, identity: &str, status: ItemStatus);

    /// Latest recorded status of `identity`
    fn status(&self, identity: &str) -> Option<&ItemStatus>;
}

/// How an output directory proves an input was processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionRule {
    /// Some `{label}-{identity}.{extension}` exists, whatever the label
    AnyLabel { extension: String },
    /// `{identity}{suffix}` exists
    Exact { suffix: String },
    /// This exact file name exists
    Fixed(String),
}

/// Ledger backed by the output directory
#[derive(Debug)]
pub struct FsLedger {
    dir: PathBuf,
    rule: CompletionRule,
    statuses: HashMap<String, ItemStatus>,
}

impl FsLedger {
    /// Create a ledger over an output directory
    pub fn new(dir: impl Into<PathBuf>, rule: CompletionRule) -> Self {
        Self {
            dir: dir.into(),
            rule,
            statuses: HashMap::new(),
        }
    }

    fn output_exists(&self, identity: &str) -> bool {
        match &self.rule {
            CompletionRule::AnyLabel { extension } => {
                let suffix = format!("-{}.{}", identity, extension);
                match std::fs::read_dir(&self.dir) {
                    Ok(entries) => entries
                        .flatten()
                        .any(|e| e.file_name().to_string_lossy().ends_with(&suffix)),
                    Err(_) => false,
                }
            }
            CompletionRule::Exact { suffix } => {
                self.dir.join(format!("{}{}", identity, suffix)).is_file()
            }
            CompletionRule::Fixed(name) => self.dir.join(name).is_file(),
        }
    }
}

impl StatusLedger for FsLedger {
    fn is_complete(&self, identity: &str) -> bool {
        matches!(self.statuses.get(identity), Some(ItemStatus::Done { .. }))
            || self.output_exists(identity)
    }

    fn record(&mut self, identity: &str, status: ItemStatus) {
        self.statuses.insert(identity.to_string(), status);
    }

    fn status(&self, identity: &str) -> Option<&ItemStatus> {
        self.statuses.get(identity)
    }
}

/// In-memory ledger, complete once an item is recorded as done
#[derive(Debug, Default)]
pub struct MemoryLedger {
    statuses: HashMap<String, ItemStatus>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusLedger for MemoryLedger {
    fn is_complete(&self, identity: &str) -> bool {
        matches!(
            self.statuses.get(identity),
            Some(ItemStatus::Done { .. }) | Some(ItemStatus::Skipped)
        )
    }

    fn record(&mut self, identity: &str, status: ItemStatus) {
        self.statuses.insert(identity.to_string(), status);
    }

    fn status(&self, identity: &str) -> Option<&ItemStatus> {
        self.statuses.get(identity)
    }
}

/// One input handed to a conversion closure
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Input path
    pub path: PathBuf,
    /// Input base name (file name without extension)
    pub identity: String,
    /// Input file name
    pub file_name: String,
    /// Input is a full-page fallback capture
    pub uncertain: bool,
    /// Input content
    pub content: String,
}

/// Output produced for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutput {
    /// Output file name inside the output directory
    pub file_name: String,
    /// Output content
    pub content: String,
}

impl ItemOutput {
    pub fn new(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }
}

/// Outcome of one item in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub identity: String,
    pub status: ItemStatus,
}

/// Outcome of a batch run, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    /// Items whose output was written
    pub fn processed(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Done { .. }))
    }

    /// Items skipped as already complete
    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Skipped))
    }

    /// Items that failed
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Failed(_)))
    }

    /// Paths written by this run
    pub fn outputs(&self) -> Vec<&Path> {
        self.items
            .iter()
            .filter_map(|item| match &item.status {
                ItemStatus::Done { output } => Some(output.as_path()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&ItemStatus) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.status)).count()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} skipped={} failed={}",
            self.processed(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Sequential, failure-isolating batch runner
#[derive(Debug, Clone)]
pub struct BatchDriver {
    today: NaiveDate,
}

impl Default for BatchDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchDriver {
    /// Driver whose "today" is the local calendar day
    pub fn new() -> Self {
        Self {
            today: Local::now().date_naive(),
        }
    }

    /// Driver with a fixed "today"
    pub fn with_today(today: NaiveDate) -> Self {
        Self { today }
    }

    /// The day used for date filters and date-stamped names
    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// List files in `dir` matching `selection`, in directory order
    pub fn enumerate(
        &self,
        dir: &Path,
        selection: &InputSelection,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        if !dir.is_dir() {
            return Err(PipelineError::MissingInput(dir.to_path_buf()));
        }

        let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;
        let mut inputs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
            let path = entry.path();
            match entry.metadata() {
                Ok(metadata) if selection.matches(&path, &metadata) => inputs.push(path),
                Ok(_) => {}
                Err(e) => warn!(file = %path.display(), error = %e, "Cannot stat input, ignoring"),
            }
        }

        Ok(inputs)
    }

    /// Process `inputs` in order, one attempt each
    ///
    /// Never fails as a whole: every item ends as done, skipped or failed in
    /// the returned report and in `ledger`.
    pub async fn run<L, F, Fut>(
        &self,
        inputs: &[PathBuf],
        ledger: &mut L,
        out_dir: &Path,
        mut convert: F,
    ) -> BatchReport
    where
        L: StatusLedger + ?Sized,
        F: FnMut(BatchItem) -> Fut,
        Fut: Future<Output = Result<ItemOutput, PipelineError>>,
    {
        let identities: Vec<String> = inputs.iter().map(|p| base_name(p)).collect();
        for identity in &identities {
            if ledger.status(identity).is_none() {
                ledger.record(identity, ItemStatus::Pending);
            }
        }

        let mut report = BatchReport::default();

        for (path, identity) in inputs.iter().zip(identities) {
            let status = if ledger.is_complete(&identity) {
                info!(file = %identity, "Skipping, already processed");
                ItemStatus::Skipped
            } else {
                info!(file = %identity, "Processing");
                match process_item(path, &identity, out_dir, &mut convert).await {
                    Ok(WriteOutcome::Written(output)) => {
                        info!(file = %identity, output = %output.display(), "Saved");
                        ItemStatus::Done { output }
                    }
                    Ok(WriteOutcome::Kept(_)) => ItemStatus::Skipped,
                    Err(e) => {
                        error!(file = %identity, error = %e, "Failed to process item");
                        ItemStatus::Failed(e.to_string())
                    }
                }
            };

            ledger.record(&identity, status.clone());
            report.items.push(ItemReport { identity, status });
        }

        info!(summary = %report, "Batch finished");
        report
    }
}

async fn process_item<F, Fut>(
    path: &Path,
    identity: &str,
    out_dir: &Path,
    convert: &mut F,
) -> Result<WriteOutcome, PipelineError>
where
    F: FnMut(BatchItem) -> Fut,
    Fut: Future<Output = Result<ItemOutput, PipelineError>>,
{
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let uncertain = is_uncertain(&file_name);
    if uncertain {
        warn!(file = %file_name, "Input is a full-page capture, review its output");
    }

    let item = BatchItem {
        path: path.to_path_buf(),
        identity: identity.to_string(),
        file_name,
        uncertain,
        content,
    };

    let output = convert(item).await?;
    let kind = ArtifactKind::from_name(&output.file_name);
    Artifact::new(output.file_name, kind, output.content)
        .persist(out_dir, CollisionPolicy::Keep)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        let mut names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_enumerate_filters_by_extension_and_suffix() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.html", "");
        write(tmp.path(), "b.HTML", "");
        write(tmp.path(), "c.md", "");
        write(tmp.path(), ".hidden.html", "");
        write(tmp.path(), "d-2026-10-19.md", "");
        std::fs::create_dir(tmp.path().join("dir.html")).unwrap();

        let driver = BatchDriver::new();
        let html = driver
            .enumerate(tmp.path(), &InputSelection::new().extension("html"))
            .unwrap();
        assert_eq!(names(&html), vec!["a.html", "b.HTML"]);

        let dated = driver
            .enumerate(tmp.path(), &InputSelection::new().name_suffix("-2026-10-19.md"))
            .unwrap();
        assert_eq!(names(&dated), vec!["d-2026-10-19.md"]);
    }

    #[test]
    fn test_enumerate_filters_by_creation_date() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.html", "");

        let today = BatchDriver::new();
        let selected = today
            .enumerate(tmp.path(), &InputSelection::new().created_on(today.today()))
            .unwrap();
        assert_eq!(selected.len(), 1);

        let long_ago = BatchDriver::with_today(NaiveDate::from_ymd_opt(2001, 1, 1).unwrap());
        let selected = long_ago
            .enumerate(tmp.path(), &InputSelection::new().created_on(long_ago.today()))
            .unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn test_enumerate_missing_directory() {
        let driver = BatchDriver::new();
        let err = driver
            .enumerate(Path::new("/definitely/not/here"), &InputSelection::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }

    #[test]
    fn test_fs_ledger_any_label() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "com-recomendacao-report1.md", "");
        let ledger = FsLedger::new(tmp.path(), CompletionRule::AnyLabel {
            extension: "md".to_string(),
        });
        assert!(ledger.is_complete("report1"));
        assert!(!ledger.is_complete("report2"));
        assert!(!ledger.is_complete("com"));
    }

    #[test]
    fn test_fs_ledger_exact_and_fixed() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "w-2026-10-19.md", "");
        let exact = FsLedger::new(tmp.path(), CompletionRule::Exact {
            suffix: "-2026-10-19.md".to_string(),
        });
        assert!(exact.is_complete("w"));
        assert!(!exact.is_complete("v"));

        let fixed = FsLedger::new(tmp.path(), CompletionRule::Fixed("w-2026-10-19.md".to_string()));
        assert!(fixed.is_complete("anything"));
    }

    #[test]
    fn test_fs_ledger_missing_dir_is_incomplete() {
        let ledger = FsLedger::new("/definitely/not/here", CompletionRule::AnyLabel {
            extension: "md".to_string(),
        });
        assert!(!ledger.is_complete("x"));
    }

    #[tokio::test]
    async fn test_run_flags_uncertain_inputs() {
        let tmp = TempDir::new().unwrap();
        let fallback = write(tmp.path(), "NAO-CONSEGUI_SALVAR_r.html", "<html/>");
        let regular = write(tmp.path(), "r2.html", "<p/>");

        let mut seen = Vec::new();
        let mut ledger = MemoryLedger::new();
        BatchDriver::new()
            .run(&[fallback, regular], &mut ledger, &tmp.path().join("out"), |item| {
                seen.push((item.identity.clone(), item.uncertain));
                async move { Ok(ItemOutput::new(format!("{}.md", item.identity), item.content)) }
            })
            .await;

        assert_eq!(
            seen,
            vec![
                ("NAO-CONSEGUI_SALVAR_r".to_string(), true),
                ("r2".to_string(), false)
            ]
        );
    }

    #[tokio::test]
    async fn test_run_skips_completed_without_calling_converter() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        let output = tmp.path().join("out");
        std::fs::create_dir_all(&input).unwrap();
        let a = write(&input, "a.html", "A");
        let b = write(&input, "b.html", "B");

        let mut ledger = MemoryLedger::new();
        ledger.record("a", ItemStatus::Done { output: PathBuf::from("x") });

        let calls = AtomicUsize::new(0);
        let report = BatchDriver::new()
            .run(&[a, b], &mut ledger, &output, |item| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(ItemOutput::new(format!("{}.md", item.identity), item.content)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.processed(), 1);
        assert_eq!(std::fs::read_to_string(output.join("b.md")).unwrap(), "B");
        assert!(matches!(ledger.status("b"), Some(ItemStatus::Done { .. })));
    }

    #[tokio::test]
    async fn test_run_isolates_failures() {
        let tmp = TempDir::new().unwrap();
        let inputs: Vec<PathBuf> = (0..4)
            .map(|i| write(tmp.path(), &format!("r{}.html", i), &format!("body {}", i)))
            .collect();
        let output = tmp.path().join("out");

        let mut ledger = MemoryLedger::new();
        let report = BatchDriver::new()
            .run(&inputs, &mut ledger, &output, |item| async move {
                if item.identity == "r2" {
                    return Err(PipelineError::MalformedResponse("boom".to_string()));
                }
                Ok(ItemOutput::new(format!("{}.md", item.identity), item.content))
            })
            .await;

        assert_eq!(report.processed(), 3);
        assert_eq!(report.failed(), 1);
        for i in [0, 1, 3] {
            assert!(output.join(format!("r{}.md", i)).is_file());
        }
        assert!(!output.join("r2.md").exists());
        assert_eq!(
            ledger.status("r2"),
            Some(&ItemStatus::Failed("Malformed backend response: boom".to_string()))
        );
    }

    #[tokio::test]
    async fn test_run_records_unreadable_input_as_failed() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("gone.html");
        let mut ledger = MemoryLedger::new();

        let report = BatchDriver::new()
            .run(&[missing], &mut ledger, tmp.path(), |item| async move {
                Ok(ItemOutput::new("x.md", item.content))
            })
            .await;

        assert_eq!(report.failed(), 1);
        assert!(matches!(ledger.status("gone"), Some(ItemStatus::Failed(_))));
    }

    #[tokio::test]
    async fn test_run_twice_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let input = write(tmp.path(), "w.html", "W");
        let out = tmp.path().join("out");
        let driver = BatchDriver::new();

        for expected_processed in [1, 0] {
            let mut ledger = FsLedger::new(&out, CompletionRule::Exact {
                suffix: ".md".to_string(),
            });
            let report = driver
                .run(std::slice::from_ref(&input), &mut ledger, &out, |item| async move {
                    Ok(ItemOutput::new(format!("{}.md", item.identity), item.content))
                })
                .await;
            assert_eq!(report.processed(), expected_processed);
        }
    }

    #[tokio::test]
    async fn test_colliding_outputs_keep_first() {
        let tmp = TempDir::new().unwrap();
        let a = write(tmp.path(), "a.html", "first");
        let b = write(tmp.path(), "b.html", "second");
        let out = tmp.path().join("out");
        let mut ledger = MemoryLedger::new();

        let report = BatchDriver::new()
            .run(&[a, b], &mut ledger, &out, |item| async move {
                Ok(ItemOutput::new("same.csv", item.content))
            })
            .await;

        assert_eq!(report.processed(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(std::fs::read_to_string(out.join("same.csv")).unwrap(), "first");
    }

    #[test]
    fn test_report_display() {
        let report = BatchReport {
            items: vec![
                ItemReport {
                    identity: "a".to_string(),
                    status: ItemStatus::Done {
                        output: PathBuf::from("a.md"),
                    },
                },
                ItemReport {
                    identity: "b".to_string(),
                    status: ItemStatus::Skipped,
                },
                ItemReport {
                    identity: "c".to_string(),
                    status: ItemStatus::Failed("x".to_string()),
                },
            ],
        };
        assert_eq!(report.to_string(), "processed=1 skipped=1 failed=1");
        assert_eq!(report.outputs(), vec![Path::new("a.md")]);
    }
}
