//! Batch jobs: one function per conversion step of the pipeline
//!
//! | Job | Input | Output |
//! |-----|-------|--------|
//! | [`process_reports`] | `*.html` created today | `{label}-{base}.md` |
//! | [`wallets_html_to_markdown`] | `*.html` created today | `{base}-{date}.md` |
//! | [`wallets_markdown_to_csv`] | `*-{date}.md` | `{base}.csv` |
//! | [`meus_dividendos_to_csv`] | one `.htm` file | `carteira-meus-dividendos-{date}.csv` |

use crate::artifact::date_stamp;
use crate::batch::{
    BatchDriver, BatchItem, BatchReport, CompletionRule, FsLedger, InputSelection, ItemOutput,
};
use crate::converter::StagedConverter;
use crate::error::PipelineError;
use chrono::NaiveDate;
use std::path::Path;
use tracing::info;

/// Base name of the Meus Dividendos wallet artifacts
pub const MEUS_DIVIDENDOS_BASE: &str = "carteira-meus-dividendos";

/// Summarize today's HTML reports into classified Markdown files
///
/// A report counts as processed when any `*-{base}.md` exists in `out_dir`.
pub async fn process_reports(
    driver: &BatchDriver,
    converter: &StagedConverter,
    html_dir: &Path,
    out_dir: &Path,
) -> Result<BatchReport, PipelineError> {
    let selection = InputSelection::new()
        .extension("html")
        .created_on(driver.today());
    let inputs = driver.enumerate(html_dir, &selection)?;
    info!(count = inputs.len(), dir = %html_dir.display(), "Found reports created today");

    let mut ledger = FsLedger::new(out_dir, CompletionRule::AnyLabel {
        extension: "md".to_string(),
    });

    let report = driver
        .run(&inputs, &mut ledger, out_dir, move |item: BatchItem| async move {
            let summary = converter
                .summarize_report(&item.file_name, &item.content)
                .await?;
            Ok(ItemOutput::new(
                format!("{}-{}.md", summary.classification(), item.identity),
                summary.result,
            ))
        })
        .await;

    Ok(report)
}

/// Turn today's HTML wallets into Markdown documents of CSV blocks
pub async fn wallets_html_to_markdown(
    driver: &BatchDriver,
    converter: &StagedConverter,
    html_dir: &Path,
    md_dir: &Path,
) -> Result<BatchReport, PipelineError> {
    let stamp = date_stamp(driver.today());
    let selection = InputSelection::new()
        .extension("html")
        .created_on(driver.today());
    let inputs = driver.enumerate(html_dir, &selection)?;
    info!(count = inputs.len(), dir = %html_dir.display(), "Found wallets created today");

    let suffix = format!("-{}.md", stamp);
    let mut ledger = FsLedger::new(md_dir, CompletionRule::Exact {
        suffix: suffix.clone(),
    });

    let suffix = suffix.as_str();
    let report = driver
        .run(&inputs, &mut ledger, md_dir, move |item: BatchItem| async move {
            let markdown = converter
                .extract_tables(&item.file_name, &item.content)
                .await?;
            Ok(ItemOutput::new(format!("{}{}", item.identity, suffix), markdown))
        })
        .await;

    Ok(report)
}

/// Normalize today's wallet Markdown documents into CSV files
pub async fn wallets_markdown_to_csv(
    driver: &BatchDriver,
    converter: &StagedConverter,
    md_dir: &Path,
    csv_dir: &Path,
) -> Result<BatchReport, PipelineError> {
    let selection = InputSelection::new()
        .extension("md")
        .name_suffix(format!("-{}.md", date_stamp(driver.today())));
    let inputs = driver.enumerate(md_dir, &selection)?;
    info!(count = inputs.len(), dir = %md_dir.display(), "Found wallet documents for today");

    let mut ledger = FsLedger::new(csv_dir, CompletionRule::Exact {
        suffix: ".csv".to_string(),
    });

    let report = driver
        .run(&inputs, &mut ledger, csv_dir, move |item: BatchItem| async move {
            let csv = converter
                .normalize_columns(&item.file_name, &item.content)
                .await?;
            Ok(ItemOutput::new(format!("{}.csv", item.identity), csv))
        })
        .await;

    Ok(report)
}

/// Convert the Meus Dividendos portfolio table into a `;`-separated CSV
pub async fn meus_dividendos_to_csv(
    driver: &BatchDriver,
    converter: &StagedConverter,
    html_file: &Path,
    csv_dir: &Path,
) -> Result<BatchReport, PipelineError> {
    if !html_file.is_file() {
        return Err(PipelineError::MissingInput(html_file.to_path_buf()));
    }

    let output_name = meus_dividendos_file_name(driver.today(), "csv");
    let mut ledger = FsLedger::new(csv_dir, CompletionRule::Fixed(output_name.clone()));

    let output_name = output_name.as_str();
    let report = driver
        .run(
            std::slice::from_ref(&html_file.to_path_buf()),
            &mut ledger,
            csv_dir,
            move |item: BatchItem| async move {
                let csv = converter
                    .convert_spreadsheet(&item.file_name, &item.content)
                    .await?;
                Ok(ItemOutput::new(output_name, csv))
            },
        )
        .await;

    Ok(report)
}

/// Date-stamped Meus Dividendos artifact name for `extension`
pub fn meus_dividendos_file_name(date: NaiveDate, extension: &str) -> String {
    format!("{}-{}.{}", MEUS_DIVIDENDOS_BASE, date_stamp(date), extension)
}
