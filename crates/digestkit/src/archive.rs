//! Folder archiving

use crate::artifact::creation_date;
use crate::error::PipelineError;
use chrono::NaiveDate;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Zip the files under `folder` into `output`
///
/// Walks `folder` recursively. With a `date_filter`, only files created on
/// that day are included. Entries are stored deflated under their path
/// relative to `folder`, using `/` separators. Returns the number of files
/// archived.
pub fn zip_folder(
    folder: &Path,
    output: &Path,
    date_filter: Option<NaiveDate>,
) -> Result<usize, PipelineError> {
    if !folder.is_dir() {
        return Err(PipelineError::MissingInput(folder.to_path_buf()));
    }

    let mut files = Vec::new();
    collect_files(folder, &mut files)?;
    files.sort();

    let file = File::create(output).map_err(|e| PipelineError::io(output, e))?;
    let output_abs = output.canonicalize().map_err(|e| PipelineError::io(output, e))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut archived = 0;
    for path in files {
        if path.canonicalize().ok().as_deref() == Some(output_abs.as_path()) {
            continue;
        }

        if let Some(date) = date_filter {
            let metadata = std::fs::metadata(&path).map_err(|e| PipelineError::io(&path, e))?;
            if creation_date(&metadata) != Some(date) {
                continue;
            }
        }

        let name = entry_name(folder, &path);
        debug!(entry = %name, "Adding to archive");
        zip.start_file(name, options)?;
        let mut source = File::open(&path).map_err(|e| PipelineError::io(&path, e))?;
        std::io::copy(&mut source, &mut zip).map_err(|e| PipelineError::io(&path, e))?;
        archived += 1;
    }

    zip.finish()?;
    info!(files = archived, archive = %output.display(), "Archive written");
    Ok(archived)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), PipelineError> {
    let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| PipelineError::io(&path, e))?;
        if file_type.is_dir() {
            collect_files(&path, files)?;
        } else if file_type.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

/// Archive entry name: path relative to `root`, `/`-separated
fn entry_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
