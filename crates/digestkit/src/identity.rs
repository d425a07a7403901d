//! Artifact identity derivation
//!
//! Maps a URL or a site-relative path to a filesystem-safe name. The same
//! name is used to write an artifact and to detect that it already exists.
//!
//! Distinct sources that share an alphanumeric skeleton (for example
//! `/a-b` and `/a_b`) map to the same name.

use std::path::Path;
use url::Url;

/// Extension appended to derived identities
pub const ARTIFACT_EXTENSION: &str = "html";

/// Filename prefix marking a full-page fallback capture
pub const UNCERTAIN_PREFIX: &str = "NAO-CONSEGUI_SALVAR_";

/// Separator replacing every run of non-alphanumeric characters
const SEPARATOR: char = '_';

/// Derive a filesystem-safe artifact name from a URL or path
///
/// Absolute URLs contribute host, port and path; query and fragment are
/// ignored. Anything that does not parse as an absolute URL is treated as a
/// path.
pub fn derive_identity(source: &str) -> String {
    let skeleton = match Url::parse(source) {
        Ok(url) if url.has_host() => {
            let host = url.host_str().unwrap_or_default();
            match url.port() {
                Some(port) => format!("{}:{}{}", host, port, url.path()),
                None => format!("{}{}", host, url.path()),
            }
        }
        _ => strip_query(source).to_string(),
    };

    format!("{}.{}", sanitize(&skeleton), ARTIFACT_EXTENSION)
}

/// Prefix a derived name with the uncertain-extraction marker when needed
pub fn mark_uncertain(name: &str, uncertain: bool) -> String {
    if uncertain {
        format!("{}{}", UNCERTAIN_PREFIX, name)
    } else {
        name.to_string()
    }
}

/// Whether a file name carries the uncertain-extraction marker
pub fn is_uncertain(name: &str) -> bool {
    name.starts_with(UNCERTAIN_PREFIX)
}

/// Base name of a file: its name without the final extension
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Collapse runs of non-ASCII-alphanumerics into one separator and trim the ends
fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_separator = false;

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push(SEPARATOR);
            }
            pending_separator = false;
            out.push(c);
        } else {
            pending_separator = true;
        }
    }

    out
}

fn strip_query(path: &str) -> &str {
    let end = path.find(|c: char| c == '?' || c == '#').unwrap_or(path.len());
    &path[..end]
}
