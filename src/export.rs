//! Markdown downloads: filenames and atomic writes.

use crate::error::ReqDocError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Filename stem used when a design title sanitises to nothing.
pub const DESIGN_FALLBACK_TITLE: &str = "Generated_TDD";

/// Filename stem of every requirement analysis download.
pub const ANALYSIS_FILE_STEM: &str = "AI_Requirement_Analysis";

static RE_UNSAFE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9\s-]").expect("valid unsafe-char regex"));
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Make a title usable as a filename stem.
///
/// Removes everything but ASCII letters, digits, whitespace and `-`, trims,
/// then replaces each whitespace run with `_`. Returns `fallback` when
/// nothing is left.
pub fn safe_title(title: &str, fallback: &str) -> String {
    let kept = RE_UNSAFE.replace_all(title, "");
    let safe = RE_WHITESPACE.replace_all(kept.trim(), "_");
    if safe.is_empty() {
        fallback.to_string()
    } else {
        safe.into_owned()
    }
}

/// `{stem}.md`.
pub fn download_file_name(stem: &str) -> String {
    format!("{stem}.md")
}

/// Write `content` to `path` as UTF-8, atomically.
///
/// The text goes to a temporary file in the destination directory which is
/// then renamed over `path`, so readers never observe a partial file.
/// Missing parent directories are created.
pub async fn write_markdown(path: impl AsRef<Path>, content: &str) -> Result<(), ReqDocError> {
    let path = path.as_ref().to_path_buf();
    let fail = |path: &Path, source: std::io::Error| ReqDocError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| fail(&path, e))?;

    let content = content.to_owned();
    let target = path.clone();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".reqdoc-")
            .suffix(".md.tmp")
            .tempfile_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| fail(&path, std::io::Error::other(e.to_string())))?
    .map_err(|e| fail(&path, e))?;

    info!("Wrote {}", path.display());
    Ok(())
}
