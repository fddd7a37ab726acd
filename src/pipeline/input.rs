//! Upload resolution: decide what kind of document we were handed.
//!
//! The declared type is trusted the way a browser file picker trusts it: a
//! MIME string for in-memory uploads, the file extension for files on disk.
//! Legacy `.doc` files are accepted for selection but classified as
//! [`DeclaredType::LegacyWord`] so the extractor can refuse them before any
//! parser ever sees the bytes.

use crate::error::ExtractionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_DOC: &str = "application/msword";

/// A format the extractor can actually read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Docx,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Pdf => f.write_str("PDF"),
            SourceFormat::Docx => f.write_str("DOCX"),
        }
    }
}

/// What the uploader claims the file is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredType {
    Pdf,
    Docx,
    /// `application/msword`: selectable, never extractable.
    LegacyWord,
    Other(String),
}

impl DeclaredType {
    /// Classify a MIME type string.
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            MIME_PDF => DeclaredType::Pdf,
            MIME_DOCX => DeclaredType::Docx,
            MIME_DOC => DeclaredType::LegacyWord,
            _ => DeclaredType::Other(essence),
        }
    }

    /// Classify by file extension, for uploads coming from disk.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => DeclaredType::Pdf,
            "docx" => DeclaredType::Docx,
            "doc" => DeclaredType::LegacyWord,
            "" => DeclaredType::Other("(no extension)".to_string()),
            other => DeclaredType::Other(format!(".{other}")),
        }
    }

    /// Map to a readable format, or the error the user should see.
    ///
    /// This is the fail-fast gate: it runs before any byte is parsed.
    pub fn source_format(&self) -> Result<SourceFormat, ExtractionError> {
        match self {
            DeclaredType::Pdf => Ok(SourceFormat::Pdf),
            DeclaredType::Docx => Ok(SourceFormat::Docx),
            DeclaredType::LegacyWord => Err(ExtractionError::LegacyWordFormat),
            DeclaredType::Other(declared) => {
                debug!("Rejected upload with declared type '{declared}'");
                Err(ExtractionError::UnsupportedType {
                    declared: declared.clone(),
                })
            }
        }
    }
}

/// An uploaded file: a name, its declared type and the raw bytes.
#[derive(Clone)]
pub struct Upload {
    pub name: String,
    pub declared: DeclaredType,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

impl Upload {
    /// Build an upload from in-memory bytes and a MIME type.
    pub fn new(name: impl Into<String>, mime: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared: DeclaredType::from_mime(mime),
            bytes,
        }
    }

    /// Read a file from disk, declaring its type from the extension.
    ///
    /// Legacy `.doc` files are not even read: the answer does not depend on
    /// their content.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ExtractionError> {
        let path = path.as_ref();
        let declared = DeclaredType::from_path(path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if declared == DeclaredType::LegacyWord {
            return Ok(Self {
                name,
                declared,
                bytes: Vec::new(),
            });
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| unreadable(path.to_path_buf(), &e))?;
        debug!("Read upload {} ({} bytes)", path.display(), bytes.len());

        Ok(Self {
            name,
            declared,
            bytes,
        })
    }
}

fn unreadable(path: PathBuf, e: &std::io::Error) -> ExtractionError {
    let reason = match e.kind() {
        std::io::ErrorKind::NotFound => "file not found".to_string(),
        std::io::ErrorKind::PermissionDenied => "permission denied".to_string(),
        _ => e.to_string(),
    };
    ExtractionError::Unreadable { path, reason }
}
