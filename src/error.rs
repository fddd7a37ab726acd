//! Error types for the reqdoc library.
//!
//! Three error families mirror the three places work can fail:
//!
//! * [`ExtractionError`]: an uploaded document could not be turned into
//!   text (unreadable, legacy `.doc`, encrypted, corrupt, or no text layer).
//! * [`GenerationError`]: the external model service failed or answered
//!   with something that does not fit the expected response shape.
//! * [`RenderError`]: a single diagram could not be rendered. These never
//!   escape the render pass; they become an error panel on that diagram.
//!
//! [`ReqDocError`] wraps the first two for the top-level entry points, plus
//! configuration and session errors.

use crate::pipeline::input::SourceFormat;
use std::path::PathBuf;
use thiserror::Error;

/// Fixed message shown whenever a legacy binary Word document is selected.
pub const DOC_UNSUPPORTED_MESSAGE: &str = "`.doc` files are not supported for direct analysis. \
Please save the file as `.docx` or `.pdf` and re-upload it.";

/// Message shown when a document parsed fine but held no text at all.
pub const NO_TEXT_MESSAGE: &str =
    "Could not extract any text from the source. The document might be empty or image-based.";

/// Failures turning an uploaded document into plain text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The file could not be read from disk.
    #[error("Could not read '{path}': {reason}")]
    Unreadable { path: PathBuf, reason: String },

    /// Legacy binary Word document; rejected before any parsing is attempted.
    #[error("{}", DOC_UNSUPPORTED_MESSAGE)]
    LegacyWordFormat,

    /// Declared type is neither PDF nor DOCX.
    #[error("Unsupported file type. Please use a PDF or DOCX file.")]
    UnsupportedType { declared: String },

    /// The document requires a password.
    #[error("The {format} document is encrypted and cannot be read.")]
    Encrypted { format: SourceFormat },

    /// The parser rejected the byte stream.
    #[error("Failed to parse {format}: {detail}")]
    Corrupt { format: SourceFormat, detail: String },

    /// The document parsed but contains no extractable text (e.g. a scan).
    #[error("{}", NO_TEXT_MESSAGE)]
    NoTextFound { format: SourceFormat },

    /// The PDF engine could not be loaded.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/dir/containing/libpdfium or install pdfium system-wide."
    )]
    PdfiumUnavailable(String),

    /// A blocking extraction task panicked or was cancelled.
    #[error("Extraction task failed: {0}")]
    Internal(String),
}

/// Failures talking to the external document generation service.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No provider could be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The request itself failed (network, auth, quota, ...).
    #[error("Could not generate {what}: {message}")]
    Request { what: &'static str, message: String },

    /// The call exceeded the configured timeout.
    #[error("Could not generate {what}: no response after {secs}s")]
    Timeout { what: &'static str, secs: u64 },

    /// The service answered, but not with the expected response shape.
    #[error(
        "Could not generate {what}. The model returned an invalid response: {detail}"
    )]
    MalformedResponse { what: &'static str, detail: String },

    /// The service answered with nothing.
    #[error("Could not generate {what}: the model returned an empty response")]
    EmptyResponse { what: &'static str },
}

/// Failure rendering one diagram. Contained per diagram.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum RenderError {
    /// The engine rejected the diagram source.
    #[error("{message}")]
    InvalidSource { id: String, message: String },

    /// The engine could not be run at all.
    #[error("Diagram engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine did not answer in time.
    #[error("Diagram '{id}' timed out after {secs}s")]
    Timeout { id: String, secs: u64 },
}

/// All fatal errors returned by the reqdoc entry points.
#[derive(Debug, Error)]
pub enum ReqDocError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The same logical action is already running for this session.
    #[error("{action} is already in progress; wait for it to finish")]
    ActionInProgress { action: &'static str },

    /// An action needs output from an earlier step that is not there yet.
    #[error("{0}")]
    MissingInput(String),

    /// The response arrived after the session was reset and was discarded.
    #[error("{action} result discarded: the session changed while it was running")]
    Stale { action: &'static str },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
