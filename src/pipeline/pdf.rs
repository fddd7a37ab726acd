//! PDF text extraction via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to drive from async code. Parsing runs on Tokio's
//! blocking pool so the async workers never stall on a large document.
//!
//! Pages are read strictly in order (1..N). Each page's text layer is
//! tokenised on whitespace and re-joined with single spaces; pages are joined
//! with a blank line. There is no OCR: an image-only PDF yields empty text,
//! which the caller turns into [`ExtractionError::NoTextFound`].

use crate::error::ExtractionError;
use crate::pipeline::input::SourceFormat;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Separator inserted between the text of consecutive pages.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Text pulled out of a PDF, one entry per page in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfText {
    pub pages: Vec<String>,
}

impl PdfText {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All pages joined with blank-line separators.
    pub fn joined(&self) -> String {
        join_pages(self.pages.iter().map(String::as_str))
    }
}

/// Extract the text of every page of an in-memory PDF.
pub async fn extract(bytes: Vec<u8>) -> Result<PdfText, ExtractionError> {
    tokio::task::spawn_blocking(move || extract_blocking(&bytes))
        .await
        .map_err(|e| ExtractionError::Internal(format!("PDF task panicked: {e}")))?
}

fn extract_blocking(bytes: &[u8]) -> Result<PdfText, ExtractionError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(classify_load_error)?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut out = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page.text().map_err(|e| ExtractionError::Corrupt {
            format: SourceFormat::Pdf,
            detail: format!("page {}: {:?}", idx + 1, e),
        })?;
        let normalised = page_text(&text.all());
        debug!("Page {}: {} chars", idx + 1, normalised.len());
        out.push(normalised);
    }

    Ok(PdfText { pages: out })
}

/// Bind to a pdfium shared library.
///
/// `PDFIUM_LIB_PATH` (a directory holding the platform library) wins;
/// otherwise the system library search path is used.
pub fn bind_pdfium() -> Result<Pdfium, ExtractionError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(dir) if !dir.is_empty() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractionError::PdfiumUnavailable(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// pdfium reports a missing password as an internal error; tell it apart
/// from a genuinely corrupt file.
fn classify_load_error(e: PdfiumError) -> ExtractionError {
    let detail = format!("{e:?}");
    if detail.contains("Password") || detail.contains("password") {
        ExtractionError::Encrypted {
            format: SourceFormat::Pdf,
        }
    } else {
        ExtractionError::Corrupt {
            format: SourceFormat::Pdf,
            detail,
        }
    }
}

/// Join the text tokens of one page with single spaces.
pub fn page_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Join pages in order with a blank line between them.
pub fn join_pages<'a>(pages: impl IntoIterator<Item = &'a str>) -> String {
    pages.into_iter().collect::<Vec<_>>().join(PAGE_SEPARATOR)
}
