//! DOCX raw-text extraction.
//!
//! A DOCX file is a ZIP container; the body lives in `word/document.xml`.
//! We stream that XML once and keep only the text of runs (`w:t`), plus the
//! few elements that carry whitespace meaning:
//!
//! | element | becomes |
//! |---------|---------|
//! | `w:tab` | `\t` |
//! | `w:br`, `w:cr` | `\n` |
//! | `w:br w:type="page"` | blank line |
//! | end of `w:p` | `\n` |
//! | `w:sectPr` inside a paragraph | blank line |
//!
//! Styling, numbering, images and headers/footers are ignored.

use crate::error::ExtractionError;
use crate::pipeline::input::SourceFormat;
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use regex::Regex;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract the raw body text of an in-memory DOCX.
pub async fn extract(bytes: Vec<u8>) -> Result<String, ExtractionError> {
    tokio::task::spawn_blocking(move || extract_blocking(&bytes))
        .await
        .map_err(|e| ExtractionError::Internal(format!("DOCX task panicked: {e}")))?
}

fn extract_blocking(bytes: &[u8]) -> Result<String, ExtractionError> {
    let xml = read_document_part(bytes)?;
    let text = body_text(&xml)?;
    debug!("DOCX body: {} chars", text.len());
    Ok(text)
}

fn corrupt(detail: impl Into<String>) -> ExtractionError {
    ExtractionError::Corrupt {
        format: SourceFormat::Docx,
        detail: detail.into(),
    }
}

fn read_document_part(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| corrupt(format!("not a ZIP container: {e}")))?;

    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| corrupt(format!("missing {DOCUMENT_PART}")))?;

    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| corrupt(format!("{DOCUMENT_PART} is not valid UTF-8: {e}")))?;
    Ok(xml)
}

/// Walk `word/document.xml` and collect the raw text.
pub fn body_text(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = XmlReader::from_str(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;
    let mut paragraph_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match local_name(e).as_slice() {
                b"t" => in_text = true,
                b"p" => paragraph_depth += 1,
                other => push_marker(&mut out, other, e, paragraph_depth),
            },
            Ok(Event::Empty(ref e)) => {
                let name = local_name(e);
                push_marker(&mut out, name.as_slice(), e, paragraph_depth);
            }
            Ok(Event::Text(e)) => {
                if in_text {
                    let text = e
                        .unescape()
                        .map_err(|err| corrupt(format!("bad text node: {err}")))?;
                    out.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    paragraph_depth = paragraph_depth.saturating_sub(1);
                    out.push('\n');
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(corrupt(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(normalise(&out))
}

fn local_name(e: &BytesStart<'_>) -> Vec<u8> {
    e.local_name().as_ref().to_vec()
}

fn push_marker(out: &mut String, name: &[u8], e: &BytesStart<'_>, paragraph_depth: usize) {
    match name {
        b"tab" => out.push('\t'),
        // Only reached for a self-closed, empty `<w:p/>`.
        b"p" | b"cr" => out.push('\n'),
        b"br" => {
            if is_page_break(e) {
                out.push_str("\n\n");
            } else {
                out.push('\n');
            }
        }
        // A section break stored in a paragraph's properties ends a section.
        b"sectPr" if paragraph_depth > 0 => out.push_str("\n\n"),
        _ => {}
    }
}

fn is_page_break(e: &BytesStart<'_>) -> bool {
    e.attributes().flatten().any(|attr| {
        attr.key.local_name().as_ref() == b"type" && attr.value.as_ref() == b"page"
    })
}

static RE_BOUNDARIES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid boundary regex"));

/// Collapse runs of blank lines to one blank line and trim the ends.
fn normalise(raw: &str) -> String {
    RE_BOUNDARIES
        .replace_all(raw, "\n\n")
        .trim_matches('\n')
        .to_string()
}
