//! Text Extractor: one uploaded document in, one normalised string out.

use crate::error::ExtractionError;
use crate::pipeline::input::{SourceFormat, Upload};
use crate::pipeline::{docx, pdf};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Plain text pulled out of an upload. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub source_format: SourceFormat,
    /// Known for PDFs only; DOCX has no fixed pagination.
    pub page_count: Option<usize>,
    pub text: String,
}

/// Extract all text from a PDF or DOCX upload, in document order.
///
/// The declared type is checked first: a legacy `.doc` or any other type
/// fails before a single byte is parsed. A document that parses but yields
/// only whitespace fails with [`ExtractionError::NoTextFound`].
pub async fn extract_text(upload: &Upload) -> Result<ExtractedDocument, ExtractionError> {
    let format = upload.declared.source_format()?;
    info!("Extracting {} text from '{}'", format, upload.name);

    let (text, page_count) = match format {
        SourceFormat::Pdf => {
            let pages = pdf::extract(upload.bytes.clone()).await?;
            (pages.joined(), Some(pages.page_count()))
        }
        SourceFormat::Docx => (docx::extract(upload.bytes.clone()).await?, None),
    };

    if text.trim().is_empty() {
        warn!("'{}' has no extractable text", upload.name);
        return Err(ExtractionError::NoTextFound { format });
    }

    info!("Extracted {} chars from '{}'", text.len(), upload.name);
    Ok(ExtractedDocument {
        source_format: format,
        page_count,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::input::{MIME_DOC, MIME_DOCX};
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("word/document.xml", opts).unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    fn body(paragraphs: &str) -> String {
        format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{paragraphs}</w:body></w:document>"#
        )
    }

    #[tokio::test]
    async fn docx_paragraphs_are_extracted() {
        let bytes = docx_bytes(&body(
            "<w:p><w:r><w:t>Ticket: X</w:t></w:r></w:p><w:p><w:r><w:t>Do Y.</w:t></w:r></w:p>",
        ));
        let doc = extract_text(&Upload::new("req.docx", MIME_DOCX, bytes)).await.unwrap();
        assert_eq!(doc.source_format, SourceFormat::Docx);
        assert_eq!(doc.page_count, None);
        assert_eq!(doc.text, "Ticket: X\nDo Y.");
    }

    #[tokio::test]
    async fn empty_docx_is_no_text() {
        let bytes = docx_bytes(&body("<w:p/><w:p><w:r><w:t>   </w:t></w:r></w:p>"));
        let err = extract_text(&Upload::new("blank.docx", MIME_DOCX, bytes))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::NoTextFound {
                format: SourceFormat::Docx
            }
        ));
    }

    #[tokio::test]
    async fn legacy_doc_rejected_regardless_of_content() {
        // Even a perfectly valid DOCX payload is refused when declared as .doc.
        let bytes = docx_bytes(&body("<w:p><w:r><w:t>hi</w:t></w:r></w:p>"));
        let err = extract_text(&Upload::new("old.doc", MIME_DOC, bytes))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::LegacyWordFormat));
    }

    #[tokio::test]
    async fn other_types_rejected() {
        let err = extract_text(&Upload::new("a.txt", "text/plain", b"hello".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedType { .. }));
        assert_eq!(
            err.to_string(),
            "Unsupported file type. Please use a PDF or DOCX file."
        );
    }
}
