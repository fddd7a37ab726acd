//! Offline integration tests: upload → session (stub model) → formatted
//! Markdown → table of contents → rendered tree → diagram pass.
//!
//! No network, no pdfium: uploads are DOCX archives built in memory and the
//! model is a stub [`GenerationClient`].

use async_trait::async_trait;
use reqdoc::document::NO_PLAN_MESSAGE;
use reqdoc::error::{GenerationError, RenderError, DOC_UNSUPPORTED_MESSAGE};
use reqdoc::pipeline::input::{MIME_DOC, MIME_DOCX};
use reqdoc::render::copy::MemoryClipboard;
use reqdoc::render::node::{Block, DiagramContent};
use reqdoc::{
    build_toc, extract_text, format_plan, render_markdown, Appendix, CodeKind, CoreFeature, DesignDocument,
    DiagramEngine, DiagramRenderer, ImplementationPlan, ReqDocError, Session, Theme, Upload,
};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use zip::write::SimpleFileOptions;

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );

    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    zip.start_file("[Content_Types].xml", opts).unwrap();
    zip.write_all(b"<Types/>").unwrap();
    zip.start_file("word/document.xml", opts).unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

/// Stub model: records the requirement it saw and answers with a fixed
/// two-feature design.
#[derive(Default)]
struct StubModel {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl reqdoc::GenerationClient for StubModel {
    async fn analyze_requirement(&self, requirement: &str) -> Result<String, GenerationError> {
        self.seen.lock().unwrap().push(requirement.to_string());
        Ok("# 📌 Feature: Checkout\n\n---\n\n## 🧠 Summary\nPay.\n\n\
## 🗺️ Flow Diagram\n```mermaid\nsequenceDiagram\n  User->>App: Pay\n```\n"
            .to_string())
    }

    async fn generate_design_document(
        &self,
        requirement: &str,
    ) -> Result<DesignDocument, GenerationError> {
        self.seen.lock().unwrap().push(requirement.to_string());
        let feature = |name: &str, diagram: &str| CoreFeature {
            name: name.into(),
            tech_solution: "- Client calls `POST /cart`".into(),
            tech_notes: "- Low complexity".into(),
            data_changes: "```sql\nALTER TABLE carts ADD COLUMN qty INT;\n```".into(),
            diagram: diagram.into(),
        };
        Ok(DesignDocument {
            title: "Shopping Cart & Checkout (v2)".into(),
            general_overview: "Overhaul the checkout.".into(),
            core_features: vec![
                feature("My Feature", "graph TD; A[Cart] -- \"Pay\" --> B[Done];"),
                feature("Payment Gateway", "```mermaid\ngraph TD; P-->Q\n```"),
            ],
            appendix: Appendix {
                new_metrics: "No new metrics".into(),
                tools: "No new tools required".into(),
                compatibility: "No compatibility issues".into(),
            },
        })
    }

    async fn generate_plan(
        &self,
        design_markdown: &str,
    ) -> Result<Vec<ImplementationPlan>, GenerationError> {
        assert!(design_markdown.starts_with("# Shopping Cart & Checkout (v2)\n"));
        Ok(vec![ImplementationPlan {
            feature_name: "My Feature".into(),
            features_to_implement: vec!["Persistent cart".into()],
            frontend_steps: vec!["Create `<CartPanel />`".into()],
            backend_steps: vec!["`POST /api/v1/cart`".into()],
            integration_steps: vec!["Returns 201 with the cart".into()],
        }])
    }
}

/// Diagram engine that counts calls and fails on a marker.
#[derive(Default)]
struct CountingEngine {
    calls: AtomicUsize,
}

#[async_trait]
impl DiagramEngine for CountingEngine {
    async fn render(&self, id: &str, code: &str) -> Result<String, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if code.contains("P-->Q") {
            return Err(RenderError::InvalidSource {
                id: id.to_string(),
                message: "Parse error on line 2: <P-->".into(),
            });
        }
        Ok(format!("<svg id=\"{id}\"></svg>"))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn docx_to_design_to_rendered_document() {
    let model = Arc::new(StubModel::default());
    let session = Session::new(model.clone());

    let upload = Upload::new(
        "req.docx",
        MIME_DOCX,
        docx(&["Ticket: FEAT-451", "Overhaul Shopping Cart &amp; Checkout"]),
    );
    let design = session.generate_design_from_upload(&upload).await.unwrap();

    // The model saw the extracted text.
    let seen = model.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with("Ticket: FEAT-451\n"));
    assert!(session.snapshot().extracted.is_some());

    assert_eq!(design.title, "Shopping_Cart_Checkout_v2");
    assert!(design.content.contains("### 2.1 My Feature\n"));
    assert!(design.content.contains("### 2.2 Payment Gateway\n"));

    // TOC and heading ids agree.
    let toc = build_toc(&design.content);
    let doc = render_markdown(&design.content, Theme::Dark);
    let ids: Vec<&str> = doc.heading_ids().into_iter().map(|(_, id)| id).collect();
    for entry in &toc {
        assert!(ids.contains(&entry.slug.as_str()), "no heading id {}", entry.slug);
    }
    assert!(toc.iter().any(|e| e.level == 3 && e.slug == "21-my-feature"));
    assert!(ids.contains(&"i-general-overview"));

    // Level 4 headings are rendered but not navigable.
    assert!(!toc.iter().any(|e| e.text == "Tech Solution"));

    // One diagram per core feature; the second one lost its inner fence.
    let diagrams = doc.diagrams();
    assert_eq!(diagrams.len(), 2);
    assert!(diagrams.iter().all(|d| !d.state.processed));
    assert!(!diagrams[1].state.code.contains("```"));

    // The SQL block is highlighted and copyable on its own.
    let sql = doc
        .code_blocks()
        .into_iter()
        .find(|c| matches!(&c.kind, CodeKind::Highlighted { language } if language == "sql"))
        .expect("sql block");
    assert_eq!(sql.copy.text(), "ALTER TABLE carts ADD COLUMN qty INT;");
}

#[tokio::test]
async fn docx_text_feeds_design_with_sections_in_fixed_order() {
    let upload = Upload::new("ticket.docx", MIME_DOCX, docx(&["Ticket: X", "Do Y."]));
    let extracted = extract_text(&upload).await.unwrap();
    assert_eq!(extracted.text, "Ticket: X\nDo Y.");

    let model = Arc::new(StubModel::default());
    let session = Session::new(model.clone());
    let design = session.generate_design(&extracted.text).await.unwrap();
    assert_eq!(model.seen.lock().unwrap().as_slice(), ["Ticket: X\nDo Y."]);

    let toc = build_toc(&design.content);
    let sections: Vec<&str> = toc
        .iter()
        .filter(|e| e.level == 2)
        .map(|e| e.slug.as_str())
        .collect();
    assert_eq!(sections, ["i-general-overview", "ii-core-features", "iii-appendix"]);

    let features: Vec<&str> = toc
        .iter()
        .filter(|e| e.level == 3)
        .map(|e| e.slug.as_str())
        .collect();
    assert_eq!(
        features,
        ["21-my-feature", "22-payment-gateway", "31-new-metrics", "32-tools", "33-compatibility"]
    );
}

#[tokio::test]
async fn diagram_pass_is_at_most_once_and_contains_failures() {
    let session = Session::new(Arc::new(StubModel::default()));
    let design = session.generate_design("cart").await.unwrap();
    let mut doc = render_markdown(&design.content, Theme::Light);

    let engine = Arc::new(CountingEngine::default());
    let renderer = DiagramRenderer::new(engine.clone());

    let first = renderer.render_pending(&mut doc).await;
    assert_eq!(first.rendered, 1);
    assert_eq!(first.failed, 1);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 2);

    let second = renderer.render_pending(&mut doc).await;
    assert_eq!(second.skipped, 2);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 2);

    let diagrams = doc.diagrams();
    assert!(matches!(diagrams[0].content, DiagramContent::Rendered { .. }));
    assert!(matches!(diagrams[1].content, DiagramContent::Failed { .. }));

    let html = doc.to_html();
    assert!(html.contains("Diagram Rendering Error"));
    assert!(html.contains("&lt;P--&gt;"));
    assert!(html.contains("<svg id=\"mermaid-0\"></svg>"));
}

#[tokio::test(start_paused = true)]
async fn copy_affordances_are_independent() {
    let md = "```js\nlet a = 1;\n```\n\n```\nplain text\n```\n";
    let doc = render_markdown(md, Theme::Dark);
    let clipboard = MemoryClipboard::new();
    let blocks = doc.code_blocks();
    assert_eq!(blocks.len(), 2);

    assert!(blocks[0].copy.trigger(&clipboard));
    assert!(blocks[0].copy.is_copied());
    assert!(!blocks[1].copy.is_copied());
    assert!(!blocks[0].copy.trigger(&clipboard), "disabled while copied");

    assert!(blocks[1].copy.trigger(&clipboard));
    assert_eq!(clipboard.writes(), vec!["let a = 1;", "plain text"]);

    tokio::time::sleep(std::time::Duration::from_millis(2001)).await;
    assert!(!blocks[0].copy.is_copied());
    assert!(!blocks[1].copy.is_copied());

    assert!(doc.copy_all.trigger(&clipboard));
    assert_eq!(clipboard.last().as_deref(), Some(md));
}

#[tokio::test]
async fn analysis_renders_with_sections_and_diagram() {
    let session = Session::new(Arc::new(StubModel::default()));
    let md = session.analyze("Checkout").await.unwrap();

    let toc = build_toc(&md);
    assert_eq!(toc[0].level, 1);
    assert_eq!(toc[0].text, "📌 Feature: Checkout");

    let doc = render_markdown(&md, Theme::Dark);
    assert!(doc.blocks.iter().any(|b| matches!(b, Block::Rule)));
    assert_eq!(doc.diagrams().len(), 1);
}

#[tokio::test]
async fn plan_flows_from_stored_design() {
    let session = Session::new(Arc::new(StubModel::default()));
    session.generate_design("cart").await.unwrap();
    let plans = session.generate_plan().await.unwrap();

    let md = format_plan(&plans);
    assert!(md.starts_with("## FEATURE: My Feature\n"));
    assert_eq!(build_toc(&md)[0].slug, "feature-my-feature");
    assert_eq!(format_plan(&[]), format!("{NO_PLAN_MESSAGE}\n"));
}

#[tokio::test]
async fn legacy_word_upload_never_reaches_the_model() {
    let model = Arc::new(StubModel::default());
    let session = Session::new(model.clone());

    let upload = Upload::new("old.doc", MIME_DOC, b"\xD0\xCF\x11\xE0".to_vec());
    let err = session.generate_design_from_upload(&upload).await.unwrap_err();

    assert!(matches!(err, ReqDocError::Extraction(_)));
    assert_eq!(err.to_string(), DOC_UNSUPPORTED_MESSAGE);
    assert!(model.seen.lock().unwrap().is_empty());
    assert!(session.design().is_none());
}
