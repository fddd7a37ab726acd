//! # reqdoc
//!
//! Turn requirement documents into engineering documents, and render
//! Markdown into a navigable, themed document view.
//!
//! ## Why this crate?
//!
//! Requirements arrive as PDFs and Word files written for people. Developers
//! need a feature brief, a Technical Design Document (TDD) and a step-by-step
//! implementation plan. This crate pulls the text out of the upload, asks a
//! model for each document through a narrow request/response interface, and
//! renders the Markdown answers with heading anchors, a table of contents,
//! highlighted code with copy buttons, and Mermaid flow diagrams.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / DOCX
//!  │
//!  ├─ 1. Extract  declared-type gate, then pdfium / word XML text (spawn_blocking)
//!  ├─ 2. Generate analysis (Markdown) · TDD (JSON) · plan (JSON) via the model
//!  ├─ 3. Format   TDD and plan flattened into one Markdown string
//!  ├─ 4. Index    heading slugs + table of contents
//!  ├─ 5. Render   display tree: callouts, code kinds, copy affordances
//!  └─ 6. Diagrams at-most-once async pass, failures contained per diagram
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reqdoc::{extract_text, GenerationConfig, LlmGenerationClient, Session, Upload};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let client = LlmGenerationClient::from_config(GenerationConfig::default())?;
//!     let session = Session::new(Arc::new(client));
//!
//!     let upload = Upload::from_path("requirements.docx").await?;
//!     let design = session.generate_design_from_upload(&upload).await?;
//!     println!("{}", design.content);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `reqdoc` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! reqdoc = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod extract;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod session;
pub mod slug;
pub mod toc;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationConfig, GenerationConfigBuilder, RenderConfig, RenderConfigBuilder, Theme};
pub use document::{
    format_design_document, format_plan, Appendix, CoreFeature, DesignDocument, GeneratedDesign,
    ImplementationPlan,
};
pub use error::{ExtractionError, GenerationError, RenderError, ReqDocError};
pub use export::{download_file_name, safe_title, write_markdown};
pub use extract::{extract_text, ExtractedDocument};
pub use pipeline::input::{DeclaredType, SourceFormat, Upload};
pub use pipeline::llm::{GenerationClient, LlmGenerationClient};
pub use render::copy::{Clipboard, CopyAffordance};
pub use render::diagram::{DiagramEngine, DiagramRenderer, MermaidCli};
pub use render::node::{CodeKind, RenderedDocument};
pub use render::{render_markdown, Renderer};
pub use session::{Action, Session};
pub use slug::slugify;
pub use toc::{build_toc, TableOfContents, TocEntry};
