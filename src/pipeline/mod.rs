//! Pipeline stages from uploaded bytes to model answers.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and a parser can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pdf | docx ──▶ llm ──▶ postprocess
//! (gate)    (text)         (model) (cleanup)
//! ```
//!
//! 1. [`input`]: classify the upload by declared type; legacy `.doc` and
//!    unknown types stop here
//! 2. [`pdf`]: per-page text via pdfium; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`docx`]: paragraph text from `word/document.xml`, also blocking
//! 4. [`llm`]: the generation client; the only stage with network I/O
//! 5. [`postprocess`]: deterministic clean-up of model answers (outer
//!    fences, stray JSON prose, diagram fences, whitespace)

pub mod docx;
pub mod input;
pub mod llm;
pub mod pdf;
pub mod postprocess;
