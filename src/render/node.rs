//! Display tree produced by the render pipeline.
//!
//! The tree is rebuilt from scratch for every content change. Only diagram
//! nodes are mutated afterwards, by the diagram pass, and only through their
//! [`MermaidRenderState`].

use crate::config::Theme;
use crate::render::copy::CopyAffordance;
use serde::{Deserialize, Serialize};

// ── Code classification ──────────────────────────────────────────────────

/// How a piece of code is presented. Chosen once, at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CodeKind {
    /// Inline code span: styled text, no copy affordance.
    Inline,
    /// `mermaid` fence: placeholder for the diagram pass.
    Diagram,
    /// Fence with any other language tag.
    Highlighted { language: String },
    /// Fence without a tag, or tagged `text`.
    Plain,
}

impl CodeKind {
    /// Language tag used for diagram fences.
    pub const DIAGRAM_LANGUAGE: &'static str = "mermaid";

    /// Classify a fenced block by its info string.
    ///
    /// Only the leading word characters of the first token count, so
    /// `rust,ignore` is `rust` and `c++` is `c`.
    pub fn for_fence(info: Option<&str>) -> Self {
        match info.map(language_tag).unwrap_or_default() {
            "" | "text" => CodeKind::Plain,
            Self::DIAGRAM_LANGUAGE => CodeKind::Diagram,
            lang => CodeKind::Highlighted {
                language: lang.to_string(),
            },
        }
    }

    /// Whether this presentation offers a copy action.
    pub fn has_copy(&self) -> bool {
        matches!(self, CodeKind::Highlighted { .. } | CodeKind::Plain)
    }
}

fn language_tag(info: &str) -> &str {
    let first = info.split_whitespace().next().unwrap_or_default();
    let end = first
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(first.len());
    &first[..end]
}

// ── Blocks ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum Block {
    Heading {
        level: u8,
        /// Anchor id; set for levels 1-3.
        id: Option<String>,
        content: Vec<Inline>,
    },
    Paragraph(Vec<Inline>),
    /// Inline content with no paragraph wrapper (tight list items).
    Plain(Vec<Inline>),
    /// Blockquote, presented as a themed callout.
    Callout { theme: Theme, blocks: Vec<Block> },
    Code(CodeBlock),
    Diagram(DiagramBlock),
    List {
        /// Start number for ordered lists.
        start: Option<u64>,
        items: Vec<ListItem>,
    },
    Table(Table),
    Rule,
    Html(String),
}

#[derive(Debug, Default)]
pub struct ListItem {
    /// `Some(checked)` for task list items.
    pub task: Option<bool>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnAlign {
    None,
    Left,
    Center,
    Right,
}

#[derive(Debug, Default)]
pub struct Table {
    pub alignments: Vec<ColumnAlign>,
    pub head: Vec<Vec<Inline>>,
    pub rows: Vec<Vec<Vec<Inline>>>,
}

/// A fenced block shown as code (plain or highlighted).
#[derive(Debug)]
pub struct CodeBlock {
    pub kind: CodeKind,
    /// Exact text the copy action puts on the clipboard.
    pub text: String,
    /// Highlighted HTML for [`CodeKind::Highlighted`].
    pub highlighted: Option<String>,
    pub copy: CopyAffordance,
}

impl CodeBlock {
    /// Header label: the language name for highlighted blocks.
    pub fn label(&self) -> Option<&str> {
        match &self.kind {
            CodeKind::Highlighted { language } => Some(language),
            _ => None,
        }
    }
}

// ── Diagrams ─────────────────────────────────────────────────────────────

/// Per-diagram render bookkeeping.
///
/// `processed` goes from false to true exactly once; a node that is already
/// processed is never handed to the engine again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MermaidRenderState {
    pub processed: bool,
    /// Theme directive line, a newline, then the diagram source.
    pub code: String,
}

/// What a diagram node currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DiagramContent {
    /// Not processed yet; the raw source is shown.
    Pending,
    Loading,
    Rendered { svg: String },
    /// Body was blank: nothing is shown.
    Empty,
    /// Error panel; `message` is unescaped here and escaped on output.
    Failed { message: String },
}

#[derive(Debug)]
pub struct DiagramBlock {
    pub id: String,
    /// Fallback text, with any leading `%%{...}%%` directive removed.
    pub source: String,
    pub state: MermaidRenderState,
    pub content: DiagramContent,
}

impl DiagramBlock {
    pub const HEADER: &'static str = "Flow Diagram";

    /// Text of the render code after its directive line.
    pub fn body(&self) -> &str {
        self.state
            .code
            .split_once('\n')
            .map(|(_, body)| body)
            .unwrap_or_default()
    }

    /// True when there is nothing to draw.
    pub fn is_blank(&self) -> bool {
        self.body().trim().is_empty()
    }
}

// ── Inlines ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Code(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Link { url: String, content: Vec<Inline> },
    Image { url: String, alt: String },
    Html(String),
    SoftBreak,
    HardBreak,
}

/// Concatenate the visible text of inline content.
pub fn flatten_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    push_text(inlines, &mut out);
    out
}

fn push_text(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(t) | Inline::Code(t) => out.push_str(t),
            Inline::Emphasis(c) | Inline::Strong(c) | Inline::Strikethrough(c) => push_text(c, out),
            Inline::Link { content, .. } => push_text(content, out),
            Inline::Image { alt, .. } => out.push_str(alt),
            Inline::SoftBreak | Inline::HardBreak => out.push(' '),
            Inline::Html(_) => {}
        }
    }
}

// ── Document ─────────────────────────────────────────────────────────────

/// The display tree for one content string.
#[derive(Debug)]
pub struct RenderedDocument {
    pub theme: Theme,
    pub blocks: Vec<Block>,
    /// Whole-document copy action over the Markdown source.
    pub copy_all: CopyAffordance,
}

impl RenderedDocument {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All diagram nodes in document order.
    pub fn diagrams(&self) -> Vec<&DiagramBlock> {
        let mut out = Vec::new();
        visit_blocks(&self.blocks, &mut |b| {
            if let Block::Diagram(d) = b {
                out.push(d);
            }
        });
        out
    }

    /// Mutable access to every diagram node, in document order.
    pub fn diagrams_mut(&mut self) -> Vec<&mut DiagramBlock> {
        let mut out = Vec::new();
        collect_diagrams(&mut self.blocks, &mut out);
        out
    }

    /// All fenced code blocks shown as code, in document order.
    pub fn code_blocks(&self) -> Vec<&CodeBlock> {
        let mut out = Vec::new();
        visit_blocks(&self.blocks, &mut |b| {
            if let Block::Code(c) = b {
                out.push(c);
            }
        });
        out
    }

    /// `(level, id)` of every heading that carries an anchor.
    pub fn heading_ids(&self) -> Vec<(u8, &str)> {
        let mut out = Vec::new();
        visit_blocks(&self.blocks, &mut |b| {
            if let Block::Heading {
                level,
                id: Some(id),
                ..
            } = b
            {
                out.push((*level, id.as_str()));
            }
        });
        out
    }
}

fn visit_blocks<'a>(blocks: &'a [Block], f: &mut impl FnMut(&'a Block)) {
    for block in blocks {
        f(block);
        match block {
            Block::Callout { blocks, .. } => visit_blocks(blocks, f),
            Block::List { items, .. } => {
                for item in items {
                    visit_blocks(&item.blocks, f);
                }
            }
            _ => {}
        }
    }
}

fn collect_diagrams<'a>(blocks: &'a mut [Block], out: &mut Vec<&'a mut DiagramBlock>) {
    for block in blocks {
        match block {
            Block::Diagram(d) => out.push(d),
            Block::Callout { blocks, .. } => collect_diagrams(blocks, out),
            Block::List { items, .. } => {
                for item in items {
                    collect_diagrams(&mut item.blocks, out);
                }
            }
            _ => {}
        }
    }
}
