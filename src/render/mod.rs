//! Markdown render pipeline.
//!
//! ```text
//! Markdown ──▶ pulldown-cmark events ──▶ display tree ──▶ diagram pass ──▶ HTML
//!              (GFM extensions)          (node)           (diagram)        (html)
//! ```
//!
//! ## Why build a tree?
//!
//! The diagram pass runs after the document exists and updates diagram nodes
//! in place. A tree keeps those nodes addressable, so the pass can mark each
//! one processed and fill in its result without re-parsing the source. The
//! tree is thrown away and rebuilt on every content change.
//!
//! GFM support: tables, strikethrough, task lists and autolinks (both
//! `<https://...>` and bare `http(s)://` URLs in text).

pub mod copy;
pub mod diagram;
pub mod highlight;
pub mod html;
pub mod node;

use crate::config::{RenderConfig, Theme};
use crate::slug::slugify;
use copy::CopyAffordance;
use node::{
    flatten_text, Block, CodeBlock, CodeKind, ColumnAlign, DiagramBlock, DiagramContent, Inline,
    ListItem, MermaidRenderState, RenderedDocument, Table,
};
use once_cell::sync::Lazy;
use pulldown_cmark::{Alignment, CodeBlockKind, Event, Options, Parser, Tag};
use regex::Regex;
use std::time::Duration;
use tracing::debug;

/// Render Markdown with default timings.
///
/// Empty input gives an empty document, never an error.
pub fn render_markdown(source: &str, theme: Theme) -> RenderedDocument {
    Renderer {
        theme,
        ..Renderer::default()
    }
    .render(source)
}

/// Markdown-to-tree renderer.
#[derive(Debug, Clone)]
pub struct Renderer {
    pub theme: Theme,
    pub code_copy_reset: Duration,
    pub document_copy_reset: Duration,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            code_copy_reset: copy::CODE_RESET,
            document_copy_reset: copy::DOCUMENT_RESET,
        }
    }
}

impl Renderer {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            theme: config.theme,
            code_copy_reset: config.code_copy_reset(),
            document_copy_reset: config.document_copy_reset(),
        }
    }

    pub fn render(&self, source: &str) -> RenderedDocument {
        let mut builder = TreeBuilder {
            renderer: self,
            stack: vec![Frame::Root(Vec::new())],
            text: String::new(),
            diagrams: 0,
        };

        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        for event in Parser::new_ext(source, options) {
            builder.event(event);
        }

        let blocks = builder.finish();
        debug!("Rendered {} top-level blocks", blocks.len());
        RenderedDocument {
            theme: self.theme,
            blocks,
            copy_all: CopyAffordance::new(source, self.document_copy_reset),
        }
    }

    fn code_block(&self, info: Option<String>, raw: String, diagram_index: &mut usize) -> Block {
        let text = raw.trim().to_string();
        match CodeKind::for_fence(info.as_deref()) {
            CodeKind::Diagram => {
                let id = format!("mermaid-{}", *diagram_index);
                *diagram_index += 1;
                Block::Diagram(diagram_block(id, &text, self.theme))
            }
            kind => {
                let highlighted = match &kind {
                    CodeKind::Highlighted { language } => {
                        Some(highlight::highlight(&text, language, self.theme))
                    }
                    _ => None,
                };
                Block::Code(CodeBlock {
                    copy: CopyAffordance::new(text.clone(), self.code_copy_reset),
                    kind,
                    text,
                    highlighted,
                })
            }
        }
    }
}

// ── Diagram placeholders ─────────────────────────────────────────────────

/// Directive line prepended to diagram code for `theme`.
pub fn theme_directive(theme: Theme) -> &'static str {
    match theme {
        Theme::Dark => "%%{init: {'theme': 'dark'}}%%",
        Theme::Light => "%%{init: {'theme': 'default'}}%%",
    }
}

static RE_LEADING_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A\s*%%\{.*?\}%%[ \t]*\r?\n?").expect("valid directive regex"));

fn diagram_block(id: String, text: &str, theme: Theme) -> DiagramBlock {
    // Some generators wrap the diagram in a second fence inside the first.
    let source = if text.starts_with("```") {
        let lines: Vec<&str> = text.lines().collect();
        lines[1..lines.len().saturating_sub(1).max(1)].join("\n")
    } else {
        text.to_string()
    };

    DiagramBlock {
        id,
        state: MermaidRenderState {
            processed: false,
            code: format!("{}\n{}", theme_directive(theme), source),
        },
        source: RE_LEADING_DIRECTIVE.replace(&source, "").into_owned(),
        content: DiagramContent::Pending,
    }
}

// ── Bare URL autolinks ───────────────────────────────────────────────────

static RE_BARE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://[^\s<>"]*[^\s<>".,:;!?'")\]]"#).expect("valid url regex")
});

fn linkify(text: &str, out: &mut Vec<Inline>) {
    let mut last = 0;
    for m in RE_BARE_URL.find_iter(text) {
        if m.start() > last {
            out.push(Inline::Text(text[last..m.start()].to_string()));
        }
        out.push(Inline::Link {
            url: m.as_str().to_string(),
            content: vec![Inline::Text(m.as_str().to_string())],
        });
        last = m.end();
    }
    if last < text.len() {
        out.push(Inline::Text(text[last..].to_string()));
    }
}

// ── Tree building ────────────────────────────────────────────────────────

/// Open container while walking the event stream. Every `End` event closes
/// the top frame, whatever its tag.
enum Frame {
    Root(Vec<Block>),
    Paragraph(Vec<Inline>),
    Heading { level: u8, inlines: Vec<Inline> },
    Quote(Vec<Block>),
    Code { info: Option<String>, text: String },
    List { start: Option<u64>, items: Vec<ListItem> },
    Item { item: ListItem, pending: Vec<Inline> },
    Table(Table),
    TableHead(Vec<Vec<Inline>>),
    TableRow(Vec<Vec<Inline>>),
    TableCell(Vec<Inline>),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Link { url: String, inlines: Vec<Inline> },
    Image { url: String, inlines: Vec<Inline> },
    HtmlBlock(String),
    /// Containers without a presentation of their own; contents are spliced
    /// into the parent.
    Passthrough { blocks: Vec<Block>, inlines: Vec<Inline> },
}

impl Frame {
    fn inlines(&mut self) -> Option<&mut Vec<Inline>> {
        match self {
            Frame::Paragraph(v)
            | Frame::Heading { inlines: v, .. }
            | Frame::Item { pending: v, .. }
            | Frame::TableCell(v)
            | Frame::Emphasis(v)
            | Frame::Strong(v)
            | Frame::Strikethrough(v)
            | Frame::Link { inlines: v, .. }
            | Frame::Image { inlines: v, .. }
            | Frame::Passthrough { inlines: v, .. } => Some(v),
            _ => None,
        }
    }

    fn push_block(&mut self, block: Block) {
        match self {
            Frame::Root(v) | Frame::Quote(v) | Frame::Passthrough { blocks: v, .. } => v.push(block),
            Frame::Item { item, pending } => {
                if !pending.is_empty() {
                    item.blocks.push(Block::Plain(std::mem::take(pending)));
                }
                item.blocks.push(block);
            }
            // Block content cannot sit in an inline container; keep its text.
            other => {
                if let (Some(v), Some(text)) = (other.inlines(), block_text(&block)) {
                    v.push(Inline::Text(text));
                }
            }
        }
    }
}

fn block_text(block: &Block) -> Option<String> {
    match block {
        Block::Paragraph(i) | Block::Plain(i) => Some(flatten_text(i)),
        Block::Code(c) => Some(c.text.clone()),
        _ => None,
    }
}

struct TreeBuilder<'r> {
    renderer: &'r Renderer,
    stack: Vec<Frame>,
    text: String,
    diagrams: usize,
}

impl TreeBuilder<'_> {
    fn top(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn inside_link(&self) -> bool {
        self.stack
            .iter()
            .any(|f| matches!(f, Frame::Link { .. } | Frame::Image { .. }))
    }

    fn push_inline(&mut self, inline: Inline) {
        let top = self.top();
        if let Some(v) = top.inlines() {
            v.push(inline);
        } else {
            top.push_block(Block::Plain(vec![inline]));
        }
    }

    fn push_inlines(&mut self, inlines: Vec<Inline>) {
        for inline in inlines {
            self.push_inline(inline);
        }
    }

    fn raw_buffer(&mut self) -> Option<&mut String> {
        match self.top() {
            Frame::Code { text, .. } => Some(text),
            Frame::HtmlBlock(html) => Some(html),
            _ => None,
        }
    }

    /// Adjacent text events are merged before autolinking, so a URL split
    /// across two events is still found.
    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        if self.inside_link() {
            self.push_inline(Inline::Text(text));
        } else {
            let mut pieces = Vec::new();
            linkify(&text, &mut pieces);
            self.push_inlines(pieces);
        }
    }

    fn event(&mut self, event: Event<'_>) {
        if let Event::Text(text) = &event {
            match self.raw_buffer() {
                Some(buf) => buf.push_str(text),
                None => self.text.push_str(text),
            }
            return;
        }
        self.flush_text();

        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => self.end(),
            Event::Code(code) => self.push_inline(Inline::Code(code.to_string())),
            Event::Html(html) => match self.top() {
                Frame::HtmlBlock(buf) => buf.push_str(&html),
                _ => self.push_inline(Inline::Html(html.to_string())),
            },
            Event::InlineHtml(html) => self.push_inline(Inline::Html(html.to_string())),
            Event::SoftBreak => self.push_inline(Inline::SoftBreak),
            Event::HardBreak => self.push_inline(Inline::HardBreak),
            Event::Rule => self.top().push_block(Block::Rule),
            Event::TaskListMarker(checked) => {
                if let Some(Frame::Item { item, .. }) = self
                    .stack
                    .iter_mut()
                    .rev()
                    .find(|f| matches!(f, Frame::Item { .. }))
                {
                    item.task = Some(checked);
                }
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let frame = match tag {
            Tag::Paragraph => Frame::Paragraph(Vec::new()),
            Tag::Heading { level, .. } => Frame::Heading {
                level: level as u8,
                inlines: Vec::new(),
            },
            Tag::BlockQuote(_) => Frame::Quote(Vec::new()),
            Tag::CodeBlock(kind) => Frame::Code {
                info: match kind {
                    CodeBlockKind::Fenced(info) if !info.trim().is_empty() => Some(info.to_string()),
                    _ => None,
                },
                text: String::new(),
            },
            Tag::HtmlBlock => Frame::HtmlBlock(String::new()),
            Tag::List(start) => Frame::List {
                start,
                items: Vec::new(),
            },
            Tag::Item => Frame::Item {
                item: ListItem::default(),
                pending: Vec::new(),
            },
            Tag::Table(alignments) => Frame::Table(Table {
                alignments: alignments.into_iter().map(column_align).collect(),
                ..Table::default()
            }),
            Tag::TableHead => Frame::TableHead(Vec::new()),
            Tag::TableRow => Frame::TableRow(Vec::new()),
            Tag::TableCell => Frame::TableCell(Vec::new()),
            Tag::Emphasis => Frame::Emphasis(Vec::new()),
            Tag::Strong => Frame::Strong(Vec::new()),
            Tag::Strikethrough => Frame::Strikethrough(Vec::new()),
            Tag::Link { dest_url, .. } => Frame::Link {
                url: dest_url.to_string(),
                inlines: Vec::new(),
            },
            Tag::Image { dest_url, .. } => Frame::Image {
                url: dest_url.to_string(),
                inlines: Vec::new(),
            },
            _ => Frame::Passthrough {
                blocks: Vec::new(),
                inlines: Vec::new(),
            },
        };
        self.stack.push(frame);
    }

    fn end(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };

        match frame {
            Frame::Root(_) => {}
            Frame::Paragraph(inlines) => self.top().push_block(Block::Paragraph(inlines)),
            Frame::Heading { level, inlines } => {
                let id = (level <= 3).then(|| slugify(&flatten_text(&inlines)));
                self.top().push_block(Block::Heading {
                    level,
                    id,
                    content: inlines,
                });
            }
            Frame::Quote(blocks) => {
                let theme = self.renderer.theme;
                self.top().push_block(Block::Callout { theme, blocks });
            }
            Frame::Code { info, text } => {
                let block = self.renderer.code_block(info, text, &mut self.diagrams);
                self.top().push_block(block);
            }
            Frame::HtmlBlock(html) => self.top().push_block(Block::Html(html)),
            Frame::List { start, items } => self.top().push_block(Block::List { start, items }),
            Frame::Item { mut item, pending } => {
                if !pending.is_empty() {
                    item.blocks.push(Block::Plain(pending));
                }
                if let Frame::List { items, .. } = self.top() {
                    items.push(item);
                } else {
                    for block in item.blocks {
                        self.top().push_block(block);
                    }
                }
            }
            Frame::Table(table) => self.top().push_block(Block::Table(table)),
            Frame::TableHead(cells) => {
                if let Frame::Table(table) = self.top() {
                    table.head = cells;
                }
            }
            Frame::TableRow(cells) => {
                if let Frame::Table(table) = self.top() {
                    table.rows.push(cells);
                }
            }
            Frame::TableCell(inlines) => match self.top() {
                Frame::TableHead(cells) | Frame::TableRow(cells) => cells.push(inlines),
                _ => self.push_inlines(inlines),
            },
            Frame::Emphasis(inlines) => self.push_inline(Inline::Emphasis(inlines)),
            Frame::Strong(inlines) => self.push_inline(Inline::Strong(inlines)),
            Frame::Strikethrough(inlines) => self.push_inline(Inline::Strikethrough(inlines)),
            Frame::Link { url, inlines } => self.push_inline(Inline::Link {
                url,
                content: inlines,
            }),
            Frame::Image { url, inlines } => self.push_inline(Inline::Image {
                url,
                alt: flatten_text(&inlines),
            }),
            Frame::Passthrough { blocks, inlines } => {
                for block in blocks {
                    self.top().push_block(block);
                }
                self.push_inlines(inlines);
            }
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush_text();
        while self.stack.len() > 1 {
            self.end();
        }
        match self.stack.pop() {
            Some(Frame::Root(blocks)) => blocks,
            _ => Vec::new(),
        }
    }
}

fn column_align(a: Alignment) -> ColumnAlign {
    match a {
        Alignment::None => ColumnAlign::None,
        Alignment::Left => ColumnAlign::Left,
        Alignment::Center => ColumnAlign::Center,
        Alignment::Right => ColumnAlign::Right,
    }
}
