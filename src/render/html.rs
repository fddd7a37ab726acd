//! HTML output for a rendered document.
//!
//! [`RenderedDocument::to_html`] emits a fragment; [`page`] wraps it into a
//! standalone preview page with the table of contents as in-page navigation.
//!
//! Raw HTML found in the Markdown is escaped and shown as text: the content
//! usually comes from a model, and nothing in it is trusted markup.

use crate::config::Theme;
use crate::render::diagram::{ERROR_DETAIL, ERROR_TITLE, LOADING_TEXT};
use crate::render::node::{
    Block, CodeBlock, CodeKind, ColumnAlign, DiagramBlock, DiagramContent, Inline, ListItem,
    RenderedDocument, Table,
};
use crate::toc::TocEntry;
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::fmt::Write as _;

impl RenderedDocument {
    /// Emit the document as an HTML fragment.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, r#"<div class="reqdoc reqdoc-{}">"#, self.theme);
        write_blocks(&mut out, &self.blocks);
        out.push_str("</div>\n");
        out
    }
}

/// Error panel shown in place of a diagram that failed to render.
pub fn error_panel(message: &str) -> String {
    format!(
        "<div class=\"diagram-error\"><strong>{ERROR_TITLE}</strong><p>{ERROR_DETAIL}</p><pre>{}</pre></div>",
        text(message)
    )
}

fn write_blocks(out: &mut String, blocks: &[Block]) {
    for block in blocks {
        write_block(out, block);
    }
}

fn write_block(out: &mut String, block: &Block) {
    match block {
        Block::Heading { level, id, content } => {
            match id {
                Some(id) => {
                    let _ = write!(out, r#"<h{level} id="{}">"#, attr(id));
                }
                None => {
                    let _ = write!(out, "<h{level}>");
                }
            }
            write_inlines(out, content);
            let _ = writeln!(out, "</h{level}>");
        }
        Block::Paragraph(inlines) => {
            out.push_str("<p>");
            write_inlines(out, inlines);
            out.push_str("</p>\n");
        }
        Block::Plain(inlines) => write_inlines(out, inlines),
        Block::Callout { theme, blocks } => {
            let _ = write!(
                out,
                r#"<blockquote class="callout callout-{theme}"><span class="callout-glyph" aria-hidden="true">&#8220;</span><div class="callout-body">"#
            );
            write_blocks(out, blocks);
            out.push_str("</div></blockquote>\n");
        }
        Block::Code(code) => write_code(out, code),
        Block::Diagram(diagram) => write_diagram(out, diagram),
        Block::List { start, items } => write_list(out, *start, items),
        Block::Table(table) => write_table(out, table),
        Block::Rule => out.push_str("<hr>\n"),
        Block::Html(html) => {
            let _ = writeln!(out, r#"<pre class="raw-html">{}</pre>"#, text(html));
        }
    }
}

fn copy_button(out: &mut String, code: &CodeBlock) {
    let label = if code.copy.is_copied() {
        "Copied to clipboard"
    } else {
        "Copy code to clipboard"
    };
    let disabled = if code.copy.is_enabled() { "" } else { " disabled" };
    let _ = write!(
        out,
        r#"<button class="copy-button" type="button" data-copy="{}" aria-label="{label}"{disabled}>Copy</button>"#,
        attr(code.copy.text())
    );
}

fn write_code(out: &mut String, code: &CodeBlock) {
    match (&code.kind, &code.highlighted) {
        (CodeKind::Highlighted { language }, Some(html)) => {
            let _ = write!(
                out,
                r#"<div class="code-block code-highlighted"><div class="code-header"><span class="code-lang">{}</span>"#,
                text(language)
            );
            copy_button(out, code);
            out.push_str("</div>");
            out.push_str(html);
            out.push_str("</div>\n");
        }
        _ => {
            let _ = write!(
                out,
                r#"<div class="code-block code-plain"><pre><code>{}</code></pre>"#,
                text(&code.text)
            );
            copy_button(out, code);
            out.push_str("</div>\n");
        }
    }
}

fn write_diagram(out: &mut String, diagram: &DiagramBlock) {
    let _ = write!(
        out,
        r#"<div class="mermaid-container"><div class="diagram-header">{}</div><div class="diagram-body" data-mermaid-code="{}"><div id="{}" class="mermaid" data-processed="{}">"#,
        DiagramBlock::HEADER,
        attr(&diagram.state.code),
        attr(&diagram.id),
        diagram.state.processed,
    );
    match &diagram.content {
        DiagramContent::Pending => out.push_str(&text(&diagram.source)),
        DiagramContent::Loading => {
            let _ = write!(out, r#"<div class="diagram-loading">{LOADING_TEXT}</div>"#);
        }
        DiagramContent::Rendered { svg } => out.push_str(svg),
        DiagramContent::Empty => {}
        DiagramContent::Failed { message } => out.push_str(&error_panel(message)),
    }
    out.push_str("</div></div></div>\n");
}

fn write_list(out: &mut String, start: Option<u64>, items: &[ListItem]) {
    let close = match start {
        Some(1) => {
            out.push_str("<ol>\n");
            "</ol>\n"
        }
        Some(n) => {
            let _ = writeln!(out, r#"<ol start="{n}">"#);
            "</ol>\n"
        }
        None => {
            out.push_str("<ul>\n");
            "</ul>\n"
        }
    };
    for item in items {
        match item.task {
            Some(checked) => {
                let _ = write!(
                    out,
                    r#"<li class="task"><input type="checkbox" disabled{}> "#,
                    if checked { " checked" } else { "" }
                );
            }
            None => out.push_str("<li>"),
        }
        write_blocks(out, &item.blocks);
        out.push_str("</li>\n");
    }
    out.push_str(close);
}

fn align_style(align: ColumnAlign) -> &'static str {
    match align {
        ColumnAlign::None => "",
        ColumnAlign::Left => r#" style="text-align: left""#,
        ColumnAlign::Center => r#" style="text-align: center""#,
        ColumnAlign::Right => r#" style="text-align: right""#,
    }
}

fn write_table(out: &mut String, table: &Table) {
    let style = |i: usize| {
        table
            .alignments
            .get(i)
            .copied()
            .map(align_style)
            .unwrap_or_default()
    };

    out.push_str("<table>\n<thead><tr>");
    for (i, cell) in table.head.iter().enumerate() {
        let _ = write!(out, "<th{}>", style(i));
        write_inlines(out, cell);
        out.push_str("</th>");
    }
    out.push_str("</tr></thead>\n<tbody>\n");
    for row in &table.rows {
        out.push_str("<tr>");
        for (i, cell) in row.iter().enumerate() {
            let _ = write!(out, "<td{}>", style(i));
            write_inlines(out, cell);
            out.push_str("</td>");
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>\n");
}

fn write_inlines(out: &mut String, inlines: &[Inline]) {
    for inline in inlines {
        match inline {
            Inline::Text(t) => out.push_str(&text(t)),
            Inline::Code(c) => {
                let _ = write!(out, "<code>{}</code>", text(c));
            }
            Inline::Emphasis(c) => wrap(out, "em", c),
            Inline::Strong(c) => wrap(out, "strong", c),
            Inline::Strikethrough(c) => wrap(out, "del", c),
            Inline::Link { url, content } => {
                let _ = write!(out, r#"<a href="{}">"#, attr(safe_url(url)));
                write_inlines(out, content);
                out.push_str("</a>");
            }
            Inline::Image { url, alt } => {
                let _ = write!(out, r#"<img src="{}" alt="{}">"#, attr(safe_url(url)), attr(alt));
            }
            Inline::Html(h) => out.push_str(&text(h)),
            Inline::SoftBreak => out.push('\n'),
            Inline::HardBreak => out.push_str("<br>\n"),
        }
    }
}

/// Schemes allowed in `href` / `src`.
const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// `url` if it is relative, a fragment or uses a safe scheme; `#` otherwise.
///
/// A colon only starts a scheme when no `/`, `?` or `#` precedes it.
pub fn safe_url(url: &str) -> &str {
    let Some(colon) = url.find(':') else {
        return url;
    };
    if url[..colon].contains(['/', '?', '#']) {
        return url;
    }
    let scheme = &url[..colon];
    if SAFE_SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
        url
    } else {
        "#"
    }
}

fn wrap(out: &mut String, tag: &str, content: &[Inline]) {
    let _ = write!(out, "<{tag}>");
    write_inlines(out, content);
    let _ = write!(out, "</{tag}>");
}

// ── Standalone page ──────────────────────────────────────────────────────

const PAGE_STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; line-height: 1.7; }
.layout { display: flex; min-height: 100vh; }
.toc { width: 18rem; flex-shrink: 0; padding: 1rem; position: sticky; top: 0; align-self: flex-start; max-height: 100vh; overflow-y: auto; }
.toc h3 { text-transform: uppercase; letter-spacing: .05em; font-size: .9rem; }
.toc ul { list-style: none; padding: 0; margin: 0; }
.toc a { display: block; padding: .2rem .5rem; text-decoration: none; font-size: .9rem; border-radius: .3rem; }
.toc .toc-l2 { margin-left: 1rem; } .toc .toc-l3 { margin-left: 2rem; }
main { flex: 1; padding: 1.5rem 2rem; min-width: 0; }
.callout { margin: 1.5rem 0; border-left: 4px solid; border-radius: 0 .5rem .5rem 0; padding: 1rem 1rem 1rem 1.25rem; position: relative; }
.callout-glyph { position: absolute; left: .25rem; top: .1rem; font-size: 2rem; opacity: .3; }
.callout-body { margin-left: 1rem; font-style: italic; }
.code-block { position: relative; margin: 1.5rem 0; border-radius: .5rem; overflow: hidden; }
.code-header { display: flex; justify-content: space-between; align-items: center; padding: .4rem 1rem; }
.code-lang, .diagram-header { font-size: .75rem; font-weight: 600; text-transform: uppercase; letter-spacing: .05em; }
.code-block pre { margin: 0; padding: 1rem; overflow-x: auto; }
.code-plain .copy-button { position: absolute; top: .5rem; right: .5rem; }
.mermaid-container { margin: 2rem 0; border-radius: .5rem; border: 1px solid; }
.diagram-header { padding: .4rem 1rem; border-bottom: 1px solid; }
.diagram-body { display: flex; justify-content: center; padding: 1rem; }
.diagram-error { border: 1px solid #ef4444; border-radius: .4rem; padding: 1rem; color: #f87171; width: 100%; }
.diagram-error pre { white-space: pre-wrap; word-break: break-all; font-size: .75rem; }
table { width: 100%; border-collapse: collapse; margin: 1.5rem 0; }
th, td { padding: .75rem; border: 1px solid; text-align: left; }
.reqdoc-dark, body.dark { background: #111827; color: #d1d5db; }
.reqdoc-dark .callout { border-color: #06b6d4; background: rgba(31,41,55,.5); }
.reqdoc-dark code { background: rgba(55,65,81,.5); color: #fcd34d; }
.reqdoc-dark a, body.dark .toc a { color: #22d3ee; }
.reqdoc-dark th, .reqdoc-dark td, .reqdoc-dark .mermaid-container, .reqdoc-dark .diagram-header { border-color: #374151; }
.reqdoc-light, body.light { background: #ffffff; color: #111827; }
.reqdoc-light .callout { border-color: #d1d5db; background: #f9fafb; }
.reqdoc-light code { background: #f3f4f6; color: #db2777; }
.reqdoc-light a, body.light .toc a { color: #2563eb; }
.reqdoc-light th, .reqdoc-light td, .reqdoc-light .mermaid-container, .reqdoc-light .diagram-header { border-color: #d1d5db; }
.code-block pre code, .code-block pre { background: transparent; color: inherit; }
"#;

const PAGE_SCRIPT: &str = r#"
document.querySelectorAll('.copy-button').forEach(function (button) {
  button.addEventListener('click', function () {
    var text = button.getAttribute('data-copy');
    if (!text || button.disabled) return;
    navigator.clipboard.writeText(text).then(function () {
      button.disabled = true;
      button.textContent = 'Copied';
      button.setAttribute('aria-label', 'Copied to clipboard');
      setTimeout(function () {
        button.disabled = false;
        button.textContent = 'Copy';
        button.setAttribute('aria-label', 'Copy code to clipboard');
      }, 2000);
    });
  });
});
"#;

/// Render the table of contents as a navigation list. Empty TOC, no nav.
pub fn toc_nav(toc: &[TocEntry]) -> String {
    if toc.is_empty() {
        return String::new();
    }
    let mut out = String::from("<nav class=\"toc\"><h3>Contents</h3><ul>\n");
    for entry in toc {
        let _ = writeln!(
            out,
            r##"<li class="toc-l{}"><a href="#{}">{}</a></li>"##,
            entry.level,
            attr(&entry.slug),
            text(&entry.text)
        );
    }
    out.push_str("</ul></nav>\n");
    out
}

/// A standalone HTML page: TOC sidebar, document body and copy-button script.
pub fn page(title: &str, toc: &[TocEntry], doc: &RenderedDocument) -> String {
    let theme = match doc.theme {
        Theme::Dark => "dark",
        Theme::Light => "light",
    };
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{title}</title>\n<style>{PAGE_STYLE}</style>\n</head>\n\
<body class=\"{theme}\">\n<div class=\"layout\">\n{nav}<main>\n{body}</main>\n</div>\n\
<script>{PAGE_SCRIPT}</script>\n</body>\n</html>\n",
        title = text(title),
        nav = toc_nav(toc),
        body = doc.to_html(),
    )
}
