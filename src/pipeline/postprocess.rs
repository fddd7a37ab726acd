//! Post-processing: deterministic cleanup of model responses.
//!
//! ## Why is post-processing necessary?
//!
//! Even well-prompted models return artefacts that are harmless to a reader
//! but break the next stage:
//!
//! - the whole Markdown answer wrapped in a ` ```markdown ` fence, which would
//!   render as one big code block;
//! - a JSON answer wrapped in a ` ```json ` fence or preceded by a sentence,
//!   which `serde_json` rejects;
//! - a diagram field that still carries its ` ```mermaid ` fence although the
//!   field must hold raw diagram code;
//! - CRLF line endings, zero-width characters, runs of blank lines, tables
//!   without a separator row.
//!
//! Each rule is a small pure function; [`clean_markdown`] applies the
//! Markdown rules in a fixed order.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a Markdown answer.
///
/// Rules, in order:
/// 1. Strip an outer ` ```markdown ` / ` ```md ` / bare fence around the whole answer
/// 2. Normalise line endings (CRLF / CR → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line, outside code fences
/// 5. Collapse runs of blank lines to one, outside code fences
/// 6. Insert a missing separator row after a table header
/// 7. Ensure the text ends with exactly one newline
pub fn clean_markdown(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = tidy_prose_lines(&s);
    let s = fix_headerless_tables(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Strip an outer fence ─────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\r?\n(.*?)\r?\n```[ \t]*$").expect("valid fence regex")
});

fn strip_outer_fence(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCE.captures(trimmed) {
        Some(caps) if inner_fences_balanced(&caps[1]) => caps[1].to_string(),
        _ => input.to_string(),
    }
}

/// Fences inside a wrapped answer must open with a language tag and pair
/// up. A bare ``` as the first inner fence means the "outer" fence was
/// really the first of several code blocks.
fn inner_fences_balanced(inner: &str) -> bool {
    let fences: Vec<&str> = inner
        .lines()
        .map(str::trim_start)
        .filter(|l| l.starts_with("```"))
        .collect();
    match fences.first() {
        None => true,
        Some(first) => first.trim_end().len() > 3 && fences.len() % 2 == 0,
    }
}

// ── Rule 2: Line endings ─────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Invisible characters ─────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

// ── Rules 4 and 5: Trailing whitespace and blank runs ────────────────────

/// Code inside fences is left byte-for-byte alone: it ends up on the
/// clipboard exactly as written.
fn tidy_prose_lines(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut in_fence = false;
    let mut blank_run = 0usize;

    for line in input.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            blank_run = 0;
            out.push(line.trim_end());
            continue;
        }
        if in_fence {
            out.push(line);
            continue;
        }

        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push(line);
    }

    out.join("\n")
}

// ── Rule 6: Table separator rows ─────────────────────────────────────────

fn is_table_row(line: &str) -> bool {
    let t = line.trim();
    t.len() > 2 && t.starts_with('|') && t.ends_with('|')
}

fn is_separator_row(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('|') && t.contains('-') && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// A model sometimes emits `| A | B |` followed directly by data rows.
/// Without the separator GFM renders the block as a paragraph of pipes.
fn fix_headerless_tables(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 4);
    let mut in_fence = false;

    for (i, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        out.push(line.to_string());
        if in_fence || !is_table_row(line) || is_separator_row(line) {
            continue;
        }

        let starts_table = i == 0 || !is_table_row(lines[i - 1]);
        let next = lines.get(i + 1).copied().unwrap_or("");
        if starts_table && is_table_row(next) && !is_separator_row(next) {
            let columns = line.trim().matches('|').count().saturating_sub(1).max(1);
            out.push(format!("|{}", " --- |".repeat(columns)));
        }
    }

    out.join("\n")
}

// ── Rule 7: Final newline ────────────────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

// ── Structured answers ───────────────────────────────────────────────────

static RE_JSON_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n(.*?)\r?\n?```").expect("valid json fence regex")
});

/// Extract the JSON payload from a model answer.
///
/// Prefers the content of a ` ```json ` fence; otherwise takes the span from
/// the first `{` or `[` to the matching last `}` or `]`. Returns the trimmed
/// input unchanged when neither applies, so the JSON parser reports the real
/// problem.
pub fn extract_json(input: &str) -> &str {
    let trimmed = input.trim();
    if let Some(caps) = RE_JSON_FENCE.captures(trimmed) {
        if let Some(body) = caps.get(1) {
            return body.as_str().trim();
        }
    }

    let open = trimmed.find(['{', '[']);
    let close = trimmed.rfind(['}', ']']);
    match (open, close) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

static RE_DIAGRAM_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[ \t]*(?:mermaid)?[ \t]*\n(.*?)\n?```$").expect("valid diagram fence regex")
});

/// Clean a raw diagram field: drop a surrounding ` ```mermaid ` fence and
/// normalise line endings.
pub fn clean_diagram(code: &str) -> String {
    let code = normalise_line_endings(code.trim());
    match RE_DIAGRAM_FENCE.captures(&code) {
        Some(caps) => caps[1].trim().to_string(),
        None => code,
    }
}
