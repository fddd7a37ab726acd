//! Table of contents built straight from Markdown source lines.

use crate::slug::slugify;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One navigable heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// 1..=3
    pub level: u8,
    pub text: String,
    pub slug: String,
}

pub type TableOfContents = Vec<TocEntry>;

static RE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,3})\s+(.*)").expect("valid heading regex"));

/// Collect level 1-3 ATX headings in document order.
///
/// Every line is matched on its own. `#` lines inside fenced code count as
/// headings too, and a `####` line never matches because the fourth `#` is
/// not whitespace.
pub fn build_toc(markdown: &str) -> TableOfContents {
    markdown
        .lines()
        .filter_map(|line| {
            let caps = RE_HEADING.captures(line)?;
            let text = caps[2].trim();
            if text.is_empty() {
                return None;
            }
            Some(TocEntry {
                level: caps[1].len() as u8,
                text: text.to_string(),
                slug: slugify(text),
            })
        })
        .collect()
}

/// Render the table of contents as a nested Markdown list of anchor links.
pub fn to_markdown(toc: &[TocEntry]) -> String {
    let mut out = String::new();
    for entry in toc {
        let indent = "  ".repeat(usize::from(entry.level.saturating_sub(1)));
        out.push_str(&format!("{indent}- [{}](#{})\n", entry.text, entry.slug));
    }
    out
}
