//! Syntax highlighting for fenced code blocks, backed by syntect.
//!
//! Syntax and theme sets are loaded once per process. A language syntect
//! does not know is highlighted as plain text rather than rejected.

use crate::config::Theme;
use once_cell::sync::Lazy;
use syntect::highlighting::{Theme as SyntectTheme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};
use tracing::debug;

const DARK_THEME: &str = "base16-ocean.dark";
const LIGHT_THEME: &str = "InspiredGitHub";

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

fn syntax_for(language: &str) -> &'static SyntaxReference {
    SYNTAX_SET
        .find_syntax_by_token(language)
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text())
}

fn palette(theme: Theme) -> Option<&'static SyntectTheme> {
    let name = match theme {
        Theme::Dark => DARK_THEME,
        Theme::Light => LIGHT_THEME,
    };
    THEME_SET.themes.get(name)
}

/// Highlight `code` as `language` into a self-contained `<pre>` element
/// with inline styles.
///
/// Falls back to an escaped, unstyled `<pre><code>` if highlighting fails.
pub fn highlight(code: &str, language: &str, theme: Theme) -> String {
    let syntax = syntax_for(language);
    let highlighted = palette(theme)
        .ok_or_else(|| format!("theme for {theme} missing from the default set"))
        .and_then(|palette| {
            highlighted_html_for_string(code, &SYNTAX_SET, syntax, palette).map_err(|e| e.to_string())
        });

    match highlighted {
        Ok(html) => html,
        Err(e) => {
            debug!("Highlighting '{language}' failed, using plain output: {e}");
            format!(
                "<pre><code>{}</code></pre>\n",
                html_escape::encode_text(code)
            )
        }
    }
}
