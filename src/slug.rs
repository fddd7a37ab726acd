//! Heading slugs: the anchor ids shared by headings and the table of contents.
//!
//! Slugs are not made unique. Two headings with the same text get the same
//! id and an in-page link resolves to whichever the viewer finds first.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static RE_DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9-]").expect("valid regex"));
static RE_HYPHEN_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").expect("valid regex"));

/// Turn heading text into a URL-fragment-safe anchor id.
///
/// Lowercase, trim, whitespace runs to `-`, drop everything outside
/// `[a-z0-9-]`, collapse hyphen runs. Leading or trailing hyphens that come
/// from the input survive.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let hyphenated = RE_WHITESPACE.replace_all(lowered.trim(), "-");
    let stripped = RE_DISALLOWED.replace_all(&hyphenated, "");
    RE_HYPHEN_RUN.replace_all(&stripped, "-").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_heading() {
        assert_eq!(slugify("My Feature"), "my-feature");
        assert_eq!(slugify("  Hello   World  "), "hello-world");
    }

    #[test]
    fn numbered_tdd_headings() {
        assert_eq!(slugify("2.1 User Login"), "21-user-login");
        assert_eq!(slugify("III. Appendix"), "iii-appendix");
    }

    #[test]
    fn punctuation_and_emoji_are_dropped() {
        assert_eq!(slugify("📌 Feature: Coupons!"), "-feature-coupons");
        assert_eq!(slugify("A -- B"), "a-b");
    }

    #[test]
    fn non_ascii_letters_are_dropped() {
        assert_eq!(slugify("Café Menü"), "caf-men");
    }

    #[test]
    fn empty_and_blank() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify(" \t\n "), "");
    }

    #[test]
    fn idempotent() {
        for s in ["My Feature", "📌 Feature: Coupons!", "a--b", "x - y", "-lead"] {
            let once = slugify(s);
            assert_eq!(slugify(&once), once, "input: {s}");
        }
    }

    #[test]
    fn output_alphabet() {
        let s = slugify("Ünïcödé & <tags> \"quoted\" 100%");
        assert!(s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        assert!(!s.contains("--"));
    }
}
