//! Strips leaked drafting notes and normalizes whitespace in model output

use once_cell::sync::Lazy;
use regex::Regex;

/// Leading annotations some models emit before the actual answer
static LEADING_NOTES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"(?im)^\(Self-Correction during drafting\)["\s]*:\s*["']Make sure to[^"']*["']\s*"#,
        r#"(?im)^\(Self-Correction during drafting\)[":\s]*"#,
        r"(?im)^\(Note:[^)]*\)\s*",
        r"(?im)^\(Internal:[^)]*\)\s*",
        r"(?im)^\[System:[^\]]*\]\s*",
        r"(?im)^\[Note:[^\]]*\]\s*",
        r#"(?im)^["']Make sure to[^"']*["']\s*"#,
        r#"(?im)^["']Note:[^"']*["']\s*"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

static SURROUNDING_QUOTES: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^["']+|["']+$"#).unwrap());

static HORIZONTAL_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

static BLANK_LINE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n\s*\n+").unwrap());

static EMPTY_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*\)|\[\s*\]").unwrap());

/// Clean a generated answer before it is returned or cached
pub fn clean_response(text: &str) -> String {
    let mut cleaned = text.to_string();

    for pattern in LEADING_NOTES.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }

    cleaned = SURROUNDING_QUOTES.replace_all(&cleaned, "").into_owned();
    cleaned = HORIZONTAL_SPACE.replace_all(&cleaned, " ").into_owned();
    cleaned = BLANK_LINE_RUN.replace_all(&cleaned, "\n\n").into_owned();
    cleaned = EMPTY_BRACKETS.replace_all(&cleaned, "").into_owned();

    cleaned.trim().to_string()
}
