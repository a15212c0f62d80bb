//! Post summary and tech-tag extraction from model output

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::sanitize::clean_response;

/// Number of summary lines always returned
pub const SUMMARY_LINES: usize = 3;

/// Upper bound on returned tags
pub const SUMMARY_TAGS: usize = 5;

const UNAVAILABLE_LINE: &str = "Unable to generate a summary.";

/// Keywords recognized when the model answers in prose instead of JSON
const TECH_KEYWORDS: &[&str] = &[
    "React", "Vue", "Angular", "Next.js", "Nuxt", "Svelte",
    "TypeScript", "JavaScript", "Python", "Java", "Go", "Rust", "C++", "C#",
    "Node.js", "Express", "NestJS", "FastAPI", "Django", "Spring",
    "PostgreSQL", "MySQL", "MongoDB", "Redis", "Supabase", "Firebase",
    "AWS", "Azure", "GCP", "Docker", "Kubernetes",
    "Tailwind", "CSS", "SCSS", "Styled Components",
    "GraphQL", "REST", "gRPC",
];

static EMBEDDED_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

static LINE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());

static NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.)]\s").unwrap());

static NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.)]\s*").unwrap());

static BULLETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*]\s").unwrap());

static BULLET_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*]\s*").unwrap());

/// Three-line summary plus up to five technology tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub summary: Vec<String>,
    pub tags: Vec<String>,
}

impl PostSummary {
    /// Result returned whenever generation or parsing fails
    pub fn unavailable() -> Self {
        Self {
            summary: vec![UNAVAILABLE_LINE.to_string(), String::new(), String::new()],
            tags: Vec::new(),
        }
    }

    /// Enforce exactly three summary lines and at most five tags
    fn finalize(mut summary: Vec<String>, mut tags: Vec<String>) -> Self {
        if summary.is_empty() {
            return Self::unavailable().with_tags(tags);
        }

        summary.resize(SUMMARY_LINES, String::new());
        tags.truncate(SUMMARY_TAGS);

        Self { summary, tags }
    }

    fn with_tags(mut self, mut tags: Vec<String>) -> Self {
        tags.truncate(SUMMARY_TAGS);
        self.tags = tags;
        self
    }
}

/// Parse a model reply into a summary
///
/// Accepts a bare JSON object, a JSON object embedded in prose, or
/// free text (numbered, bulleted or long lines become summary lines).
pub fn parse_summary(text: &str) -> PostSummary {
    let text = text.trim();

    if text.is_empty() {
        return PostSummary::unavailable();
    }

    match serde_json::from_str::<Value>(text) {
        Ok(value) => from_json(&value),
        Err(_) => match EMBEDDED_OBJECT.find(text) {
            Some(found) => match serde_json::from_str::<Value>(found.as_str()) {
                Ok(value) => from_json(&value),
                Err(_) => PostSummary::unavailable(),
            },
            None => from_text(text),
        },
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn from_json(value: &Value) -> PostSummary {
    PostSummary::finalize(
        string_list(value.get("summary")),
        string_list(value.get("tags")),
    )
}

fn from_text(text: &str) -> PostSummary {
    let cleaned = clean_response(text);

    let summary: Vec<String> = LINE_BREAKS
        .split(&cleaned)
        .map(str::trim)
        .filter(|line| {
            !line.is_empty()
                && (NUMBERED.is_match(line) || BULLETED.is_match(line) || line.chars().count() > 20)
        })
        .take(SUMMARY_LINES)
        .map(|line| {
            let line = NUMBER_PREFIX.replace(line, "");
            BULLET_PREFIX.replace(&line, "").trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect();

    let lowered = cleaned.to_lowercase();
    let tags: Vec<String> = TECH_KEYWORDS
        .iter()
        .filter(|keyword| lowered.contains(&keyword.to_lowercase()))
        .take(SUMMARY_TAGS)
        .map(|keyword| keyword.to_string())
        .collect();

    PostSummary::finalize(summary, tags)
}
