//! Structured-output parsing with text fallbacks.

use regex::Regex;
use std::sync::OnceLock;

use docsight_types::{DocsightError, Result};

use crate::keywords::contains_any;

/// Upper bound on insights and recommendations kept from any source.
pub const MAX_ITEMS: usize = 5;

fn fence_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$").ok())
        .as_ref()
}

fn strip_code_fence(raw: &str) -> &str {
    match fence_re()
        .and_then(|re| re.captures(raw))
        .and_then(|c| c.get(1))
    {
        Some(m) => m.as_str(),
        None => raw.trim(),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn items_from_array(values: Vec<serde_json::Value>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| match v {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse a model response expected to be a JSON array of strings.
///
/// Accepts a bare array, a fenced ```json block, or an array embedded in
/// surrounding prose. Non-string items are kept in their JSON form.
/// Anything else is a [`DocsightError::Parse`].
pub fn parse_string_list(raw: &str) -> Result<Vec<String>> {
    let body = strip_code_fence(raw);

    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Array(values)) => return Ok(items_from_array(values)),
        Ok(other) => {
            return Err(DocsightError::Parse(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            )))
        }
        Err(_) => {}
    }

    if let (Some(start), Some(end)) = (body.find('['), body.rfind(']')) {
        if start < end {
            if let Ok(serde_json::Value::Array(values)) = serde_json::from_str(&body[start..=end]) {
                return Ok(items_from_array(values));
            }
        }
    }

    let preview: String = body.chars().take(60).collect();
    Err(DocsightError::Parse(format!(
        "expected a JSON array of strings, got: {preview}"
    )))
}

/// Sentences of `text` (split on ". ") longer than 20 characters that
/// mention one of `keywords`, each ending in a period, at most `cap`.
pub fn sentence_fallback(text: &str, keywords: &[&str], cap: usize) -> Vec<String> {
    text.split(". ")
        .map(str::trim)
        .filter(|s| s.chars().count() > 20)
        .filter(|s| contains_any(&s.to_lowercase(), keywords))
        .map(|s| {
            if s.ends_with('.') {
                s.to_string()
            } else {
                format!("{s}.")
            }
        })
        .take(cap)
        .collect()
}

/// Non-blank lines of `text` longer than 10 characters, at most `cap`.
pub fn line_fallback(text: &str, cap: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| l.chars().count() > 10)
        .map(String::from)
        .take(cap)
        .collect()
}
