//! Keyword tables and the shared substring matcher used by query analysis,
//! classification, insight fallback, and chart type selection.

/// `true` when `haystack` contains any of `needles` as a substring.
///
/// Callers pass an already lower-cased haystack; needles are lower-case.
pub fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

// ---------------------------------------------------------------------------
// RAG query analysis
// ---------------------------------------------------------------------------

pub const TABLE_HINTS: &[&str] = &["table", "data", "statistics", "numbers", "trend", "chart"];
pub const IMAGE_HINTS: &[&str] = &["image", "figure", "diagram", "photo", "picture"];
pub const CHART_HINTS: &[&str] = &["trend", "chart", "graph", "visualization"];

// ---------------------------------------------------------------------------
// Analytics classification (checked in this order)
// ---------------------------------------------------------------------------

pub const TREND_KEYWORDS: &[&str] = &["trend", "over time", "timeline", "change", "growth"];
pub const COMPARISON_KEYWORDS: &[&str] = &["compare", "vs", "versus", "difference", "between"];
pub const SUMMARY_KEYWORDS: &[&str] = &["summary", "overview", "summarize", "total", "average"];
pub const PREDICTION_KEYWORDS: &[&str] = &["predict", "forecast", "future", "projection"];

/// Words that mark a sentence as an insight when structured output is missing.
pub const IMPACT_KEYWORDS: &[&str] = &[
    "increase",
    "decrease",
    "trend",
    "significant",
    "growth",
    "decline",
    "improvement",
    "higher",
    "lower",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_any_is_substring_match() {
        assert!(contains_any("show the revenue trends", &["trend"]));
        assert!(contains_any("q1 vs q2", COMPARISON_KEYWORDS));
        assert!(!contains_any("hello world", TABLE_HINTS));
        assert!(!contains_any("anything", &[]));
    }

    #[test]
    fn multi_word_keywords_match_across_spaces() {
        assert!(contains_any("sales over time", TREND_KEYWORDS));
        assert!(!contains_any("sales overtime", &["over time"]));
    }
}
