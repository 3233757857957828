//! Keyword-driven query classification.

use async_trait::async_trait;

use docsight_types::{AnalysisType, Result};

use crate::keywords::{
    contains_any, COMPARISON_KEYWORDS, PREDICTION_KEYWORDS, SUMMARY_KEYWORDS, TREND_KEYWORDS,
};

/// Classify a query by keyword containment; the first matching group wins.
pub fn classify_query(query: &str) -> AnalysisType {
    let q = query.to_lowercase();
    if contains_any(&q, TREND_KEYWORDS) {
        AnalysisType::TrendAnalysis
    } else if contains_any(&q, COMPARISON_KEYWORDS) {
        AnalysisType::Comparison
    } else if contains_any(&q, SUMMARY_KEYWORDS) {
        AnalysisType::Summary
    } else if contains_any(&q, PREDICTION_KEYWORDS) {
        AnalysisType::Prediction
    } else {
        AnalysisType::General
    }
}

/// Classification seam used by the analytics workflow.
#[async_trait]
pub trait QueryClassifier: Send + Sync {
    async fn classify(&self, query: &str) -> Result<AnalysisType>;
}

/// [`QueryClassifier`] backed by [`classify_query`]. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

#[async_trait]
impl QueryClassifier for KeywordClassifier {
    async fn classify(&self, query: &str) -> Result<AnalysisType> {
        Ok(classify_query(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_wins_over_comparison() {
        assert_eq!(
            classify_query("trend over time vs last year"),
            AnalysisType::TrendAnalysis
        );
    }

    #[test]
    fn each_group_is_recognised() {
        assert_eq!(classify_query("Compare Q1 vs Q2 revenue"), AnalysisType::Comparison);
        assert_eq!(classify_query("Give me an OVERVIEW"), AnalysisType::Summary);
        assert_eq!(classify_query("forecast next quarter"), AnalysisType::Prediction);
        assert_eq!(classify_query("who signed the contract?"), AnalysisType::General);
    }

    #[test]
    fn summary_beats_prediction() {
        assert_eq!(
            classify_query("predict the total spend"),
            AnalysisType::Summary
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let q = "How did growth change between regions?";
        assert_eq!(classify_query(q), classify_query(q));
    }

    #[tokio::test]
    async fn keyword_classifier_delegates() {
        let c = KeywordClassifier;
        assert_eq!(
            c.classify("revenue growth").await.unwrap(),
            AnalysisType::TrendAnalysis
        );
    }
}
