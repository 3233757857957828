use async_trait::async_trait;
use std::sync::Arc;

use docsight_llm::{GenerationRequest, TextGenerator};
use docsight_types::{AnalysisType, Confidence, ContentType, Result};

use crate::classifier::QueryClassifier;
use crate::collaborators::{
    document_count, non_empty_chart, search_bounded, ChartGenerator, Retriever,
};
use crate::confidence::{score, ConfidenceSignals, ConfidenceWeights};
use crate::config::RetrievalConfig;
use crate::engine::Stage;
use crate::keywords::IMPACT_KEYWORDS;
use crate::parse::{line_fallback, parse_string_list, sentence_fallback, MAX_ITEMS};
use crate::tables::{extract_table_records, synthetic_table_document};

use super::routines::{no_data, run_routine, RoutineDeps};
use super::state::{AnalysisSummary, AnalyticsState, ProcessedData};
use super::{
    CALCULATE_CONFIDENCE, CLASSIFY_QUERY, CREATE_VISUALIZATIONS, ERROR_INSIGHT,
    ERROR_RECOMMENDATION, FORMULATE_RECOMMENDATIONS, GATHER_DATA, GENERATE_INSIGHTS,
    HANDLE_ERROR, NO_INSIGHTS, PROCESS_DATA,
};

// ---------------------------------------------------------------------------
// ClassifyQuery
// ---------------------------------------------------------------------------

pub(crate) struct ClassifyQuery {
    pub classifier: Arc<dyn QueryClassifier>,
}

#[async_trait]
impl Stage<AnalyticsState> for ClassifyQuery {
    fn id(&self) -> &str {
        CLASSIFY_QUERY
    }

    async fn execute(&self, state: &mut AnalyticsState) -> Result<()> {
        let analysis_type = self.classifier.classify(state.query()).await?;
        tracing::info!(analysis_type = %analysis_type, "Classified query");
        state.set_analysis_type(analysis_type)
    }
}

// ---------------------------------------------------------------------------
// GatherData
// ---------------------------------------------------------------------------

/// Content types searched for each analysis type.
pub(crate) fn gather_types(analysis_type: AnalysisType) -> &'static [ContentType] {
    match analysis_type {
        AnalysisType::TrendAnalysis | AnalysisType::Comparison => {
            &[ContentType::Table, ContentType::Text]
        }
        AnalysisType::Summary => &[ContentType::Text, ContentType::Table, ContentType::Image],
        AnalysisType::Prediction | AnalysisType::General => &[ContentType::Text, ContentType::Table],
    }
}

pub(crate) struct GatherData {
    pub retriever: Arc<dyn Retriever>,
    pub retrieval: RetrievalConfig,
}

#[async_trait]
impl Stage<AnalyticsState> for GatherData {
    fn id(&self) -> &str {
        GATHER_DATA
    }

    async fn execute(&self, state: &mut AnalyticsState) -> Result<()> {
        let analysis_type = state.effective_type();
        let k = self.retrieval.analytics_k(analysis_type);
        state.retrieved = search_bounded(
            self.retriever.as_ref(),
            state.query(),
            gather_types(analysis_type),
            k,
        )
        .await?;
        state.raw_data = state
            .retrieved
            .get(&ContentType::Table)
            .map(|docs| extract_table_records(docs))
            .unwrap_or_default();
        tracing::info!(
            records = state.raw_data.len(),
            documents = document_count(&state.retrieved),
            "Gathered data"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ProcessData
// ---------------------------------------------------------------------------

pub(crate) struct ProcessData {
    pub generator: Arc<dyn TextGenerator>,
    pub retriever: Arc<dyn Retriever>,
    pub side_k: usize,
}

#[async_trait]
impl Stage<AnalyticsState> for ProcessData {
    fn id(&self) -> &str {
        PROCESS_DATA
    }

    async fn execute(&self, state: &mut AnalyticsState) -> Result<()> {
        if state.raw_data.is_empty() {
            tracing::info!("No records to analyze");
            state.processed = Some(no_data());
            return Ok(());
        }
        let deps = RoutineDeps {
            generator: self.generator.as_ref(),
            retriever: self.retriever.as_ref(),
            side_k: self.side_k,
        };
        let output = run_routine(
            &deps,
            state.effective_type(),
            state.query(),
            &state.raw_data,
        )
        .await;
        if let Some(e) = output.failure {
            tracing::warn!(error = %e, "Analysis generation failed, using fallback narrative");
            state.degraded.push(format!("{PROCESS_DATA}: {e}"));
        }
        state.processed = Some(output.processed);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GenerateInsights
// ---------------------------------------------------------------------------

fn insights_prompt(narrative: &str, data_points: usize) -> String {
    format!(
        "Extract 3-5 key actionable insights from this analysis:\n\nAnalysis: {narrative}\n\n\
         Data points: {data_points}\n\nReturn insights as a JSON array of strings. Each insight should be:\n\
         1. Specific and actionable\n2. Based on the data\n3. Business-relevant\n4. Concise (1-2 sentences)\n\n\
         Example format:\n[\"Revenue increased by 15% year-over-year\", \"Q4 showed strongest growth at 23%\"]"
    )
}

pub(crate) struct GenerateInsights {
    pub generator: Arc<dyn TextGenerator>,
}

#[async_trait]
impl Stage<AnalyticsState> for GenerateInsights {
    fn id(&self) -> &str {
        GENERATE_INSIGHTS
    }

    async fn execute(&self, state: &mut AnalyticsState) -> Result<()> {
        let narrative = match &state.processed {
            Some(p) if p.generated => p.narrative.clone(),
            _ => {
                state.insights = vec![NO_INSIGHTS.to_string()];
                return Ok(());
            }
        };

        let request = GenerationRequest::new(insights_prompt(&narrative, state.raw_data.len()));
        let parsed = match self.generator.generate(&request).await {
            Ok(raw) => parse_string_list(&raw),
            Err(e) => {
                state.degraded.push(format!("{GENERATE_INSIGHTS}: {e}"));
                Err(e)
            }
        };
        state.insights = match parsed {
            Ok(items) if !items.is_empty() => items.into_iter().take(MAX_ITEMS).collect(),
            Ok(_) | Err(_) => {
                tracing::debug!("Falling back to sentence extraction for insights");
                sentence_fallback(&narrative, IMPACT_KEYWORDS, MAX_ITEMS)
            }
        };
        tracing::info!(insights = state.insights.len(), "Generated insights");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CreateVisualizations
// ---------------------------------------------------------------------------

pub(crate) struct CreateVisualizations {
    pub charts: Arc<dyn ChartGenerator>,
}

#[async_trait]
impl Stage<AnalyticsState> for CreateVisualizations {
    fn id(&self) -> &str {
        CREATE_VISUALIZATIONS
    }

    async fn execute(&self, state: &mut AnalyticsState) -> Result<()> {
        state.chart = None;
        let chartable = matches!(
            state.analysis_type(),
            Some(AnalysisType::TrendAnalysis) | Some(AnalysisType::Comparison)
        );
        if !state.options.generate_chart || !chartable || state.raw_data.is_empty() {
            return Ok(());
        }
        let document = synthetic_table_document(state.raw_data.clone());
        let chart = self
            .charts
            .generate(state.query(), std::slice::from_ref(&document))
            .await?;
        state.chart = non_empty_chart(chart);
        tracing::info!(created = state.chart.is_some(), "Created visualization");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FormulateRecommendations
// ---------------------------------------------------------------------------

fn recommendations_prompt(analysis_type: AnalysisType, narrative: &str, insights: &[String]) -> String {
    format!(
        "Based on this {analysis_type} analysis, provide 3-5 actionable recommendations:\n\n\
         Analysis: {narrative}\n\nKey Insights: {}\n\n\
         Provide specific, actionable recommendations that:\n1. Address the findings\n\
         2. Are practical to implement\n3. Have clear business value\n4. Are prioritized by impact\n\n\
         Return as a JSON array of strings.",
        insights.join("; ")
    )
}

pub(crate) struct FormulateRecommendations {
    pub generator: Arc<dyn TextGenerator>,
}

#[async_trait]
impl Stage<AnalyticsState> for FormulateRecommendations {
    fn id(&self) -> &str {
        FORMULATE_RECOMMENDATIONS
    }

    async fn execute(&self, state: &mut AnalyticsState) -> Result<()> {
        state.recommendations.clear();
        if !state.options.include_recommendations {
            return Ok(());
        }
        let prompt =
            recommendations_prompt(state.effective_type(), state.narrative(), &state.insights);
        let raw = self.generator.generate(&GenerationRequest::new(prompt)).await?;
        state.recommendations = match parse_string_list(&raw) {
            Ok(items) if !items.is_empty() => items.into_iter().take(MAX_ITEMS).collect(),
            Ok(_) | Err(_) => line_fallback(&raw, MAX_ITEMS),
        };
        tracing::info!(
            recommendations = state.recommendations.len(),
            "Formulated recommendations"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CalculateConfidence
// ---------------------------------------------------------------------------

pub(crate) struct CalculateConfidence {
    pub weights: ConfidenceWeights,
}

#[async_trait]
impl Stage<AnalyticsState> for CalculateConfidence {
    fn id(&self) -> &str {
        CALCULATE_CONFIDENCE
    }

    async fn execute(&self, state: &mut AnalyticsState) -> Result<()> {
        let signals = ConfidenceSignals {
            record_count: state.raw_data.len(),
            narrative_chars: state.narrative().chars().count(),
            insight_count: state.insights.len(),
            has_chart: state.chart.is_some(),
            analysis_type: state.analysis_type(),
        };
        state.confidence = score(&self.weights, &signals);
        tracing::info!(confidence = %state.confidence, "Calculated confidence");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HandleError
// ---------------------------------------------------------------------------

pub(crate) struct HandleError {
    pub error_confidence: f64,
}

#[async_trait]
impl Stage<AnalyticsState> for HandleError {
    fn id(&self) -> &str {
        HANDLE_ERROR
    }

    async fn execute(&self, state: &mut AnalyticsState) -> Result<()> {
        let error = state
            .error
            .clone()
            .unwrap_or_else(|| "Unknown error occurred".to_string());
        tracing::error!(error = %error, "Analytics workflow took the error route");
        state.processed = Some(ProcessedData {
            narrative: format!("Analytics processing encountered an error: {error}"),
            generated: false,
            summary: AnalysisSummary::Error,
        });
        state.insights = vec![ERROR_INSIGHT.to_string()];
        state.chart = None;
        state.recommendations = vec![ERROR_RECOMMENDATION.to_string()];
        state.confidence = Confidence::new(self.error_confidence);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_types_per_analysis_type() {
        assert_eq!(
            gather_types(AnalysisType::TrendAnalysis),
            &[ContentType::Table, ContentType::Text]
        );
        assert_eq!(gather_types(AnalysisType::Summary).len(), 3);
        assert_eq!(
            gather_types(AnalysisType::Prediction),
            gather_types(AnalysisType::General)
        );
    }

    #[test]
    fn prompts_request_json_arrays() {
        assert!(insights_prompt("n", 3).contains("JSON array"));
        let p = recommendations_prompt(
            AnalysisType::Comparison,
            "narrative",
            &["a".to_string(), "b".to_string()],
        );
        assert!(p.starts_with("Based on this comparison analysis"));
        assert!(p.contains("Key Insights: a; b"));
        assert!(p.ends_with("Return as a JSON array of strings."));
    }
}
