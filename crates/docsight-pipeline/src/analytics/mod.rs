//! Analytics workflow.
//!
//! ```text
//! classify_query ─┬─ continue ─> gather_data -> process_data -> generate_insights
//!                 │                -> create_visualizations -> formulate_recommendations
//!                 │                -> calculate_confidence
//!                 └─ error ────> handle_error
//! ```
//!
//! Only a classification failure takes the error route. Later stages fall back
//! to fixed values and list the failure in [`AnalyticsReport::degraded`].

mod routines;
mod stages;
pub mod state;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use docsight_types::{AnalysisType, Confidence, Result};

use crate::classifier::{KeywordClassifier, QueryClassifier};
use crate::collaborators::Collaborators;
use crate::config::OrchestratorConfig;
use crate::engine::{Workflow, WorkflowBuilder};
use crate::events::EventEmitter;
use crate::rag::source_labels;

use stages::{
    CalculateConfidence, ClassifyQuery, CreateVisualizations, FormulateRecommendations, GatherData,
    GenerateInsights, HandleError, ProcessData,
};

pub use routines::{comparison_subjects, GENERATION_FAILED_NARRATIVE, NO_DATA_NARRATIVE};
pub use state::{AnalysisSummary, AnalyticsState, ComparisonSide, ProcessedData};

pub const CLASSIFY_QUERY: &str = "classify_query";
pub const GATHER_DATA: &str = "gather_data";
pub const PROCESS_DATA: &str = "process_data";
pub const GENERATE_INSIGHTS: &str = "generate_insights";
pub const CREATE_VISUALIZATIONS: &str = "create_visualizations";
pub const FORMULATE_RECOMMENDATIONS: &str = "formulate_recommendations";
pub const CALCULATE_CONFIDENCE: &str = "calculate_confidence";
pub const HANDLE_ERROR: &str = "handle_error";

pub const NO_INSIGHTS: &str = "No insights could be generated from the available data.";
pub const ERROR_INSIGHT: &str = "Analysis could not be completed due to technical issues.";
pub const ERROR_RECOMMENDATION: &str = "Please try rephrasing your query or contact support.";

fn route_after_classification(state: &AnalyticsState) -> &'static str {
    if state.error.is_some() {
        "error"
    } else {
        "continue"
    }
}

// ---------------------------------------------------------------------------
// Options and report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsOptions {
    pub generate_chart: bool,
    pub include_recommendations: bool,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            generate_chart: true,
            include_recommendations: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub query: String,
    /// `None` when classification failed.
    pub analysis_type: Option<AnalysisType>,
    pub narrative: String,
    pub insights: Vec<String>,
    pub chart: Option<Value>,
    pub recommendations: Vec<String>,
    pub confidence: Confidence,
    pub data_points: usize,
    pub summary: Option<AnalysisSummary>,
    pub sources: Vec<String>,
    pub degraded: Vec<String>,
    pub error: Option<String>,
}

impl From<AnalyticsState> for AnalyticsReport {
    fn from(state: AnalyticsState) -> Self {
        let (narrative, summary) = match state.processed.clone() {
            Some(p) => (p.narrative, Some(p.summary)),
            None => (String::new(), None),
        };
        Self {
            query: state.query().to_string(),
            analysis_type: state.analysis_type(),
            narrative,
            data_points: state.raw_data.len(),
            sources: source_labels(&state.retrieved),
            insights: state.insights,
            chart: state.chart,
            recommendations: state.recommendations,
            confidence: state.confidence,
            summary,
            degraded: state.degraded,
            error: state.error,
        }
    }
}

// ---------------------------------------------------------------------------
// AnalyticsWorkflow
// ---------------------------------------------------------------------------

pub struct AnalyticsWorkflow {
    workflow: Workflow<AnalyticsState>,
}

impl AnalyticsWorkflow {
    /// Workflow using the keyword classifier.
    pub fn new(collaborators: &Collaborators, config: &OrchestratorConfig) -> Result<Self> {
        Self::with_classifier(collaborators, Arc::new(KeywordClassifier), config)
    }

    pub fn with_classifier(
        collaborators: &Collaborators,
        classifier: Arc<dyn QueryClassifier>,
        config: &OrchestratorConfig,
    ) -> Result<Self> {
        let workflow = WorkflowBuilder::new("analytics")
            .stage(ClassifyQuery { classifier })
            .stage(GatherData {
                retriever: collaborators.retriever.clone(),
                retrieval: config.retrieval.clone(),
            })
            .stage(ProcessData {
                generator: collaborators.generator.clone(),
                retriever: collaborators.retriever.clone(),
                side_k: config.retrieval.comparison_side_k,
            })
            .stage(GenerateInsights {
                generator: collaborators.generator.clone(),
            })
            .stage(CreateVisualizations {
                charts: collaborators.charts.clone(),
            })
            .stage(FormulateRecommendations {
                generator: collaborators.generator.clone(),
            })
            .stage(CalculateConfidence {
                weights: config.confidence.clone(),
            })
            .stage(HandleError {
                error_confidence: config.confidence.error_confidence,
            })
            .entry(CLASSIFY_QUERY)
            .branch(
                CLASSIFY_QUERY,
                route_after_classification,
                &[("continue", GATHER_DATA), ("error", HANDLE_ERROR)],
            )
            .edge(GATHER_DATA, PROCESS_DATA)
            .edge(PROCESS_DATA, GENERATE_INSIGHTS)
            .edge(GENERATE_INSIGHTS, CREATE_VISUALIZATIONS)
            .edge(CREATE_VISUALIZATIONS, FORMULATE_RECOMMENDATIONS)
            .edge(FORMULATE_RECOMMENDATIONS, CALCULATE_CONFIDENCE)
            .end(CALCULATE_CONFIDENCE)
            .end(HANDLE_ERROR)
            .build()?;
        Ok(Self { workflow })
    }

    pub fn with_events(mut self, emitter: EventEmitter) -> Self {
        self.workflow.set_emitter(emitter);
        self
    }

    /// Analyze `query`. Never fails; the report is always well-formed.
    pub async fn run(&self, query: &str, options: AnalyticsOptions) -> AnalyticsReport {
        let result = self
            .workflow
            .run(AnalyticsState::new(query, options))
            .await;
        AnalyticsReport::from(result.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsight_types::DocsightError;
    use crate::engine::WorkflowState;

    #[test]
    fn router_follows_error_field() {
        let mut state = AnalyticsState::new("q", AnalyticsOptions::default());
        assert_eq!(route_after_classification(&state), "continue");
        state.record_failure(CLASSIFY_QUERY, &DocsightError::Classification("x".into()));
        assert_eq!(route_after_classification(&state), "error");
    }

    #[test]
    fn report_from_fresh_state_is_well_formed() {
        let report = AnalyticsReport::from(AnalyticsState::new("q", AnalyticsOptions::default()));
        assert_eq!(report.query, "q");
        assert!(report.narrative.is_empty());
        assert!(report.summary.is_none());
        assert_eq!(report.data_points, 0);
        assert_eq!(report.confidence, Confidence::default());
    }
}
