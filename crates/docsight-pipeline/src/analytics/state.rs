use serde::{Deserialize, Serialize};
use serde_json::Value;

use docsight_types::{AnalysisType, Confidence, DocsightError, Record, Result};

use crate::collaborators::Retrieved;
use crate::engine::WorkflowState;
use crate::stats::DatasetStatistics;
use crate::timeseries::TrendReport;

use super::{
    AnalyticsOptions, CLASSIFY_QUERY, CREATE_VISUALIZATIONS, FORMULATE_RECOMMENDATIONS,
    GATHER_DATA,
};

// ---------------------------------------------------------------------------
// Processed data
// ---------------------------------------------------------------------------

/// Size of one side of a two-subject comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSide {
    pub subject: String,
    pub record_count: usize,
}

/// Type-specific structured result of the processing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisSummary {
    Trend {
        trends: TrendReport,
        statistics: DatasetStatistics,
    },
    Comparison {
        statistics: DatasetStatistics,
        sides: Option<(ComparisonSide, ComparisonSide)>,
    },
    Summary {
        statistics: DatasetStatistics,
    },
    General {
        statistics: DatasetStatistics,
    },
    NoData,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedData {
    pub narrative: String,
    /// `true` when the narrative came from an analysis routine rather than
    /// a fixed fallback message.
    pub generated: bool,
    pub summary: AnalysisSummary,
}

// ---------------------------------------------------------------------------
// AnalyticsState
// ---------------------------------------------------------------------------

/// Per-request state threaded through the analytics workflow.
#[derive(Debug, Clone)]
pub struct AnalyticsState {
    query: String,
    analysis_type: Option<AnalysisType>,
    pub options: AnalyticsOptions,
    pub retrieved: Retrieved,
    pub raw_data: Vec<Record>,
    pub processed: Option<ProcessedData>,
    pub insights: Vec<String>,
    pub chart: Option<Value>,
    pub recommendations: Vec<String>,
    pub confidence: Confidence,
    pub error: Option<String>,
    pub degraded: Vec<String>,
}

impl AnalyticsState {
    pub fn new(query: impl Into<String>, options: AnalyticsOptions) -> Self {
        Self {
            query: query.into(),
            analysis_type: None,
            options,
            retrieved: Retrieved::new(),
            raw_data: Vec::new(),
            processed: None,
            insights: Vec::new(),
            chart: None,
            recommendations: Vec::new(),
            confidence: Confidence::default(),
            error: None,
            degraded: Vec::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn analysis_type(&self) -> Option<AnalysisType> {
        self.analysis_type
    }

    /// The classified type, or `General` before classification.
    pub fn effective_type(&self) -> AnalysisType {
        self.analysis_type.unwrap_or(AnalysisType::General)
    }

    /// Set the analysis type. It can be set only once.
    pub fn set_analysis_type(&mut self, analysis_type: AnalysisType) -> Result<()> {
        if let Some(existing) = self.analysis_type {
            return Err(DocsightError::Other(format!(
                "analysis type already set to {existing}"
            )));
        }
        self.analysis_type = Some(analysis_type);
        Ok(())
    }

    pub fn narrative(&self) -> &str {
        self.processed
            .as_ref()
            .map(|p| p.narrative.as_str())
            .unwrap_or("")
    }
}

impl WorkflowState for AnalyticsState {
    fn record_failure(&mut self, stage_id: &str, error: &DocsightError) {
        if stage_id == CLASSIFY_QUERY {
            self.error = Some(match error {
                DocsightError::Classification(_) => error.to_string(),
                other => format!("Query classification failed: {other}"),
            });
            return;
        }
        match stage_id {
            GATHER_DATA => {
                self.retrieved.clear();
                self.raw_data.clear();
            }
            CREATE_VISUALIZATIONS => self.chart = None,
            FORMULATE_RECOMMENDATIONS => self.recommendations.clear(),
            _ => {}
        }
        self.degraded.push(format!("{stage_id}: {error}"));
    }
}
