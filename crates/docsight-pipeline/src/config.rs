//! Orchestrator configuration loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;

use docsight_llm::GenerationConfig;
use docsight_types::{AnalysisType, DocsightError, Result};

use crate::confidence::ConfidenceWeights;

/// Documents requested per content type by each retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub rag_k: usize,
    pub trend_k: usize,
    pub comparison_k: usize,
    pub summary_k: usize,
    pub default_k: usize,
    /// Per-subject k for the two comparison side retrievals.
    pub comparison_side_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rag_k: 5,
            trend_k: 15,
            comparison_k: 15,
            summary_k: 10,
            default_k: 8,
            comparison_side_k: 10,
        }
    }
}

impl RetrievalConfig {
    /// k used by the analytics data-gathering stage for `analysis_type`.
    pub fn analytics_k(&self, analysis_type: AnalysisType) -> usize {
        match analysis_type {
            AnalysisType::TrendAnalysis => self.trend_k,
            AnalysisType::Comparison => self.comparison_k,
            AnalysisType::Summary => self.summary_k,
            AnalysisType::Prediction | AnalysisType::General => self.default_k,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub retrieval: RetrievalConfig,
    pub confidence: ConfidenceWeights,
    pub generation: GenerationConfig,
}

impl OrchestratorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| DocsightError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
            .map_err(|e| DocsightError::Config(format!("{}: {e}", path.display())))
    }

    fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        let ks = [
            ("rag_k", r.rag_k),
            ("trend_k", r.trend_k),
            ("comparison_k", r.comparison_k),
            ("summary_k", r.summary_k),
            ("default_k", r.default_k),
            ("comparison_side_k", r.comparison_side_k),
        ];
        if let Some((name, _)) = ks.iter().find(|(_, k)| *k == 0) {
            return Err(DocsightError::Config(format!(
                "retrieval.{name} must be at least 1"
            )));
        }
        if self.generation.max_attempts == 0 {
            return Err(DocsightError::Config(
                "generation.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
