//! Facade bundling both workflows over one set of collaborators.

use std::sync::Arc;

use docsight_llm::{ChatCompletionsGenerator, DryRunGenerator, RetryingGenerator, TextGenerator};
use docsight_types::{AnalysisType, Result};

use crate::analytics::{AnalyticsOptions, AnalyticsReport, AnalyticsWorkflow};
use crate::chart::SpecChartGenerator;
use crate::classifier::classify_query;
use crate::collaborators::{Collaborators, Retriever};
use crate::config::OrchestratorConfig;
use crate::events::EventEmitter;
use crate::rag::{ChatOptions, ChatResult, RagWorkflow};

pub struct Orchestrator {
    rag: RagWorkflow,
    analytics: AnalyticsWorkflow,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, config: OrchestratorConfig) -> Result<Self> {
        let rag = RagWorkflow::new(&collaborators, &config.retrieval)?;
        let analytics = AnalyticsWorkflow::new(&collaborators, &config)?;
        Ok(Self {
            rag,
            analytics,
            config,
        })
    }

    /// Wire the default collaborators around `retriever`: the chat-completions
    /// generator (or the dry-run generator) wrapped in retries, and the chart
    /// spec generator.
    pub fn with_retriever(
        retriever: Arc<dyn Retriever>,
        config: OrchestratorConfig,
        dry_run: bool,
    ) -> Result<Self> {
        let generator: Arc<dyn TextGenerator> = if dry_run {
            Arc::new(DryRunGenerator::new())
        } else {
            let client = ChatCompletionsGenerator::from_env(config.generation.clone())?;
            Arc::new(RetryingGenerator::new(client, config.generation.max_attempts))
        };
        let collaborators = Collaborators::new(retriever, generator, Arc::new(SpecChartGenerator));
        Self::new(collaborators, config)
    }

    /// Attach one emitter to both workflows.
    pub fn with_events(self, emitter: EventEmitter) -> Self {
        Self {
            rag: self.rag.with_events(emitter.clone()),
            analytics: self.analytics.with_events(emitter),
            config: self.config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub async fn chat(&self, query: &str, options: ChatOptions) -> ChatResult {
        self.rag.run(query, options).await
    }

    pub async fn analyze(&self, query: &str, options: AnalyticsOptions) -> AnalyticsReport {
        self.analytics.run(query, options).await
    }

    pub fn classify(&self, query: &str) -> AnalysisType {
        classify_query(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusRetriever;
    use docsight_types::Document;

    fn orchestrator() -> Orchestrator {
        let corpus = CorpusRetriever::new(vec![
            Document::text("Revenue grew in every region").with_page(1),
            Document::table("quarter: Q1 | revenue: 100").with_page(2),
            Document::table("quarter: Q2 | revenue: 140").with_page(2),
        ]);
        Orchestrator::with_retriever(Arc::new(corpus), OrchestratorConfig::default(), true).unwrap()
    }

    #[tokio::test]
    async fn dry_run_chat_cites_sources() {
        let result = orchestrator()
            .chat("What does the revenue data show?", ChatOptions::default())
            .await;
        assert!(result.response.starts_with("[dry-run]"));
        assert!(result.response.contains("**Sources:**"));
        assert!(result.sources.contains(&"Page 2 (table)".to_string()));
    }

    #[tokio::test]
    async fn dry_run_analysis_produces_chart_for_comparison() {
        let report = orchestrator()
            .analyze("Compare Q1 vs Q2 revenue", AnalyticsOptions::default())
            .await;
        assert_eq!(report.analysis_type, Some(AnalysisType::Comparison));
        assert_eq!(report.data_points, 2);
        assert!(report.chart.is_some());
        assert_eq!(report.insights.len(), 3);
        assert!(report.error.is_none());
    }

    #[test]
    fn classify_is_exposed() {
        assert_eq!(
            orchestrator().classify("forecast demand"),
            AnalysisType::Prediction
        );
    }
}
