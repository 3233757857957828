//! Conversational retrieval-augmented workflow.
//!
//! Six stages in a straight line: analyze the query, retrieve, build the
//! context block, generate the answer, optionally chart table data, and
//! append source citations. Every stage degrades locally; a run always
//! produces a [`ChatResult`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use docsight_llm::{GenerationRequest, TextGenerator};
use docsight_types::{Confidence, ContentType, DocsightError, Result};

use crate::collaborators::{
    document_count, non_empty_chart, search_bounded, ChartGenerator, Collaborators, Retrieved,
    Retriever,
};
use crate::config::RetrievalConfig;
use crate::engine::{Stage, Workflow, WorkflowBuilder, WorkflowState};
use crate::events::EventEmitter;
use crate::keywords::{contains_any, CHART_HINTS, IMAGE_HINTS, TABLE_HINTS};

pub const APOLOGY: &str =
    "I apologize, but I encountered an error while generating the response.";

/// Confidence of a generated answer.
pub const ANSWERED_CONFIDENCE: f64 = 0.8;
/// Confidence when the apology fallback was returned.
pub const FALLBACK_CONFIDENCE: f64 = 0.1;

pub const ANALYZE_QUERY: &str = "analyze_query";
pub const RETRIEVE: &str = "retrieve";
pub const BUILD_CONTEXT: &str = "build_context";
pub const GENERATE_RESPONSE: &str = "generate_response";
pub const GENERATE_CHARTS: &str = "generate_charts";
pub const FINALIZE: &str = "finalize";

// ---------------------------------------------------------------------------
// Options, state, result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatOptions {
    pub include_charts: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            include_charts: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RagState {
    pub query: String,
    pub options: ChatOptions,
    pub content_types: Vec<ContentType>,
    pub requires_charts: bool,
    pub retrieved: Retrieved,
    pub context: String,
    pub response: String,
    pub generated: bool,
    pub chart: Option<Value>,
    pub sources: Vec<String>,
    pub degraded: Vec<String>,
}

impl RagState {
    pub fn new(query: impl Into<String>, options: ChatOptions) -> Self {
        Self {
            query: query.into(),
            options,
            ..Default::default()
        }
    }
}

impl WorkflowState for RagState {
    fn record_failure(&mut self, stage_id: &str, error: &DocsightError) {
        match stage_id {
            RETRIEVE => self.retrieved.clear(),
            GENERATE_RESPONSE => {
                self.response = APOLOGY.to_string();
                self.generated = false;
            }
            GENERATE_CHARTS => self.chart = None,
            _ => {}
        }
        self.degraded.push(format!("{stage_id}: {error}"));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResult {
    pub query: String,
    pub response: String,
    pub chart: Option<Value>,
    /// Distinct `Page N (type)` citations in retrieval order.
    pub sources: Vec<String>,
    /// Content types that returned at least one document.
    pub content_types: Vec<ContentType>,
    pub requires_charts: bool,
    pub confidence: Confidence,
    pub degraded: Vec<String>,
}

impl From<RagState> for ChatResult {
    fn from(state: RagState) -> Self {
        let confidence = if state.generated {
            ANSWERED_CONFIDENCE
        } else {
            FALLBACK_CONFIDENCE
        };
        Self {
            content_types: state.retrieved.keys().copied().collect(),
            query: state.query,
            response: state.response,
            chart: state.chart,
            sources: state.sources,
            requires_charts: state.requires_charts,
            confidence: Confidence::new(confidence),
            degraded: state.degraded,
        }
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Content types and chart intent from query keywords.
pub fn plan_query(query: &str) -> (Vec<ContentType>, bool) {
    let q = query.to_lowercase();
    let mut types = vec![ContentType::Text];
    if contains_any(&q, TABLE_HINTS) {
        types.push(ContentType::Table);
    }
    if contains_any(&q, IMAGE_HINTS) {
        types.push(ContentType::Image);
    }
    (types, contains_any(&q, CHART_HINTS))
}

/// Header block per non-empty type, then one labelled entry per document.
pub fn build_context(retrieved: &Retrieved) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (content_type, docs) in retrieved {
        if docs.is_empty() {
            continue;
        }
        parts.push(format!(
            "\n=== {} CONTENT ===",
            content_type.as_str().to_uppercase()
        ));
        for doc in docs {
            parts.push(format!(
                "\n[{} from Page {}]",
                content_type.title(),
                doc.page_label()
            ));
            parts.push(doc.content.clone());
        }
    }
    parts.join("\n")
}

/// Distinct `Page N (type)` labels, first occurrence first.
pub fn source_labels(retrieved: &Retrieved) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for (content_type, docs) in retrieved {
        for doc in docs {
            let label = format!("Page {} ({})", doc.page_label(), content_type);
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
    }
    labels
}

struct AnalyzeQuery;

#[async_trait]
impl Stage<RagState> for AnalyzeQuery {
    fn id(&self) -> &str {
        ANALYZE_QUERY
    }

    async fn execute(&self, state: &mut RagState) -> Result<()> {
        let (types, requires_charts) = plan_query(&state.query);
        tracing::debug!(?types, requires_charts, "Planned retrieval");
        state.content_types = types;
        state.requires_charts = requires_charts;
        Ok(())
    }
}

struct Retrieve {
    retriever: Arc<dyn Retriever>,
    k: usize,
}

#[async_trait]
impl Stage<RagState> for Retrieve {
    fn id(&self) -> &str {
        RETRIEVE
    }

    async fn execute(&self, state: &mut RagState) -> Result<()> {
        state.retrieved =
            search_bounded(self.retriever.as_ref(), &state.query, &state.content_types, self.k)
                .await?;
        tracing::info!(documents = document_count(&state.retrieved), "Retrieved documents");
        Ok(())
    }
}

struct BuildContext;

#[async_trait]
impl Stage<RagState> for BuildContext {
    fn id(&self) -> &str {
        BUILD_CONTEXT
    }

    async fn execute(&self, state: &mut RagState) -> Result<()> {
        state.context = build_context(&state.retrieved);
        Ok(())
    }
}

struct GenerateResponse {
    generator: Arc<dyn TextGenerator>,
}

#[async_trait]
impl Stage<RagState> for GenerateResponse {
    fn id(&self) -> &str {
        GENERATE_RESPONSE
    }

    async fn execute(&self, state: &mut RagState) -> Result<()> {
        let request = GenerationRequest::new(state.query.clone()).with_context(state.context.clone());
        state.response = self.generator.generate(&request).await?;
        state.generated = true;
        Ok(())
    }
}

struct GenerateCharts {
    charts: Arc<dyn ChartGenerator>,
}

#[async_trait]
impl Stage<RagState> for GenerateCharts {
    fn id(&self) -> &str {
        GENERATE_CHARTS
    }

    async fn execute(&self, state: &mut RagState) -> Result<()> {
        state.chart = None;
        if !state.options.include_charts || !state.requires_charts {
            return Ok(());
        }
        let tables = match state.retrieved.get(&ContentType::Table) {
            Some(docs) if !docs.is_empty() => docs,
            _ => return Ok(()),
        };
        let chart = self.charts.generate(&state.query, tables).await?;
        state.chart = non_empty_chart(chart);
        Ok(())
    }
}

struct Finalize;

#[async_trait]
impl Stage<RagState> for Finalize {
    fn id(&self) -> &str {
        FINALIZE
    }

    async fn execute(&self, state: &mut RagState) -> Result<()> {
        state.sources = source_labels(&state.retrieved);
        if !state.sources.is_empty() {
            state.response = format!(
                "{}\n\n**Sources:** {}",
                state.response,
                state.sources.join(", ")
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RagWorkflow
// ---------------------------------------------------------------------------

pub struct RagWorkflow {
    workflow: Workflow<RagState>,
}

impl RagWorkflow {
    pub fn new(collaborators: &Collaborators, retrieval: &RetrievalConfig) -> Result<Self> {
        let workflow = WorkflowBuilder::new("rag")
            .stage(AnalyzeQuery)
            .stage(Retrieve {
                retriever: collaborators.retriever.clone(),
                k: retrieval.rag_k,
            })
            .stage(BuildContext)
            .stage(GenerateResponse {
                generator: collaborators.generator.clone(),
            })
            .stage(GenerateCharts {
                charts: collaborators.charts.clone(),
            })
            .stage(Finalize)
            .entry(ANALYZE_QUERY)
            .edge(ANALYZE_QUERY, RETRIEVE)
            .edge(RETRIEVE, BUILD_CONTEXT)
            .edge(BUILD_CONTEXT, GENERATE_RESPONSE)
            .edge(GENERATE_RESPONSE, GENERATE_CHARTS)
            .edge(GENERATE_CHARTS, FINALIZE)
            .end(FINALIZE)
            .build()?;
        Ok(Self { workflow })
    }

    pub fn with_events(mut self, emitter: EventEmitter) -> Self {
        self.workflow.set_emitter(emitter);
        self
    }

    /// Answer `query`. Never fails; degraded stages are listed in the result.
    pub async fn run(&self, query: &str, options: ChatOptions) -> ChatResult {
        let result = self.workflow.run(RagState::new(query, options)).await;
        ChatResult::from(result.state)
    }
}
