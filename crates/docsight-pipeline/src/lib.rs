//! Query orchestration for document question answering and analytics.
//!
//! Two workflows run on a small stage-graph engine ([`engine`]):
//!
//! - [`rag::RagWorkflow`] answers a question from retrieved documents and
//!   cites the pages it used.
//! - [`analytics::AnalyticsWorkflow`] classifies a query, gathers table
//!   records, runs a type-specific analysis, and reports insights, an
//!   optional chart, recommendations, and a confidence score.
//!
//! Both reach the outside world only through the [`collaborators`] traits.

pub mod analytics;
pub mod chart;
pub mod classifier;
pub mod collaborators;
pub mod confidence;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod events;
pub mod keywords;
pub mod orchestrator;
pub mod parse;
pub mod rag;
pub mod stats;
pub mod tables;
pub mod timeseries;

pub use analytics::{AnalyticsOptions, AnalyticsReport, AnalyticsWorkflow};
pub use chart::SpecChartGenerator;
pub use classifier::{classify_query, KeywordClassifier, QueryClassifier};
pub use collaborators::{ChartGenerator, Collaborators, Retrieved, Retriever};
pub use confidence::{ConfidenceSignals, ConfidenceWeights};
pub use config::{OrchestratorConfig, RetrievalConfig};
pub use corpus::CorpusRetriever;
pub use engine::{ExecutionResult, Stage, Workflow, WorkflowBuilder, WorkflowState};
pub use events::{EventEmitter, WorkflowEvent};
pub use orchestrator::Orchestrator;
pub use rag::{ChatOptions, ChatResult, RagWorkflow};
