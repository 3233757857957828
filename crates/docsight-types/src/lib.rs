//! Shared types, errors, documents, and confidence for the docsight query engine.
//!
//! This crate provides the foundational types used across all other docsight crates:
//! - `DocsightError`: unified error taxonomy
//! - `Document` / `ContentType`: retrieved content and its modality
//! - `AnalysisType`: the classification a query receives
//! - `Record`: a flat key/value row extracted from a table
//! - `Confidence`: a score that can never leave `[0.0, 1.0]`

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error type for all docsight subsystems.
#[derive(Debug, thiserror::Error)]
pub enum DocsightError {
    // === Stage Failures ===
    #[error("Query classification failed: {0}")]
    Classification(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Chart generation failed: {0}")]
    Chart(String),

    #[error("Could not parse structured output: {0}")]
    Parse(String),

    // === Generation Transport Errors ===
    #[error("Provider {provider} returned HTTP {status}: {message}")]
    ProviderError {
        provider: String,
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthError { provider: String },

    #[error("Request to {provider} timed out after {timeout_ms}ms")]
    RequestTimeout { provider: String, timeout_ms: u64 },

    // === Workflow Construction ===
    #[error("Workflow '{workflow}' is invalid: {message}")]
    InvalidWorkflow { workflow: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl DocsightError {
    /// Returns `true` if the error is transient and the operation may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DocsightError::RateLimited { .. }
                | DocsightError::RequestTimeout { .. }
                | DocsightError::ProviderError { retryable: true, .. }
        )
    }

    /// Returns `true` if the error is permanent and retrying will not help.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DocsightError::AuthError { .. }
                | DocsightError::InvalidWorkflow { .. }
                | DocsightError::Config(_)
        )
    }
}

/// A convenience alias for `Result<T, DocsightError>`.
pub type Result<T> = std::result::Result<T, DocsightError>;

// ---------------------------------------------------------------------------
// ContentType: modality of a retrieved document
// ---------------------------------------------------------------------------

/// Ordering follows declaration order, so maps keyed by `ContentType` iterate
/// text, then table, then image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Table,
    Image,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Table => "table",
            ContentType::Image => "image",
        }
    }

    /// Capitalized form used in context headers, e.g. `Table`.
    pub fn title(&self) -> &'static str {
        match self {
            ContentType::Text => "Text",
            ContentType::Table => "Table",
            ContentType::Image => "Image",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AnalysisType: classification of an analytics query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    TrendAnalysis,
    Comparison,
    Summary,
    Prediction,
    General,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::TrendAnalysis => "trend_analysis",
            AnalysisType::Comparison => "comparison",
            AnalysisType::Summary => "summary",
            AnalysisType::Prediction => "prediction",
            AnalysisType::General => "general",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Document: an immutable retrieved unit of content
// ---------------------------------------------------------------------------

/// A flat key/value row extracted from a table.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Metadata key under which table documents carry structured rows.
pub const TABLE_DATA_KEY: &str = "table_data";

/// Metadata key under which image documents carry OCR text.
pub const OCR_TEXT_KEY: &str = "ocr_text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    pub fn new(content_type: ContentType, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type,
            page_number: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(ContentType::Text, content)
    }

    pub fn table(content: impl Into<String>) -> Self {
        Self::new(ContentType::Table, content)
    }

    pub fn image(content: impl Into<String>) -> Self {
        Self::new(ContentType::Image, content)
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page_number = Some(page);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Attach structured rows under [`TABLE_DATA_KEY`].
    pub fn with_records(self, records: Vec<Record>) -> Self {
        let rows = records.into_iter().map(serde_json::Value::Object).collect();
        self.with_metadata(TABLE_DATA_KEY, serde_json::Value::Array(rows))
    }

    /// Structured rows carried in metadata, if any. Non-object entries are skipped.
    /// Returns `None` when the document carries no rows at all.
    pub fn structured_records(&self) -> Option<Vec<Record>> {
        let rows = self.metadata.get(TABLE_DATA_KEY)?.as_array()?;
        let records: Vec<Record> = rows
            .iter()
            .filter_map(|row| row.as_object().cloned())
            .collect();
        if records.is_empty() {
            None
        } else {
            Some(records)
        }
    }

    pub fn ocr_text(&self) -> Option<&str> {
        self.metadata.get(OCR_TEXT_KEY).and_then(|v| v.as_str())
    }

    /// Page reference for citations; `Unknown` when the page is not known.
    pub fn page_label(&self) -> String {
        self.page_number
            .map(|p| p.to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

// ---------------------------------------------------------------------------
// Confidence: a score clamped to [0.0, 1.0]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub const MIN: Confidence = Confidence(0.0);

    /// Build a confidence, clamping into `[0.0, 1.0]`. NaN becomes 0.0.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::MIN;
        }
        Confidence(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::MIN
    }
}

impl From<f64> for Confidence {
    fn from(value: f64) -> Self {
        Confidence::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> Self {
        c.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
