//! External collaborator seams: retrieval and chart generation.
//!
//! Text generation lives in `docsight-llm`; [`Collaborators`] bundles all
//! three so workflows can be constructed from one value.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use docsight_llm::TextGenerator;
use docsight_types::{ContentType, Document, Result};

/// Relevance-ordered documents per content type, best first.
pub type Retrieved = BTreeMap<ContentType, Vec<Document>>;

/// The Retrieval collaborator.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` documents per requested content type, best first.
    async fn search(&self, query: &str, content_types: &[ContentType], k: usize)
        -> Result<Retrieved>;
}

/// The Chart collaborator. Returns an opaque chart specification, or `None`
/// when no chart applies to the data.
#[async_trait]
pub trait ChartGenerator: Send + Sync {
    async fn generate(&self, query: &str, tables: &[Document]) -> Result<Option<Value>>;
}

/// Shared, immutable handles to the three collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub retriever: Arc<dyn Retriever>,
    pub generator: Arc<dyn TextGenerator>,
    pub charts: Arc<dyn ChartGenerator>,
}

impl Collaborators {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn TextGenerator>,
        charts: Arc<dyn ChartGenerator>,
    ) -> Self {
        Self {
            retriever,
            generator,
            charts,
        }
    }
}

/// Search and enforce the retrieval contract on the result: unrequested
/// types are dropped, each list is cut to `k`, and empty lists are removed.
pub async fn search_bounded(
    retriever: &dyn Retriever,
    query: &str,
    content_types: &[ContentType],
    k: usize,
) -> Result<Retrieved> {
    let mut results = retriever.search(query, content_types, k).await?;
    results.retain(|ct, docs| {
        docs.truncate(k);
        content_types.contains(ct) && !docs.is_empty()
    });
    Ok(results)
}

/// Total document count across all types.
pub fn document_count(retrieved: &Retrieved) -> usize {
    retrieved.values().map(Vec::len).sum()
}

/// A chart spec counts as present only when it carries content.
pub fn non_empty_chart(chart: Option<Value>) -> Option<Value> {
    chart.filter(|c| match c {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Greedy;

    #[async_trait]
    impl Retriever for Greedy {
        async fn search(&self, _q: &str, _t: &[ContentType], _k: usize) -> Result<Retrieved> {
            let mut out = Retrieved::new();
            out.insert(
                ContentType::Text,
                (0..10).map(|i| Document::text(format!("t{i}"))).collect(),
            );
            out.insert(ContentType::Image, vec![Document::image("img")]);
            out.insert(ContentType::Table, vec![]);
            Ok(out)
        }
    }

    #[tokio::test]
    async fn search_bounded_truncates_and_filters() {
        let out = search_bounded(&Greedy, "q", &[ContentType::Text, ContentType::Table], 3)
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[&ContentType::Text].len(), 3);
        assert_eq!(out[&ContentType::Text][0].content, "t0");
        assert_eq!(document_count(&out), 3);
    }

    #[test]
    fn empty_chart_values_are_absent() {
        assert_eq!(non_empty_chart(None), None);
        assert_eq!(non_empty_chart(Some(Value::Null)), None);
        assert_eq!(non_empty_chart(Some(json!({}))), None);
        assert!(non_empty_chart(Some(json!({"chart_type": "bar"}))).is_some());
    }
}
