//! In-memory retriever over a document list loaded from JSON.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use docsight_types::{ContentType, Document, Result};

use crate::collaborators::{Retrieved, Retriever};

#[derive(Deserialize)]
#[serde(untagged)]
enum CorpusFile {
    List(Vec<Document>),
    Wrapped { documents: Vec<Document> },
}

/// Ranks documents of each requested type by how many distinct query terms
/// they contain. Ties keep corpus order, so a query with no matching terms
/// still returns the first `k` documents of each type.
#[derive(Debug, Clone, Default)]
pub struct CorpusRetriever {
    documents: Vec<Document>,
}

impl CorpusRetriever {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Accepts a JSON array of documents or `{"documents": [...]}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let documents = match serde_json::from_str::<CorpusFile>(json)? {
            CorpusFile::List(docs) => docs,
            CorpusFile::Wrapped { documents } => documents,
        };
        Ok(Self::new(documents))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let corpus = Self::from_json_str(&raw)?;
        tracing::info!(path = %path.display(), documents = corpus.len(), "Loaded corpus");
        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

fn overlap(query_terms: &HashSet<String>, doc: &Document) -> usize {
    let mut doc_terms = terms(&doc.content);
    if let Some(ocr) = doc.ocr_text() {
        doc_terms.extend(terms(ocr));
    }
    query_terms.intersection(&doc_terms).count()
}

#[async_trait]
impl Retriever for CorpusRetriever {
    async fn search(
        &self,
        query: &str,
        content_types: &[ContentType],
        k: usize,
    ) -> Result<Retrieved> {
        let query_terms = terms(query);
        let mut out = Retrieved::new();
        for ct in content_types {
            let mut scored: Vec<(usize, &Document)> = self
                .documents
                .iter()
                .filter(|d| d.content_type == *ct)
                .map(|d| (overlap(&query_terms, d), d))
                .collect();
            scored.sort_by(|a, b| b.0.cmp(&a.0));
            let docs: Vec<Document> = scored.into_iter().take(k).map(|(_, d)| d.clone()).collect();
            if !docs.is_empty() {
                out.insert(*ct, docs);
            }
        }
        Ok(out)
    }
}
