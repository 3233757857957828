use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docsight_types::Result;

// ---------------------------------------------------------------------------
// GenerationRequest
// ---------------------------------------------------------------------------

/// One call to the text generator: the task prompt, optional retrieved
/// context, and optional extra system instructions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub system_message: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            context: String::new(),
            system_message: String::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = system_message.into();
        self
    }
}

// ---------------------------------------------------------------------------
// TextGenerator
// ---------------------------------------------------------------------------

/// The Generation collaborator. Implementations are shared across concurrent
/// workflow runs and must not hold per-request mutable state.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce a completion. May fail on transport or quota problems.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsight_types::DocsightError;
    use std::sync::Arc;

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            if request.prompt.is_empty() {
                return Err(DocsightError::Generation("empty prompt".into()));
            }
            Ok(format!("{}|{}|{}", request.prompt, request.context, request.system_message))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[test]
    fn request_builder_sets_fields() {
        let req = GenerationRequest::new("q")
            .with_context("ctx")
            .with_system_message("sys");
        assert_eq!(req.prompt, "q");
        assert_eq!(req.context, "ctx");
        assert_eq!(req.system_message, "sys");
    }

    #[tokio::test]
    async fn generator_usable_as_shared_trait_object() {
        let generator: Arc<dyn TextGenerator> = Arc::new(EchoGenerator);
        let out = generator
            .generate(&GenerationRequest::new("hi").with_context("c"))
            .await
            .unwrap();
        assert_eq!(out, "hi|c|");
        assert_eq!(generator.name(), "echo");

        let err = generator.generate(&GenerationRequest::default()).await;
        assert!(matches!(err, Err(DocsightError::Generation(_))));
    }
}
