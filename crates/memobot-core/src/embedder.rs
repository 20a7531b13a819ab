//! Embedding adapter over an `autoagents-llm` provider.

use async_trait::async_trait;
use autoagents_llm::LLMProvider;
use autoagents_llm::embedding::EmbeddingProvider;
use memobot_memory::{Embedder, MemoryError};
use std::sync::Arc;

/// Uses the chat provider's embedding endpoint for memory vectors.
#[derive(Clone)]
pub struct LlmEmbedder {
    llm: Arc<dyn LLMProvider>,
}

impl LlmEmbedder {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Embedder for LlmEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, MemoryError> {
        self.llm
            .embed(texts)
            .await
            .map_err(|err| MemoryError::Embedding(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::LlmEmbedder;
    use memobot_memory::Embedder;
    use memobot_test_utils::{FailingLLM, LetterEmbedder, ScriptedLLM};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[tokio::test]
    async fn forwards_batches_to_provider() {
        let embedder = LlmEmbedder::new(Arc::new(ScriptedLLM::new(["unused"])));
        let vectors = embedder
            .embed(vec!["abc".to_string(), "zz".to_string()])
            .await
            .expect("embed");
        assert_eq!(
            vectors,
            vec![LetterEmbedder::vector("abc"), LetterEmbedder::vector("zz")]
        );
    }

    #[tokio::test]
    async fn maps_provider_errors() {
        let embedder = LlmEmbedder::new(Arc::new(FailingLLM::new("no embeddings")));
        let err = embedder
            .embed(vec!["abc".to_string()])
            .await
            .expect_err("failure");
        assert_eq!(err.to_string().starts_with("embedding error:"), true);
        assert_eq!(err.to_string().contains("no embeddings"), true);
    }
}
