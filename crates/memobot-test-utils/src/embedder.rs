use async_trait::async_trait;
use memobot_memory::{Embedder, MemoryError};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Letter-frequency embedding over `a..=z` plus a constant bias axis.
///
/// Deterministic, and texts sharing words land close together.
#[derive(Debug, Default)]
pub struct LetterEmbedder {
    calls: AtomicUsize,
}

impl LetterEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `embed` calls served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; 27];
        for ch in text.to_ascii_lowercase().chars() {
            if ch.is_ascii_lowercase() {
                vector[(ch as u8 - b'a') as usize] += 1.0;
            }
        }
        vector[26] = 0.5;
        vector
    }
}

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, MemoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|text| Self::vector(text)).collect())
    }
}
