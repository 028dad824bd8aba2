//! Deterministic embedder stub for classifier and optimizer tests.

use std::collections::HashMap;

use async_trait::async_trait;
use semroute_common::{Result, SemrouteError};
use semroute_encoder::Embedder;

/// Embedder returning fixed vectors per exact text
pub(crate) struct StubEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    threshold: f32,
}

impl StubEmbedder {
    pub fn new(threshold: f32) -> Self {
        Self {
            vectors: HashMap::new(),
            threshold,
        }
    }

    pub fn with(mut self, text: &str, vector: &[f32]) -> Self {
        self.vectors.insert(text.to_string(), vector.to_vec());
        self
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|t| {
                self.vectors.get(t).cloned().ok_or_else(|| {
                    SemrouteError::provider(format!("No stub vector for '{}'", t))
                })
            })
            .collect()
    }

    fn model_name(&self) -> &str {
        "stub-embedder"
    }

    fn score_threshold(&self) -> f32 {
        self.threshold
    }
}
