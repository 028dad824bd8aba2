use async_trait::async_trait;
use semroute_common::Result;

/// Common trait for embedding backends
///
/// The router depends on this seam only, so tests can substitute a
/// deterministic stub for the network client.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Encode texts into vectors, same length and order as the input
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embedding model name
    fn model_name(&self) -> &str;

    /// Default score threshold suggested by the model
    fn score_threshold(&self) -> f32;
}
