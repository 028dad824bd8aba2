use serde::{Deserialize, Serialize};

/// Embedding request (OpenAI-compatible wire format)
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    /// Texts to embed, at most one provider batch worth
    pub input: Vec<String>,

    /// Model name (e.g., "BAAI/bge-large-zh-v1.5")
    pub model: String,

    /// Requested output dimensions (model-dependent, optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

/// Embedding response
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResponse {
    /// One entry per input text, in input order
    pub data: Vec<EmbeddingData>,
}

/// Single embedding entry
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
}
