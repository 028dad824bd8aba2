//! Semroute Embedding Client
//!
//! Batched, retried, order-preserving text embedding against an
//! OpenAI-compatible provider, in sync and async variants.

mod blocking;
mod client;
mod embedder;
mod models;
mod retry;
mod truncate;
mod types;

pub use blocking::BlockingEmbeddingClient;
pub use client::{EmbeddingClient, EncoderConfig, BATCH_SIZE, INTER_BATCH_DELAY};
pub use embedder::Embedder;
pub use models::{encoder_info, EncoderInfo, DEFAULT_MODEL};
pub use retry::{outcome_for_status, BatchOutcome, BatchState, RetryPolicy, Transition};
pub use truncate::TextTruncator;
pub use types::{EmbeddingData, EmbeddingRequest, EmbeddingResponse};
