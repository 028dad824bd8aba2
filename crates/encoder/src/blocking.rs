//! Synchronous embedding client.
//!
//! Same contract as [`crate::EmbeddingClient`] over blocking I/O; no mutable
//! state is shared with the async variant. Must not be used from inside a
//! tokio runtime.

use semroute_common::{Result, SemrouteError};
use tracing::{debug, warn};

use crate::client::{transport_outcome, EncoderConfig, ResolvedEncoder, BATCH_SIZE, INTER_BATCH_DELAY};
use crate::retry::{outcome_for_status, BatchOutcome, BatchState, Transition};
use crate::types::EmbeddingResponse;

/// Blocking embedding client for an OpenAI-compatible provider
#[derive(Debug)]
pub struct BlockingEmbeddingClient {
    http: reqwest::blocking::Client,
    inner: ResolvedEncoder,
}

impl BlockingEmbeddingClient {
    /// Create a new blocking embedding client
    pub fn new(config: EncoderConfig) -> Result<Self> {
        let timeout = config.timeout;
        let inner = ResolvedEncoder::new(config)?;
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        debug!(
            "Blocking embedding client initialized: model={}, base_url={}",
            inner.model, inner.base_url
        );
        Ok(Self { http, inner })
    }

    /// Resolved score threshold for the configured model
    pub fn score_threshold(&self) -> f32 {
        self.inner.score_threshold
    }

    /// Embedding model name
    pub fn model_name(&self) -> &str {
        &self.inner.model
    }

    /// Encode texts into embedding vectors, preserving input order
    pub fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.encode_with_options(texts, true)
    }

    /// Encode with explicit truncation control
    pub fn encode_with_options(&self, texts: &[String], truncate: bool) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let docs: Vec<String> = if truncate {
            texts.iter().map(|t| self.inner.truncator.truncate(t)).collect()
        } else {
            texts.to_vec()
        };

        let total_batches = docs.len().div_ceil(BATCH_SIZE);
        let mut all_embeddings = Vec::with_capacity(docs.len());

        for (batch_num, batch) in docs.chunks(BATCH_SIZE).enumerate() {
            let embeddings = self.encode_batch(batch, batch_num + 1, total_batches)?;
            all_embeddings.extend(embeddings);

            if batch_num + 1 < total_batches {
                std::thread::sleep(INTER_BATCH_DELAY);
            }
        }

        Ok(all_embeddings)
    }

    fn encode_batch(
        &self,
        batch: &[String],
        batch_num: usize,
        total_batches: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let (mut state, mut transition) = self.inner.retry.dispatch(BatchState::Pending);
        let mut result: Option<Vec<Vec<f32>>> = None;
        let mut last_error = String::new();

        loop {
            match transition {
                Transition::Call { attempt } => {
                    debug!(
                        "Creating embeddings for batch {}/{} ({} docs, attempt {})",
                        batch_num,
                        total_batches,
                        batch.len(),
                        attempt
                    );
                    let outcome = match self.call_provider(batch) {
                        Ok(embeddings) => {
                            result = Some(embeddings);
                            BatchOutcome::Success
                        }
                        Err(outcome) => outcome,
                    };
                    if let BatchOutcome::Transient(msg) | BatchOutcome::Fatal(msg) = &outcome {
                        last_error = msg.clone();
                    }
                    (state, transition) = self.inner.retry.observe(state, &outcome);
                }
                Transition::Backoff { delay, next_attempt } => {
                    warn!(
                        "Batch {}/{} failed ({}); retrying in {:?}",
                        batch_num, total_batches, last_error, delay
                    );
                    std::thread::sleep(delay);
                    transition = Transition::Call {
                        attempt: next_attempt,
                    };
                }
                Transition::Done => {
                    return result.ok_or_else(|| {
                        SemrouteError::provider("Provider returned no embeddings")
                    });
                }
                Transition::Abort => {
                    return Err(SemrouteError::provider(format!(
                        "Embedding batch {}/{} failed: {}",
                        batch_num, total_batches, last_error
                    )));
                }
            }
        }
    }

    fn call_provider(&self, batch: &[String]) -> std::result::Result<Vec<Vec<f32>>, BatchOutcome> {
        let response = self
            .http
            .post(self.inner.embeddings_url())
            .bearer_auth(&self.inner.api_key)
            .json(&self.inner.request_for(batch))
            .send()
            .map_err(transport_outcome)?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().unwrap_or_default();
            return Err(outcome_for_status(status, &body));
        }

        let body: EmbeddingResponse = response
            .json()
            .map_err(|e| BatchOutcome::Fatal(format!("Failed to parse embedding response: {}", e)))?;

        self.inner.embeddings_from(body, batch.len())
    }
}
