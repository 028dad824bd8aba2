use std::time::Duration;

use async_trait::async_trait;
use semroute_common::{AppConfig, Result, SemrouteError};
use tracing::{debug, warn};

use crate::embedder::Embedder;
use crate::models::{encoder_info, DEFAULT_MODEL, FALLBACK_THRESHOLD, FALLBACK_TOKEN_LIMIT};
use crate::retry::{outcome_for_status, BatchOutcome, BatchState, RetryPolicy, Transition};
use crate::truncate::TextTruncator;
use crate::types::{EmbeddingRequest, EmbeddingResponse};

/// Provider hard cap is 32 inputs per request; 30 leaves a safety margin
pub const BATCH_SIZE: usize = 30;

/// Pause between consecutive batches to respect provider rate limits
pub const INTER_BATCH_DELAY: Duration = Duration::from_millis(500);

/// Embedding client settings
///
/// Credentials are explicit values threaded in here; the client never reads
/// the environment itself (use [`EncoderConfig::from_app_config`] for that).
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Embedding model name
    pub model: String,

    /// Provider API key
    pub api_key: Option<String>,

    /// Provider base URL (OpenAI-compatible)
    pub base_url: String,

    /// Score threshold override; defaults to the model table value
    pub score_threshold: Option<f32>,

    /// Requested output dimensions, if the model supports it
    pub dimensions: Option<usize>,

    /// Maximum retries per batch
    pub max_retries: u32,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: "https://api.siliconflow.cn/v1".to_string(),
            score_threshold: None,
            dimensions: None,
            max_retries: 3,
            timeout: Duration::from_secs(30),
        }
    }
}

impl EncoderConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            model: config.encoder_model.clone(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            score_threshold: None,
            dimensions: None,
            max_retries: config.max_retries,
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

/// Resolved model parameters shared by the sync and async clients
#[derive(Debug)]
pub(crate) struct ResolvedEncoder {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub dimensions: Option<usize>,
    pub score_threshold: f32,
    pub truncator: TextTruncator,
    pub retry: RetryPolicy,
}

impl ResolvedEncoder {
    pub fn new(config: EncoderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                SemrouteError::client_not_initialized("Provider API key cannot be empty")
            })?;

        let info = encoder_info(&config.model);
        if info.is_none() {
            warn!(
                "Unknown embedding model '{}'; using fallback token limit {} and threshold {}",
                config.model, FALLBACK_TOKEN_LIMIT, FALLBACK_THRESHOLD
            );
        }
        let token_limit = info.map(|i| i.token_limit).unwrap_or(FALLBACK_TOKEN_LIMIT);
        let score_threshold = config
            .score_threshold
            .or(info.map(|i| i.threshold))
            .unwrap_or(FALLBACK_THRESHOLD);

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model,
            dimensions: config.dimensions,
            score_threshold,
            truncator: TextTruncator::new(token_limit)?,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    pub fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    pub fn request_for(&self, batch: &[String]) -> EmbeddingRequest {
        EmbeddingRequest {
            input: batch.to_vec(),
            model: self.model.clone(),
            dimensions: self.dimensions,
        }
    }

    /// Validate a provider response body against the batch it answers
    pub fn embeddings_from(
        &self,
        response: EmbeddingResponse,
        batch_len: usize,
    ) -> std::result::Result<Vec<Vec<f32>>, BatchOutcome> {
        if response.data.is_empty() {
            return Err(BatchOutcome::Fatal("No embeddings returned".to_string()));
        }
        if response.data.len() != batch_len {
            return Err(BatchOutcome::Fatal(format!(
                "Provider returned {} embeddings for {} inputs",
                response.data.len(),
                batch_len
            )));
        }
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

pub(crate) fn transport_outcome(e: reqwest::Error) -> BatchOutcome {
    if e.is_timeout() || e.is_connect() {
        BatchOutcome::Transient(format!("Transport failure: {}", e))
    } else {
        BatchOutcome::Fatal(format!("Request failed: {}", e))
    }
}

/// One provider round trip for a single batch; the seam between the
/// batching/retry driver and the actual transport
#[async_trait]
pub(crate) trait ProviderCall: Sync {
    async fn call(&self, batch: &[String]) -> std::result::Result<Vec<Vec<f32>>, BatchOutcome>;
}

/// Split documents into provider batches and concatenate the results in
/// input order, pausing `delay` between consecutive batches.
pub(crate) async fn encode_in_batches(
    provider: &dyn ProviderCall,
    retry: &RetryPolicy,
    docs: &[String],
    delay: Duration,
) -> Result<Vec<Vec<f32>>> {
    let total_batches = docs.len().div_ceil(BATCH_SIZE);
    let mut all_embeddings = Vec::with_capacity(docs.len());

    for (batch_num, batch) in docs.chunks(BATCH_SIZE).enumerate() {
        let embeddings = encode_batch(provider, retry, batch, batch_num + 1, total_batches).await?;
        all_embeddings.extend(embeddings);

        if batch_num + 1 < total_batches {
            tokio::time::sleep(delay).await;
        }
    }

    Ok(all_embeddings)
}

/// Drive one batch through the retry state machine
async fn encode_batch(
    provider: &dyn ProviderCall,
    retry: &RetryPolicy,
    batch: &[String],
    batch_num: usize,
    total_batches: usize,
) -> Result<Vec<Vec<f32>>> {
    let (mut state, mut transition) = retry.dispatch(BatchState::Pending);
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
                let outcome = match provider.call(batch).await {
                    Ok(embeddings) => {
                        result = Some(embeddings);
                        BatchOutcome::Success
                    }
                    Err(outcome) => outcome,
                };
                if let BatchOutcome::Transient(msg) | BatchOutcome::Fatal(msg) = &outcome {
                    last_error = msg.clone();
                }
                (state, transition) = retry.observe(state, &outcome);
            }
            Transition::Backoff { delay, next_attempt } => {
                warn!(
                    "Batch {}/{} failed ({}); retrying in {:?}",
                    batch_num, total_batches, last_error, delay
                );
                tokio::time::sleep(delay).await;
                transition = Transition::Call {
                    attempt: next_attempt,
                };
            }
            Transition::Done => {
                return result
                    .ok_or_else(|| SemrouteError::provider("Provider returned no embeddings"));
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

/// Asynchronous embedding client for an OpenAI-compatible provider.
///
/// `encode` preserves input order across batches; concurrent calls are
/// independent and share nothing but the provider's own rate limit.
#[derive(Debug)]
pub struct EmbeddingClient {
    http: reqwest::Client,
    inner: ResolvedEncoder,
}

impl EmbeddingClient {
    /// Create a new embedding client
    pub fn new(config: EncoderConfig) -> Result<Self> {
        let timeout = config.timeout;
        let inner = ResolvedEncoder::new(config)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        debug!(
            "Embedding client initialized: model={}, base_url={}",
            inner.model, inner.base_url
        );
        Ok(Self { http, inner })
    }

    /// Resolved score threshold for the configured model
    pub fn score_threshold(&self) -> f32 {
        self.inner.score_threshold
    }

    /// Encode texts into embedding vectors, preserving input order.
    ///
    /// Texts over the model token limit are truncated first. Any batch that
    /// exhausts its retries fails the whole call; earlier batch results are
    /// discarded so callers re-submit the full text set.
    pub async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.encode_with_options(texts, true).await
    }

    /// Encode with explicit truncation control
    pub async fn encode_with_options(
        &self,
        texts: &[String],
        truncate: bool,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let docs: Vec<String> = if truncate {
            texts.iter().map(|t| self.inner.truncator.truncate(t)).collect()
        } else {
            texts.to_vec()
        };

        encode_in_batches(self, &self.inner.retry, &docs, INTER_BATCH_DELAY).await
    }
}

#[async_trait]
impl ProviderCall for EmbeddingClient {
    async fn call(&self, batch: &[String]) -> std::result::Result<Vec<Vec<f32>>, BatchOutcome> {
        let response = self
            .http
            .post(self.inner.embeddings_url())
            .bearer_auth(&self.inner.api_key)
            .json(&self.inner.request_for(batch))
            .send()
            .await
            .map_err(transport_outcome)?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(outcome_for_status(status, &body));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| BatchOutcome::Fatal(format!("Failed to parse embedding response: {}", e)))?;

        self.inner.embeddings_from(body, batch.len())
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.encode(texts).await
    }

    fn model_name(&self) -> &str {
        &self.inner.model
    }

    fn score_threshold(&self) -> f32 {
        self.inner.score_threshold
    }
}
