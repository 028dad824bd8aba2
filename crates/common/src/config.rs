use crate::error::SemrouteError;
use serde::{Deserialize, Serialize};

/// Semroute application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Embedding provider API key
    pub api_key: Option<String>,

    /// Embedding provider base URL (OpenAI-compatible)
    pub base_url: String,

    /// Embedding model name
    pub encoder_model: String,

    /// Router-wide default score threshold
    pub score_threshold: f32,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum retries per embedding batch
    pub max_retries: u32,

    /// Log level
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.siliconflow.cn/v1".to_string(),
            encoder_model: "BAAI/bge-large-zh-v1.5".to_string(),
            score_threshold: 0.3,
            request_timeout_secs: 30,
            max_retries: 3,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self, SemrouteError> {
        // Load .env file (ignore if not exists)
        let _ = dotenv::dotenv();

        let config = Self {
            api_key: std::env::var("SEMROUTE_API_KEY").ok(),
            base_url: std::env::var("SEMROUTE_BASE_URL")
                .unwrap_or_else(|_| "https://api.siliconflow.cn/v1".to_string()),
            encoder_model: std::env::var("SEMROUTE_ENCODER_MODEL")
                .unwrap_or_else(|_| "BAAI/bge-large-zh-v1.5".to_string()),
            score_threshold: std::env::var("SEMROUTE_SCORE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.3),
            request_timeout_secs: std::env::var("SEMROUTE_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            max_retries: std::env::var("SEMROUTE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), SemrouteError> {
        if self.encoder_model.is_empty() {
            return Err(SemrouteError::config("Encoder model name cannot be empty"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(SemrouteError::config(
                "Provider base URL must start with http:// or https://",
            ));
        }

        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(SemrouteError::config(
                "Score threshold must be between 0.0 and 1.0",
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(SemrouteError::config("Request timeout cannot be 0"));
        }

        Ok(())
    }
}
