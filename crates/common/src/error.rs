/// Semroute error types
#[derive(Debug, thiserror::Error)]
pub enum SemrouteError {
    /// Embedding provider error (network/auth/API failure after retries)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Embedding client was constructed without usable credentials
    #[error("Client not initialized: {0}")]
    ClientNotInitialized(String),

    /// Vector dimension does not match the index dimension
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Operation on an index with zero records
    #[error("Index is not populated: {0}")]
    NotPopulated(String),

    /// Route filter matched zero stored records
    #[error("No routes found matching the filter criteria: {0}")]
    NoMatchingRoutes(String),

    /// Automatic threshold optimization failed
    #[error("Threshold optimization error: {0}")]
    Optimization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// General error (anyhow integration)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SemrouteError {
    /// Create provider error
    pub fn provider<S: Into<String>>(msg: S) -> Self {
        Self::Provider(msg.into())
    }

    /// Create client-not-initialized error
    pub fn client_not_initialized<S: Into<String>>(msg: S) -> Self {
        Self::ClientNotInitialized(msg.into())
    }

    /// Create not-populated error
    pub fn not_populated<S: Into<String>>(msg: S) -> Self {
        Self::NotPopulated(msg.into())
    }

    /// Create no-matching-routes error
    pub fn no_matching_routes<S: Into<String>>(msg: S) -> Self {
        Self::NoMatchingRoutes(msg.into())
    }

    /// Create optimization error
    pub fn optimization<S: Into<String>>(msg: S) -> Self {
        Self::Optimization(msg.into())
    }

    /// Create config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// True when the failure is a programmer/data error on the index itself.
    /// These are never retried, only surfaced.
    pub fn is_index_structural(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. } | Self::NotPopulated(_) | Self::NoMatchingRoutes(_)
        )
    }
}
