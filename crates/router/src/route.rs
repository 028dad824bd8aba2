use serde::{Deserialize, Serialize};

/// A named intent category with example utterances and an acceptance
/// threshold.
///
/// Routes are created once at router-build time; only the threshold is
/// mutated afterwards (by the optimizer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    /// Unique route name
    pub name: String,

    /// Example utterances, in training order
    pub utterances: Vec<String>,

    /// Per-route acceptance threshold; falls back to the router-wide
    /// default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,

    /// Free-form metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Route {
    /// Create a new route
    pub fn new(name: impl Into<String>, utterances: Vec<String>) -> Self {
        Self {
            name: name.into(),
            utterances,
            score_threshold: None,
            metadata: None,
        }
    }

    /// Set the acceptance threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
