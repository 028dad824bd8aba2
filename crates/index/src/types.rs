use serde::{Deserialize, Serialize};

/// Shape summary returned by `FlatIndex::describe`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index implementation tag
    #[serde(rename = "type")]
    pub index_type: String,

    /// Vector dimension; 0 before the first add
    pub dimension: usize,

    /// Number of stored records
    pub vector_count: usize,
}

/// One scored hit from a query: (score, route name)
pub type RouteHit = (f32, String);

/// One scored utterance lookup: (utterance, score)
pub type UtteranceHit = (String, f32);
