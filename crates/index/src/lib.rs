//! Semroute Vector Index
//!
//! Flat exact-scan index keeping routes, utterances and metadata in
//! lockstep with the vector arena; deletion rebuilds the arena.

mod flat;
mod similarity;
mod types;

pub use flat::FlatIndex;
pub use similarity::{l2_distance, score_from_distance};
pub use types::{IndexConfig, RouteHit, UtteranceHit};
