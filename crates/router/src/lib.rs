//! Semroute Semantic Router
//!
//! 의미 기반 라우팅 파이프라인. Ties the embedding client and the flat
//! index together: routes with per-route thresholds, threshold-filtered
//! classification, accuracy evaluation, grid-search threshold
//! optimization, and JSON model persistence.

pub mod model;
pub mod optimizer;
pub mod route;
pub mod router;

#[cfg(test)]
mod testing;

pub use model::{ModelMetadata, RouteSpec, RouterModel, COMPATIBLE_VERSIONS, MODEL_VERSION};
pub use optimizer::{
    optimize_thresholds, OptimizationMethod, OptimizationReport, ThresholdFitter, GRID_POINTS,
};
pub use route::Route;
pub use router::{Aggregation, Evaluation, RouteChoice, RouterOptions, SemanticRouter};
