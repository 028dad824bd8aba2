//! Router model persistence.
//!
//! A saved model carries route definitions and training data but never
//! embeddings; loading re-encodes every utterance, so a model file stays
//! valid across encoder upgrades.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use semroute_common::{Result, SemrouteError};
use semroute_encoder::Embedder;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::route::Route;
use crate::router::{RouterOptions, SemanticRouter};

/// Format version written by this build
pub const MODEL_VERSION: &str = "2.0";

/// Format versions this build can load
pub const COMPATIBLE_VERSIONS: &[&str] = &["1.0", "2.0"];

/// One route as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSpec {
    pub name: String,
    pub utterances: Vec<String>,
}

/// Summary counts persisted alongside the routes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub num_routes: usize,
    pub total_utterances: usize,
}

/// Serialized router state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterModel {
    /// Embedding model the router was built with
    pub encoder_name: String,

    /// Router-wide default acceptance threshold
    pub score_threshold: f32,

    pub routes: Vec<RouteSpec>,

    /// Labeled evaluation utterances grouped by their expected route
    #[serde(default)]
    pub training_data: BTreeMap<String, Vec<String>>,

    /// RFC 3339 save time
    pub timestamp: String,

    pub version: String,

    pub metadata: ModelMetadata,
}

impl RouterModel {
    /// Snapshot a router, optionally bundling its evaluation samples
    pub fn from_router(router: &SemanticRouter, training_data: &[(String, String)]) -> Self {
        let routes: Vec<RouteSpec> = router
            .routes()
            .iter()
            .map(|r| RouteSpec {
                name: r.name.clone(),
                utterances: r.utterances.clone(),
            })
            .collect();

        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (utterance, route) in training_data {
            grouped.entry(route.clone()).or_default().push(utterance.clone());
        }
        let total_utterances = grouped.values().map(Vec::len).sum();

        Self {
            encoder_name: router.model_name().to_string(),
            score_threshold: router.default_threshold(),
            metadata: ModelMetadata {
                num_routes: routes.len(),
                total_utterances,
            },
            routes,
            training_data: grouped,
            timestamp: Utc::now().to_rfc3339(),
            version: MODEL_VERSION.to_string(),
        }
    }

    /// Write the model as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(
            "Saved router model to {} ({} routes, {} utterances)",
            path.display(),
            self.metadata.num_routes,
            self.metadata.total_utterances
        );
        Ok(())
    }

    /// Read a model back, warning on an unrecognized format version
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            SemrouteError::not_found(format!("Model file {}: {}", path.display(), e))
        })?;
        let model: Self = serde_json::from_str(&json)?;
        if !COMPATIBLE_VERSIONS.contains(&model.version.as_str()) {
            warn!(
                "Model {} has unrecognized version '{}'; loading anyway",
                path.display(),
                model.version
            );
        }
        Ok(model)
    }

    /// Labeled `(utterance, expected_route)` samples flattened from the
    /// grouped training data
    pub fn training_samples(&self) -> Vec<(String, String)> {
        self.training_data
            .iter()
            .flat_map(|(route, utterances)| {
                utterances.iter().map(move |u| (u.clone(), route.clone()))
            })
            .collect()
    }
}

impl SemanticRouter {
    /// Rebuild a router from a saved model, re-encoding every utterance
    pub async fn from_model(model: &RouterModel, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if embedder.model_name() != model.encoder_name {
            warn!(
                "Model was trained with encoder '{}' but is being loaded with '{}'; \
                 scores may shift",
                model.encoder_name,
                embedder.model_name()
            );
        }

        let routes: Vec<Route> = model
            .routes
            .iter()
            .map(|r| Route::new(&r.name, r.utterances.clone()))
            .collect();
        let options = RouterOptions {
            score_threshold: Some(model.score_threshold),
            ..RouterOptions::default()
        };
        Self::with_options(embedder, routes, options).await
    }
}
