use std::collections::HashMap;
use std::sync::Arc;

use semroute_common::{Result, SemrouteError};
use semroute_encoder::Embedder;
use semroute_index::{FlatIndex, IndexConfig, RouteHit};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::route::Route;

/// How per-route hit scores are collapsed into one aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    /// Best observed score per route (default)
    #[default]
    Max,
    /// Mean of observed scores per route
    Mean,
}

/// Router construction options
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Router-wide default threshold; falls back to the encoder's model
    /// threshold when unset
    pub score_threshold: Option<f32>,

    /// How many nearest utterances each classification considers
    pub top_k: usize,

    /// Per-route score aggregation
    pub aggregation: Aggregation,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            score_threshold: None,
            top_k: 5,
            aggregation: Aggregation::Max,
        }
    }
}

/// Outcome of classifying one query
#[derive(Debug, Clone, Serialize)]
pub struct RouteChoice {
    /// Original query text
    pub query: String,

    /// Accepted route, or None when nothing cleared its threshold
    pub route: Option<String>,

    /// Aggregate score of the accepted route, or the best aggregate
    /// observed when nothing was accepted
    pub score: f32,

    /// Whether a route cleared its threshold
    pub passed: bool,

    /// Error detail when classification failed outright
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RouteChoice {
    fn no_match(query: &str, score: f32, error: Option<String>) -> Self {
        Self {
            query: query.to_string(),
            route: None,
            score,
            passed: false,
            error,
        }
    }
}

/// Accuracy over a labeled evaluation set
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Evaluation {
    pub total: usize,
    pub correct: usize,
    /// correct / total * 100; 0 for an empty set
    pub accuracy: f32,
}

/// Semantic router: routes plus one exclusively-owned flat index.
///
/// The pipeline is synchronous per call; the only suspension points are the
/// embedding provider requests.
pub struct SemanticRouter {
    embedder: Arc<dyn Embedder>,
    routes: Vec<Route>,
    index: FlatIndex,
    score_threshold: f32,
    top_k: usize,
    aggregation: Aggregation,
}

impl SemanticRouter {
    /// Build a router from routes, encoding every utterance
    pub async fn new(embedder: Arc<dyn Embedder>, routes: Vec<Route>) -> Result<Self> {
        Self::with_options(embedder, routes, RouterOptions::default()).await
    }

    /// Build a router with explicit options
    pub async fn with_options(
        embedder: Arc<dyn Embedder>,
        routes: Vec<Route>,
        options: RouterOptions,
    ) -> Result<Self> {
        let texts: Vec<String> = routes
            .iter()
            .flat_map(|r| r.utterances.iter().cloned())
            .collect();
        let route_names: Vec<String> = routes
            .iter()
            .flat_map(|r| std::iter::repeat(r.name.clone()).take(r.utterances.len()))
            .collect();

        let mut index = FlatIndex::new();
        if !texts.is_empty() {
            let embeddings = embedder.encode(&texts).await?;
            index.add(embeddings, route_names, texts, None)?;
        }

        let score_threshold = options
            .score_threshold
            .unwrap_or_else(|| embedder.score_threshold());

        info!(
            "Semantic router built: {} routes, {} utterances, default threshold {:.3}",
            routes.len(),
            index.len(),
            score_threshold
        );

        Ok(Self {
            embedder,
            routes,
            index,
            score_threshold,
            top_k: options.top_k,
            aggregation: options.aggregation,
        })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn describe_index(&self) -> IndexConfig {
        self.index.describe()
    }

    /// Embedding model name of the underlying encoder
    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Router-wide default threshold
    pub fn default_threshold(&self) -> f32 {
        self.score_threshold
    }

    /// Effective threshold per route
    pub fn thresholds(&self) -> HashMap<String, f32> {
        self.routes
            .iter()
            .map(|r| {
                (
                    r.name.clone(),
                    r.score_threshold.unwrap_or(self.score_threshold),
                )
            })
            .collect()
    }

    /// Set a route's acceptance threshold
    pub fn set_threshold(&mut self, route_name: &str, threshold: f32) -> Result<()> {
        let route = self
            .routes
            .iter_mut()
            .find(|r| r.name == route_name)
            .ok_or_else(|| SemrouteError::not_found(format!("Route '{}'", route_name)))?;
        route.score_threshold = Some(threshold);
        Ok(())
    }

    /// Remove a route and all of its index records
    pub fn remove_route(&mut self, route_name: &str) -> Result<()> {
        if !self.routes.iter().any(|r| r.name == route_name) {
            return Err(SemrouteError::not_found(format!("Route '{}'", route_name)));
        }
        self.index.delete(route_name)?;
        self.routes.retain(|r| r.name != route_name);
        info!("Removed route '{}'", route_name);
        Ok(())
    }

    /// Encode texts with the router's embedder
    pub async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embedder.encode(texts).await
    }

    /// Classify a query, mapping any failure to a no-match result with an
    /// error detail so a caller's request loop never crashes.
    pub async fn classify(&self, query: &str) -> RouteChoice {
        match self.try_classify(query).await {
            Ok(choice) => choice,
            Err(e) => {
                warn!("Classification failed for query '{}': {}", query, e);
                RouteChoice::no_match(query, 0.0, Some(e.to_string()))
            }
        }
    }

    /// Classify a query, surfacing failures as errors
    pub async fn try_classify(&self, query: &str) -> Result<RouteChoice> {
        let mut embeddings = self.embedder.encode(&[query.to_string()]).await?;
        let vector = embeddings
            .pop()
            .ok_or_else(|| SemrouteError::provider("Provider returned no embedding for query"))?;
        self.classify_vector(query, &vector)
    }

    /// Classify from a precomputed query vector.
    ///
    /// Pure given fixed embeddings: hits are aggregated per route, routes
    /// failing their own threshold are dropped, and the best survivor wins
    /// with ties broken by route insertion order.
    pub fn classify_vector(&self, query: &str, vector: &[f32]) -> Result<RouteChoice> {
        let hits = self.index.query(vector, self.top_k, None)?;
        let aggregates = self.aggregate(&hits);

        let mut best_overall: f32 = 0.0;
        let mut winner: Option<(&str, f32)> = None;

        for route in &self.routes {
            let Some(&score) = aggregates.get(route.name.as_str()) else {
                continue;
            };
            if score > best_overall {
                best_overall = score;
            }
            let threshold = route.score_threshold.unwrap_or(self.score_threshold);
            if score < threshold {
                continue;
            }
            // strict comparison keeps the earliest-inserted route on ties
            if winner.map_or(true, |(_, best)| score > best) {
                winner = Some((&route.name, score));
            }
        }

        match winner {
            Some((name, score)) => {
                debug!("Query '{}' matched route '{}' ({:.4})", query, name, score);
                Ok(RouteChoice {
                    query: query.to_string(),
                    route: Some(name.to_string()),
                    score,
                    passed: true,
                    error: None,
                })
            }
            None => {
                debug!(
                    "Query '{}' matched no route (best aggregate {:.4})",
                    query, best_overall
                );
                Ok(RouteChoice::no_match(query, best_overall, None))
            }
        }
    }

    /// Evaluate accuracy over labeled `(utterance, expected_route)` pairs
    pub async fn evaluate(&self, samples: &[(String, String)]) -> Result<Evaluation> {
        let texts: Vec<String> = samples.iter().map(|(q, _)| q.clone()).collect();
        let vectors = self.embedder.encode(&texts).await?;
        Ok(self.evaluate_vectors(&vectors, samples))
    }

    /// Evaluate from precomputed query vectors (pure computation)
    pub fn evaluate_vectors(&self, vectors: &[Vec<f32>], samples: &[(String, String)]) -> Evaluation {
        let mut correct = 0;
        for (vector, (query, expected)) in vectors.iter().zip(samples) {
            match self.classify_vector(query, vector) {
                Ok(choice) if choice.route.as_deref() == Some(expected.as_str()) => correct += 1,
                Ok(_) => {}
                Err(e) => debug!("Evaluation query '{}' failed: {}", query, e),
            }
        }

        let total = samples.len();
        let accuracy = if total > 0 {
            correct as f32 / total as f32 * 100.0
        } else {
            0.0
        };
        Evaluation {
            total,
            correct,
            accuracy,
        }
    }

    fn aggregate(&self, hits: &[RouteHit]) -> HashMap<&str, f32> {
        let mut grouped: HashMap<&str, Vec<f32>> = HashMap::new();
        for (score, route) in hits {
            // key borrows from self.routes so the map outlives the hits
            if let Some(route) = self.routes.iter().find(|r| &r.name == route) {
                grouped.entry(route.name.as_str()).or_default().push(*score);
            }
        }

        grouped
            .into_iter()
            .map(|(name, scores)| {
                let aggregate = match self.aggregation {
                    Aggregation::Max => scores.iter().fold(f32::NEG_INFINITY, |a, b| a.max(*b)),
                    Aggregation::Mean => scores.iter().sum::<f32>() / scores.len() as f32,
                };
                (name, aggregate)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubEmbedder;

    async fn greeting_farewell_router() -> SemanticRouter {
        let embedder = StubEmbedder::new(0.3)
            .with("hello there", &[2.0 / 3.0])
            .with("goodbye now", &[9.0 / 11.0])
            .with("hi friend", &[0.0]);
        let routes = vec![
            Route::new("greeting", vec!["hello there".to_string()]).with_threshold(0.8),
            Route::new("farewell", vec!["goodbye now".to_string()]).with_threshold(0.5),
        ];
        SemanticRouter::new(Arc::new(embedder), routes).await.unwrap()
    }

    #[tokio::test]
    async fn test_build_populates_index() {
        let router = greeting_farewell_router().await;
        let config = router.describe_index();
        assert_eq!(config.vector_count, 2);
        assert_eq!(config.dimension, 1);
        assert_eq!(
            router.index().get_vector_by_utterance("hello there").unwrap(),
            &[2.0 / 3.0]
        );
    }

    #[tokio::test]
    async fn test_only_route_clearing_its_threshold_wins() {
        // greeting scores 0.6 against its 0.8 threshold; farewell scores
        // 0.55 against 0.5: farewell must win despite the lower score
        let router = greeting_farewell_router().await;
        let choice = router.classify("hi friend").await;
        assert_eq!(choice.route.as_deref(), Some("farewell"));
        assert!(choice.passed);
        assert!((choice.score - 0.55).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_no_match_when_nothing_clears() {
        let embedder = StubEmbedder::new(0.9)
            .with("hello there", &[2.0 / 3.0])
            .with("hi friend", &[0.0]);
        let routes = vec![Route::new("greeting", vec!["hello there".to_string()])];
        let router = SemanticRouter::new(Arc::new(embedder), routes).await.unwrap();

        let choice = router.classify("hi friend").await;
        assert!(choice.route.is_none());
        assert!(!choice.passed);
        // diagnostics still carry the best aggregate observed
        assert!((choice.score - 0.6).abs() < 1e-5);
        assert!(choice.error.is_none());
    }

    #[tokio::test]
    async fn test_classification_is_deterministic() {
        let router = greeting_farewell_router().await;
        let first = router.classify("hi friend").await;
        let second = router.classify("hi friend").await;
        assert_eq!(first.route, second.route);
        assert_eq!(first.score, second.score);
    }

    #[tokio::test]
    async fn test_tie_broken_by_insertion_order() {
        let embedder = StubEmbedder::new(0.3)
            .with("left", &[1.0])
            .with("right", &[-1.0])
            .with("middle", &[0.0]);
        let routes = vec![
            Route::new("first", vec!["left".to_string()]),
            Route::new("second", vec!["right".to_string()]),
        ];
        let router = SemanticRouter::new(Arc::new(embedder), routes).await.unwrap();

        // both routes aggregate to exactly 0.5
        let choice = router.classify("middle").await;
        assert_eq!(choice.route.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_classify_maps_failure_to_no_match() {
        let router = greeting_farewell_router().await;
        // stub has no vector for this text, so encoding fails
        let choice = router.classify("unknown text").await;
        assert!(choice.route.is_none());
        assert!(!choice.passed);
        assert!(choice.error.is_some());

        let err = router.try_classify("unknown text").await.unwrap_err();
        assert!(matches!(err, SemrouteError::Provider(_)));
    }

    #[tokio::test]
    async fn test_mean_aggregation() {
        let embedder = StubEmbedder::new(0.1)
            .with("a1", &[1.0])
            .with("a2", &[3.0])
            .with("q", &[0.0]);
        let routes = vec![Route::new("a", vec!["a1".to_string(), "a2".to_string()])];
        let options = RouterOptions {
            aggregation: Aggregation::Mean,
            ..RouterOptions::default()
        };
        let router = SemanticRouter::with_options(Arc::new(embedder), routes, options)
            .await
            .unwrap();

        // scores 0.5 and 0.25 -> mean 0.375
        let choice = router.classify("q").await;
        assert!((choice.score - 0.375).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_remove_route() {
        let mut router = greeting_farewell_router().await;
        router.remove_route("farewell").unwrap();
        assert_eq!(router.routes().len(), 1);
        assert_eq!(router.describe_index().vector_count, 1);

        let choice = router.classify("hi friend").await;
        assert_ne!(choice.route.as_deref(), Some("farewell"));

        let err = router.remove_route("farewell").unwrap_err();
        assert!(matches!(err, SemrouteError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_thresholds_fall_back_to_default() {
        let embedder = StubEmbedder::new(0.3).with("x", &[0.0]);
        let routes = vec![
            Route::new("custom", vec!["x".to_string()]).with_threshold(0.9),
            Route::new("default", vec![]),
        ];
        let router = SemanticRouter::new(Arc::new(embedder), routes).await.unwrap();

        let thresholds = router.thresholds();
        assert_eq!(thresholds["custom"], 0.9);
        assert_eq!(thresholds["default"], 0.3);
    }

    #[tokio::test]
    async fn test_evaluate_accuracy() {
        let router = greeting_farewell_router().await;
        let samples = vec![
            ("hi friend".to_string(), "farewell".to_string()),
            ("hello there".to_string(), "greeting".to_string()),
        ];
        let evaluation = router.evaluate(&samples).await.unwrap();
        assert_eq!(evaluation.total, 2);
        // "hello there" scores 1.0 on greeting (>= 0.8), "hi friend" goes
        // to farewell
        assert_eq!(evaluation.correct, 2);
        assert_eq!(evaluation.accuracy, 100.0);
    }

    #[tokio::test]
    async fn test_evaluate_empty_set() {
        let router = greeting_farewell_router().await;
        let evaluation = router.evaluate(&[]).await.unwrap();
        assert_eq!(evaluation.total, 0);
        assert_eq!(evaluation.accuracy, 0.0);
    }

    #[tokio::test]
    async fn test_set_threshold() {
        let mut router = greeting_farewell_router().await;
        router.set_threshold("greeting", 0.55).unwrap();
        assert_eq!(router.thresholds()["greeting"], 0.55);

        // with the lowered threshold, greeting (0.6) now beats farewell (0.55)
        let choice = router.classify("hi friend").await;
        assert_eq!(choice.route.as_deref(), Some("greeting"));

        assert!(router.set_threshold("missing", 0.5).is_err());
    }
}
