use semroute_common::{Result, SemrouteError};
use serde_json::Value;
use tracing::{debug, info};

use crate::similarity::{l2_distance, score_from_distance};
use crate::types::{IndexConfig, RouteHit, UtteranceHit};

/// Flat (exact scan) vector index over route utterances.
///
/// Vectors live in one arena kept in lockstep with three parallel arrays
/// (route names, utterances, metadata): equal lengths at all times, positions
/// corresponding 1:1. The dimension is fixed by the first `add`.
///
/// No internal locking; `add`/`delete` must not run concurrently with each
/// other or with `query` on the same instance.
#[derive(Debug, Default)]
pub struct FlatIndex {
    vectors: Vec<Vec<f32>>,
    routes: Vec<String>,
    utterances: Vec<String>,
    metadata: Vec<Value>,
    dimension: Option<usize>,
}

impl FlatIndex {
    /// Create a new empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Fixed dimension, once the first add has established it
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// True once the index holds at least one record
    pub fn is_ready(&self) -> bool {
        !self.is_empty()
    }

    /// Add embeddings with their route names, utterances and metadata.
    ///
    /// All slices must agree in length. Every vector must match the index
    /// dimension (fixed by the first add); any mismatch rejects the whole
    /// call before anything is appended.
    pub fn add(
        &mut self,
        embeddings: Vec<Vec<f32>>,
        routes: Vec<String>,
        utterances: Vec<String>,
        metadata: Option<Vec<Value>>,
    ) -> Result<()> {
        if embeddings.len() != routes.len() || embeddings.len() != utterances.len() {
            return Err(SemrouteError::invalid_input(format!(
                "Length mismatch: {} embeddings, {} routes, {} utterances",
                embeddings.len(),
                routes.len(),
                utterances.len()
            )));
        }
        if let Some(meta) = &metadata {
            if meta.len() != embeddings.len() {
                return Err(SemrouteError::invalid_input(format!(
                    "Length mismatch: {} embeddings, {} metadata entries",
                    embeddings.len(),
                    meta.len()
                )));
            }
        }
        if embeddings.is_empty() {
            return Ok(());
        }

        // Validate every dimension before touching the arena (atomic rejection)
        let expected = self.dimension.unwrap_or(embeddings[0].len());
        for vector in &embeddings {
            if vector.len() != expected {
                return Err(SemrouteError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }

        self.dimension = Some(expected);
        let added = embeddings.len();
        let metadata =
            metadata.unwrap_or_else(|| vec![Value::Object(Default::default()); added]);

        self.vectors.extend(embeddings);
        self.routes.extend(routes);
        self.utterances.extend(utterances);
        self.metadata.extend(metadata);

        debug!("Added {} records to flat index (total {})", added, self.len());
        Ok(())
    }

    /// Search for the `top_k` nearest records, optionally restricted to a
    /// set of routes.
    ///
    /// The filter only narrows the candidate pool; scoring is unchanged.
    /// Results are `(score, route)` pairs in non-increasing score order,
    /// ties stable in insertion order.
    pub fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        route_filter: Option<&[String]>,
    ) -> Result<Vec<RouteHit>> {
        if self.is_empty() {
            return Err(SemrouteError::not_populated(
                "Cannot query an empty index",
            ));
        }
        self.check_dimension(vector)?;

        let mut hits: Vec<(f32, usize)> = Vec::new();
        for (i, stored) in self.vectors.iter().enumerate() {
            if let Some(filter) = route_filter {
                if !filter.contains(&self.routes[i]) {
                    continue;
                }
            }
            let score = score_from_distance(l2_distance(vector, stored));
            hits.push((score, i));
        }

        if hits.is_empty() {
            return Err(SemrouteError::no_matching_routes(
                "Route filter matched no stored records",
            ));
        }

        hits.sort_by(|a, b| b.0.total_cmp(&a.0));
        hits.truncate(top_k);

        Ok(hits
            .into_iter()
            .map(|(score, i)| (score, self.routes[i].clone()))
            .collect())
    }

    /// Delete all records of a specific route.
    ///
    /// The underlying structure has no in-place removal, so this is a
    /// keep-mask rebuild: a fresh arena and fresh parallel arrays are built
    /// from the kept entries in their original relative order, then swapped
    /// in. A route with no records is a no-op.
    pub fn delete(&mut self, route_name: &str) -> Result<()> {
        if self.is_empty() {
            return Err(SemrouteError::not_populated(
                "Cannot delete from an empty index",
            ));
        }

        let keep: Vec<bool> = self.routes.iter().map(|r| r != route_name).collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return Ok(());
        }

        let kept = self.len() - removed;
        let mut vectors = Vec::with_capacity(kept);
        let mut routes = Vec::with_capacity(kept);
        let mut utterances = Vec::with_capacity(kept);
        let mut metadata = Vec::with_capacity(kept);

        for (i, keep_it) in keep.iter().enumerate() {
            if *keep_it {
                vectors.push(self.vectors[i].clone());
                routes.push(self.routes[i].clone());
                utterances.push(self.utterances[i].clone());
                metadata.push(self.metadata[i].clone());
            }
        }

        self.vectors = vectors;
        self.routes = routes;
        self.utterances = utterances;
        self.metadata = metadata;

        info!(
            "Deleted {} records for route '{}' ({} remaining)",
            removed,
            route_name,
            self.len()
        );
        Ok(())
    }

    /// Describe the index shape
    pub fn describe(&self) -> IndexConfig {
        IndexConfig {
            index_type: "flat".to_string(),
            dimension: self.dimension.unwrap_or(0),
            vector_count: self.len(),
        }
    }

    /// First stored vector whose utterance equals `utterance`
    pub fn get_vector_by_utterance(&self, utterance: &str) -> Option<&[f32]> {
        self.utterances
            .iter()
            .position(|u| u == utterance)
            .map(|i| self.vectors[i].as_slice())
    }

    /// Up to `top_k` nearest `(utterance, score)` pairs for a vector
    pub fn get_utterance_by_vector(&self, vector: &[f32], top_k: usize) -> Result<Vec<UtteranceHit>> {
        if self.is_empty() {
            return Err(SemrouteError::not_populated(
                "Cannot look up utterances in an empty index",
            ));
        }
        self.check_dimension(vector)?;

        let mut hits: Vec<(f32, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, stored)| (score_from_distance(l2_distance(vector, stored)), i))
            .collect();
        hits.sort_by(|a, b| b.0.total_cmp(&a.0));
        hits.truncate(top_k);

        Ok(hits
            .into_iter()
            .map(|(score, i)| (self.utterances[i].clone(), score))
            .collect())
    }

    /// All stored (route, utterance) pairs in insertion order
    pub fn utterances(&self) -> Vec<(String, String)> {
        self.routes
            .iter()
            .cloned()
            .zip(self.utterances.iter().cloned())
            .collect()
    }

    /// Metadata of the record at `position`
    pub fn metadata_at(&self, position: usize) -> Option<&Value> {
        self.metadata.get(position)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        match self.dimension {
            Some(expected) if vector.len() != expected => Err(SemrouteError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }),
            _ => Ok(()),
        }
    }
}
