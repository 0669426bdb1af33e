//! C5: hybrid search with over-fetch, quality boosting, and optional graph
//! expansion (§4.4). `GraphStoreError::is_connection_error` drives the
//! one-shot retry; every other store error degrades to an empty result with
//! a logged warning rather than propagating, per the Retriever's
//! fail-open contract.

use std::sync::Arc;

use tracing::warn;

use crate::domain::Chunk;
use crate::ports::{Embedder, GraphStore, HybridFilters};

/// A ranked search hit: a `Chunk` plus its post-boost score and convenience
/// accessors mirroring the spec's `SearchResult`.
#[derive(Clone, Debug)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f64,
}

impl SearchResult {
    pub fn chunk_id(&self) -> &str {
        &self.chunk.chunk_id
    }
    pub fn content(&self) -> &str {
        &self.chunk.content
    }
    pub fn page_title(&self) -> &str {
        &self.chunk.page_title
    }
    pub fn url(&self) -> &str {
        &self.chunk.url
    }
    pub fn space_key(&self) -> &str {
        &self.chunk.space_key
    }
    pub fn doc_type(&self) -> &str {
        &self.chunk.doc_type
    }
    pub fn quality_score(&self) -> f64 {
        self.chunk.quality_score
    }
    pub fn owner(&self) -> &str {
        &self.chunk.owner
    }
}

pub struct Retriever {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    quality_boost_weight: f64,
}

impl Retriever {
    pub fn new(store: Arc<dyn GraphStore>, embedder: Arc<dyn Embedder>, quality_boost_weight: f64) -> Self {
        Self {
            store,
            embedder,
            quality_boost_weight,
        }
    }

    pub async fn check_health(&self) -> bool {
        self.store.check_health().await && self.embedder.embed_single("healthcheck").await.is_ok()
    }

    /// §4.4 `Search`. Never propagates a store error to the caller: on
    /// failure this returns an empty vector and logs a warning, after one
    /// retry if the failure classifies as a stale connection.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filters: &HybridFilters,
        use_quality_boost: bool,
        use_graph_expansion: bool,
    ) -> Vec<SearchResult> {
        let query_embedding = match self.embedder.embed_single(query).await {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "embedder unavailable during search");
                return Vec::new();
            }
        };

        let over_fetch_k = k.saturating_mul(3).max(1);
        let raw = match self.store.search_hybrid(query, &query_embedding, over_fetch_k, filters).await {
            Ok(results) => results,
            Err(err) if err.is_connection_error() => {
                warn!(error = %err, "stale store connection, retrying once");
                match self.store.search_hybrid(query, &query_embedding, over_fetch_k, filters).await {
                    Ok(results) => results,
                    Err(err) => {
                        warn!(error = %err, "retry failed, returning empty result");
                        return Vec::new();
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "search_hybrid failed, returning empty result");
                return Vec::new();
            }
        };

        let mut results: Vec<SearchResult> = raw
            .into_iter()
            .filter(|(chunk, _)| !chunk.is_deleted())
            .filter(|(chunk, _)| filters.space_key.as_deref().is_none_or(|s| s == chunk.space_key))
            .filter(|(chunk, _)| filters.doc_type.as_deref().is_none_or(|d| d == chunk.doc_type))
            .map(|(chunk, score)| SearchResult { chunk, score })
            .collect();

        if use_quality_boost {
            for result in &mut results {
                result.score = boosted_score(result.score, result.chunk.quality_score, self.quality_boost_weight);
            }
            results.sort_by(|a, b| b.score.total_cmp(&a.score));
        }
        results.truncate(k);

        if use_graph_expansion {
            self.expand_with_related(&mut results, k).await;
        }

        results
    }

    async fn expand_with_related(&self, results: &mut Vec<SearchResult>, k: usize) {
        const M: usize = 5;
        let top_ids: Vec<String> = results.iter().take(M).map(|r| r.chunk_id().to_string()).collect();
        let mut candidates: Vec<(String, usize)> = Vec::new();
        for id in &top_ids {
            if let Ok(related) = self.store.related_chunks(id, k).await {
                candidates.extend(related);
            }
        }
        candidates.sort_by(|a, b| b.1.cmp(&a.1));

        let already: std::collections::HashSet<String> = results.iter().map(|r| r.chunk_id().to_string()).collect();
        let expansion_limit = k / 3;
        let mut added = 0usize;
        for (chunk_id, _shared_count) in candidates {
            if added >= expansion_limit {
                break;
            }
            if already.contains(&chunk_id) {
                continue;
            }
            if let Ok(Some(chunk)) = self.store.get_chunk_by_id(&chunk_id).await {
                if chunk.is_deleted() {
                    continue;
                }
                results.push(SearchResult { chunk, score: 0.0 });
                added += 1;
            }
        }
    }
}

/// §4.4 quality-boost transform: `score * (1 + w * (2*(quality/100) - 1))`.
pub fn boosted_score(score: f64, quality_score: f64, w: f64) -> f64 {
    score * (1.0 + w * (2.0 * (quality_score / 100.0) - 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_boost_matches_scenario_2() {
        let a = boosted_score(0.80, 100.0, 0.2);
        let b = boosted_score(0.80, 25.0, 0.2);
        assert!((a - 0.96).abs() < 1e-9);
        assert!((b - 0.72).abs() < 1e-9);
        assert!(a > b);
    }

    #[test]
    fn quality_fifty_is_neutral() {
        let s = boosted_score(0.5, 50.0, 0.2);
        assert!((s - 0.5).abs() < 1e-9);
    }
}
