use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::Chunk;
use crate::error::GraphStoreError;

/// Metadata filters accepted by `SearchHybrid` (§4.3).
#[derive(Clone, Debug, Default)]
pub struct HybridFilters {
    pub space_key: Option<String>,
    pub doc_type: Option<String>,
    pub min_quality_score: Option<f64>,
}

/// Abstraction over a temporal graph database (§4.3). The only concrete
/// implementation shipped here is the in-memory reference store in
/// `crate::stores::memory` — the real driver is out of scope.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Idempotent by `chunk_id`; replaces content and metadata while
    /// preserving historical event-time semantics. `embedding` is the
    /// chunk's vector representation, computed by the ingestion pipeline
    /// before the call; `None` leaves a previously stored embedding intact.
    async fn upsert_chunk(
        &self,
        chunk: Chunk,
        event_time: DateTime<Utc>,
        embedding: Option<Vec<f32>>,
    ) -> Result<(), GraphStoreError>;

    async fn get_chunk_by_id(&self, chunk_id: &str) -> Result<Option<Chunk>, GraphStoreError>;

    /// Merge-update a subset of metadata fields; race-safe with concurrent
    /// `upsert_chunk` calls (last writer wins, no invariant violations).
    /// Unknown keys already present on the record are preserved.
    async fn update_metadata(
        &self,
        chunk_id: &str,
        patch: Value,
    ) -> Result<(), GraphStoreError>;

    /// Clamps to [0, 100]; the feedback counter increments atomically with
    /// the score write when `increment_feedback_count` is set.
    async fn update_quality_score(
        &self,
        chunk_id: &str,
        new_score: f64,
        increment_feedback_count: bool,
    ) -> Result<(), GraphStoreError>;

    /// Top-`k` results ranked by a combined semantic+lexical+graph score.
    /// Must never return a soft-deleted chunk.
    async fn search_hybrid(
        &self,
        query: &str,
        query_embedding: &[f32],
        k: usize,
        filters: &HybridFilters,
    ) -> Result<Vec<(Chunk, f64)>, GraphStoreError>;

    async fn bulk_list(
        &self,
        limit: usize,
        since_event_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<Chunk>, GraphStoreError>;

    /// Chunks sharing graph entities with the given chunk, ranked by number
    /// of shared entities (used for graph expansion and conflict-candidate
    /// discovery).
    async fn related_chunks(&self, chunk_id: &str, limit: usize) -> Result<Vec<(String, usize)>, GraphStoreError>;

    async fn check_health(&self) -> bool;
}
