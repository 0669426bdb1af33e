//! In-process reference implementations of `GraphStore` and
//! `AnalyticsStore`. Single-writer-lock discipline (matching the teacher's
//! `ResumeTracker`'s `Arc<Mutex<HashSet<_>>>`), one `tokio::sync::RwLock`
//! per collection so readers don't block each other and every mutation is
//! atomic at the chunk/record granularity, as the ports require.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use petgraph::graph::{NodeIndex, UnGraph};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::domain::{BehavioralSignal, BotResponse, Chunk, FeedbackRecord, IndexingCheckpoint, IndexingStatus};
use crate::error::{GraphStoreError, QualityError};
use crate::ports::{AnalyticsStore, FeedbackCounts, GraphStore, HybridFilters};

#[derive(Clone, Debug)]
enum NodeRef {
    Chunk(String),
    Entity(String),
}

/// In-memory `GraphStore`. Chunk content/metadata lives in a plain map;
/// a small undirected graph of chunk↔entity (topic) edges backs graph
/// expansion and conflict-candidate discovery, mirroring the "episode /
/// entity" traversal described in the glossary.
#[derive(Default)]
pub struct InMemoryGraphStore {
    chunks: RwLock<HashMap<String, Chunk>>,
    embeddings: RwLock<HashMap<String, Vec<f32>>>,
    graph: RwLock<UnGraph<NodeRef, ()>>,
    chunk_nodes: RwLock<HashMap<String, NodeIndex>>,
    entity_nodes: RwLock<HashMap<String, NodeIndex>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn link_entities(&self, chunk_id: &str, topics: &HashSet<String>) {
        let mut graph = self.graph.write().await;
        let mut chunk_nodes = self.chunk_nodes.write().await;
        let mut entity_nodes = self.entity_nodes.write().await;

        let chunk_node = *chunk_nodes
            .entry(chunk_id.to_string())
            .or_insert_with(|| graph.add_node(NodeRef::Chunk(chunk_id.to_string())));

        for topic in topics {
            let entity_node = *entity_nodes
                .entry(topic.clone())
                .or_insert_with(|| graph.add_node(NodeRef::Entity(topic.clone())));
            if !graph.contains_edge(chunk_node, entity_node) {
                graph.add_edge(chunk_node, entity_node, ());
            }
        }
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
        if a.is_empty() || b.is_empty() || a.len() != b.len() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        (dot / (norm_a * norm_b)) as f64
    }

    fn lexical_score(query: &str, content: &str) -> f64 {
        let query_terms: HashSet<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if query_terms.is_empty() {
            return 0.0;
        }
        let content_lower = content.to_lowercase();
        let hits = query_terms
            .iter()
            .filter(|term| content_lower.contains(term.as_str()))
            .count();
        hits as f64 / query_terms.len() as f64
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert_chunk(
        &self,
        chunk: Chunk,
        _event_time: DateTime<Utc>,
        embedding: Option<Vec<f32>>,
    ) -> Result<(), GraphStoreError> {
        let chunk_id = chunk.chunk_id.clone();
        let topics = chunk.topics.iter().cloned().collect::<HashSet<_>>();

        if let Some(embedding) = embedding {
            self.embeddings.write().await.insert(chunk_id.clone(), embedding);
        }
        self.chunks.write().await.insert(chunk_id.clone(), chunk);
        self.link_entities(&chunk_id, &topics).await;
        Ok(())
    }

    async fn get_chunk_by_id(&self, chunk_id: &str) -> Result<Option<Chunk>, GraphStoreError> {
        Ok(self.chunks.read().await.get(chunk_id).cloned())
    }

    async fn update_metadata(&self, chunk_id: &str, patch: Value) -> Result<(), GraphStoreError> {
        let mut chunks = self.chunks.write().await;
        let chunk = chunks
            .get_mut(chunk_id)
            .ok_or_else(|| GraphStoreError::NotFound(chunk_id.to_string()))?;

        let Value::Object(fields) = patch else {
            return Err(GraphStoreError::Operation("metadata patch must be a JSON object".into()));
        };

        let mut current = serde_json::to_value(&*chunk).map_err(|e| GraphStoreError::Operation(e.to_string()))?;
        if let Value::Object(current_fields) = &mut current {
            for (key, value) in fields {
                current_fields.insert(key, value);
            }
        }
        *chunk = serde_json::from_value(current).map_err(|e| GraphStoreError::Operation(e.to_string()))?;
        Ok(())
    }

    async fn update_quality_score(
        &self,
        chunk_id: &str,
        new_score: f64,
        increment_feedback_count: bool,
    ) -> Result<(), GraphStoreError> {
        let mut chunks = self.chunks.write().await;
        let chunk = chunks
            .get_mut(chunk_id)
            .ok_or_else(|| GraphStoreError::NotFound(chunk_id.to_string()))?;
        chunk.set_quality_score(new_score);
        if increment_feedback_count {
            chunk.feedback_count += 1;
        }
        Ok(())
    }

    async fn search_hybrid(
        &self,
        query: &str,
        query_embedding: &[f32],
        k: usize,
        filters: &HybridFilters,
    ) -> Result<Vec<(Chunk, f64)>, GraphStoreError> {
        let chunks = self.chunks.read().await;
        let embeddings = self.embeddings.read().await;

        let mut scored: Vec<(Chunk, f64)> = chunks
            .values()
            .filter(|c| !c.is_deleted())
            .filter(|c| filters.space_key.as_deref().is_none_or(|s| s == c.space_key))
            .filter(|c| filters.doc_type.as_deref().is_none_or(|d| d == c.doc_type))
            .filter(|c| filters.min_quality_score.is_none_or(|min| c.quality_score >= min))
            .map(|c| {
                let semantic = embeddings
                    .get(&c.chunk_id)
                    .map(|e| Self::cosine_similarity(query_embedding, e))
                    .unwrap_or(0.0);
                let lexical = Self::lexical_score(query, &c.content);
                let graph = 0.0; // graph-traversal term contributed by the Retriever's expansion pass
                let score = 0.6 * semantic + 0.3 * lexical + 0.1 * graph;
                (c.clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored)
    }

    async fn bulk_list(
        &self,
        limit: usize,
        since_event_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<Chunk>, GraphStoreError> {
        let chunks = self.chunks.read().await;
        let mut out: Vec<Chunk> = chunks
            .values()
            .filter(|c| since_event_time.is_none_or(|since| c.event_time >= since))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));
        out.truncate(limit);
        Ok(out)
    }

    async fn related_chunks(&self, chunk_id: &str, limit: usize) -> Result<Vec<(String, usize)>, GraphStoreError> {
        let graph = self.graph.read().await;
        let chunk_nodes = self.chunk_nodes.read().await;

        let Some(&start) = chunk_nodes.get(chunk_id) else {
            return Ok(Vec::new());
        };

        let mut shared_counts: HashMap<String, usize> = HashMap::new();
        for entity in graph.neighbors(start) {
            for other in graph.neighbors(entity) {
                if let Some(NodeRef::Chunk(other_id)) = graph.node_weight(other) {
                    if other_id != chunk_id {
                        *shared_counts.entry(other_id.clone()).or_insert(0) += 1;
                    }
                }
            }
        }

        let mut ranked: Vec<(String, usize)> = shared_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn check_health(&self) -> bool {
        true
    }
}

/// In-memory `AnalyticsStore`. Feedback and bot-response history are
/// append-only vectors guarded by a single lock each, matching the
/// single-connection-discipline-for-writes policy in §5 (multiple readers
/// may still multiplex against the lock).
#[derive(Default)]
pub struct InMemoryAnalyticsStore {
    feedback: RwLock<Vec<FeedbackRecord>>,
    seen_feedback_keys: RwLock<HashSet<(String, String, String, String)>>,
    signals: RwLock<Vec<BehavioralSignal>>,
    bot_responses: RwLock<HashMap<String, BotResponse>>,
    checkpoints: RwLock<HashMap<(String, String), IndexingCheckpoint>>,
}

impl InMemoryAnalyticsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnalyticsStore for InMemoryAnalyticsStore {
    async fn record_feedback(&self, record: FeedbackRecord, message_ts: &str) -> Result<bool, QualityError> {
        let key = (
            record.chunk_id.clone(),
            record.user_id.clone(),
            format!("{:?}", record.feedback_type),
            message_ts.to_string(),
        );
        let mut seen = self.seen_feedback_keys.write().await;
        if !seen.insert(key) {
            return Ok(false);
        }
        self.feedback.write().await.push(record);
        Ok(true)
    }

    async fn record_signal(&self, signal: BehavioralSignal) -> Result<(), QualityError> {
        self.signals.write().await.push(signal);
        Ok(())
    }

    async fn record_bot_response(&self, response: BotResponse) -> Result<(), QualityError> {
        self.bot_responses
            .write()
            .await
            .insert(response.response_ts.clone(), response);
        Ok(())
    }

    async fn get_bot_response(&self, response_ts: &str) -> Result<Option<BotResponse>, QualityError> {
        Ok(self.bot_responses.read().await.get(response_ts).cloned())
    }

    async fn set_has_follow_up(&self, response_ts: &str) -> Result<(), QualityError> {
        if let Some(r) = self.bot_responses.write().await.get_mut(response_ts) {
            r.has_follow_up = true;
        }
        Ok(())
    }

    async fn feedback_counts_since(
        &self,
        chunk_id: &str,
        since: DateTime<Utc>,
    ) -> Result<FeedbackCounts, QualityError> {
        let feedback = self.feedback.read().await;
        let mut counts = FeedbackCounts::default();
        for record in feedback
            .iter()
            .filter(|r| r.chunk_id == chunk_id && r.created_at >= since)
        {
            match record.feedback_type {
                crate::domain::FeedbackType::Helpful => counts.helpful += 1,
                crate::domain::FeedbackType::Outdated => counts.outdated += 1,
                crate::domain::FeedbackType::Incorrect => counts.incorrect += 1,
                crate::domain::FeedbackType::Confusing => counts.confusing += 1,
            }
        }
        Ok(counts)
    }

    async fn recent_signal_values(&self, chunk_id: &str, since: DateTime<Utc>) -> Result<Vec<f64>, QualityError> {
        let signals = self.signals.read().await;
        Ok(signals
            .iter()
            .filter(|s| s.chunk_ids.iter().any(|id| id == chunk_id) && s.created_at >= since)
            .map(|s| s.signal_value)
            .collect())
    }

    async fn negative_feedback_count_since(
        &self,
        chunk_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, QualityError> {
        let feedback = self.feedback.read().await;
        Ok(feedback
            .iter()
            .filter(|r| r.chunk_id == chunk_id && r.created_at >= since && r.feedback_type.is_negative())
            .count() as u32)
    }

    async fn upsert_checkpoint(&self, checkpoint: IndexingCheckpoint) -> Result<(), QualityError> {
        self.checkpoints.write().await.insert(
            (checkpoint.chunk_id.clone(), checkpoint.session_id.clone()),
            checkpoint,
        );
        Ok(())
    }

    async fn get_checkpoint(
        &self,
        chunk_id: &str,
        session_id: &str,
    ) -> Result<Option<IndexingCheckpoint>, QualityError> {
        Ok(self
            .checkpoints
            .read()
            .await
            .get(&(chunk_id.to_string(), session_id.to_string()))
            .cloned())
    }

    async fn indexed_chunk_ids(&self, session_id: &str) -> Result<Vec<String>, QualityError> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints
            .values()
            .filter(|c| c.session_id == session_id && c.status == IndexingStatus::Indexed)
            .map(|c| c.chunk_id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChunkData, ChunkType, GovernanceInfo};

    fn sample_chunk(id_index: usize, topics: &[&str]) -> Chunk {
        let data = ChunkData::new("page-1", id_index, "Title", "some content here", ChunkType::Text, vec![]);
        let now = Utc::now();
        let mut chunk = Chunk::from_ingest(
            data,
            "SPACE",
            "https://wiki.example.com/page-1",
            "author@example.com",
            "Author",
            now,
            now,
            GovernanceInfo::default(),
            now,
        );
        chunk.topics = topics.iter().map(|s| s.to_string()).collect();
        chunk
    }

    #[tokio::test]
    async fn upsert_is_idempotent_in_observable_state() {
        let store = InMemoryGraphStore::new();
        let chunk = sample_chunk(0, &["security"]);
        let now = Utc::now();
        store.upsert_chunk(chunk.clone(), now, Some(vec![1.0, 0.0])).await.unwrap();
        store.upsert_chunk(chunk.clone(), now, Some(vec![1.0, 0.0])).await.unwrap();

        assert_eq!(store.chunks.read().await.len(), 1);
        let fetched = store.get_chunk_by_id(&chunk.chunk_id).await.unwrap().unwrap();
        assert_eq!(fetched.content, chunk.content);
    }

    #[tokio::test]
    async fn search_hybrid_never_returns_deleted_chunks() {
        let store = InMemoryGraphStore::new();
        let mut chunk = sample_chunk(0, &[]);
        chunk.deleted_at = Some(Utc::now());
        store.upsert_chunk(chunk, Utc::now(), None).await.unwrap();

        let results = store
            .search_hybrid("content", &[], 10, &HybridFilters::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn related_chunks_share_topics() {
        let store = InMemoryGraphStore::new();
        let a = sample_chunk(0, &["security", "onboarding"]);
        let b = sample_chunk(1, &["security"]);
        let c = sample_chunk(2, &["unrelated"]);
        store.upsert_chunk(a.clone(), Utc::now(), None).await.unwrap();
        store.upsert_chunk(b.clone(), Utc::now(), None).await.unwrap();
        store.upsert_chunk(c, Utc::now(), None).await.unwrap();

        let related = store.related_chunks(&a.chunk_id, 10).await.unwrap();
        assert_eq!(related[0].0, b.chunk_id);
    }

    #[tokio::test]
    async fn quality_score_clamps_on_write() {
        let store = InMemoryGraphStore::new();
        let chunk = sample_chunk(0, &[]);
        store.upsert_chunk(chunk.clone(), Utc::now(), None).await.unwrap();

        store.update_quality_score(&chunk.chunk_id, 150.0, false).await.unwrap();
        let fetched = store.get_chunk_by_id(&chunk.chunk_id).await.unwrap().unwrap();
        assert_eq!(fetched.quality_score, 100.0);

        store.update_quality_score(&chunk.chunk_id, -30.0, false).await.unwrap();
        let fetched = store.get_chunk_by_id(&chunk.chunk_id).await.unwrap().unwrap();
        assert_eq!(fetched.quality_score, 0.0);
    }

    #[tokio::test]
    async fn feedback_is_idempotent_per_message_ts() {
        let store = InMemoryAnalyticsStore::new();
        let record = FeedbackRecord {
            chunk_id: "page-1_0".into(),
            user_id: "u1".into(),
            feedback_type: crate::domain::FeedbackType::Helpful,
            comment: None,
            suggested_correction: None,
            evidence: None,
            query_context: None,
            thread_ref: "t1".into(),
            created_at: Utc::now(),
        };
        let first = store.record_feedback(record.clone(), "ts-1").await.unwrap();
        let second = store.record_feedback(record, "ts-1").await.unwrap();
        assert!(first);
        assert!(!second);
    }
}
