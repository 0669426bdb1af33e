use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{BehavioralSignal, BotResponse, FeedbackRecord, IndexingCheckpoint};
use crate::error::QualityError;

/// Small relational store for analytics: append-only feedback/behavioral
/// signal history, bot-response materialization, and the indexing
/// checkpoint table. Out of scope for a concrete implementation (§1); this
/// crate ships an in-memory reference implementation for tests
/// (`crate::stores::memory::InMemoryAnalyticsStore`).
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Idempotent per `(chunk_id, user_id, feedback_type, message_ts)` —
    /// the same click replayed must not double-count.
    async fn record_feedback(&self, record: FeedbackRecord, message_ts: &str) -> Result<bool, QualityError>;

    async fn record_signal(&self, signal: BehavioralSignal) -> Result<(), QualityError>;

    /// `response_ts` is the unique key.
    async fn record_bot_response(&self, response: BotResponse) -> Result<(), QualityError>;

    async fn get_bot_response(&self, response_ts: &str) -> Result<Option<BotResponse>, QualityError>;

    async fn set_has_follow_up(&self, response_ts: &str) -> Result<(), QualityError>;

    /// Feedback counts by type within `since..now`, used by the composite
    /// recompute's feedback term.
    async fn feedback_counts_since(
        &self,
        chunk_id: &str,
        since: DateTime<Utc>,
    ) -> Result<FeedbackCounts, QualityError>;

    /// Recent behavioral signal values for the behavior term.
    async fn recent_signal_values(&self, chunk_id: &str, since: DateTime<Utc>) -> Result<Vec<f64>, QualityError>;

    /// Negative feedback count for a chunk within a rolling window, used by
    /// auto-escalation.
    async fn negative_feedback_count_since(
        &self,
        chunk_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, QualityError>;

    async fn upsert_checkpoint(&self, checkpoint: IndexingCheckpoint) -> Result<(), QualityError>;

    async fn get_checkpoint(&self, chunk_id: &str, session_id: &str) -> Result<Option<IndexingCheckpoint>, QualityError>;

    /// All chunk ids already `indexed` for a session (for resume).
    async fn indexed_chunk_ids(&self, session_id: &str) -> Result<Vec<String>, QualityError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FeedbackCounts {
    pub helpful: u32,
    pub outdated: u32,
    pub incorrect: u32,
    pub confusing: u32,
}

impl FeedbackCounts {
    pub fn total(&self) -> u32 {
        self.helpful + self.outdated + self.incorrect + self.confusing
    }

    pub fn negative(&self) -> u32 {
        self.outdated + self.incorrect + self.confusing
    }
}
