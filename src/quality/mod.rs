//! C6: composite quality scoring, feedback/signal write paths, and the
//! scheduled recompute job (§4.5).

mod signal;

pub use signal::{classify_reaction, classify_text, SignalClassification};

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::instrument;

use crate::domain::{BehavioralSignal, Chunk, FeedbackRecord};
use crate::error::QualityError;
use crate::ports::{AnalyticsStore, GraphStore};

const FEEDBACK_WEIGHT: f64 = 0.35;
const BEHAVIOR_WEIGHT: f64 = 0.25;
const RELEVANCE_WEIGHT: f64 = 0.25;
const FRESHNESS_WEIGHT: f64 = 0.15;

/// Laplace-smoothed helpful-ratio over `(helpful)` vs
/// `(outdated, incorrect, confusing)`, smoothed toward 0.5 under 5 items.
fn feedback_component(helpful: u32, negative: u32) -> f64 {
    let total = helpful + negative;
    if total < 5 {
        let observed = (helpful as f64 + 1.0) / (total as f64 + 2.0);
        0.5 + (observed - 0.5) * (total as f64 / 5.0)
    } else {
        (helpful as f64 + 1.0) / (total as f64 + 2.0)
    }
}

/// Mean of recent signal values (each in [-1,1]) mapped into [0,1], smoothed
/// toward 0.5 under 3 signals.
fn behavior_component(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.5;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let mapped = (mean + 1.0) / 2.0;
    if values.len() < 3 {
        0.5 + (mapped - 0.5) * (values.len() as f64 / 3.0)
    } else {
        mapped
    }
}

/// Logarithmic saturation of access counts toward 1.0.
fn relevance_component(access_30d: u64, access_lifetime: u64) -> f64 {
    let recent = (access_30d as f64 + 1.0).ln() / (50.0_f64 + 1.0).ln();
    let lifetime = (access_lifetime as f64 + 1.0).ln() / (500.0_f64 + 1.0).ln();
    (0.6 * recent + 0.4 * lifetime).min(1.0)
}

/// Step function of source `updated_at` age, per §4.5.
fn freshness_component(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = (now - updated_at).num_days();
    match age_days {
        d if d < 30 => 1.0,
        d if d < 90 => 0.9,
        d if d < 180 => 0.75,
        d if d < 365 => 0.6,
        d if d < 730 => 0.4,
        _ => 0.2,
    }
}

/// Additive decay applied per recompute invocation, §4.5.
fn access_tier_modifier(access_30d: u64) -> f64 {
    match access_30d {
        50.. => 0.25,
        20..=49 => 0.5,
        5..=19 => 0.75,
        1..=4 => 1.0,
        _ => 1.5,
    }
}

pub struct QualityEngine {
    store: Arc<dyn GraphStore>,
    analytics: Arc<dyn AnalyticsStore>,
}

impl QualityEngine {
    pub fn new(store: Arc<dyn GraphStore>, analytics: Arc<dyn AnalyticsStore>) -> Self {
        Self { store, analytics }
    }

    /// Explicit feedback write path: immediate delta, clamped, counter bump.
    /// Idempotent via `AnalyticsStore::record_feedback`'s dedup key.
    #[instrument(skip(self, record))]
    pub async fn apply_feedback(&self, record: FeedbackRecord, message_ts: &str) -> Result<(), QualityError> {
        let chunk_id = record.chunk_id.clone();
        let delta = record.feedback_type.immediate_delta();
        let is_new = self.analytics.record_feedback(record, message_ts).await?;
        if !is_new {
            return Ok(());
        }
        if let Some(chunk) = self.store.get_chunk_by_id(&chunk_id).await? {
            let new_score = (chunk.quality_score + delta).clamp(0.0, 100.0);
            self.store.update_quality_score(&chunk_id, new_score, true).await?;
        }
        Ok(())
    }

    /// Behavioral signal write path: record only, no immediate mutation.
    pub async fn record_signal(&self, signal: BehavioralSignal) -> Result<(), QualityError> {
        self.analytics.record_signal(signal).await
    }

    /// §4.5 `RecomputeAll`: walk every chunk, recompute the composite,
    /// persist via `UpdateQualityScore`.
    #[instrument(skip(self))]
    pub async fn recompute_all(&self) -> Result<u64, QualityError> {
        let now = Utc::now();
        let mut updated = 0u64;
        let chunks: Vec<Chunk> = self.store.bulk_list(usize::MAX, None).await?;

        for chunk in chunks {
            let since_90d = now - ChronoDuration::days(90);
            let counts = self.analytics.feedback_counts_since(&chunk.chunk_id, since_90d).await?;
            let signal_values = self.analytics.recent_signal_values(&chunk.chunk_id, since_90d).await?;

            let feedback = feedback_component(counts.helpful, counts.negative());
            let behavior = behavior_component(&signal_values);
            // The store only tracks lifetime access_count; the 30-day tier
            // uses the same figure as a conservative proxy.
            let relevance = relevance_component(chunk.access_count, chunk.access_count);
            let freshness = freshness_component(chunk.updated_at, now);

            let composite = FEEDBACK_WEIGHT * feedback
                + BEHAVIOR_WEIGHT * behavior
                + RELEVANCE_WEIGHT * relevance
                + FRESHNESS_WEIGHT * freshness;

            let decay = (2.0 / 30.0) * access_tier_modifier(chunk.access_count);
            let new_score = (composite * 100.0 - decay).clamp(0.0, 100.0);

            self.store.update_quality_score(&chunk.chunk_id, new_score, false).await?;
            updated += 1;
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_component_smooths_toward_half_under_five_items() {
        let score = feedback_component(1, 0);
        assert!(score > 0.5 && score < 1.0);
    }

    #[test]
    fn freshness_buckets_match_spec() {
        let now = Utc::now();
        assert_eq!(freshness_component(now - ChronoDuration::days(10), now), 1.0);
        assert_eq!(freshness_component(now - ChronoDuration::days(800), now), 0.2);
    }

    #[test]
    fn access_tier_modifier_matches_spec_buckets() {
        assert_eq!(access_tier_modifier(60), 0.25);
        assert_eq!(access_tier_modifier(0), 1.5);
    }

    #[tokio::test]
    async fn three_incorrect_feedback_drains_a_fresh_chunk_to_exactly_25() {
        use crate::domain::{ChunkData, ChunkType, FeedbackType, GovernanceInfo};
        use crate::stores::{InMemoryAnalyticsStore, InMemoryGraphStore};

        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let analytics: Arc<dyn crate::ports::AnalyticsStore> = Arc::new(InMemoryAnalyticsStore::new());
        let engine = QualityEngine::new(store.clone(), analytics);

        let data = ChunkData::new("page-1", 0, "Title", "some content", ChunkType::Text, vec![]);
        let now = Utc::now();
        let chunk = Chunk::from_ingest(data, "SPACE", "https://wiki/page-1", "a@co", "A", now, now, GovernanceInfo::default(), now);
        store.upsert_chunk(chunk.clone(), now, None).await.unwrap();
        assert_eq!(chunk.quality_score, 100.0);

        for i in 0..3 {
            let record = FeedbackRecord {
                chunk_id: chunk.chunk_id.clone(),
                user_id: format!("user-{i}"),
                feedback_type: FeedbackType::Incorrect,
                comment: None,
                suggested_correction: None,
                evidence: None,
                query_context: None,
                thread_ref: "thread-1".to_string(),
                created_at: Utc::now(),
            };
            engine.apply_feedback(record, &format!("ts-{i}")).await.unwrap();
        }

        let updated = store.get_chunk_by_id(&chunk.chunk_id).await.unwrap().unwrap();
        assert_eq!(updated.quality_score, 25.0);
        assert_eq!(updated.feedback_count, 3);
    }
}
