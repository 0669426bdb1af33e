use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Explicit, append-only feedback on a chunk, owned exclusively by the
/// AnalyticsStore.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub chunk_id: String,
    pub user_id: String,
    pub feedback_type: FeedbackType,
    pub comment: Option<String>,
    pub suggested_correction: Option<String>,
    pub evidence: Option<String>,
    pub query_context: Option<String>,
    pub thread_ref: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Helpful,
    Outdated,
    Incorrect,
    Confusing,
}

impl FeedbackType {
    /// Immediate score delta applied on explicit feedback, per §4.5.
    pub fn immediate_delta(self) -> f64 {
        match self {
            FeedbackType::Helpful => 5.0,
            FeedbackType::Outdated => -20.0,
            FeedbackType::Incorrect => -25.0,
            FeedbackType::Confusing => -10.0,
        }
    }

    pub fn is_negative(self) -> bool {
        !matches!(self, FeedbackType::Helpful)
    }
}

/// Implicit feedback inferred from chat activity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BehavioralSignal {
    pub response_ref: String,
    pub thread_ref: String,
    pub chunk_ids: Vec<String>,
    pub user_id: String,
    pub signal_type: SignalType,
    pub signal_value: f64,
    pub raw_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    FollowUp,
    Thanks,
    Frustration,
    PositiveReaction,
    NegativeReaction,
    SatisfiedSilence,
    Rephrasing,
}

/// Materialization of an emitted answer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BotResponse {
    pub response_ts: String,
    pub thread_ts: String,
    pub channel_id: String,
    pub user_id: String,
    pub query: String,
    pub response_text: String,
    pub chunk_ids: Vec<String>,
    pub has_follow_up: bool,
}
