use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A detected contradiction or near-duplicate between two chunks from
/// different pages.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentConflict {
    pub id: Uuid,
    pub chunk_a_id: String,
    pub chunk_b_id: String,
    pub conflict_type: ConflictType,
    pub status: ConflictStatus,
    pub resolution: Option<ConflictResolution>,
    pub similarity_score: f64,
    pub confidence_score: Option<f64>,
    pub ai_explanation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    Contradiction,
    OutdatedDuplicate,
    Ambiguous,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Open,
    Resolved,
    Dismissed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    KeepA,
    KeepB,
    Merge,
    ArchiveBoth,
}

impl ContentConflict {
    pub fn new(
        chunk_a_id: impl Into<String>,
        chunk_b_id: impl Into<String>,
        conflict_type: ConflictType,
        similarity_score: f64,
        confidence_score: Option<f64>,
        ai_explanation: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            chunk_a_id: chunk_a_id.into(),
            chunk_b_id: chunk_b_id.into(),
            conflict_type,
            status: ConflictStatus::Open,
            resolution: None,
            similarity_score,
            confidence_score,
            ai_explanation,
            created_at: now,
            resolved_at: None,
        }
    }

    /// Symmetric identity check used to suppress duplicate conflict rows:
    /// `(a, b)` and `(b, a)` refer to the same unordered pair.
    pub fn matches_pair(&self, a: &str, b: &str) -> bool {
        (self.chunk_a_id == a && self.chunk_b_id == b)
            || (self.chunk_a_id == b && self.chunk_b_id == a)
    }
}
