use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sync-tracking record. Used to compute incremental sync deltas; not the
/// source of truth for retrieval (the `Chunk` is).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page {
    pub page_id: String,
    pub space_key: String,
    pub title: String,
    pub file_path: Option<String>,
    pub version_number: u64,
    pub status: PageStatus,
    pub updated_at: DateTime<Utc>,
    pub downloaded_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Active,
    Draft,
    Deleted,
}

/// `(chunk_id, session_id)` → ingestion progress. Enables resumable sync.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexingCheckpoint {
    pub chunk_id: String,
    pub session_id: String,
    pub status: IndexingStatus,
    pub retry_count: u32,
    pub error: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingStatus {
    Pending,
    Indexed,
    Failed,
}

impl IndexingCheckpoint {
    pub fn pending(chunk_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            session_id: session_id.into(),
            status: IndexingStatus::Pending,
            retry_count: 0,
            error: None,
        }
    }

    pub fn mark_indexed(&mut self) {
        self.status = IndexingStatus::Indexed;
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = IndexingStatus::Failed;
        self.error = Some(error.into());
        self.retry_count += 1;
    }
}
