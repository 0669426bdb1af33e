use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structural kind of a chunk, assigned by the chunker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Text,
    Code,
    Table,
    List,
}

/// Governance classification. Defaults to `Internal` when unset on source
/// labels, per the Chunk invariant that classification is always set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Public,
    Internal,
    Confidential,
}

impl Default for Classification {
    fn default() -> Self {
        Classification::Internal
    }
}

/// Output of the chunker: a structural fragment of a page, not yet enriched
/// with governance or quality defaults. `Chunk` wraps this with the rest of
/// the data model once the ingestion pipeline derives governance metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkData {
    pub chunk_id: String,
    pub page_id: String,
    pub chunk_index: usize,
    pub page_title: String,
    pub content: String,
    pub chunk_type: ChunkType,
    pub parent_headers: Vec<String>,
    pub char_count: usize,
}

impl ChunkData {
    pub fn new(
        page_id: impl Into<String>,
        chunk_index: usize,
        page_title: impl Into<String>,
        content: impl Into<String>,
        chunk_type: ChunkType,
        parent_headers: Vec<String>,
    ) -> Self {
        let page_id = page_id.into();
        let content = content.into();
        let char_count = content.chars().count();
        let chunk_id = format!("{page_id}_{chunk_index}");
        Self {
            chunk_id,
            page_id,
            chunk_index,
            page_title: page_title.into(),
            content,
            chunk_type,
            parent_headers,
            char_count,
        }
    }
}

/// Governance metadata derived from wiki page labels (`owner:`, `reviewed_by:`,
/// `reviewed_at:`, `classification:`, `doc_type:`). Missing fields fall back
/// to the documented defaults when merged into a `Chunk`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GovernanceInfo {
    pub owner: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub classification: Option<Classification>,
    pub doc_type: Option<String>,
}

/// The central retrieval entity. See `spec.md` §3 for the full field
/// rationale and invariants enforced by the `GraphStore` port.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    // Identity
    pub chunk_id: String,
    pub page_id: String,
    pub chunk_index: usize,
    pub page_title: String,

    // Content
    pub content: String,
    pub chunk_type: ChunkType,
    pub parent_headers: Vec<String>,
    pub char_count: usize,

    // Source
    pub space_key: String,
    pub url: String,
    pub author: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Governance
    pub owner: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub classification: Classification,
    pub doc_type: String,

    // Semantic
    pub topics: BTreeSet<String>,
    pub audience: Option<String>,
    pub complexity: Option<String>,
    pub summary: String,

    // Quality
    pub quality_score: f64,
    pub access_count: u64,
    pub feedback_count: u64,

    // Temporal envelope (bi-temporal)
    pub event_time: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,

    // Lifecycle
    pub status: ChunkStatus,
    pub deprecated_at: Option<DateTime<Utc>>,
    pub cold_archived_at: Option<DateTime<Utc>>,
}

/// Four-state chunk lifecycle (§4.6), distinct from `Page::status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Active,
    Deprecated,
    ColdStorage,
    HardArchived,
}

impl Chunk {
    /// Build a freshly-ingested chunk with quality defaults
    /// (`quality_score=100`, counters at zero) per §4.2.
    pub fn from_ingest(
        data: ChunkData,
        space_key: impl Into<String>,
        url: impl Into<String>,
        author: impl Into<String>,
        author_name: impl Into<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        governance: GovernanceInfo,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            chunk_id: data.chunk_id,
            page_id: data.page_id,
            chunk_index: data.chunk_index,
            page_title: data.page_title,
            content: data.content,
            chunk_type: data.chunk_type,
            parent_headers: data.parent_headers,
            char_count: data.char_count,
            space_key: space_key.into(),
            url: url.into(),
            author: author.into(),
            author_name: author_name.into(),
            created_at,
            updated_at,
            owner: governance.owner.unwrap_or_default(),
            reviewed_by: governance.reviewed_by,
            reviewed_at: governance.reviewed_at,
            classification: governance.classification.unwrap_or_default(),
            doc_type: governance.doc_type.unwrap_or_default(),
            topics: BTreeSet::new(),
            audience: None,
            complexity: None,
            summary: String::new(),
            quality_score: 100.0,
            access_count: 0,
            feedback_count: 0,
            event_time: updated_at,
            ingested_at: now,
            deleted_at: None,
            status: ChunkStatus::Active,
            deprecated_at: None,
            cold_archived_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Clamp and assign `quality_score`, matching the store-level invariant
    /// that the field is always in [0, 100] after any mutation path.
    pub fn set_quality_score(&mut self, score: f64) {
        self.quality_score = score.clamp(0.0, 100.0);
    }
}
