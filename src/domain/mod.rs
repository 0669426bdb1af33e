//! Core entities shared across every component: the chunk that retrieval is
//! built on, the page-sync bookkeeping record, the analytics-owned feedback
//! trail, and the lifecycle workflow records.

mod chunk;
mod conflict;
mod feedback;
mod page;

pub use chunk::{Chunk, ChunkData, ChunkStatus, ChunkType, Classification, GovernanceInfo};
pub use conflict::{ConflictResolution, ConflictStatus, ConflictType, ContentConflict};
pub use feedback::{BehavioralSignal, BotResponse, FeedbackRecord, FeedbackType, SignalType};
pub use page::{IndexingCheckpoint, IndexingStatus, Page, PageStatus};
