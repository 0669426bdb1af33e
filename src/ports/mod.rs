//! Minimal provider ports (C1). Each is a small `async_trait`, the same
//! shape as the teacher's `Backend`/`Node` traits: a handful of required
//! methods, `Send + Sync` for use behind `Arc<dyn _>`, concrete
//! implementations resolved at startup by the provider registry (§9).

mod analytics_store;
mod chat_surface;
mod embedder;
mod graph_store;
mod llm;
mod reranker;
mod wiki_source;

pub use analytics_store::{AnalyticsStore, FeedbackCounts};
pub use chat_surface::{ChatSurface, FeedbackButtonRow, OwnerLookup};
pub use embedder::Embedder;
pub use graph_store::{GraphStore, HybridFilters};
pub use llm::LLM;
pub use reranker::Reranker;
pub use wiki_source::{PageBody, PageSummary, SpacePage, WikiSource};
