//! C3: bring the Chunk Store into sync with the `WikiSource`. Page fetch is
//! serialized per space; embed+upsert fan out over a bounded worker pool
//! behind a circuit breaker, matching the teacher's `runtimes::execution`
//! bounded-concurrency-over-a-channel shape but scoped to this pipeline.

mod breaker;

pub use breaker::CircuitBreaker;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use governor::{Quota, RateLimiter};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::chunker;
use crate::config::ServiceConfig;
use crate::domain::{Chunk, GovernanceInfo, IndexingCheckpoint};
use crate::error::IngestionError;
use crate::ports::{AnalyticsStore, Embedder, GraphStore, SpacePage, WikiSource};

/// Tallies produced by a `sync_spaces` run, per §4.2.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyncCounters {
    pub new: u32,
    pub updated: u32,
    pub skipped: u32,
    pub errors: u32,
}

/// Parses the `owner:`/`reviewed_by:`/`reviewed_at:`/`classification:`/
/// `doc_type:` label conventions (§6) into a `GovernanceInfo`.
pub fn governance_from_labels(labels: &[String]) -> GovernanceInfo {
    let mut info = GovernanceInfo::default();
    for label in labels {
        if let Some(rest) = label.strip_prefix("owner:") {
            info.owner = Some(rest.to_string());
        } else if let Some(rest) = label.strip_prefix("reviewed_by:") {
            info.reviewed_by = Some(rest.to_string());
        } else if let Some(rest) = label.strip_prefix("reviewed_at:") {
            info.reviewed_at = chrono::DateTime::parse_from_rfc3339(rest).ok().map(|d| d.with_timezone(&Utc));
        } else if let Some(rest) = label.strip_prefix("classification:") {
            info.classification = match rest {
                "public" => Some(crate::domain::Classification::Public),
                "confidential" => Some(crate::domain::Classification::Confidential),
                _ => Some(crate::domain::Classification::Internal),
            };
        } else if let Some(rest) = label.strip_prefix("doc_type:") {
            info.doc_type = Some(rest.to_string());
        }
    }
    info
}

/// Drives ingestion for a single process. Holds the provider ports it needs
/// and the process-local rate limiter / breaker / concurrency gate.
pub struct IngestionPipeline {
    wiki: Arc<dyn WikiSource>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn GraphStore>,
    config: ServiceConfig,
    limiter: RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>,
    semaphore: Semaphore,
    breaker: CircuitBreaker,
}

impl IngestionPipeline {
    pub fn new(
        wiki: Arc<dyn WikiSource>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn GraphStore>,
        config: ServiceConfig,
    ) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(config.wiki_reqs_per_sec).unwrap());
        let concurrency = config.graphiti_concurrency;
        let breaker = CircuitBreaker::new(config.breaker_threshold, Duration::from_secs(config.cooldown_seconds));
        Self {
            wiki,
            embedder,
            store,
            config,
            limiter: RateLimiter::direct(quota),
            semaphore: Semaphore::new(concurrency),
            breaker,
        }
    }

    /// §4.2 `sync_spaces`. `session_id` scopes checkpoint lookups for resume.
    #[instrument(skip(self, analytics), fields(spaces = ?spaces))]
    pub async fn sync_spaces(
        &self,
        spaces: &[String],
        force_full: bool,
        resume: bool,
        session_id: &str,
        analytics: &dyn AnalyticsStore,
    ) -> SyncCounters {
        let mut counters = SyncCounters::default();
        for space in spaces {
            self.sync_one_space(space, force_full, resume, session_id, analytics, &mut counters)
                .await;
        }
        counters
    }

    async fn sync_one_space(
        &self,
        space: &str,
        force_full: bool,
        resume: bool,
        session_id: &str,
        analytics: &dyn AnalyticsStore,
        counters: &mut SyncCounters,
    ) {
        self.limiter.until_ready().await;
        let pages = match self.wiki.list_pages(space).await {
            Ok(pages) => pages,
            Err(err) => {
                warn!(%space, error = %err, "failed to list pages for space");
                counters.errors += 1;
                return;
            }
        };

        for page in &pages {
            self.sync_one_page(page, force_full, resume, session_id, analytics, counters)
                .await;
        }
    }

    async fn sync_one_page(
        &self,
        page: &SpacePage,
        force_full: bool,
        resume: bool,
        session_id: &str,
        analytics: &dyn AnalyticsStore,
        counters: &mut SyncCounters,
    ) {
        let _ = force_full; // full Page-row diffing lives outside this pipeline's scope (§1)
        if page.status == "trashed" {
            counters.skipped += 1;
            return;
        }

        self.limiter.until_ready().await;
        let body = match self.wiki.get_page(&page.id).await {
            Ok(body) => body,
            Err(err) => {
                warn!(page_id = %page.id, error = %err, "permanent failure fetching page, skipping");
                counters.errors += 1;
                return;
            }
        };

        let governance = governance_from_labels(&body.labels);
        let chunks = chunker::chunk_page(&body.storage_html, &body.id, &body.title, &self.config);

        for data in chunks {
            if resume {
                if let Ok(Some(checkpoint)) = analytics.get_checkpoint(&data.chunk_id, session_id).await {
                    if checkpoint.status == crate::domain::IndexingStatus::Indexed {
                        counters.skipped += 1;
                        continue;
                    }
                }
            }

            let _permit = self.semaphore.acquire().await.expect("semaphore not closed");
            let pending = IndexingCheckpoint::pending(data.chunk_id.as_str(), session_id);
            let _ = analytics.upsert_checkpoint(pending).await;

            match self.upsert_one(&data, &governance, &body).await {
                Ok(()) => {
                    let mut checkpoint = IndexingCheckpoint::pending(data.chunk_id.as_str(), session_id);
                    checkpoint.mark_indexed();
                    let _ = analytics.upsert_checkpoint(checkpoint).await;
                    counters.new += 1;
                }
                Err(err) => {
                    warn!(chunk_id = %data.chunk_id, error = %err, "chunk upsert failed");
                    let mut checkpoint = IndexingCheckpoint::pending(data.chunk_id.as_str(), session_id);
                    checkpoint.mark_failed(err.to_string());
                    let _ = analytics.upsert_checkpoint(checkpoint).await;
                    counters.errors += 1;
                }
            }
        }
        info!(page_id = %page.id, "page ingested");
    }

    async fn upsert_one(
        &self,
        data: &crate::domain::ChunkData,
        governance: &GovernanceInfo,
        body: &crate::ports::PageBody,
    ) -> Result<(), IngestionError> {
        if !self.breaker.allow() {
            return Err(IngestionError::BreakerOpen { operation: "graph_upsert" });
        }

        let embedding = match self.embedder.embed_single(&data.content).await {
            Ok(v) => v,
            Err(e) => {
                self.breaker.record_failure();
                return Err(IngestionError::Embedder(e.to_string()));
            }
        };

        let chunk = Chunk::from_ingest(
            data.clone(),
            body.space_key.clone(),
            body.webui_link.clone(),
            body.author.clone(),
            body.author_name.clone(),
            body.created_at,
            body.updated_at,
            governance.clone(),
            Utc::now(),
        );

        match self.store.upsert_chunk(chunk, body.updated_at, Some(embedding)).await {
            Ok(()) => {
                self.breaker.record_success();
                Ok(())
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(IngestionError::Store(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn governance_labels_parse_known_keys() {
        let labels = vec![
            "owner:alice@example.com".to_string(),
            "classification:confidential".to_string(),
            "doc_type:policy".to_string(),
        ];
        let info = governance_from_labels(&labels);
        assert_eq!(info.owner.as_deref(), Some("alice@example.com"));
        assert_eq!(info.classification, Some(crate::domain::Classification::Confidential));
        assert_eq!(info.doc_type.as_deref(), Some("policy"));
    }

    #[test]
    fn unknown_labels_are_ignored() {
        let labels = vec!["random-tag".to_string()];
        let info = governance_from_labels(&labels);
        assert!(info.owner.is_none());
    }

    struct FixedPageSource {
        page: crate::ports::SpacePage,
        body: crate::ports::PageBody,
    }

    #[async_trait::async_trait]
    impl crate::ports::WikiSource for FixedPageSource {
        async fn list_pages(&self, _: &str) -> Result<Vec<crate::ports::SpacePage>, crate::error::WikiSourceError> {
            Ok(vec![self.page.clone()])
        }
        async fn get_page(&self, _: &str) -> Result<crate::ports::PageBody, crate::error::WikiSourceError> {
            Ok(self.body.clone())
        }
    }

    struct FixedEmbedder;

    #[async_trait::async_trait]
    impl crate::ports::Embedder for FixedEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, crate::error::RetrieverError> {
            Ok(texts.iter().map(|_| vec![0.1_f32; 4]).collect())
        }
        fn dimension(&self) -> usize {
            4
        }
        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// §8 scenario 5: of 1000 chunks on a page, 600 are pre-marked `indexed`
    /// and 400 `failed` in the checkpoint table. `resume=true` attempts only
    /// the 400; final counts are `skipped=600`, `new=400`.
    #[tokio::test]
    async fn resume_attempts_only_non_indexed_chunks() {
        use crate::domain::IndexingCheckpoint;
        use crate::stores::{InMemoryAnalyticsStore, InMemoryGraphStore};

        const TOTAL: usize = 1000;
        const ALREADY_INDEXED: usize = 600;

        let mut html = String::new();
        for i in 0..TOTAL {
            html.push_str(&format!("<pre><code>chunk body number {i}</code></pre>"));
        }

        let page = crate::ports::SpacePage {
            id: "page-1".to_string(),
            title: "Big Page".to_string(),
            status: "current".to_string(),
            version_number: 1,
            version_created_at: Utc::now(),
            parent_id: None,
            webui_link: "https://wiki/page-1".to_string(),
        };
        let body = crate::ports::PageBody {
            id: "page-1".to_string(),
            title: "Big Page".to_string(),
            space_key: "SPACE".to_string(),
            storage_html: html,
            labels: vec![],
            attachments: vec![],
            author: "a".to_string(),
            author_name: "A".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            webui_link: "https://wiki/page-1".to_string(),
        };

        let wiki: Arc<dyn WikiSource> = Arc::new(FixedPageSource { page, body });
        let embedder: Arc<dyn Embedder> = Arc::new(FixedEmbedder);
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let analytics = InMemoryAnalyticsStore::new();

        let session_id = "resume-session";
        for i in 0..ALREADY_INDEXED {
            let mut checkpoint = IndexingCheckpoint::pending(format!("page-1_{i}"), session_id);
            checkpoint.mark_indexed();
            analytics.upsert_checkpoint(checkpoint).await.unwrap();
        }
        for i in ALREADY_INDEXED..TOTAL {
            let mut checkpoint = IndexingCheckpoint::pending(format!("page-1_{i}"), session_id);
            checkpoint.mark_failed("embedding timeout".to_string());
            analytics.upsert_checkpoint(checkpoint).await.unwrap();
        }
        assert_eq!(analytics.indexed_chunk_ids(session_id).await.unwrap().len(), ALREADY_INDEXED);

        let pipeline = IngestionPipeline::new(wiki, embedder, store, ServiceConfig::default());
        let counters = pipeline
            .sync_spaces(&["SPACE".to_string()], false, true, session_id, &analytics)
            .await;

        assert_eq!(counters.skipped, ALREADY_INDEXED as u32);
        assert_eq!(counters.new, (TOTAL - ALREADY_INDEXED) as u32);
        assert_eq!(counters.errors, 0);
    }
}
