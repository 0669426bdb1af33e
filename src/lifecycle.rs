//! C7: scheduled archival state machine plus conflict detection/resolution
//! (§4.6). Conflict rows are workflow state the spec does not assign to
//! either `GraphStore` or `AnalyticsStore`; this manager owns them directly
//! in a process-local table, the same pattern the teacher uses for small
//! in-memory bookkeeping structures guarded by a single lock.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::domain::{ChunkStatus, ConflictResolution, ConflictType, ContentConflict};
use crate::error::LifecycleError;
use crate::ports::GraphStore;

/// Outcome tallies for one `RunArchivalPipeline` invocation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchivalCounters {
    pub cold_archived: u32,
    pub deprecated: u32,
    pub restored: u32,
    pub hard_archived: u32,
}

pub struct LifecycleManager {
    store: Arc<dyn GraphStore>,
    archive_root: PathBuf,
    score_threshold_deprecated: f64,
    score_threshold_archive: f64,
    cold_archive_days: i64,
    conflict_similarity_threshold: f64,
    conflict_confidence_threshold: f64,
    conflicts: RwLock<Vec<ContentConflict>>,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn GraphStore>,
        archive_root: PathBuf,
        score_threshold_deprecated: f64,
        score_threshold_archive: f64,
        cold_archive_days: i64,
        conflict_similarity_threshold: f64,
        conflict_confidence_threshold: f64,
    ) -> Self {
        Self {
            store,
            archive_root,
            score_threshold_deprecated,
            score_threshold_archive,
            cold_archive_days,
            conflict_similarity_threshold,
            conflict_confidence_threshold,
            conflicts: RwLock::new(Vec::new()),
        }
    }

    /// §4.6 scheduled job: decay-driven transitions plus hard-archival.
    #[instrument(skip(self))]
    pub async fn run_archival_pipeline(&self) -> Result<ArchivalCounters, LifecycleError> {
        let mut counters = ArchivalCounters::default();
        let chunks = self.store.bulk_list(usize::MAX, None).await?;
        let now = Utc::now();

        for chunk in &chunks {
            match chunk.status {
                ChunkStatus::Active | ChunkStatus::Deprecated => {
                    if chunk.quality_score < self.score_threshold_archive {
                        self.cold_archive(&chunk.chunk_id, now).await?;
                        counters.cold_archived += 1;
                    } else if chunk.quality_score < self.score_threshold_deprecated
                        && chunk.status == ChunkStatus::Active
                    {
                        self.deprecate(&chunk.chunk_id).await?;
                        counters.deprecated += 1;
                    } else if chunk.quality_score >= 70.0 && chunk.status == ChunkStatus::Deprecated {
                        self.restore(&chunk.chunk_id).await?;
                        counters.restored += 1;
                    }
                }
                ChunkStatus::ColdStorage => {
                    let archived_at = chunk.cold_archived_at.unwrap_or(now);
                    if (now - archived_at).num_days() >= self.cold_archive_days {
                        self.hard_archive(chunk).await?;
                        counters.hard_archived += 1;
                    }
                }
                ChunkStatus::HardArchived => {}
            }
        }
        Ok(counters)
    }

    async fn cold_archive(&self, chunk_id: &str, now: chrono::DateTime<Utc>) -> Result<(), LifecycleError> {
        let patch = serde_json::json!({ "status": "cold_storage", "cold_archived_at": now });
        self.store.update_metadata(chunk_id, patch).await?;
        Ok(())
    }

    async fn deprecate(&self, chunk_id: &str) -> Result<(), LifecycleError> {
        let patch = serde_json::json!({ "status": "deprecated", "deprecated_at": Utc::now() });
        self.store.update_metadata(chunk_id, patch).await?;
        Ok(())
    }

    async fn restore(&self, chunk_id: &str) -> Result<(), LifecycleError> {
        let patch = serde_json::json!({ "status": "active", "deprecated_at": serde_json::Value::Null });
        self.store.update_metadata(chunk_id, patch).await?;
        Ok(())
    }

    /// Emit a complete JSON record to `archive_root/YYYY/MM/<chunk_id>.json`
    /// then mark the chunk hard-archived with a tombstone body.
    async fn hard_archive(&self, chunk: &crate::domain::Chunk) -> Result<(), LifecycleError> {
        let now = Utc::now();
        let dir = self.archive_root.join(format!("{:04}", now.format("%Y"))).join(format!("{:02}", now.format("%m")));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| LifecycleError::ArchiveExport {
                chunk_id: chunk.chunk_id.clone(),
                source,
            })?;
        let path = dir.join(format!("{}.json", chunk.chunk_id));
        let record = serde_json::to_vec_pretty(chunk).map_err(|e| LifecycleError::ArchiveExport {
            chunk_id: chunk.chunk_id.clone(),
            source: std::io::Error::other(e),
        })?;
        tokio::fs::write(&path, record)
            .await
            .map_err(|source| LifecycleError::ArchiveExport {
                chunk_id: chunk.chunk_id.clone(),
                source,
            })?;

        let patch = serde_json::json!({
            "status": "hard_archived",
            "content": "[archived]",
            "deleted_at": now,
        });
        self.store.update_metadata(&chunk.chunk_id, patch).await?;
        info!(chunk_id = %chunk.chunk_id, path = %path.display(), "hard-archived chunk");
        Ok(())
    }

    /// §4.6 conflict detection for one chunk against a set of similarity
    /// candidates `(chunk_id, similarity_score)`. `llm_verdict` is an
    /// optional `(is_contradiction, confidence)` pair per candidate, indexed
    /// in parallel with `candidates`.
    #[instrument(skip(self, candidates, llm_verdicts))]
    pub async fn detect_conflicts_for_chunk(
        &self,
        chunk_id: &str,
        chunk_page_id: &str,
        candidates: &[(String, String, f64)], // (candidate_chunk_id, candidate_page_id, similarity)
        llm_verdicts: &[Option<(bool, f64)>],
    ) -> Vec<ContentConflict> {
        let mut created = Vec::new();
        let now = Utc::now();

        for (i, (candidate_id, candidate_page_id, similarity)) in candidates.iter().enumerate() {
            if *similarity < self.conflict_similarity_threshold || candidate_page_id == chunk_page_id {
                continue;
            }

            let mut conflicts = self.conflicts.write().await;
            if conflicts.iter().any(|c| c.matches_pair(chunk_id, candidate_id)) {
                continue;
            }

            let verdict = llm_verdicts.get(i).copied().flatten();
            let (conflict_type, confidence, explanation) = match verdict {
                Some((true, confidence)) if confidence >= self.conflict_confidence_threshold => {
                    (ConflictType::Contradiction, Some(confidence), Some("llm flagged contradiction".to_string()))
                }
                _ => (ConflictType::OutdatedDuplicate, None, None),
            };

            let conflict =
                ContentConflict::new(chunk_id, candidate_id.clone(), conflict_type, *similarity, confidence, explanation, now);
            conflicts.push(conflict.clone());
            created.push(conflict);
        }
        created
    }

    /// §4.6 `resolve_conflict`: apply the chosen resolution and mark the
    /// conflict resolved. "Merge" performs no automatic content merge.
    pub async fn resolve_conflict(
        &self,
        conflict_id: uuid::Uuid,
        resolution: ConflictResolution,
    ) -> Result<(), LifecycleError> {
        let (chunk_a, chunk_b) = {
            let conflicts = self.conflicts.read().await;
            let Some(conflict) = conflicts.iter().find(|c| c.id == conflict_id) else {
                warn!(%conflict_id, "resolve_conflict called for unknown conflict");
                return Ok(());
            };
            (conflict.chunk_a_id.clone(), conflict.chunk_b_id.clone())
        };

        match resolution {
            ConflictResolution::KeepA => self.deprecate_chunk(&chunk_b, "conflict: kept counterpart A").await?,
            ConflictResolution::KeepB => self.deprecate_chunk(&chunk_a, "conflict: kept counterpart B").await?,
            ConflictResolution::ArchiveBoth => {
                self.deprecate_chunk(&chunk_a, "conflict: archiving both").await?;
                self.deprecate_chunk(&chunk_b, "conflict: archiving both").await?;
            }
            ConflictResolution::Merge => {} // human follow-up; no automatic mutation
        }

        let mut conflicts = self.conflicts.write().await;
        if let Some(conflict) = conflicts.iter_mut().find(|c| c.id == conflict_id) {
            conflict.status = crate::domain::ConflictStatus::Resolved;
            conflict.resolution = Some(resolution);
            conflict.resolved_at = Some(Utc::now());
        }
        Ok(())
    }

    /// §4.6: sets `quality_score=0` and `status="deprecated"`. `reason` is
    /// for the audit log only — `Chunk` has no field to persist it in.
    async fn deprecate_chunk(&self, chunk_id: &str, reason: &str) -> Result<(), LifecycleError> {
        self.store.update_quality_score(chunk_id, 0.0, false).await?;
        let patch = serde_json::json!({ "status": "deprecated", "deprecated_at": Utc::now() });
        self.store.update_metadata(chunk_id, patch).await?;
        info!(chunk_id, reason, "conflict resolution deprecated chunk");
        Ok(())
    }

    pub async fn open_conflicts(&self) -> Vec<ContentConflict> {
        self.conflicts.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryGraphStore;

    fn manager(store: Arc<dyn GraphStore>) -> LifecycleManager {
        LifecycleManager::new(store, PathBuf::from("/tmp/krs-test-archive"), 40.0, 10.0, 30, 0.85, 0.7)
    }

    #[tokio::test]
    async fn detect_conflicts_suppresses_symmetric_duplicates() {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let mgr = manager(store);

        let candidates = vec![("chunk-b".to_string(), "page-2".to_string(), 0.92)];
        let verdicts = vec![Some((true, 0.8))];
        let first = mgr.detect_conflicts_for_chunk("chunk-a", "page-1", &candidates, &verdicts).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].conflict_type, ConflictType::Contradiction);

        let second = mgr.detect_conflicts_for_chunk("chunk-a", "page-1", &candidates, &verdicts).await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn below_threshold_similarity_is_ignored() {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let mgr = manager(store);
        let candidates = vec![("chunk-b".to_string(), "page-2".to_string(), 0.5)];
        let created = mgr.detect_conflicts_for_chunk("chunk-a", "page-1", &candidates, &[None]).await;
        assert!(created.is_empty());
    }
}
