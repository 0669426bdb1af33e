//! C9: route negative feedback to content owners, with an admin-channel
//! fallback, plus the independent auto-escalation sweep (§4.8).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use tracing::{info, instrument};

use crate::error::EscalationError;
use crate::ports::{AnalyticsStore, ChatSurface, GraphStore, OwnerLookup};

pub struct EscalationManager {
    store: Arc<dyn GraphStore>,
    analytics: Arc<dyn AnalyticsStore>,
    chat: Arc<dyn ChatSurface>,
    admin_channel: String,
    auto_escalate_threshold: u32,
    escalate_window_hours: i64,
    /// One-shot-per-window dedup for auto-escalation, keyed by chunk_id.
    last_auto_escalation: Mutex<HashMap<String, chrono::DateTime<Utc>>>,
}

impl EscalationManager {
    pub fn new(
        store: Arc<dyn GraphStore>,
        analytics: Arc<dyn AnalyticsStore>,
        chat: Arc<dyn ChatSurface>,
        admin_channel: String,
        auto_escalate_threshold: u32,
        escalate_window_hours: i64,
    ) -> Self {
        Self {
            store,
            analytics,
            chat,
            admin_channel,
            auto_escalate_threshold,
            escalate_window_hours,
            last_auto_escalation: Mutex::new(HashMap::new()),
        }
    }

    /// §4.8 steps 1-3: per-event negative-feedback escalation.
    #[instrument(skip(self, issue_description, suggested_correction, original_question, affected_titles))]
    pub async fn escalate_feedback(
        &self,
        chunk_ids: &[String],
        issue_description: &str,
        suggested_correction: Option<&str>,
        original_question: &str,
        affected_titles: &[String],
        thread_link: &str,
    ) -> Result<(), EscalationError> {
        let owner = self.first_owner(chunk_ids).await?;

        let body = format_escalation_body(issue_description, suggested_correction, original_question, affected_titles, thread_link);

        match owner {
            Some(email) => match self.chat.lookup_owner_by_email(&email).await {
                Ok(OwnerLookup::Found { user_id }) => {
                    let text = format!("{body}\n\nActions: [View Thread] [Acknowledge]");
                    self.chat
                        .send_direct_message(&user_id, &text)
                        .await
                        .map_err(|e| EscalationError::ChatSurface(e.to_string()))?;
                }
                _ => {
                    self.post_admin_fallback(&body, "owner not found", thread_link).await?;
                }
            },
            None => {
                self.post_admin_fallback(&body, "no owner assigned", thread_link).await?;
            }
        }
        Ok(())
    }

    async fn first_owner(&self, chunk_ids: &[String]) -> Result<Option<String>, EscalationError> {
        for chunk_id in chunk_ids {
            if let Some(chunk) = self.store.get_chunk_by_id(chunk_id).await.map_err(EscalationError::Store)? {
                if !chunk.owner.is_empty() {
                    return Ok(Some(chunk.owner));
                }
            }
        }
        Ok(None)
    }

    async fn post_admin_fallback(&self, body: &str, reason: &str, thread_link: &str) -> Result<(), EscalationError> {
        let text = format!("Escalation ({reason})\n{body}\n\nActions: [View Thread] [Mark Resolved]\n{thread_link}");
        self.chat
            .post_to_admin_channel(&self.admin_channel, &text)
            .await
            .map_err(|e| EscalationError::ChatSurface(e.to_string()))
    }

    /// §4.8 independent sweep: ≥`auto_escalate_threshold` negative
    /// `FeedbackRecord`s for the same chunk in a rolling window triggers
    /// exactly one admin-channel alert per window.
    #[instrument(skip(self))]
    pub async fn check_auto_escalation(&self, chunk_id: &str) -> Result<bool, EscalationError> {
        let since = Utc::now() - ChronoDuration::hours(self.escalate_window_hours);
        let count = self.analytics.negative_feedback_count_since(chunk_id, since).await?;

        if count < self.auto_escalate_threshold {
            return Ok(false);
        }

        let mut last = self.last_auto_escalation.lock();
        if let Some(prev) = last.get(chunk_id) {
            if *prev >= since {
                return Ok(false);
            }
        }

        let text = format!(
            "Chunk {chunk_id} has received {count} negative feedback submissions in the last {}h.",
            self.escalate_window_hours
        );
        self.chat
            .post_to_admin_channel(&self.admin_channel, &text)
            .await
            .map_err(|e| EscalationError::ChatSurface(e.to_string()))?;
        last.insert(chunk_id.to_string(), Utc::now());
        info!(%chunk_id, count, "auto-escalation alert posted");
        Ok(true)
    }
}

fn format_escalation_body(
    issue_description: &str,
    suggested_correction: Option<&str>,
    original_question: &str,
    affected_titles: &[String],
    thread_link: &str,
) -> String {
    let correction = suggested_correction.unwrap_or("(none provided)");
    format!(
        "Issue: {issue_description}\nSuggested correction: {correction}\nOriginal question: {original_question}\nAffected content: {}\nThread: {thread_link}",
        affected_titles.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FeedbackRecord, FeedbackType};
    use crate::stores::{InMemoryAnalyticsStore, InMemoryGraphStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn format_body_includes_all_fields() {
        let body = format_escalation_body("wrong info", Some("fix it"), "how do I X?", &["Doc A".to_string()], "https://chat/thread/1");
        assert!(body.contains("wrong info"));
        assert!(body.contains("fix it"));
        assert!(body.contains("Doc A"));
    }

    struct CountingChat {
        admin_posts: AtomicUsize,
    }

    #[async_trait]
    impl ChatSurface for CountingChat {
        async fn post_answer(&self, _: &str, _: &str, _: &str, _: &[String]) -> Result<String, crate::error::OrchestratorError> {
            Ok("ts".to_string())
        }
        async fn post_ephemeral(&self, _: &str, _: &str, _: &str) -> Result<(), crate::error::OrchestratorError> {
            Ok(())
        }
        async fn lookup_owner_by_email(&self, _: &str) -> Result<OwnerLookup, crate::error::OrchestratorError> {
            Ok(OwnerLookup::NotFound)
        }
        async fn send_direct_message(&self, _: &str, _: &str) -> Result<(), crate::error::OrchestratorError> {
            Ok(())
        }
        async fn post_to_admin_channel(&self, _: &str, _: &str) -> Result<(), crate::error::OrchestratorError> {
            self.admin_posts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// §8 scenario 4: three different users submit `outdated` within 12h →
    /// exactly one admin alert; a fourth submission in the same 24h window
    /// produces no additional alert.
    #[tokio::test]
    async fn three_users_trigger_exactly_one_auto_escalation_alert() {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let analytics: Arc<dyn AnalyticsStore> = Arc::new(InMemoryAnalyticsStore::new());
        let chat = Arc::new(CountingChat { admin_posts: AtomicUsize::new(0) });
        let mgr = EscalationManager::new(store, analytics.clone(), chat.clone(), "#knowledge-admin".to_string(), 3, 24);

        let chunk_id = "chunk-x";
        for (i, user) in ["alice", "bob", "carol"].iter().enumerate() {
            analytics
                .record_feedback(
                    FeedbackRecord {
                        chunk_id: chunk_id.to_string(),
                        user_id: user.to_string(),
                        feedback_type: FeedbackType::Outdated,
                        comment: None,
                        suggested_correction: None,
                        evidence: None,
                        query_context: None,
                        thread_ref: "thread-1".to_string(),
                        created_at: Utc::now(),
                    },
                    &format!("ts-{i}"),
                )
                .await
                .unwrap();
            let triggered = mgr.check_auto_escalation(chunk_id).await.unwrap();
            assert_eq!(triggered, i == 2, "only the 3rd submission should trigger");
        }
        assert_eq!(chat.admin_posts.load(Ordering::SeqCst), 1);

        analytics
            .record_feedback(
                FeedbackRecord {
                    chunk_id: chunk_id.to_string(),
                    user_id: "dave".to_string(),
                    feedback_type: FeedbackType::Outdated,
                    comment: None,
                    suggested_correction: None,
                    evidence: None,
                    query_context: None,
                    thread_ref: "thread-1".to_string(),
                    created_at: Utc::now(),
                },
                "ts-3",
            )
            .await
            .unwrap();
        let triggered_again = mgr.check_auto_escalation(chunk_id).await.unwrap();
        assert!(!triggered_again);
        assert_eq!(chat.admin_posts.load(Ordering::SeqCst), 1);
    }
}
