//! C8: binds `ChatSurface` to `Retriever`, `LLM`, and feedback capture
//! (§4.7). Dedup LRU and thread cache are bounded, process-local state per
//! §9 — the same "global singletons kept small and explicit" shape the
//! teacher uses for its session registry.

mod thread_cache;

pub use thread_cache::{Turn, ThreadCache};

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{instrument, warn};

use crate::domain::{BehavioralSignal, BotResponse, FeedbackRecord, FeedbackType, SignalType};
use crate::error::OrchestratorError;
use crate::ports::{AnalyticsStore, ChatSurface, GraphStore, HybridFilters, LLM};
use crate::quality::{self, QualityEngine};
use crate::retriever::Retriever;

const DEDUP_CAPACITY: usize = 1000;
const MAX_PRIOR_TURNS: usize = 6;
const MAX_TURN_CHARS: usize = 500;
const MAX_CONTEXT_CHARS: usize = 1000;
const SEARCH_K: usize = 5;

const SYSTEM_PREAMBLE: &str = "You are a knowledgeable internal assistant. Answer using only the \
provided context blocks; cite sources by their bracketed number. If the context does not contain \
the answer, say so plainly instead of guessing.";

pub struct Orchestrator {
    retriever: Arc<Retriever>,
    llm: Arc<dyn LLM>,
    chat: Arc<dyn ChatSurface>,
    store: Arc<dyn GraphStore>,
    analytics: Arc<dyn AnalyticsStore>,
    quality: Arc<QualityEngine>,
    dedup: Mutex<LruCache<String, ()>>,
    threads: ThreadCache,
}

impl Orchestrator {
    pub fn new(
        retriever: Arc<Retriever>,
        llm: Arc<dyn LLM>,
        chat: Arc<dyn ChatSurface>,
        store: Arc<dyn GraphStore>,
        analytics: Arc<dyn AnalyticsStore>,
        quality: Arc<QualityEngine>,
    ) -> Self {
        Self {
            retriever,
            llm,
            chat,
            store,
            analytics,
            quality,
            dedup: Mutex::new(LruCache::new(NonZeroUsize::new(DEDUP_CAPACITY).unwrap())),
            threads: ThreadCache::new(),
        }
    }

    /// §4.7 steps 1-8: the full question-answering path.
    #[instrument(skip(self, text))]
    pub async fn handle_question(
        &self,
        dedup_key: &str,
        text: &str,
        user: &str,
        channel: &str,
        thread_ref: &str,
    ) -> Result<Option<String>, OrchestratorError> {
        if self.is_duplicate(dedup_key) {
            return Ok(None);
        }

        let prior_turns = self.threads.recent_turns(thread_ref, MAX_PRIOR_TURNS);
        let results = self
            .retriever
            .search(text, SEARCH_K, &HybridFilters::default(), true, false)
            .await;

        for result in &results {
            let chunk_id = result.chunk_id().to_string();
            let next_count = result.chunk.access_count + 1;
            let store = self.store.clone();
            tokio::spawn(async move {
                let patch = serde_json::json!({ "access_count": next_count });
                if let Err(err) = store.update_metadata(&chunk_id, patch).await {
                    warn!(%chunk_id, error = %err, "failed to bump access_count");
                }
            });
        }

        let prompt = assemble_prompt(text, &prior_turns, &results);
        let response_text = match self.llm.generate(&prompt).await {
            Ok(text) => text,
            Err(_) if !results.is_empty() => format!(
                "I found {} relevant document(s) but couldn't generate an answer right now. Please try again later.",
                results.len()
            ),
            Err(_) => "I couldn't generate an answer right now. Please try again later.".to_string(),
        };

        let chunk_ids: Vec<String> = results.iter().map(|r| r.chunk_id().to_string()).collect();
        let response_ts = self.chat.post_answer(channel, thread_ref, &response_text, &chunk_ids).await?;

        self.analytics
            .record_bot_response(BotResponse {
                response_ts: response_ts.clone(),
                thread_ts: thread_ref.to_string(),
                channel_id: channel.to_string(),
                user_id: user.to_string(),
                query: text.to_string(),
                response_text: response_text.clone(),
                chunk_ids,
                has_follow_up: false,
            })
            .await?;

        self.threads.append_turn(thread_ref, Turn::user(text));
        self.threads.append_turn(thread_ref, Turn::assistant(&response_text));

        Ok(Some(response_ts))
    }

    /// §4.7 feedback button click. `helpful` applies directly; the other
    /// three are expected to have already gone through a modal at the chat
    /// layer, arriving here with the collected comment/correction/evidence.
    #[instrument(skip(self, comment, suggested_correction))]
    pub async fn handle_feedback(
        &self,
        chunk_id: &str,
        user_id: &str,
        feedback_type: FeedbackType,
        thread_ref: &str,
        message_ts: &str,
        comment: Option<String>,
        suggested_correction: Option<String>,
        evidence: Option<String>,
    ) -> Result<(), OrchestratorError> {
        let record = FeedbackRecord {
            chunk_id: chunk_id.to_string(),
            user_id: user_id.to_string(),
            feedback_type,
            comment,
            suggested_correction,
            evidence,
            query_context: None,
            thread_ref: thread_ref.to_string(),
            created_at: chrono::Utc::now(),
        };

        self.quality.apply_feedback(record, message_ts).await?;

        Ok(())
    }

    /// §4.7 reaction event: classify, record if recognized.
    pub async fn handle_reaction(
        &self,
        response_ref: &str,
        thread_ref: &str,
        chunk_ids: Vec<String>,
        user_id: &str,
        reaction: &str,
    ) -> Result<(), OrchestratorError> {
        let Some(classification) = quality::classify_reaction(reaction) else {
            return Ok(());
        };
        self.record_signal(response_ref, thread_ref, chunk_ids, user_id, classification.signal_type, classification.value, None)
            .await
    }

    /// §4.7 non-bot, non-original thread message: classify against a known
    /// `BotResponse`; flip `has_follow_up` when the classification is one.
    pub async fn handle_thread_message(
        &self,
        response_ts: &str,
        thread_ref: &str,
        user_id: &str,
        text: &str,
    ) -> Result<(), OrchestratorError> {
        let Some(bot_response) = self.analytics.get_bot_response(response_ts).await? else {
            return Ok(());
        };

        let Some(classification) = quality::classify_text(text) else {
            return Ok(());
        };

        if classification.signal_type == SignalType::FollowUp {
            self.analytics.set_has_follow_up(response_ts).await?;
        }

        self.record_signal(
            response_ts,
            thread_ref,
            bot_response.chunk_ids.clone(),
            user_id,
            classification.signal_type,
            classification.value,
            Some(text.to_string()),
        )
        .await
    }

    async fn record_signal(
        &self,
        response_ref: &str,
        thread_ref: &str,
        chunk_ids: Vec<String>,
        user_id: &str,
        signal_type: SignalType,
        signal_value: f64,
        raw_text: Option<String>,
    ) -> Result<(), OrchestratorError> {
        let signal = BehavioralSignal {
            response_ref: response_ref.to_string(),
            thread_ref: thread_ref.to_string(),
            chunk_ids,
            user_id: user_id.to_string(),
            signal_type,
            signal_value,
            raw_text,
            created_at: chrono::Utc::now(),
        };
        self.quality.record_signal(signal).await?;
        Ok(())
    }

    fn is_duplicate(&self, dedup_key: &str) -> bool {
        let mut dedup = self.dedup.lock();
        if dedup.contains(dedup_key) {
            true
        } else {
            dedup.put(dedup_key.to_string(), ());
            false
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn assemble_prompt(question: &str, prior_turns: &[Turn], results: &[crate::retriever::SearchResult]) -> String {
    let mut prompt = String::new();
    prompt.push_str(SYSTEM_PREAMBLE);
    prompt.push_str("\n\n");

    if !prior_turns.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for turn in prior_turns {
            prompt.push_str(&format!("{}: {}\n", turn.role, truncate_chars(&turn.text, MAX_TURN_CHARS)));
        }
        prompt.push('\n');
    }

    for (i, result) in results.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] (source: {}, {})\n{}\n\n",
            i + 1,
            result.page_title(),
            result.url(),
            truncate_chars(result.content(), MAX_CONTEXT_CHARS)
        ));
    }

    prompt.push_str(&format!("Question: {question}\n"));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundary() {
        let s = "a".repeat(600);
        assert_eq!(truncate_chars(&s, 500).chars().count(), 500);
    }
}
