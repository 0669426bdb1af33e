//! Bounded, process-local conversational state: 500 threads × 10 turns
//! each (§4.7 step 2, §9). A thin wrapper over two nested `lru::LruCache`s
//! guarded by one lock, the same shape as the dedup set in the parent
//! module.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

const MAX_THREADS: usize = 500;
const MAX_TURNS_PER_THREAD: usize = 10;

#[derive(Clone, Debug)]
pub struct Turn {
    pub role: &'static str,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: "user", text: text.into() }
    }
    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: "assistant", text: text.into() }
    }
}

pub struct ThreadCache {
    threads: Mutex<LruCache<String, Vec<Turn>>>,
}

impl ThreadCache {
    pub fn new() -> Self {
        Self {
            threads: Mutex::new(LruCache::new(NonZeroUsize::new(MAX_THREADS).unwrap())),
        }
    }

    pub fn append_turn(&self, thread_ref: &str, turn: Turn) {
        let mut threads = self.threads.lock();
        if threads.get(thread_ref).is_none() {
            threads.put(thread_ref.to_string(), Vec::new());
        }
        let turns = threads.get_mut(thread_ref).expect("just inserted");
        turns.push(turn);
        if turns.len() > MAX_TURNS_PER_THREAD {
            turns.remove(0);
        }
    }

    /// Most recent `limit` turns, oldest first, for prompt assembly.
    pub fn recent_turns(&self, thread_ref: &str, limit: usize) -> Vec<Turn> {
        let mut threads = self.threads.lock();
        match threads.get(thread_ref) {
            Some(turns) => {
                let start = turns.len().saturating_sub(limit);
                turns[start..].to_vec()
            }
            None => Vec::new(),
        }
    }
}

impl Default for ThreadCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_turns_per_thread_at_ten() {
        let cache = ThreadCache::new();
        for i in 0..15 {
            cache.append_turn("t1", Turn::user(format!("msg {i}")));
        }
        assert_eq!(cache.recent_turns("t1", 100).len(), 10);
    }

    #[test]
    fn recent_turns_respects_limit() {
        let cache = ThreadCache::new();
        for i in 0..5 {
            cache.append_turn("t1", Turn::user(format!("msg {i}")));
        }
        let turns = cache.recent_turns("t1", 2);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].text, "msg 4");
    }
}
