use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicU64, Ordering},
    sync::Mutex,
    time::Instant,
};

use chrono::{Duration as ChronoDuration, Utc};

use crate::domain::{ConversationTurn, Role};

/// Conversations older than this are dropped by [`ConversationStore::cleanup`].
const STALE_AFTER_DAYS: i64 = 7;

/// In-memory conversation history, one bounded ring per chat.
///
/// Oldest turns are evicted once a chat exceeds its capacity. History reads
/// reflect the state at call time; concurrent appends to the same chat are
/// last-write-wins, which is fine for effectively single-writer chats.
pub struct ConversationStore {
    conversations: Mutex<HashMap<String, VecDeque<ConversationTurn>>>,
    max_messages: usize,
    started_at: Instant,

    messages_received: AtomicU64,
    messages_sent: AtomicU64,
    ocr_processed: AtomicU64,
    simple_forced: AtomicU64,
    multi_forced: AtomicU64,
}

#[derive(Clone, Debug)]
pub struct StoreStats {
    pub total_chats: usize,
    pub total_messages: usize,
    pub messages_received: u64,
    pub messages_sent: u64,
    pub ocr_processed: u64,
    pub simple_forced: u64,
    pub multi_forced: u64,
    pub uptime_secs: u64,
}

impl ConversationStore {
    pub fn new(max_messages: usize) -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            max_messages: max_messages.max(1),
            started_at: Instant::now(),
            messages_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            ocr_processed: AtomicU64::new(0),
            simple_forced: AtomicU64::new(0),
            multi_forced: AtomicU64::new(0),
        }
    }

    pub fn append_message(&self, chat_id: &str, role: Role, content: impl Into<String>) {
        let turn = ConversationTurn::new(role, content);

        let mut map = self.conversations.lock().unwrap();
        let messages = map.entry(chat_id.to_string()).or_default();
        messages.push_back(turn);
        if messages.len() > self.max_messages {
            messages.pop_front();
        }

        match role {
            Role::User => self.messages_received.fetch_add(1, Ordering::Relaxed),
            Role::Assistant => self.messages_sent.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// The most recent `limit` turns for a chat, oldest first.
    pub fn history(&self, chat_id: &str, limit: usize) -> Vec<ConversationTurn> {
        let map = self.conversations.lock().unwrap();
        let Some(messages) = map.get(chat_id) else {
            return Vec::new();
        };
        let skip = messages.len().saturating_sub(limit);
        messages.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&self, chat_id: &str) {
        self.conversations.lock().unwrap().remove(chat_id);
        tracing::info!(chat_id, "conversation history cleared");
    }

    /// Drop chats whose last activity is older than a week.
    pub fn cleanup(&self) -> usize {
        self.cleanup_older_than(Utc::now() - ChronoDuration::days(STALE_AFTER_DAYS))
    }

    pub fn cleanup_older_than(&self, cutoff: chrono::DateTime<Utc>) -> usize {
        let mut map = self.conversations.lock().unwrap();
        let before = map.len();
        map.retain(|_, messages| match messages.back() {
            Some(last) => last.timestamp >= cutoff,
            None => false,
        });
        let removed = before - map.len();
        if removed > 0 {
            tracing::info!(removed, "stale conversations dropped");
        }
        removed
    }

    pub fn note_ocr_processed(&self) {
        self.ocr_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_simple_forced(&self) {
        self.simple_forced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_multi_forced(&self) {
        self.multi_forced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> StoreStats {
        let map = self.conversations.lock().unwrap();
        StoreStats {
            total_chats: map.len(),
            total_messages: map.values().map(|m| m.len()).sum(),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            ocr_processed: self.ocr_processed.load(Ordering::Relaxed),
            simple_forced: self.simple_forced.load(Ordering::Relaxed),
            multi_forced: self.multi_forced.load(Ordering::Relaxed),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_ordered_and_limited() {
        let store = ConversationStore::new(50);
        for i in 0..5 {
            store.append_message("chat", Role::User, format!("msg {i}"));
        }

        let all = store.history("chat", 50);
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].content, "msg 0");
        assert_eq!(all[4].content, "msg 4");

        let tail = store.history("chat", 2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].content, "msg 3");
        assert_eq!(tail[1].content, "msg 4");
    }

    #[test]
    fn ring_evicts_oldest_at_capacity() {
        let store = ConversationStore::new(3);
        for i in 0..5 {
            store.append_message("chat", Role::Assistant, format!("msg {i}"));
        }

        let all = store.history("chat", 10);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].content, "msg 2");
        assert_eq!(all[2].content, "msg 4");
    }

    #[test]
    fn unknown_chat_has_empty_history() {
        let store = ConversationStore::new(50);
        assert!(store.history("nope", 10).is_empty());
    }

    #[test]
    fn stats_count_roles_separately() {
        let store = ConversationStore::new(50);
        store.append_message("a", Role::User, "hi");
        store.append_message("a", Role::Assistant, "hello");
        store.append_message("b", Role::User, "hey");

        let stats = store.stats();
        assert_eq!(stats.total_chats, 2);
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.messages_received, 2);
        assert_eq!(stats.messages_sent, 1);
    }

    #[test]
    fn cleanup_drops_only_stale_chats() {
        let store = ConversationStore::new(50);
        store.append_message("fresh", Role::User, "hi");

        // A cutoff in the past keeps everything.
        let removed = store.cleanup_older_than(Utc::now() - ChronoDuration::days(1));
        assert_eq!(removed, 0);
        assert_eq!(store.stats().total_chats, 1);

        // A cutoff in the future makes the chat stale.
        let removed = store.cleanup_older_than(Utc::now() + ChronoDuration::days(1));
        assert_eq!(removed, 1);
        assert_eq!(store.stats().total_chats, 0);
    }

    #[test]
    fn clear_forgets_one_chat_only() {
        let store = ConversationStore::new(50);
        store.append_message("a", Role::User, "hi");
        store.append_message("b", Role::User, "hey");
        store.clear("a");
        assert!(store.history("a", 10).is_empty());
        assert_eq!(store.history("b", 10).len(), 1);
    }
}
