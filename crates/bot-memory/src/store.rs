use std::collections::HashMap;
use std::sync::RwLock;

use bot_core::types::ChatTurn;
use tracing::debug;

/// In-process, ephemeral conversation memory: `key → bounded tail of turns`.
///
/// Memory is resident for the process lifetime; nothing is persisted to
/// disk. Many concurrent readers are allowed; writes take the single
/// exclusive lock for the map as a whole.
pub struct MemoryStore {
    turns: RwLock<HashMap<String, Vec<ChatTurn>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            turns: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot of the turns for `key`, empty if absent. Caller mutations to
    /// the returned `Vec` never affect the store.
    pub fn get(&self, key: &str) -> Vec<ChatTurn> {
        let turns = self.turns.read().expect("memory store lock poisoned");
        turns.get(key).cloned().unwrap_or_default()
    }

    /// Append `turn`, then truncate the leading entries so the stored
    /// length is at most `limit` (0 disables truncation): the stored length
    /// after `save` is `min(prior + 1, limit)` and the newest turn equals
    /// `turn`.
    pub fn save(&self, key: &str, turn: ChatTurn, limit: usize) {
        let mut turns = self.turns.write().expect("memory store lock poisoned");
        let entry = turns.entry(key.to_string()).or_default();
        entry.push(turn);
        if limit > 0 && entry.len() > limit {
            let excess = entry.len() - limit;
            entry.drain(0..excess);
        }
        debug!(key, len = entry.len(), "memory turn saved");
    }

    pub fn clear(&self, key: &str) {
        let mut turns = self.turns.write().expect("memory store lock poisoned");
        turns.remove(key);
    }

    /// Remove every key sharing `prefix`, so afterwards no key starting
    /// with `prefix` remains.
    pub fn clear_prefix(&self, prefix: &str) {
        let mut turns = self.turns.write().expect("memory store lock poisoned");
        turns.retain(|k, _| !k.starts_with(prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_truncates_to_limit() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.save("k1", ChatTurn::user(format!("turn {i}")), 3);
        }
        let turns = store.get("k1");
        assert_eq!(turns.len(), 3);
        assert_eq!(turns.last().unwrap().text, "turn 4");
        assert_eq!(turns.first().unwrap().text, "turn 2");
    }

    #[test]
    fn limit_zero_disables_truncation() {
        let store = MemoryStore::new();
        for i in 0..20 {
            store.save("k1", ChatTurn::user(format!("turn {i}")), 0);
        }
        assert_eq!(store.get("k1").len(), 20);
    }

    #[test]
    fn get_on_absent_key_is_empty() {
        let store = MemoryStore::new();
        assert!(store.get("missing").is_empty());
    }

    #[test]
    fn get_returns_independent_snapshot() {
        let store = MemoryStore::new();
        store.save("k1", ChatTurn::user("hi"), 10);
        let mut snapshot = store.get("k1");
        snapshot.push(ChatTurn::user("mutated locally"));
        assert_eq!(store.get("k1").len(), 1);
    }

    #[test]
    fn clear_removes_key() {
        let store = MemoryStore::new();
        store.save("k1", ChatTurn::user("hi"), 10);
        store.clear("k1");
        assert!(store.get("k1").is_empty());
    }

    #[test]
    fn clear_prefix_removes_all_matching_keys() {
        let store = MemoryStore::new();
        store.save("bot|b1|alice", ChatTurn::user("hi"), 10);
        store.save("bot|b1|bob", ChatTurn::user("hey"), 10);
        store.save("bot|b2|alice", ChatTurn::user("other bot"), 10);

        store.clear_prefix("bot|b1|");

        assert!(store.get("bot|b1|alice").is_empty());
        assert!(store.get("bot|b1|bob").is_empty());
        assert_eq!(store.get("bot|b2|alice").len(), 1);
    }

    #[test]
    fn save_never_blocks_other_keys() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for j in 0..50 {
                    store.save(&format!("k{i}"), ChatTurn::user(format!("{i}-{j}")), 10);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        for i in 0..8 {
            assert_eq!(store.get(&format!("k{i}")).len(), 10);
        }
    }
}
