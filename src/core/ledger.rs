//! Per-user, per-assistant token accounting
//!
//! The one place in the system where concurrent writers contend on shared
//! state. Each (user, assistant) record is an `AtomicU64` behind a sharded
//! map, so an increment is a single atomic read-modify-write and the final
//! total equals the sum of all increments under any interleaving.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LedgerKey {
    user_id: String,
    assistant_id: String,
}

impl LedgerKey {
    fn new(user_id: &str, assistant_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            assistant_id: assistant_id.to_string(),
        }
    }
}

/// Monotonically growing token totals per (user, assistant) pair
///
/// Records are created lazily on first use and never deleted here; export
/// and cleanup belong to the ops layer.
#[derive(Default)]
pub struct UsageLedger {
    totals: DashMap<LedgerKey, AtomicU64>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically add `tokens` to the pair's record, creating it if absent.
    /// Returns the new total.
    pub fn add(&self, user_id: &str, assistant_id: &str, tokens: u64) -> u64 {
        let entry = self
            .totals
            .entry(LedgerKey::new(user_id, assistant_id))
            .or_default();
        let total = entry.fetch_add(tokens, Ordering::Relaxed) + tokens;
        tracing::debug!(user_id, assistant_id, tokens, total, "Recorded token usage");
        total
    }

    /// Current total for one pair; zero if the record was never created
    pub fn get(&self, user_id: &str, assistant_id: &str) -> u64 {
        self.totals
            .get(&LedgerKey::new(user_id, assistant_id))
            .map(|entry| entry.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Totals for every assistant this user has consumed
    pub fn get_all(&self, user_id: &str) -> HashMap<String, u64> {
        self.totals
            .iter()
            .filter(|entry| entry.key().user_id == user_id)
            .map(|entry| {
                (
                    entry.key().assistant_id.clone(),
                    entry.value().load(Ordering::Relaxed),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_add_creates_record_lazily() {
        let ledger = UsageLedger::new();
        assert_eq!(ledger.get("u1", "vet-general"), 0);

        assert_eq!(ledger.add("u1", "vet-general", 42), 42);
        assert_eq!(ledger.add("u1", "vet-general", 8), 50);
        assert_eq!(ledger.get("u1", "vet-general"), 50);
    }

    #[test]
    fn test_pairs_are_independent() {
        let ledger = UsageLedger::new();
        ledger.add("u1", "vet-general", 10);
        ledger.add("u1", "vet-exotics", 20);
        ledger.add("u2", "vet-general", 30);

        assert_eq!(ledger.get("u1", "vet-general"), 10);
        assert_eq!(ledger.get("u1", "vet-exotics"), 20);
        assert_eq!(ledger.get("u2", "vet-general"), 30);
    }

    #[test]
    fn test_get_all_filters_by_user() {
        let ledger = UsageLedger::new();
        ledger.add("u1", "vet-general", 10);
        ledger.add("u1", "vet-exotics", 20);
        ledger.add("u2", "vet-general", 30);

        let all = ledger.get_all("u1");
        assert_eq!(all.len(), 2);
        assert_eq!(all["vet-general"], 10);
        assert_eq!(all["vet-exotics"], 20);
    }

    #[test]
    fn test_concurrent_adds_sum_exactly() {
        let ledger = Arc::new(UsageLedger::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    ledger.add("u1", "vet-general", 3);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ledger.get("u1", "vet-general"), 8 * 1000 * 3);
    }
}
