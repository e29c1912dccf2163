//! Bounded result cache for regex evaluation.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use decisionguard_types::{DEFAULT_REGEX_CACHE_CAPACITY, DEFAULT_REGEX_CACHE_EVICT_PERCENT};

/// SHA-256 of `(pattern, flags, content)`.
pub type CacheKey = [u8; 32];

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, bool>,
    /// Insertion order, oldest first.
    order: VecDeque<CacheKey>,
}

/// Regex match results keyed by pattern, flags and content.
///
/// When full, the oldest `evict_percent` of entries are dropped in one go.
/// Safe to share across threads.
#[derive(Debug)]
pub struct RegexCache {
    state: Mutex<CacheState>,
    capacity: usize,
    evict_percent: usize,
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new(DEFAULT_REGEX_CACHE_CAPACITY, DEFAULT_REGEX_CACHE_EVICT_PERCENT)
    }
}

impl RegexCache {
    pub fn new(capacity: usize, evict_percent: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity: capacity.max(1),
            evict_percent: evict_percent.clamp(1, 100),
        }
    }

    pub fn key(pattern: &str, flags: &str, content: &str) -> CacheKey {
        let mut hasher = Sha256::new();
        for part in [pattern, flags, content] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hasher.finalize().into()
    }

    pub fn get(&self, key: &CacheKey) -> Option<bool> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.get(key).copied()
    }

    pub fn insert(&self, key: CacheKey, matched: bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = state.entries.get_mut(&key) {
            *existing = matched;
            return;
        }

        if state.entries.len() >= self.capacity {
            let evict = (self.capacity * self.evict_percent / 100).max(1);
            for _ in 0..evict {
                let Some(oldest) = state.order.pop_front() else {
                    break;
                };
                state.entries.remove(&oldest);
            }
        }

        state.entries.insert(key, matched);
        state.order.push_back(key);
    }

    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.clear();
        state.order.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
