//! In-process parsed-rule cache backed by DashMap for lock-free concurrent
//! access. Parsing happens once per distinct rule text; evaluation paths
//! share the immutable parsed rule via `Arc`.

use dashmap::DashMap;
use segment_core::config::CacheConfig;
use segment_core::error::SegmentResult;
use segment_rules::parser::DEFAULT_MAX_DEPTH;
use segment_rules::rule::{content_hash, Rule};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct CacheEntry {
    rule: Arc<Rule>,
    inserted_at: Instant,
}

/// Lock-free local cache of parsed rules keyed by content hash.
pub struct RuleCache {
    store: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
    max_nesting_depth: usize,
}

impl RuleCache {
    pub fn new(ttl_secs: u64, max_entries: usize) -> Self {
        Self {
            store: Arc::new(DashMap::with_capacity(max_entries.min(1024))),
            ttl: Duration::from_secs(ttl_secs),
            max_entries,
            max_nesting_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl_secs, config.max_entries)
    }

    /// Override the parser nesting limit applied on cache misses.
    pub fn with_max_nesting_depth(mut self, max_depth: usize) -> Self {
        self.max_nesting_depth = max_depth;
        self
    }

    /// Get a parsed rule by content hash, returns None if expired or missing.
    pub fn get(&self, hash: &str) -> Option<Arc<Rule>> {
        let entry = self.store.get(hash)?;
        if entry.inserted_at.elapsed() > self.ttl {
            drop(entry);
            self.store.remove(hash);
            return None;
        }
        Some(entry.rule.clone())
    }

    /// Return the cached rule for `text`, parsing and inserting on a miss.
    /// Parse failures are returned to the caller and never cached.
    pub fn get_or_parse(&self, text: &str) -> SegmentResult<Arc<Rule>> {
        let hash = content_hash(text);
        if let Some(rule) = self.get(&hash) {
            return Ok(rule);
        }

        tracing::debug!(hash = %hash, "rule cache miss, parsing");
        let rule = Arc::new(Rule::parse_with_max_depth(text, self.max_nesting_depth)?);
        self.put(hash, rule.clone());
        Ok(rule)
    }

    /// Insert or refresh a parsed rule.
    fn put(&self, hash: String, rule: Arc<Rule>) {
        // Simple eviction: if over capacity, skip insert (background cleanup
        // handles this).
        if self.store.len() >= self.max_entries && !self.store.contains_key(&hash) {
            return;
        }
        self.store.insert(
            hash,
            CacheEntry {
                rule,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove expired entries. Call this periodically from a background task.
    pub fn evict_expired(&self) -> usize {
        let before = self.store.len();
        self.store
            .retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        before - self.store.len()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
