//! Stat 元数据缓存
//!
//! Same-execution memoization of path metadata, keyed by full path. Never
//! time-based: entries live until a mutating operation invalidates them or
//! the execution context ends. Negative lookups are cached too, so a miss
//! is as cheap as a hit. Shared across all stream handles of one
//! filesystem context.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::stat::StatRecord;

/// Cached lookup outcome / 缓存的查询结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEntry {
    Found(StatRecord),
    /// The path was looked up and does not exist / 查询过且不存在
    Missing,
}

#[derive(Default)]
pub struct StatCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl StatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<CacheEntry> {
        self.entries.lock().get(path).copied()
    }

    pub fn set(&self, path: &str, stat: StatRecord) {
        self.entries
            .lock()
            .insert(path.to_string(), CacheEntry::Found(stat));
    }

    pub fn set_missing(&self, path: &str) {
        self.entries
            .lock()
            .insert(path.to_string(), CacheEntry::Missing);
    }

    /// Drop the entry for one path; called by every mutating operation
    /// before and after it changes existence state / 失效单个路径
    pub fn invalidate(&self, path: &str) {
        self.entries.lock().remove(path);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
