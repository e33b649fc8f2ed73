use crate::services::logger::Logger;
use crate::services::sniff::SniffInfo;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Chunk(Bytes),
    Sniff(SniffInfo),
}

#[derive(Debug)]
struct CacheEntry {
    value: CachedValue,
    size: u64,
    mtime: Option<u64>,
    last_access: u64,
    inserted: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    total_bytes: u64,
    tick: u64,
    hits: u64,
    misses: u64,
    writes: u64,
    evictions: u64,
    stale_drops: u64,
}

impl CacheState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.size);
        Some(entry)
    }

    /// Least recently accessed entry; insertion order breaks ties.
    fn lru_key(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| (entry.last_access, entry.inserted))
            .map(|(key, _)| key.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub evictions: u64,
    pub stale_drops: u64,
    pub total_bytes: u64,
    pub capacity_bytes: u64,
    pub entries: usize,
    pub usage_percent: f64,
}

/// In-memory LRU bounded by total byte size. Entries optionally remember the
/// mtime of the file they were derived from so a newer mtime turns them into misses.
#[derive(Clone)]
pub struct CacheService {
    logger: Logger,
    capacity: u64,
    state: Arc<Mutex<CacheState>>,
}

impl CacheService {
    pub fn new(logger: Logger, capacity: u64) -> Self {
        Self {
            logger: logger.child("cache"),
            capacity,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let mut state = self.lock();
        let tick = state.next_tick();
        let found = state.entries.get_mut(key).map(|entry| {
            entry.last_access = tick;
            entry.value.clone()
        });
        if found.is_some() {
            state.hits += 1;
        } else {
            state.misses += 1;
        }
        found
    }

    /// Staleness check followed by a lookup.
    pub fn get_fresh(&self, key: &str, current_mtime: Option<u64>) -> Option<CachedValue> {
        self.invalidate_if_stale(key, current_mtime);
        self.get(key)
    }

    pub fn put(&self, key: &str, value: CachedValue, size: u64, mtime: Option<u64>) -> bool {
        if size > self.capacity {
            self.logger.debug(
                "Skipping cache insert larger than capacity",
                Some(&serde_json::json!({"size": size, "capacity": self.capacity})),
            );
            return false;
        }
        let mut state = self.lock();
        state.remove(key);
        while state.total_bytes + size > self.capacity {
            let Some(victim) = state.lru_key() else {
                break;
            };
            state.remove(&victim);
            state.evictions += 1;
        }
        let tick = state.next_tick();
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                size,
                mtime,
                last_access: tick,
                inserted: tick,
            },
        );
        state.total_bytes += size;
        state.writes += 1;
        true
    }

    /// Drops the entry when it was derived from a file older than `current_mtime`.
    pub fn invalidate_if_stale(&self, key: &str, current_mtime: Option<u64>) -> bool {
        let Some(current) = current_mtime else {
            return false;
        };
        let mut state = self.lock();
        let stale = match state.entries.get(key) {
            Some(entry) => entry.mtime.map(|stored| stored < current).unwrap_or(false),
            None => false,
        };
        if stale {
            state.remove(key);
            state.stale_drops += 1;
        }
        stale
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.total_bytes = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        let usage_percent = if self.capacity == 0 {
            0.0
        } else {
            (state.total_bytes as f64 / self.capacity as f64 * 10_000.0).round() / 100.0
        };
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            writes: state.writes,
            evictions: state.evictions,
            stale_drops: state.stale_drops,
            total_bytes: state.total_bytes,
            capacity_bytes: self.capacity,
            entries: state.entries.len(),
            usage_percent,
        }
    }

    pub fn build_key(&self, input: &Value) -> String {
        let payload = stable_stringify(input);
        let mut hasher = Sha256::new();
        hasher.update(payload.as_bytes());
        hex::encode(hasher.finalize())
    }
}

fn stable_stringify(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => serde_json::to_string(s).unwrap_or_else(|_| s.clone()),
        Value::Array(arr) => {
            let inner: Vec<String> = arr.iter().map(stable_stringify).collect();
            format!("[{}]", inner.join(","))
        }
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            let inner: Vec<String> = keys
                .iter()
                .map(|key| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(key).unwrap_or_default(),
                        stable_stringify(&map[*key])
                    )
                })
                .collect();
            format!("{{{}}}", inner.join(","))
        }
    }
}
