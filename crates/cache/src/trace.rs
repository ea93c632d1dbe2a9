//! Bounded in-memory trace store
//!
//! This module provides:
//! - `TraceStore`: `trace_id -> TracePayload` with TTL and LRU eviction
//!
//! Eviction is by TTL (`created_at`) or by size (least-recently-accessed
//! first). A lookup of an expired or unknown id returns `None`; callers
//! map that to `not_found` and never fall back to a fresh scan silently.
//!
//! # Thread Safety
//!
//! One mutex guards the map. Critical sections are O(entries) at the
//! configured cap (100 by default) with no I/O inside.

use manualfind_core::TracePayload;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Injectable clock returning epoch milliseconds
pub type NowFn = Arc<dyn Fn() -> u64 + Send + Sync>;

/// The wall clock
pub fn system_now() -> NowFn {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    })
}

struct TraceEntry {
    created_at_ms: u64,
    last_access: u64,
    payload: TracePayload,
}

struct TraceInner {
    items: HashMap<String, TraceEntry>,
    access_counter: u64,
}

// ============================================================================
// TraceStore
// ============================================================================

/// Bounded map of trace payloads
pub struct TraceStore {
    max_keep: usize,
    ttl_ms: u64,
    now_fn: NowFn,
    inner: Mutex<TraceInner>,
}

impl TraceStore {
    /// Create a store with the given cap and TTL (seconds)
    pub fn new(max_keep: usize, ttl_sec: u64) -> Self {
        Self::with_now_fn(max_keep, ttl_sec, system_now())
    }

    /// Create a store with an injected clock
    pub fn with_now_fn(max_keep: usize, ttl_sec: u64, now_fn: NowFn) -> Self {
        TraceStore {
            max_keep: max_keep.max(1),
            ttl_ms: ttl_sec.saturating_mul(1000),
            now_fn,
            inner: Mutex::new(TraceInner {
                items: HashMap::new(),
                access_counter: 0,
            }),
        }
    }

    fn cleanup(&self, inner: &mut TraceInner, now: u64) {
        inner
            .items
            .retain(|_, entry| now.saturating_sub(entry.created_at_ms) <= self.ttl_ms);
        while inner.items.len() > self.max_keep {
            let Some(oldest) = inner
                .items
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            inner.items.remove(&oldest);
        }
    }

    /// Register a payload under its trace id
    ///
    /// The payload's own `trace_id` field is the key; the caller assigns it
    /// before insertion.
    pub fn insert(&self, payload: TracePayload) {
        let now = (self.now_fn)();
        let mut inner = self.inner.lock();
        inner.access_counter += 1;
        let entry = TraceEntry {
            created_at_ms: now,
            last_access: inner.access_counter,
            payload,
        };
        let key = entry.payload.trace_id.clone();
        inner.items.insert(key, entry);
        self.cleanup(&mut inner, now);
    }

    /// Fetch a payload, refreshing its LRU position
    ///
    /// Returns `None` for unknown and expired ids alike.
    pub fn get(&self, trace_id: &str) -> Option<TracePayload> {
        let now = (self.now_fn)();
        let mut inner = self.inner.lock();
        self.cleanup(&mut inner, now);
        inner.access_counter += 1;
        let counter = inner.access_counter;
        let entry = inner.items.get_mut(trace_id)?;
        entry.last_access = counter;
        Some(entry.payload.clone())
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = (self.now_fn)();
        let mut inner = self.inner.lock();
        self.cleanup(&mut inner, now);
        inner.items.len()
    }

    /// True when the store holds no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================
