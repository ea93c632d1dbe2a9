//! Semantic result cache
//!
//! This module provides:
//! - `cache_key`: the hash over fingerprint, query, terms, budget, scope
//! - `SemanticCache`: TTL/LRU exact-match cache with guard revalidation
//! - the embedding provider slot (only the no-op provider is supported)
//!
//! Entries store a cloned payload so they survive trace eviction. The
//! `semantic` lookup mode is a reserved slot: with the `none` provider it
//! never fires and every non-exact lookup is a miss.
//!
//! # Thread Safety
//!
//! One mutex guards the map; critical sections hold no I/O.

use crate::trace::{system_now, NowFn};
use manualfind_core::{Result, SemCacheMode, ToolError, TracePayload};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Cache key
// ============================================================================

/// Build the exact-match cache key
///
/// `H(fingerprint || normalized_query || sorted(required_terms) || budget
/// || scope_bits)`, hex-truncated.
pub fn cache_key(
    manuals_fingerprint: &str,
    normalized_query: &str,
    required_terms: &[String],
    budget_bits: &str,
    scope_bits: &str,
) -> String {
    let mut sorted_terms: Vec<&String> = required_terms.iter().collect();
    sorted_terms.sort();

    let mut hasher = Sha256::new();
    hasher.update(manuals_fingerprint.as_bytes());
    hasher.update([0x1f]);
    hasher.update(normalized_query.as_bytes());
    hasher.update([0x1f]);
    for term in sorted_terms {
        hasher.update(term.as_bytes());
        hasher.update([0x1e]);
    }
    hasher.update([0x1f]);
    hasher.update(budget_bits.as_bytes());
    hasher.update([0x1f]);
    hasher.update(scope_bits.as_bytes());

    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for byte in digest.iter().take(16) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

// ============================================================================
// Embedding provider slot
// ============================================================================

/// Reserved embedding slot for the `semantic` lookup mode
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a normalized query; `None` disables semantic lookup
    fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

/// The only supported provider: never embeds
pub struct NoopEmbeddingProvider;

impl EmbeddingProvider for NoopEmbeddingProvider {
    fn embed(&self, _text: &str) -> Option<Vec<f32>> {
        None
    }
}

/// Resolve a provider by its configured name
///
/// Only `none` is supported; anything else is a startup error.
pub fn embedding_provider_from_name(name: &str) -> Result<Arc<dyn EmbeddingProvider>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "" | "none" => Ok(Arc::new(NoopEmbeddingProvider)),
        other => Err(ToolError::invalid_parameter(format!(
            "unsupported SEM_CACHE_EMBEDDING_PROVIDER: {other}"
        ))),
    }
}

// ============================================================================
// SemanticCache
// ============================================================================

/// Outcome of one cache consultation
#[derive(Debug, Clone)]
pub struct CacheLookup {
    /// What happened
    pub mode: SemCacheMode,
    /// Stored payload on a hit
    pub payload: Option<TracePayload>,
    /// Similarity score (semantic mode only; reserved)
    pub score: Option<f32>,
}

impl CacheLookup {
    fn miss() -> Self {
        CacheLookup {
            mode: SemCacheMode::Miss,
            payload: None,
            score: None,
        }
    }
}

struct CacheEntry {
    created_at_ms: u64,
    last_access: u64,
    payload: TracePayload,
}

struct CacheInner {
    items: HashMap<String, CacheEntry>,
    access_counter: u64,
}

/// TTL/LRU semantic cache keyed by the manual fingerprint
pub struct SemanticCache {
    enabled: bool,
    ttl_ms: u64,
    max_keep: usize,
    max_summary_gap: i64,
    max_summary_conflict: i64,
    provider: Arc<dyn EmbeddingProvider>,
    now_fn: NowFn,
    inner: Mutex<CacheInner>,
}

impl SemanticCache {
    /// Create a cache from its configuration knobs
    pub fn new(
        enabled: bool,
        ttl_sec: u64,
        max_keep: usize,
        max_summary_gap: i64,
        max_summary_conflict: i64,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self::with_now_fn(
            enabled,
            ttl_sec,
            max_keep,
            max_summary_gap,
            max_summary_conflict,
            provider,
            system_now(),
        )
    }

    /// Create a cache with an injected clock
    pub fn with_now_fn(
        enabled: bool,
        ttl_sec: u64,
        max_keep: usize,
        max_summary_gap: i64,
        max_summary_conflict: i64,
        provider: Arc<dyn EmbeddingProvider>,
        now_fn: NowFn,
    ) -> Self {
        SemanticCache {
            enabled,
            ttl_ms: ttl_sec.saturating_mul(1000),
            max_keep: max_keep.max(1),
            max_summary_gap,
            max_summary_conflict,
            provider,
            now_fn,
            inner: Mutex::new(CacheInner {
                items: HashMap::new(),
                access_counter: 0,
            }),
        }
    }

    fn cleanup(&self, inner: &mut CacheInner, now: u64) {
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

    /// Guard: a stored summary above its gap/conflict ceiling is stale
    fn guard_rejects(&self, payload: &TracePayload) -> bool {
        (self.max_summary_gap >= 0 && i64::from(payload.summary.gap_count) > self.max_summary_gap)
            || (self.max_summary_conflict >= 0
                && i64::from(payload.summary.conflict_count) > self.max_summary_conflict)
    }

    /// Consult the cache for an exact key hit
    ///
    /// A guard-rejected hit removes the entry and reports
    /// `guard_revalidate` so the pipeline re-executes.
    pub fn lookup(&self, key: &str, normalized_query: &str) -> CacheLookup {
        if !self.enabled {
            return CacheLookup::miss();
        }
        let now = (self.now_fn)();
        let mut inner = self.inner.lock();
        self.cleanup(&mut inner, now);

        inner.access_counter += 1;
        let counter = inner.access_counter;
        if let Some(entry) = inner.items.get_mut(key) {
            if self.guard_rejects(&entry.payload) {
                inner.items.remove(key);
                return CacheLookup {
                    mode: SemCacheMode::GuardRevalidate,
                    payload: None,
                    score: None,
                };
            }
            entry.last_access = counter;
            return CacheLookup {
                mode: SemCacheMode::Exact,
                payload: Some(entry.payload.clone()),
                score: Some(1.0),
            };
        }
        drop(inner);

        // Reserved semantic path: with the `none` provider this always
        // short-circuits to a miss.
        if self.provider.embed(normalized_query).is_none() {
            return CacheLookup::miss();
        }
        CacheLookup::miss()
    }

    /// Store a payload under its key
    pub fn insert(&self, key: &str, payload: TracePayload) {
        if !self.enabled {
            return;
        }
        let now = (self.now_fn)();
        let mut inner = self.inner.lock();
        inner.access_counter += 1;
        let entry = CacheEntry {
            created_at_ms: now,
            last_access: inner.access_counter,
            payload,
        };
        inner.items.insert(key.to_string(), entry);
        self.cleanup(&mut inner, now);
    }

    /// Drop every entry computed from one manual
    pub fn invalidate_manual(&self, manual_id: &str) {
        let mut inner = self.inner.lock();
        inner.items.retain(|_, entry| entry.payload.manual_id != manual_id);
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = (self.now_fn)();
        let mut inner = self.inner.lock();
        self.cleanup(&mut inner, now);
        inner.items.len()
    }

    /// True when the cache holds no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use manualfind_core::{AppliedDiagnostics, FindSummary, IntegrationStatus};
    use std::sync::atomic::{AtomicU64, Ordering};

    fn payload(gaps: u32) -> TracePayload {
        TracePayload {
            trace_id: "t1".into(),
            manual_id: "hr".into(),
            applied: AppliedDiagnostics::baseline(vec![]),
            candidates: Vec::new(),
            integrated_top: Vec::new(),
            unscanned: Vec::new(),
            gaps: Vec::new(),
            conflicts: Vec::new(),
            claims: Vec::new(),
            evidences: Vec::new(),
            edges: Vec::new(),
            gate_runs: Vec::new(),
            fusion_debug: Vec::new(),
            summary: FindSummary {
                scanned_files: 1,
                scanned_nodes: 1,
                candidates: 1,
                file_bias_ratio: 0.0,
                conflict_count: 0,
                gap_count: gaps,
                integration_status: IntegrationStatus::Ready,
            },
            source_latency_ms: 42,
            manuals_fingerprint: "fp".into(),
        }
    }

    fn cache(enabled: bool, guard_gap: i64) -> SemanticCache {
        SemanticCache::new(enabled, 1800, 10, guard_gap, -1, Arc::new(NoopEmbeddingProvider))
    }

    #[test]
    fn test_cache_key_deterministic_and_term_order_free() {
        let a = cache_key("fp", "q", &["b".into(), "a".into()], "1000:50", "scope");
        let b = cache_key("fp", "q", &["a".into(), "b".into()], "1000:50", "scope");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_cache_key_sensitive_to_parts() {
        let base = cache_key("fp", "q", &[], "1000:50", "scope");
        assert_ne!(base, cache_key("fp2", "q", &[], "1000:50", "scope"));
        assert_ne!(base, cache_key("fp", "q2", &[], "1000:50", "scope"));
        assert_ne!(base, cache_key("fp", "q", &["t".into()], "1000:50", "scope"));
        assert_ne!(base, cache_key("fp", "q", &[], "2000:50", "scope"));
        assert_ne!(base, cache_key("fp", "q", &[], "1000:50", "scope2"));
    }

    #[test]
    fn test_miss_then_exact_hit() {
        let cache = cache(true, -1);
        let lookup = cache.lookup("k1", "q");
        assert_eq!(lookup.mode, SemCacheMode::Miss);

        cache.insert("k1", payload(0));
        let lookup = cache.lookup("k1", "q");
        assert_eq!(lookup.mode, SemCacheMode::Exact);
        assert_eq!(lookup.payload.unwrap().source_latency_ms, 42);
        assert_eq!(lookup.score, Some(1.0));
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let cache = cache(false, -1);
        cache.insert("k1", payload(0));
        assert_eq!(cache.lookup("k1", "q").mode, SemCacheMode::Miss);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_guard_revalidate_on_gap_ceiling() {
        let cache = cache(true, 0);
        cache.insert("k1", payload(3));
        let lookup = cache.lookup("k1", "q");
        assert_eq!(lookup.mode, SemCacheMode::GuardRevalidate);
        assert!(lookup.payload.is_none());
        // The entry is gone; the next lookup is a plain miss.
        assert_eq!(cache.lookup("k1", "q").mode, SemCacheMode::Miss);
    }

    #[test]
    fn test_guard_disabled_with_negative_ceiling() {
        let cache = cache(true, -1);
        cache.insert("k1", payload(100));
        assert_eq!(cache.lookup("k1", "q").mode, SemCacheMode::Exact);
    }

    #[test]
    fn test_ttl_expiry() {
        let time = Arc::new(AtomicU64::new(0));
        let clock = time.clone();
        let cache = SemanticCache::with_now_fn(
            true,
            10,
            10,
            -1,
            -1,
            Arc::new(NoopEmbeddingProvider),
            Arc::new(move || clock.load(Ordering::SeqCst)),
        );
        cache.insert("k1", payload(0));
        assert_eq!(cache.lookup("k1", "q").mode, SemCacheMode::Exact);

        time.store(10_001, Ordering::SeqCst);
        assert_eq!(cache.lookup("k1", "q").mode, SemCacheMode::Miss);
    }

    #[test]
    fn test_lru_cap() {
        let cache = SemanticCache::new(true, 1800, 2, -1, -1, Arc::new(NoopEmbeddingProvider));
        cache.insert("k1", payload(0));
        cache.insert("k2", payload(0));
        cache.lookup("k1", "q");
        cache.insert("k3", payload(0));

        assert_eq!(cache.lookup("k1", "q").mode, SemCacheMode::Exact);
        assert_eq!(cache.lookup("k2", "q").mode, SemCacheMode::Miss);
        assert_eq!(cache.lookup("k3", "q").mode, SemCacheMode::Exact);
    }

    #[test]
    fn test_invalidate_manual() {
        let cache = cache(true, -1);
        cache.insert("k1", payload(0));
        let mut other = payload(0);
        other.manual_id = "legal".into();
        cache.insert("k2", other);

        cache.invalidate_manual("hr");
        assert_eq!(cache.lookup("k1", "q").mode, SemCacheMode::Miss);
        assert_eq!(cache.lookup("k2", "q").mode, SemCacheMode::Exact);
    }

    #[test]
    fn test_provider_from_name() {
        assert!(embedding_provider_from_name("none").is_ok());
        assert!(embedding_provider_from_name("NONE").is_ok());
        assert!(embedding_provider_from_name("").is_ok());
        assert!(embedding_provider_from_name("openai").is_err());
    }
}
