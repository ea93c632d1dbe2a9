//! Engine facade
//!
//! This module provides:
//! - `Engine`: configuration, index registry, trace store, semantic cache,
//!   and stats sink behind the `find` / `hits` / `invalidate` operations
//!
//! The engine owns the cache consultation rules: unscanned replay, claim
//! graph requests, `use_cache=false`, and the public compact path all
//! bypass the cache; a hit re-registers the stored payload under a fresh
//! trace id; inserts happen only at end-of-pipeline.

use crate::params::FindParams;
use crate::pipeline::{execute, next_actions_for, PipelineInputs};
use crate::response::{CompactFindResponse, FindResponse};
use manualfind_cache::{
    cache_key, embedding_provider_from_name, query_hash, AdaptiveStats, NowFn, SemanticCache,
    StatsRecord, TraceStore,
};
use manualfind_core::{
    ensure, Config, IntegrationStatus, Result, SemCacheMode, ToolError, TracePayload,
};
use manualfind_search::{normalize_text, IndexRegistry};
use manualfind_store::{manual_exists, manual_fingerprint, RESERVED_ROOT_ID};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Injectable trace-id generator
pub type IdGen = Arc<dyn Fn() -> String + Send + Sync>;

fn uuid_id_gen() -> IdGen {
    Arc::new(|| uuid::Uuid::new_v4().simple().to_string())
}

// ============================================================================
// Engine
// ============================================================================

/// The manual search core
pub struct Engine {
    cfg: Config,
    registry: IndexRegistry,
    traces: TraceStore,
    cache: SemanticCache,
    stats: AdaptiveStats,
    id_gen: IdGen,
    now_fn: NowFn,
}

impl Engine {
    /// Build an engine from configuration
    ///
    /// Fails when the configured embedding provider is unsupported.
    pub fn new(cfg: Config) -> Result<Self> {
        Self::with_parts(cfg, manualfind_cache::system_now(), uuid_id_gen())
    }

    /// Build an engine with an injected clock and id generator
    pub fn with_parts(cfg: Config, now_fn: NowFn, id_gen: IdGen) -> Result<Self> {
        let provider = embedding_provider_from_name(&cfg.sem_cache_embedding_provider)?;
        let traces = TraceStore::with_now_fn(cfg.trace_max_keep, cfg.trace_ttl_sec, now_fn.clone());
        let cache = SemanticCache::with_now_fn(
            cfg.sem_cache_enabled,
            cfg.sem_cache_ttl_sec,
            cfg.sem_cache_max_keep,
            cfg.sem_cache_max_summary_gap,
            cfg.sem_cache_max_summary_conflict,
            provider,
            now_fn.clone(),
        );
        let stats = AdaptiveStats::new(cfg.adaptive_stats_path.clone());
        Ok(Engine {
            registry: IndexRegistry::new(),
            traces,
            cache,
            stats,
            id_gen,
            now_fn,
            cfg,
        })
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The trace store (paging lives in `hits`)
    pub(crate) fn traces(&self) -> &TraceStore {
        &self.traces
    }

    /// Block until queued stats records reached the file
    pub fn flush_stats(&self) {
        self.stats.flush();
    }

    // ========================================================================
    // find
    // ========================================================================

    /// Run one query, non-compact shape
    pub fn find(&self, params: &FindParams) -> Result<FindResponse> {
        let payload = self.find_payload(params, false)?;
        let next_actions = next_actions_for(&payload, &params.query);
        Ok(FindResponse {
            trace_id: payload.trace_id.clone(),
            applied: payload.applied,
            summary: payload.summary,
            next_actions,
        })
    }

    /// Run one query, compact public shape
    ///
    /// The compact path always bypasses the cache and returns
    /// `next_actions = []`.
    pub fn find_compact(&self, params: &FindParams) -> Result<CompactFindResponse> {
        let payload = self.find_payload(params, true)?;
        let inline_hits = params.inline_hits_limit.map(|limit| {
            payload
                .integrated_top
                .iter()
                .take(limit)
                .cloned()
                .collect::<Vec<_>>()
        });
        let failure_reason = (payload.summary.integration_status == IntegrationStatus::Blocked)
            .then(|| {
                payload
                    .applied
                    .cutoff_reason
                    .map(|r| r.as_str().to_string())
                    .unwrap_or_else(|| "no_candidates".to_string())
            });
        Ok(CompactFindResponse {
            trace_id: payload.trace_id.clone(),
            candidates: payload.summary.candidates,
            status: payload.summary.integration_status,
            failure_reason,
            inline_hits,
            next_actions: Vec::new(),
        })
    }

    fn find_payload(&self, params: &FindParams, compact: bool) -> Result<TracePayload> {
        params.validate()?;
        ensure(
            manual_exists(&self.cfg.manuals_root, &params.manual_id),
            ToolError::not_found("manual_id not found").with_details(serde_json::json!({
                "manual_id": params.manual_id,
                "reason": "manual_unknown",
            })),
        )?;

        let fingerprint = manual_fingerprint(&self.cfg.manuals_root, &params.manual_id)?;
        let normalized_query = normalize_text(&params.query);
        let (candidate_low_threshold, file_bias_threshold) = self.stats.thresholds(
            self.cfg.adaptive_candidate_low_base,
            self.cfg.adaptive_file_bias_base,
            self.cfg.adaptive_tuning,
            (self.now_fn)(),
        );

        // Unscanned replay: an expired trace is a hard not_found, never a
        // silent full rescan.
        let allowed_paths: Option<HashSet<String>> = match &params.only_unscanned_from_trace_id {
            Some(trace_id) => {
                let trace = self.traces.get(trace_id).ok_or_else(|| {
                    ToolError::not_found("trace_id not found").with_details(serde_json::json!({
                        "trace_id": trace_id,
                        "reason": "trace_expired_or_missing",
                    }))
                })?;
                Some(
                    trace
                        .unscanned
                        .iter()
                        .filter(|item| item.manual_id == params.manual_id)
                        .map(|item| item.path.clone())
                        .collect(),
                )
            }
            None => None,
        };

        let bypass = compact
            || params.only_unscanned_from_trace_id.is_some()
            || params.include_claim_graph
            || !params.use_cache;
        let scope_bits = format!("{}|expand={}", params.manual_id, params.expand_scope);
        let key = cache_key(
            &fingerprint,
            &normalized_query,
            &params.required_terms,
            &params.budget.key_bits(),
            &scope_bits,
        );

        let mut pipeline_mode = SemCacheMode::Miss;
        if bypass {
            pipeline_mode = SemCacheMode::Bypass;
        } else {
            let lookup = self.cache.lookup(&key, &normalized_query);
            match lookup.mode {
                SemCacheMode::Exact => {
                    if let Some(mut payload) = lookup.payload {
                        let latency_saved = payload.source_latency_ms;
                        payload.trace_id = (self.id_gen)();
                        payload.applied.sem_cache_hit = true;
                        payload.applied.sem_cache_mode = SemCacheMode::Exact;
                        payload.applied.sem_cache_score = lookup.score;
                        payload.applied.latency_saved_ms = Some(latency_saved);
                        self.traces.insert(payload.clone());
                        self.record_stats(
                            params,
                            &payload,
                            Some(latency_saved),
                            candidate_low_threshold,
                            file_bias_threshold,
                        );
                        info!(trace_id = %payload.trace_id, "semantic cache hit");
                        return Ok(payload);
                    }
                }
                SemCacheMode::GuardRevalidate => pipeline_mode = SemCacheMode::GuardRevalidate,
                _ => {}
            }
        }

        let mut payload = execute(PipelineInputs {
            cfg: &self.cfg,
            registry: &self.registry,
            manuals_root: &self.cfg.manuals_root,
            params,
            fingerprint: &fingerprint,
            trace_id: (self.id_gen)(),
            candidate_low_threshold,
            file_bias_threshold,
            allowed_paths,
        })?;
        payload.applied.sem_cache_mode = pipeline_mode;

        // Both inserts happen only here, at end-of-pipeline.
        self.traces.insert(payload.clone());
        if !bypass {
            self.cache.insert(&key, payload.clone());
        }
        self.record_stats(params, &payload, None, candidate_low_threshold, file_bias_threshold);
        Ok(payload)
    }

    fn record_stats(
        &self,
        params: &FindParams,
        payload: &TracePayload,
        latency_saved: Option<u64>,
        low: u32,
        bias: f32,
    ) {
        let summary_chars = serde_json::to_string(&payload.summary)
            .map(|s| s.len())
            .unwrap_or(0);
        let est_tokens = ((params.query.len() + summary_chars + 3) / 4) as u64;
        let est_tokens_out = ((summary_chars + 3) / 4) as u64;
        let marginal_gain = (est_tokens_out > 0)
            .then(|| payload.summary.candidates as f32 / est_tokens_out as f32);
        self.stats.append(StatsRecord {
            ts: (self.now_fn)(),
            query_hash: query_hash(&params.query),
            scanned_files: payload.summary.scanned_files,
            candidates: payload.summary.candidates,
            sem_cache_hit: payload.applied.sem_cache_hit,
            sem_cache_mode: payload.applied.sem_cache_mode.as_str().to_string(),
            sem_cache_score: payload.applied.sem_cache_score,
            latency_saved_ms: latency_saved,
            scoring_mode: "lexical".to_string(),
            est_tokens,
            marginal_gain,
            cutoff_reason: payload
                .applied
                .cutoff_reason
                .map(|r| r.as_str().to_string()),
            candidate_low_threshold: low,
            file_bias_threshold: bias,
        });
    }

    // ========================================================================
    // invalidate
    // ========================================================================

    /// Drop the built index and cache entries of one manual
    pub fn invalidate(&self, manual_id: &str) -> Result<()> {
        ensure(
            !manual_id.trim().is_empty(),
            ToolError::invalid_parameter("manual_id is required"),
        )?;
        ensure(
            manual_id != RESERVED_ROOT_ID,
            ToolError::invalid_parameter("manual_id must not be the reserved root id"),
        )?;
        self.registry.invalidate(manual_id);
        self.cache.invalidate_manual(manual_id);
        info!(manual_id, "index and cache invalidated");
        Ok(())
    }
}
