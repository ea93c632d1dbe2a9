//! Process-wide configuration
//!
//! This module provides:
//! - `Config`: every tunable of the retrieval core, in one immutable value
//! - `Config::from_env`: environment loading with documented defaults
//!
//! The config is built once at startup and shared by reference thereafter.
//! Scoring weights live here exclusively; the algorithms must not embed
//! literal constants beyond the documented defaults.

use std::env;
use std::path::PathBuf;

// ============================================================================
// Env helpers
// ============================================================================

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(raw) => matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn env_path(name: &str, default: PathBuf) -> PathBuf {
    env::var(name).map(PathBuf::from).unwrap_or(default)
}

// ============================================================================
// Config
// ============================================================================

/// Immutable process-wide configuration
///
/// Grouped by subsystem. Every field has a documented default; see
/// [`Config::default`] for the canonical values.
#[derive(Debug, Clone)]
pub struct Config {
    // --- content roots ---
    /// Root directory containing one subdirectory per manual
    pub manuals_root: PathBuf,

    // --- trace store ---
    /// Maximum trace payloads kept (LRU by last access)
    pub trace_max_keep: usize,
    /// Trace time-to-live in seconds
    pub trace_ttl_sec: u64,

    // --- semantic cache ---
    /// Enable the semantic cache
    pub sem_cache_enabled: bool,
    /// Cache entry time-to-live in seconds
    pub sem_cache_ttl_sec: u64,
    /// Maximum cache entries kept (LRU)
    pub sem_cache_max_keep: usize,
    /// Embedding provider name; only `none` is supported
    pub sem_cache_embedding_provider: String,
    /// Guard ceiling on a cached summary's gap count (-1 disables)
    pub sem_cache_max_summary_gap: i64,
    /// Guard ceiling on a cached summary's conflict count (-1 disables)
    pub sem_cache_max_summary_conflict: i64,

    // --- sparse scoring ---
    /// Query-coverage multiplier applied to raw BM25
    pub sparse_query_coverage_weight: f32,
    /// Node-coverage multiplier applied after query coverage
    pub lexical_coverage_weight: f32,
    /// Length penalty weight: `w * ln(1 + chars / 4000)` is subtracted
    pub lexical_length_penalty_weight: f32,

    // --- lexical signals ---
    /// Bonus when every query token appears in order within a small window
    pub lexical_phrase_weight: f32,
    /// Bonus when a digit token co-occurs with a unit or particle neighbor
    pub lexical_number_context_bonus: f32,
    /// Bonus when the node title or first line matches the query head
    pub lexical_title_bonus: f32,
    /// Bonus when two required tokens fall within the near window
    pub lexical_proximity_bonus_near: f32,
    /// Bonus when two required tokens fall within the far window
    pub lexical_proximity_bonus_far: f32,
    /// Near proximity window, in token positions
    pub lexical_proximity_near_window: usize,
    /// Far proximity window, in token positions
    pub lexical_proximity_far_window: usize,

    // --- required terms ---
    /// DF guard: drop a required term above this document-frequency ratio
    pub required_term_df_too_common: f32,
    /// DF guard: mark (but keep) a required term below this ratio
    pub required_term_df_too_rare: f32,
    /// Lambda applied to `idf(t)` in single-required-term mode
    pub required_term_idf_weight: f32,

    // --- query decomposition ---
    /// Enable comparative query decomposition
    pub query_decomp_enabled: bool,
    /// Upper bound on emitted sub-queries
    pub query_decomp_max_sub_queries: usize,
    /// RRF smoothing constant for pass and sub-query fusion
    pub query_decomp_rrf_k: u32,
    /// Mix of the base ranking vs the RRF ranking in the blended score
    pub query_decomp_base_weight: f32,

    // --- pipeline caps ---
    /// Hard cap on nodes scanned per query
    pub scan_hard_cap: usize,
    /// Maximum candidates retained per file path
    pub per_file_candidate_cap: usize,
    /// Decay strength of the per-path diversity rerank
    pub diversity_decay_alpha: f32,
    /// Fraction of the result set reserved for exploration candidates
    pub exploration_ratio: f32,
    /// Score multiplier applied to injected exploration candidates
    pub exploration_score_scale: f32,
    /// Dynamic cutoff: tail dropped below `head_score * ratio`
    pub cutoff_score_ratio: f32,
    /// Dynamic cutoff: tail dropped below this match coverage
    pub cutoff_min_coverage: f32,

    // --- pseudo-relevance feedback ---
    /// Enable the optional PRF second pass
    pub prf_enabled: bool,
    /// Number of top nodes contributing PRF terms
    pub prf_top_k: usize,
    /// Number of distinctive terms taken per PRF pass
    pub prf_terms: usize,
    /// Weight of the PRF boost
    pub prf_weight: f32,

    // --- claim graph ---
    /// Materialize the diagnostic claim graph on request
    pub claim_graph_enabled: bool,

    // --- content access ---
    /// Hard cap on sections returned by a single read
    pub read_hard_max_sections: usize,
    /// Hard cap on characters returned by a single read
    pub read_hard_max_chars: usize,

    // --- adaptive stats ---
    /// JSON-Lines stats sink path
    pub adaptive_stats_path: PathBuf,
    /// Enable threshold feedback from the stats window
    pub adaptive_tuning: bool,
    /// Base low-candidate threshold before tuning
    pub adaptive_candidate_low_base: u32,
    /// Base file-bias threshold before tuning
    pub adaptive_file_bias_base: f32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            manuals_root: PathBuf::from("./manuals"),
            trace_max_keep: 100,
            trace_ttl_sec: 1800,
            sem_cache_enabled: true,
            sem_cache_ttl_sec: 1800,
            sem_cache_max_keep: 500,
            sem_cache_embedding_provider: "none".to_string(),
            sem_cache_max_summary_gap: -1,
            sem_cache_max_summary_conflict: -1,
            sparse_query_coverage_weight: 0.35,
            lexical_coverage_weight: 0.50,
            lexical_length_penalty_weight: 0.20,
            lexical_phrase_weight: 0.50,
            lexical_number_context_bonus: 0.80,
            lexical_title_bonus: 0.60,
            lexical_proximity_bonus_near: 1.00,
            lexical_proximity_bonus_far: 0.50,
            lexical_proximity_near_window: 8,
            lexical_proximity_far_window: 24,
            required_term_df_too_common: 0.80,
            required_term_df_too_rare: 0.002,
            required_term_idf_weight: 1.0,
            query_decomp_enabled: true,
            query_decomp_max_sub_queries: 3,
            query_decomp_rrf_k: 60,
            query_decomp_base_weight: 0.30,
            scan_hard_cap: 5000,
            per_file_candidate_cap: 8,
            diversity_decay_alpha: 0.50,
            exploration_ratio: 0.20,
            exploration_score_scale: 0.25,
            cutoff_score_ratio: 0.25,
            cutoff_min_coverage: 0.34,
            prf_enabled: false,
            prf_top_k: 5,
            prf_terms: 6,
            prf_weight: 0.30,
            claim_graph_enabled: false,
            read_hard_max_sections: 50,
            read_hard_max_chars: 20_000,
            adaptive_stats_path: PathBuf::from("./.system/adaptive_stats.jsonl"),
            adaptive_tuning: true,
            adaptive_candidate_low_base: 3,
            adaptive_file_bias_base: 0.80,
        }
    }
}

impl Config {
    /// Load configuration from the environment
    ///
    /// Unset or unparseable variables fall back to the defaults; loading
    /// never fails.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            manuals_root: env_path("MANUALS_ROOT", defaults.manuals_root),
            trace_max_keep: env_usize("TRACE_MAX_KEEP", defaults.trace_max_keep),
            trace_ttl_sec: env_u64("TRACE_TTL_SEC", defaults.trace_ttl_sec),
            sem_cache_enabled: env_bool("SEM_CACHE_ENABLED", defaults.sem_cache_enabled),
            sem_cache_ttl_sec: env_u64("SEM_CACHE_TTL_SEC", defaults.sem_cache_ttl_sec),
            sem_cache_max_keep: env_usize("SEM_CACHE_MAX_KEEP", defaults.sem_cache_max_keep),
            sem_cache_embedding_provider: env::var("SEM_CACHE_EMBEDDING_PROVIDER")
                .unwrap_or(defaults.sem_cache_embedding_provider),
            sem_cache_max_summary_gap: env_i64(
                "SEM_CACHE_MAX_SUMMARY_GAP",
                defaults.sem_cache_max_summary_gap,
            ),
            sem_cache_max_summary_conflict: env_i64(
                "SEM_CACHE_MAX_SUMMARY_CONFLICT",
                defaults.sem_cache_max_summary_conflict,
            ),
            sparse_query_coverage_weight: env_f32(
                "SPARSE_QUERY_COVERAGE_WEIGHT",
                defaults.sparse_query_coverage_weight,
            ),
            lexical_coverage_weight: env_f32(
                "LEXICAL_COVERAGE_WEIGHT",
                defaults.lexical_coverage_weight,
            ),
            lexical_length_penalty_weight: env_f32(
                "LEXICAL_LENGTH_PENALTY_WEIGHT",
                defaults.lexical_length_penalty_weight,
            ),
            lexical_phrase_weight: env_f32("LEXICAL_PHRASE_WEIGHT", defaults.lexical_phrase_weight),
            lexical_number_context_bonus: env_f32(
                "LEXICAL_NUMBER_CONTEXT_BONUS",
                defaults.lexical_number_context_bonus,
            ),
            lexical_title_bonus: env_f32("LEXICAL_TITLE_BONUS", defaults.lexical_title_bonus),
            lexical_proximity_bonus_near: env_f32(
                "LEXICAL_PROXIMITY_BONUS_NEAR",
                defaults.lexical_proximity_bonus_near,
            ),
            lexical_proximity_bonus_far: env_f32(
                "LEXICAL_PROXIMITY_BONUS_FAR",
                defaults.lexical_proximity_bonus_far,
            ),
            lexical_proximity_near_window: env_usize(
                "LEXICAL_PROXIMITY_NEAR_WINDOW",
                defaults.lexical_proximity_near_window,
            ),
            lexical_proximity_far_window: env_usize(
                "LEXICAL_PROXIMITY_FAR_WINDOW",
                defaults.lexical_proximity_far_window,
            ),
            required_term_df_too_common: env_f32(
                "REQUIRED_TERM_DF_TOO_COMMON",
                defaults.required_term_df_too_common,
            ),
            required_term_df_too_rare: env_f32(
                "REQUIRED_TERM_DF_TOO_RARE",
                defaults.required_term_df_too_rare,
            ),
            required_term_idf_weight: env_f32(
                "MANUAL_FIND_REQUIRED_TERM_IDF_WEIGHT",
                defaults.required_term_idf_weight,
            ),
            query_decomp_enabled: env_bool(
                "MANUAL_FIND_QUERY_DECOMP_ENABLED",
                defaults.query_decomp_enabled,
            ),
            query_decomp_max_sub_queries: env_usize(
                "MANUAL_FIND_QUERY_DECOMP_MAX_SUB_QUERIES",
                defaults.query_decomp_max_sub_queries,
            ),
            query_decomp_rrf_k: env_u64("MANUAL_FIND_QUERY_DECOMP_RRF_K", u64::from(defaults.query_decomp_rrf_k))
                as u32,
            query_decomp_base_weight: env_f32(
                "MANUAL_FIND_QUERY_DECOMP_BASE_WEIGHT",
                defaults.query_decomp_base_weight,
            ),
            scan_hard_cap: env_usize("MANUAL_FIND_SCAN_HARD_CAP", defaults.scan_hard_cap),
            per_file_candidate_cap: env_usize(
                "MANUAL_FIND_PER_FILE_CANDIDATE_CAP",
                defaults.per_file_candidate_cap,
            ),
            diversity_decay_alpha: env_f32(
                "MANUAL_FIND_DIVERSITY_DECAY_ALPHA",
                defaults.diversity_decay_alpha,
            ),
            exploration_ratio: env_f32("MANUAL_FIND_EXPLORATION_RATIO", defaults.exploration_ratio),
            exploration_score_scale: env_f32(
                "MANUAL_FIND_EXPLORATION_SCORE_SCALE",
                defaults.exploration_score_scale,
            ),
            cutoff_score_ratio: env_f32("MANUAL_FIND_CUTOFF_SCORE_RATIO", defaults.cutoff_score_ratio),
            cutoff_min_coverage: env_f32(
                "MANUAL_FIND_CUTOFF_MIN_COVERAGE",
                defaults.cutoff_min_coverage,
            ),
            prf_enabled: env_bool("MANUAL_FIND_PRF_ENABLED", defaults.prf_enabled),
            prf_top_k: env_usize("MANUAL_FIND_PRF_TOP_K", defaults.prf_top_k),
            prf_terms: env_usize("MANUAL_FIND_PRF_TERMS", defaults.prf_terms),
            prf_weight: env_f32("MANUAL_FIND_PRF_WEIGHT", defaults.prf_weight),
            claim_graph_enabled: env_bool("CLAIM_GRAPH_ENABLED", defaults.claim_graph_enabled),
            read_hard_max_sections: env_usize(
                "MANUAL_READ_HARD_MAX_SECTIONS",
                defaults.read_hard_max_sections,
            ),
            read_hard_max_chars: env_usize("MANUAL_READ_HARD_MAX_CHARS", defaults.read_hard_max_chars),
            adaptive_stats_path: env_path("ADAPTIVE_STATS_PATH", defaults.adaptive_stats_path),
            adaptive_tuning: env_bool("ADAPTIVE_TUNING", defaults.adaptive_tuning),
            adaptive_candidate_low_base: env_u64(
                "ADAPTIVE_CANDIDATE_LOW_BASE",
                u64::from(defaults.adaptive_candidate_low_base),
            ) as u32,
            adaptive_file_bias_base: env_f32(
                "ADAPTIVE_FILE_BIAS_BASE",
                defaults.adaptive_file_bias_base,
            ),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
