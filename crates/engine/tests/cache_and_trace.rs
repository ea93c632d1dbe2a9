//! Semantic cache and trace store behavior through the engine surface

use manualfind_cache::NowFn;
use manualfind_core::{Config, ErrorCode, HitsKind, SemCacheMode};
use manualfind_engine::{Engine, FindParams, HitsParams, IdGen};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn write_manual(root: &Path) {
    fs::create_dir_all(root.join("hr")).unwrap();
    fs::write(
        root.join("hr/leave.md"),
        "# 年次有給休暇\n勤続年数に応じて休暇を付与する\n# 特別休暇\n慶弔時の休暇\n",
    )
    .unwrap();
    fs::write(root.join("hr/allowance.md"), "# 手当\n通勤手当の支給\n").unwrap();
}

fn engine_at(dir: &Path) -> Engine {
    let mut cfg = Config::default();
    cfg.manuals_root = dir.to_path_buf();
    cfg.adaptive_stats_path = dir.join(".system/adaptive_stats.jsonl");
    Engine::new(cfg).unwrap()
}

/// Engine with a hand-driven clock (epoch millis)
fn engine_with_clock(dir: &Path) -> (Engine, Arc<AtomicU64>) {
    let mut cfg = Config::default();
    cfg.manuals_root = dir.to_path_buf();
    cfg.adaptive_stats_path = dir.join(".system/adaptive_stats.jsonl");

    let time = Arc::new(AtomicU64::new(1_000));
    let clock = time.clone();
    let now_fn: NowFn = Arc::new(move || clock.load(Ordering::SeqCst));
    let counter = Arc::new(AtomicU64::new(0));
    let id_gen: IdGen = Arc::new(move || {
        format!("trace-{}", counter.fetch_add(1, Ordering::SeqCst))
    });
    (Engine::with_parts(cfg, now_fn, id_gen).unwrap(), time)
}

fn params() -> FindParams {
    FindParams::new("年次有給休暇の付与", "hr", vec!["休暇".into()])
}

// ============================================================================
// Scenario 4: cache hit, then fingerprint change
// ============================================================================

#[test]
fn cache_hit_then_fingerprint_change() {
    let dir = tempfile::tempdir().unwrap();
    write_manual(dir.path());
    let engine = engine_at(dir.path());

    let first = engine.find(&params()).unwrap();
    assert!(!first.applied.sem_cache_hit);
    assert_eq!(first.applied.sem_cache_mode, SemCacheMode::Miss);

    let second = engine.find(&params()).unwrap();
    assert!(second.applied.sem_cache_hit);
    assert_eq!(second.applied.sem_cache_mode, SemCacheMode::Exact);
    assert!(second.applied.latency_saved_ms.is_some());
    // A cache hit always gets a fresh trace id.
    assert_ne!(second.trace_id, first.trace_id);
    // The hit's payload is pageable under the new id.
    assert!(engine
        .hits(&HitsParams::new(&second.trace_id, HitsKind::Candidates))
        .is_ok());

    // Grow a file: the fingerprint moves and the cache goes cold.
    fs::write(
        dir.path().join("hr/allowance.md"),
        "# 手当\n通勤手当の支給\n追記された条文\n",
    )
    .unwrap();
    let third = engine.find(&params()).unwrap();
    assert!(!third.applied.sem_cache_hit);
    assert_eq!(third.applied.sem_cache_mode, SemCacheMode::Miss);
}

// ============================================================================
// Invariant 8: all three bypass triggers
// ============================================================================

#[test]
fn cache_bypass_on_use_cache_false() {
    let dir = tempfile::tempdir().unwrap();
    write_manual(dir.path());
    let engine = engine_at(dir.path());

    engine.find(&params()).unwrap();
    let mut bypassing = params();
    bypassing.use_cache = false;
    let response = engine.find(&bypassing).unwrap();
    assert_eq!(response.applied.sem_cache_mode, SemCacheMode::Bypass);
    assert!(!response.applied.sem_cache_hit);
}

#[test]
fn cache_bypass_on_include_claim_graph() {
    let dir = tempfile::tempdir().unwrap();
    write_manual(dir.path());
    let engine = engine_at(dir.path());

    engine.find(&params()).unwrap();
    let mut bypassing = params();
    bypassing.include_claim_graph = true;
    let response = engine.find(&bypassing).unwrap();
    assert_eq!(response.applied.sem_cache_mode, SemCacheMode::Bypass);
}

#[test]
fn cache_bypass_on_unscanned_replay() {
    let dir = tempfile::tempdir().unwrap();
    write_manual(dir.path());
    let engine = engine_at(dir.path());

    let first = engine.find(&params()).unwrap();
    let mut bypassing = params();
    bypassing.only_unscanned_from_trace_id = Some(first.trace_id.clone());
    let response = engine.find(&bypassing).unwrap();
    assert_eq!(response.applied.sem_cache_mode, SemCacheMode::Bypass);
}

// ============================================================================
// Claim graph gating
// ============================================================================

#[test]
fn claim_graph_disabled_returns_empty_collections() {
    let dir = tempfile::tempdir().unwrap();
    write_manual(dir.path());
    let engine = engine_at(dir.path());

    let mut with_graph = params();
    with_graph.include_claim_graph = true;
    let response = engine.find(&with_graph).unwrap();

    // Disabled by config: collections exist but are empty.
    for kind in [HitsKind::Claims, HitsKind::Evidences, HitsKind::Edges] {
        let page = engine
            .hits(&HitsParams::new(&response.trace_id, kind))
            .unwrap();
        assert_eq!(page.total, 0, "{kind:?} should be empty when disabled");
    }
}

#[test]
fn claim_graph_enabled_materializes_graph() {
    let dir = tempfile::tempdir().unwrap();
    write_manual(dir.path());
    let mut cfg = Config::default();
    cfg.manuals_root = dir.path().to_path_buf();
    cfg.adaptive_stats_path = dir.path().join(".system/adaptive_stats.jsonl");
    cfg.claim_graph_enabled = true;
    let engine = Engine::new(cfg).unwrap();

    let mut with_graph = params();
    with_graph.include_claim_graph = true;
    let response = engine.find(&with_graph).unwrap();

    let claims = engine
        .hits(&HitsParams::new(&response.trace_id, HitsKind::Claims))
        .unwrap();
    let edges = engine
        .hits(&HitsParams::new(&response.trace_id, HitsKind::Edges))
        .unwrap();
    assert!(claims.total > 0);
    assert_eq!(claims.total, edges.total);
}

// ============================================================================
// Scenario 6 / invariant 10: expired unscanned trace
// ============================================================================

#[test]
fn expired_unscanned_trace_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    write_manual(dir.path());
    let (engine, time) = engine_with_clock(dir.path());

    let first = engine.find(&params()).unwrap();

    // Jump past TRACE_TTL_SEC.
    time.fetch_add(1801 * 1000, Ordering::SeqCst);
    let mut replay = params();
    replay.only_unscanned_from_trace_id = Some(first.trace_id.clone());
    let err = engine.find(&replay).unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(err.details.unwrap()["reason"], "trace_expired_or_missing");
}

#[test]
fn unknown_trace_id_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    write_manual(dir.path());
    let engine = engine_at(dir.path());

    let mut replay = params();
    replay.only_unscanned_from_trace_id = Some("never-existed".into());
    let err = engine.find(&replay).unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

// ============================================================================
// hits over expired traces
// ============================================================================

#[test]
fn hits_on_expired_trace_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    write_manual(dir.path());
    let (engine, time) = engine_with_clock(dir.path());

    let first = engine.find(&params()).unwrap();
    assert!(engine
        .hits(&HitsParams::new(&first.trace_id, HitsKind::Candidates))
        .is_ok());

    time.fetch_add(1801 * 1000, Ordering::SeqCst);
    let err = engine
        .hits(&HitsParams::new(&first.trace_id, HitsKind::Candidates))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

// ============================================================================
// Cache TTL through the engine clock
// ============================================================================

#[test]
fn cache_entry_expires_by_ttl() {
    let dir = tempfile::tempdir().unwrap();
    write_manual(dir.path());
    let (engine, time) = engine_with_clock(dir.path());

    engine.find(&params()).unwrap();
    time.fetch_add(1801 * 1000, Ordering::SeqCst);
    let response = engine.find(&params()).unwrap();
    assert_eq!(response.applied.sem_cache_mode, SemCacheMode::Miss);
}

// ============================================================================
// invalidate
// ============================================================================

#[test]
fn invalidate_drops_cache_entries() {
    let dir = tempfile::tempdir().unwrap();
    write_manual(dir.path());
    let engine = engine_at(dir.path());

    engine.find(&params()).unwrap();
    engine.invalidate("hr").unwrap();
    let response = engine.find(&params()).unwrap();
    assert_eq!(response.applied.sem_cache_mode, SemCacheMode::Miss);
}

#[test]
fn invalidate_validates_manual_id() {
    let dir = tempfile::tempdir().unwrap();
    write_manual(dir.path());
    let engine = engine_at(dir.path());

    assert_eq!(
        engine.invalidate("").unwrap_err().code,
        ErrorCode::InvalidParameter
    );
    assert_eq!(
        engine.invalidate("manuals").unwrap_err().code,
        ErrorCode::InvalidParameter
    );
}

// ============================================================================
// Guard revalidation
// ============================================================================

#[test]
fn guard_revalidates_low_quality_cached_summary() {
    let dir = tempfile::tempdir().unwrap();
    write_manual(dir.path());
    let mut cfg = Config::default();
    cfg.manuals_root = dir.path().to_path_buf();
    cfg.adaptive_stats_path = dir.path().join(".system/adaptive_stats.jsonl");
    // Any cached summary with a gap is stale.
    cfg.sem_cache_max_summary_gap = 0;
    let engine = Engine::new(cfg).unwrap();

    // A query with one weak candidate produces gap_count = 1.
    let weak = FindParams::new("通勤手当", "hr", vec!["手当".into()]);
    let first = engine.find(&weak).unwrap();
    assert!(first.summary.gap_count > 0, "fixture should produce a gap");

    let second = engine.find(&weak).unwrap();
    assert!(!second.applied.sem_cache_hit);
    assert_eq!(
        second.applied.sem_cache_mode,
        SemCacheMode::GuardRevalidate
    );
}
