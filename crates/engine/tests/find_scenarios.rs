//! End-to-end find scenarios over on-disk manual fixtures

use manualfind_core::{
    Config, CutoffReason, ErrorCode, HitsKind, RequiredEffectStatus, SelectedGate, Signal,
};
use manualfind_engine::{Engine, FindParams, HitsParams};
use std::fs;
use std::path::Path;

fn engine_at(dir: &Path) -> Engine {
    let mut cfg = Config::default();
    cfg.manuals_root = dir.to_path_buf();
    cfg.adaptive_stats_path = dir.join(".system/adaptive_stats.jsonl");
    Engine::new(cfg).unwrap()
}

fn engine_with(dir: &Path, tweak: impl FnOnce(&mut Config)) -> Engine {
    let mut cfg = Config::default();
    cfg.manuals_root = dir.to_path_buf();
    cfg.adaptive_stats_path = dir.join(".system/adaptive_stats.jsonl");
    tweak(&mut cfg);
    Engine::new(cfg).unwrap()
}

/// Scenario 1 fixture: one manual, one markdown node containing 休暇
fn write_single_node_manual(root: &Path) {
    fs::create_dir_all(root.join("hr")).unwrap();
    fs::write(
        root.join("hr/leave.md"),
        "# 年次有給休暇の付与\n勤続年数に応じて年次有給休暇を10日付与する\n",
    )
    .unwrap();
}

/// Scenario 2 fixture: N1 has 休暇, N2 has 手当, N3 has both
fn write_three_topic_manual(root: &Path) {
    fs::create_dir_all(root.join("hr")).unwrap();
    fs::write(root.join("hr/n1.md"), "# 休暇規程\n休暇の取得手続き\n").unwrap();
    fs::write(root.join("hr/n2.md"), "# 手当規程\n手当の支給基準\n").unwrap();
    fs::write(
        root.join("hr/n3.md"),
        "# 休暇中の手当\n休暇中における手当の扱い\n",
    )
    .unwrap();
}

/// A manual large enough for DF statistics and time budgets to matter
fn write_large_manual(root: &Path, files: usize) {
    fs::create_dir_all(root.join("big")).unwrap();
    for i in 0..files {
        let mut body = String::new();
        for j in 0..5 {
            body.push_str(&format!(
                "# 第{i}章 規程{j}\n共通の前置きとして規程を定める\n詳細な条文が続く {i}-{j}\n"
            ));
        }
        fs::write(root.join(format!("big/chapter_{i:03}.md")), body).unwrap();
    }
}

// ============================================================================
// Scenario 1: single required term, strict hit
// ============================================================================

#[test]
fn single_required_term_strict_hit() {
    let dir = tempfile::tempdir().unwrap();
    write_single_node_manual(dir.path());
    let engine = engine_at(dir.path());

    let params = FindParams::new("年次有給休暇の付与日数", "hr", vec!["休暇".into()]);
    let response = engine.find(&params).unwrap();

    assert_eq!(response.applied.selected_gate, SelectedGate::GReq);
    assert_eq!(
        response.applied.required_effect_status,
        RequiredEffectStatus::RequiredEffective
    );
    assert!(response.summary.candidates >= 1);
    assert!(response.applied.cutoff_reason.is_none());
    assert!(!response.applied.required_terms_relaxed);
}

// ============================================================================
// Scenario 2: two required terms with fusion
// ============================================================================

#[test]
fn two_required_terms_and_node_first() {
    let dir = tempfile::tempdir().unwrap();
    write_three_topic_manual(dir.path());
    let engine = engine_at(dir.path());

    let params = FindParams::new("休暇と手当", "hr", vec!["休暇".into(), "手当".into()]);
    let response = engine.find(&params).unwrap();
    assert_eq!(response.applied.selected_gate, SelectedGate::GReq);

    let page = engine
        .hits(&HitsParams::new(&response.trace_id, HitsKind::IntegratedTop))
        .unwrap();
    assert!(!page.items.is_empty());
    let top = &page.items[0];
    assert_eq!(top["ref"]["path"], "n3.md");
    let signals: Vec<String> = top["signals"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap().to_string())
        .collect();
    assert!(
        signals.contains(&Signal::RequiredTermAnd.as_str().to_string())
            || signals.contains(&Signal::RequiredTermsRrf.as_str().to_string())
    );
}

// ============================================================================
// Scenario 3: DF guard drops a too-common required term
// ============================================================================

#[test]
fn df_guard_drops_ubiquitous_term() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("big")).unwrap();
    // 規程 appears in every node; 罰則 in exactly one.
    for i in 0..12 {
        let extra = if i == 0 { "罰則の条文あり" } else { "通常の条文" };
        fs::write(
            dir.path().join(format!("big/r{i:02}.md")),
            format!("# 条文{i}\n規程の本文 {extra}\n"),
        )
        .unwrap();
    }
    let engine = engine_at(dir.path());

    let params = FindParams::new("規程と罰則", "big", vec!["規程".into(), "罰則".into()]);
    let response = engine.find(&params).unwrap();

    let dropped: Vec<_> = response
        .applied
        .required_terms_df_filtered
        .iter()
        .filter(|d| d.dropped)
        .collect();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].term, "規程");
    assert_eq!(
        response.applied.required_effect_status,
        RequiredEffectStatus::TermDroppedOrWeakened
    );

    // The effective search is driven by the surviving term.
    let page = engine
        .hits(&HitsParams::new(&response.trace_id, HitsKind::IntegratedTop))
        .unwrap();
    assert_eq!(page.items[0]["ref"]["path"], "r00.md");
}

// ============================================================================
// Scenario 5: time budget exhaustion never raises
// ============================================================================

#[test]
fn time_budget_exhaustion_returns_well_formed_payload() {
    let dir = tempfile::tempdir().unwrap();
    write_large_manual(dir.path(), 60);
    let engine = engine_at(dir.path());

    let mut params = FindParams::new("規程の条文", "big", vec!["規程".into()]);
    params.budget.time_ms = 1;
    let response = engine.find(&params).unwrap();

    assert_eq!(response.applied.cutoff_reason, Some(CutoffReason::TimeBudget));
    // Candidates may be empty but the payload is complete and pageable.
    let page = engine
        .hits(&HitsParams::new(&response.trace_id, HitsKind::Candidates))
        .unwrap();
    assert_eq!(page.total as u32, response.summary.candidates);
}

// ============================================================================
// Gate fallback
// ============================================================================

#[test]
fn unmatched_required_term_falls_back_to_baseline() {
    let dir = tempfile::tempdir().unwrap();
    write_three_topic_manual(dir.path());
    let engine = engine_at(dir.path());

    let params = FindParams::new("休暇の取得", "hr", vec!["存在しない語句".into()]);
    let response = engine.find(&params).unwrap();

    assert_eq!(response.applied.selected_gate, SelectedGate::G0);
    assert!(response.applied.required_terms_relaxed);
    assert_eq!(
        response.applied.required_terms_relax_reason.as_deref(),
        Some("zero_candidates_with_required_terms")
    );
    assert_eq!(
        response.applied.required_effect_status,
        RequiredEffectStatus::RequiredFallback
    );
    assert!(response.summary.candidates >= 1);
}

// ============================================================================
// Query decomposition
// ============================================================================

#[test]
fn comparative_query_decomposes_and_fuses() {
    let dir = tempfile::tempdir().unwrap();
    write_three_topic_manual(dir.path());
    let engine = engine_at(dir.path());

    let params = FindParams::new("休暇と手当の違い", "hr", vec!["休暇".into()]);
    let response = engine.find(&params).unwrap();

    assert!(response.applied.query_decomposed);
    assert_eq!(response.applied.sub_queries, vec!["休暇", "手当"]);

    let page = engine
        .hits(&HitsParams::new(&response.trace_id, HitsKind::FusionDebug))
        .unwrap();
    assert!(page.total > 0);
}

#[test]
fn decomposition_disabled_by_config() {
    let dir = tempfile::tempdir().unwrap();
    write_three_topic_manual(dir.path());
    let engine = engine_with(dir.path(), |cfg| cfg.query_decomp_enabled = false);

    let params = FindParams::new("休暇と手当の違い", "hr", vec!["休暇".into()]);
    let response = engine.find(&params).unwrap();
    assert!(!response.applied.query_decomposed);
    assert!(response.applied.sub_queries.is_empty());
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn identical_inputs_produce_identical_rankings() {
    let dir = tempfile::tempdir().unwrap();
    write_three_topic_manual(dir.path());
    let engine = engine_at(dir.path());

    let mut params = FindParams::new("休暇と手当", "hr", vec!["休暇".into(), "手当".into()]);
    params.use_cache = false;

    let first = engine.find(&params).unwrap();
    let second = engine.find(&params).unwrap();
    assert_ne!(first.trace_id, second.trace_id);

    let page_first = engine
        .hits(&HitsParams::new(&first.trace_id, HitsKind::Candidates))
        .unwrap();
    let page_second = engine
        .hits(&HitsParams::new(&second.trace_id, HitsKind::Candidates))
        .unwrap();
    assert_eq!(page_first.items, page_second.items);
}

// ============================================================================
// Summary / hits consistency (gap and conflict counts)
// ============================================================================

#[test]
fn gap_and_conflict_counts_match_hits_totals() {
    let dir = tempfile::tempdir().unwrap();
    write_single_node_manual(dir.path());
    let engine = engine_at(dir.path());

    let params = FindParams::new("年次有給休暇", "hr", vec!["休暇".into()]);
    let response = engine.find(&params).unwrap();

    let gaps = engine
        .hits(&HitsParams::new(&response.trace_id, HitsKind::Gaps))
        .unwrap();
    let conflicts = engine
        .hits(&HitsParams::new(&response.trace_id, HitsKind::Conflicts))
        .unwrap();
    assert_eq!(gaps.total as u32, response.summary.gap_count);
    assert_eq!(conflicts.total as u32, response.summary.conflict_count);
}

// ============================================================================
// Compact surface
// ============================================================================

#[test]
fn compact_response_contract() {
    let dir = tempfile::tempdir().unwrap();
    write_three_topic_manual(dir.path());
    let engine = engine_at(dir.path());

    let mut params = FindParams::new("休暇", "hr", vec!["休暇".into()]);
    params.inline_hits_limit = Some(3);
    let compact = engine.find_compact(&params).unwrap();

    assert!(compact.next_actions.is_empty());
    let inline = compact.inline_hits.clone().unwrap();
    assert!(inline.len() <= 3);

    // Inline hits carry exactly what integrated_top paging would produce.
    let page = engine
        .hits(
            &HitsParams::new(&compact.trace_id, HitsKind::IntegratedTop).with_page(0, 3),
        )
        .unwrap();
    let inline_values: Vec<serde_json::Value> = inline
        .iter()
        .map(|item| serde_json::to_value(item).unwrap())
        .collect();
    assert_eq!(inline_values, page.items);
}

#[test]
fn compact_blocked_result_reports_failure_reason() {
    let dir = tempfile::tempdir().unwrap();
    write_single_node_manual(dir.path());
    let engine = engine_at(dir.path());

    let params = FindParams::new("絶対に一致しない別分野の語", "hr", vec!["未登場語".into()]);
    let compact = engine.find_compact(&params).unwrap();
    assert_eq!(compact.candidates, 0);
    assert!(compact.failure_reason.is_some());
}

// ============================================================================
// Validation at the engine boundary
// ============================================================================

#[test]
fn unknown_manual_is_not_found_with_reason() {
    let dir = tempfile::tempdir().unwrap();
    write_single_node_manual(dir.path());
    let engine = engine_at(dir.path());

    let params = FindParams::new("休暇", "ghost", vec!["休暇".into()]);
    let err = engine.find(&params).unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(err.details.unwrap()["reason"], "manual_unknown");
}

#[test]
fn reserved_root_manual_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_single_node_manual(dir.path());
    let engine = engine_at(dir.path());

    let params = FindParams::new("休暇", "manuals", vec!["休暇".into()]);
    let err = engine.find(&params).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidParameter);
}

#[test]
fn required_terms_cardinality_is_enforced() {
    let dir = tempfile::tempdir().unwrap();
    write_single_node_manual(dir.path());
    let engine = engine_at(dir.path());

    let params = FindParams::new("休暇", "hr", vec![]);
    assert_eq!(
        engine.find(&params).unwrap_err().code,
        ErrorCode::InvalidParameter
    );

    let params = FindParams::new("休暇", "hr", vec!["a".into(), "b".into(), "c".into()]);
    assert_eq!(
        engine.find(&params).unwrap_err().code,
        ErrorCode::InvalidParameter
    );
}
