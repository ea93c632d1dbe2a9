//! Umbrella-crate smoke test: the re-exported surface is enough for the
//! whole find -> hits -> invalidate flow.

use manualfind::{Config, Engine, FindParams, HitsParams};
use manualfind_core::HitsKind;
use std::fs;

#[test]
fn end_to_end_through_public_surface() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("hr")).unwrap();
    fs::write(
        dir.path().join("hr/leave.md"),
        "# 年次有給休暇\n勤続年数に応じて休暇を付与する\n",
    )
    .unwrap();

    let mut cfg = Config::default();
    cfg.manuals_root = dir.path().to_path_buf();
    cfg.adaptive_stats_path = dir.path().join(".system/adaptive_stats.jsonl");
    let engine = Engine::new(cfg).unwrap();

    let params = FindParams::new("年次有給休暇の付与日数", "hr", vec!["休暇".into()]);
    let found = engine.find(&params).unwrap();
    assert!(found.summary.candidates >= 1);

    let page = engine
        .hits(&HitsParams::new(&found.trace_id, HitsKind::IntegratedTop))
        .unwrap();
    assert_eq!(page.total as u32, found.summary.candidates.min(20));

    engine.invalidate("hr").unwrap();
    let again = engine.find(&params).unwrap();
    assert!(again.summary.candidates >= 1);
}
