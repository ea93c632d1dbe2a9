//! Candidate-producing gates
//!
//! This module provides:
//! - `Candidate`: the scored unit flowing through the pipeline
//! - `run_g0`: the baseline gate over all query tokens
//! - `run_required_gate`: DF guard, single- and two-term modes, pass fusion
//!
//! Gate selection itself lives in the pipeline; this module only produces
//! rankings and their diagnostics.

use crate::fuser::{fuse_blend, Ranking};
use crate::index::SparseIndex;
use crate::normalize::normalize_text;
use crate::signals::{compute_signals, qualifies, QueryView};
use crate::tokenizer::tokenize;
use manualfind_core::{
    Config, DfFilterDecision, DfFilterReason, GateRunInfo, NodeId, SelectedGate, Signal, SignalSet,
};

// ============================================================================
// Candidate
// ============================================================================

/// One scored candidate inside the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Arena id of the node
    pub node_id: NodeId,
    /// Current score (mutated by diversity and exploration scaling)
    pub score: f32,
    /// Evidence markers
    pub signals: SignalSet,
    /// Query terms that matched
    pub matched_tokens: Vec<String>,
    /// Total term occurrences hit
    pub token_hits: u32,
    /// Unique query terms present / unique query terms
    pub match_coverage: f32,
    /// Short scoring note
    pub rank_explain: String,
}

/// Sort candidates by score descending with a deterministic node-id tie-break
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
}

// ============================================================================
// Baseline gate (g0)
// ============================================================================

/// Result of one baseline-gate run
#[derive(Debug, Clone)]
pub struct BaselineOutcome {
    /// Accepted candidates, best first
    pub candidates: Vec<Candidate>,
    /// Nodes actually scored
    pub scanned_nodes: u32,
    /// True when the scan hard cap stopped the pass early
    pub truncated: bool,
    /// Run diagnostics
    pub run: GateRunInfo,
}

/// Tokenized required terms, kept next to their raw form
#[derive(Debug, Clone)]
pub struct RequiredTermTokens {
    /// The term as received
    pub raw: String,
    /// Its normalized token sequence
    pub tokens: Vec<String>,
}

impl RequiredTermTokens {
    /// Tokenize one required term
    pub fn new(raw: &str) -> Self {
        let tokens = tokenize(&normalize_text(raw)).into_iter().map(|t| t.text).collect();
        RequiredTermTokens {
            raw: raw.to_string(),
            tokens,
        }
    }
}

/// Run the baseline gate: BM25 plus signal bonuses over every node
///
/// A node is accepted only when its signal set contains at least one
/// qualifying signal (`Exceptions` alone is not evidence).
pub fn run_g0(
    index: &SparseIndex,
    cfg: &Config,
    query: &QueryView,
    required: &[RequiredTermTokens],
    extra_exception_words: &[String],
) -> BaselineOutcome {
    let required_seqs: Vec<Vec<String>> = required.iter().map(|r| r.tokens.clone()).collect();
    let mut candidates: Vec<Candidate> = Vec::new();
    let total = index.total_docs();
    let scan_limit = (cfg.scan_hard_cap as u32).min(total);

    for raw_id in 0..scan_limit {
        let node = NodeId(raw_id);
        let parts = index.score_query(&query.unique, node, cfg);
        let node_signals = compute_signals(
            index,
            cfg,
            query,
            &required_seqs,
            extra_exception_words,
            node,
            &parts.matched_terms,
        );
        if !qualifies(&node_signals.signals) {
            continue;
        }
        let score = parts.score + node_signals.bonus;
        if score <= 0.0 {
            continue;
        }
        candidates.push(Candidate {
            node_id: node,
            score,
            signals: node_signals.signals,
            matched_tokens: parts.matched_terms,
            token_hits: parts.token_hits,
            match_coverage: parts.match_coverage,
            rank_explain: format!(
                "bm25={:.3} bonus={:.3} cov={:.2}",
                parts.score, node_signals.bonus, parts.match_coverage
            ),
        });
    }
    sort_candidates(&mut candidates);

    let truncated = scan_limit < total;
    let run = GateRunInfo {
        gate: SelectedGate::G0,
        pass: "all".to_string(),
        candidates: candidates.len() as u32,
    };
    BaselineOutcome {
        candidates,
        scanned_nodes: scan_limit,
        truncated,
        run,
    }
}

// ============================================================================
// Required-terms gate (g_req)
// ============================================================================

/// Minimum corpus size before the too-common DF guard applies
///
/// On a handful of nodes every term is "common"; DF ratios only carry
/// signal once the corpus is large enough.
pub const DF_GUARD_MIN_DOCS: u32 = 10;

/// Result of one required-gate run
#[derive(Debug, Clone)]
pub struct RequiredOutcome {
    /// Accepted candidates, best first
    pub candidates: Vec<Candidate>,
    /// DF-guard decisions, one per inspected term
    pub df_decisions: Vec<DfFilterDecision>,
    /// Terms that survived the guard
    pub kept_terms: Vec<String>,
    /// Candidate count of the strict AND pass (two-term mode)
    pub strict_candidates: u32,
    /// Run diagnostics, one per executed pass
    pub runs: Vec<GateRunInfo>,
}

/// Run the required-terms gate
///
/// Applies the DF guard, then the single-term boost or the three-pass
/// two-term fusion. Baseline candidates are passed in so per-node scores
/// and signals are shared instead of recomputed.
pub fn run_required_gate(
    index: &SparseIndex,
    cfg: &Config,
    query: &QueryView,
    required: &[RequiredTermTokens],
    baseline: &[Candidate],
) -> RequiredOutcome {
    let mut df_decisions: Vec<DfFilterDecision> = Vec::new();
    let mut kept: Vec<&RequiredTermTokens> = Vec::new();

    for term in required {
        let ratio = if index.total_docs() == 0 {
            0.0
        } else {
            index.phrase_doc_freq(&term.tokens) as f32 / index.total_docs() as f32
        };
        if index.total_docs() >= DF_GUARD_MIN_DOCS && ratio > cfg.required_term_df_too_common {
            df_decisions.push(DfFilterDecision {
                term: term.raw.clone(),
                df_ratio: ratio,
                dropped: true,
                reason: DfFilterReason::TooCommon,
            });
            continue;
        }
        if ratio < cfg.required_term_df_too_rare {
            df_decisions.push(DfFilterDecision {
                term: term.raw.clone(),
                df_ratio: ratio,
                dropped: false,
                reason: DfFilterReason::TooRare,
            });
        }
        kept.push(term);
    }

    let kept_terms: Vec<String> = kept.iter().map(|t| t.raw.clone()).collect();
    match kept.len() {
        0 => RequiredOutcome {
            candidates: Vec::new(),
            df_decisions,
            kept_terms,
            strict_candidates: 0,
            runs: Vec::new(),
        },
        1 => single_term_mode(index, cfg, kept[0], baseline, df_decisions, kept_terms),
        _ => two_term_mode(index, cfg, query, kept[0], kept[1], baseline, df_decisions, kept_terms),
    }
}

fn baseline_lookup(baseline: &[Candidate]) -> std::collections::HashMap<NodeId, &Candidate> {
    baseline.iter().map(|c| (c.node_id, c)).collect()
}

/// Candidate for a node the baseline gate did not accept
///
/// Required-term containment is itself evidence, so such nodes enter with
/// the boost as their whole score.
fn bare_candidate(node: NodeId, boost: f32, signal: Signal) -> Candidate {
    let mut signals = SignalSet::new();
    signals.insert(signal);
    Candidate {
        node_id: node,
        score: boost,
        signals,
        matched_tokens: Vec::new(),
        token_hits: 0,
        match_coverage: 0.0,
        rank_explain: format!("required idf={boost:.3}"),
    }
}

fn single_term_mode(
    index: &SparseIndex,
    cfg: &Config,
    term: &RequiredTermTokens,
    baseline: &[Candidate],
    df_decisions: Vec<DfFilterDecision>,
    kept_terms: Vec<String>,
) -> RequiredOutcome {
    let by_node = baseline_lookup(baseline);
    let boost = cfg.required_term_idf_weight * index.phrase_idf(&term.tokens);
    let mut candidates: Vec<Candidate> = Vec::new();

    for node in index.nodes_containing_phrase(&term.tokens) {
        let mut candidate = match by_node.get(&node) {
            Some(base) => (*base).clone(),
            None => bare_candidate(node, 0.0, Signal::RequiredTerm),
        };
        candidate.score += boost;
        candidate.signals.insert(Signal::RequiredTerm);
        candidate.rank_explain = format!("{} +req={boost:.3}", candidate.rank_explain);
        candidates.push(candidate);
    }
    sort_candidates(&mut candidates);

    let runs = vec![GateRunInfo {
        gate: SelectedGate::GReq,
        pass: format!("term:{}", term.raw),
        candidates: candidates.len() as u32,
    }];
    RequiredOutcome {
        strict_candidates: candidates.len() as u32,
        candidates,
        df_decisions,
        kept_terms,
        runs,
    }
}

#[allow(clippy::too_many_arguments)]
fn two_term_mode(
    index: &SparseIndex,
    cfg: &Config,
    _query: &QueryView,
    first: &RequiredTermTokens,
    second: &RequiredTermTokens,
    baseline: &[Candidate],
    df_decisions: Vec<DfFilterDecision>,
    kept_terms: Vec<String>,
) -> RequiredOutcome {
    let by_node = baseline_lookup(baseline);
    let boost_a = cfg.required_term_idf_weight * index.phrase_idf(&first.tokens);
    let boost_b = cfg.required_term_idf_weight * index.phrase_idf(&second.tokens);

    let nodes_a = index.nodes_containing_phrase(&first.tokens);
    let nodes_b = index.nodes_containing_phrase(&second.tokens);
    let set_a: std::collections::BTreeSet<NodeId> = nodes_a.iter().copied().collect();
    let set_b: std::collections::BTreeSet<NodeId> = nodes_b.iter().copied().collect();
    let nodes_and: Vec<NodeId> = set_a.intersection(&set_b).copied().collect();

    let pass_ranking = |nodes: &[NodeId], boost: f32| -> Vec<(NodeId, f32)> {
        let mut items: Vec<(NodeId, f32)> = nodes
            .iter()
            .map(|node| {
                let base = by_node.get(node).map(|c| c.score).unwrap_or(0.0);
                (*node, base + boost)
            })
            .collect();
        items.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        items
    };

    let ranking_a = Ranking::new(format!("term:{}", first.raw), pass_ranking(&nodes_a, boost_a));
    let ranking_b = Ranking::new(format!("term:{}", second.raw), pass_ranking(&nodes_b, boost_b));
    let ranking_and = Ranking::new("and", pass_ranking(&nodes_and, boost_a + boost_b));

    let runs = vec![
        GateRunInfo {
            gate: SelectedGate::GReq,
            pass: ranking_a.label.clone(),
            candidates: ranking_a.items.len() as u32,
        },
        GateRunInfo {
            gate: SelectedGate::GReq,
            pass: ranking_b.label.clone(),
            candidates: ranking_b.items.len() as u32,
        },
        GateRunInfo {
            gate: SelectedGate::GReq,
            pass: "and".to_string(),
            candidates: ranking_and.items.len() as u32,
        },
    ];

    // Base ranking for the blend: the baseline gate restricted to nodes any
    // pass produced.
    let mut base_items: Vec<(NodeId, f32)> = set_a
        .union(&set_b)
        .filter_map(|node| by_node.get(node).map(|c| (*node, c.score)))
        .collect();
    base_items.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    let base = Ranking::new("g0", base_items);

    let fused = fuse_blend(
        &base,
        &[ranking_a, ranking_b, ranking_and.clone()],
        cfg.query_decomp_rrf_k,
        cfg.query_decomp_base_weight,
    );

    let and_set: std::collections::BTreeSet<NodeId> = nodes_and.iter().copied().collect();
    let mut candidates: Vec<Candidate> = Vec::new();
    for node in fused {
        let mut candidate = match by_node.get(&node.node_id) {
            Some(base) => (*base).clone(),
            None => bare_candidate(node.node_id, 0.0, Signal::RequiredTerm),
        };
        candidate.score = node.blended;

        let in_and = and_set.contains(&node.node_id);
        let required_passes = node
            .sources
            .iter()
            .filter(|label| label.as_str() != "g0")
            .count();
        if in_and {
            candidate.signals.insert(Signal::RequiredTermAnd);
        }
        if required_passes > 1 {
            candidate.signals.insert(Signal::RequiredTermsRrf);
        }
        if required_passes <= 1 && !in_and {
            candidate.signals.insert(Signal::RequiredTerm);
        }
        if node.sources.iter().any(|label| label == "g0") && required_passes > 0 {
            candidate.signals.insert(Signal::GateRrf);
        }
        candidate.rank_explain = format!(
            "rrf base={:.2} rrf={:.2} via {}",
            node.base_norm,
            node.rrf_norm,
            node.sources.join("+")
        );
        candidates.push(candidate);
    }

    RequiredOutcome {
        strict_candidates: nodes_and.len() as u32,
        candidates,
        df_decisions,
        kept_terms,
        runs,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use manualfind_store::ManualSnapshot;
    use std::fs;
    use std::path::Path;

    fn setup(dir: &Path) {
        fs::create_dir_all(dir.join("hr")).unwrap();
        fs::write(dir.join("hr/a.md"), "# 休暇制度\n休暇の概要説明\n").unwrap();
        fs::write(dir.join("hr/b.md"), "# 手当\n通勤手当の説明\n").unwrap();
        fs::write(
            dir.join("hr/c.md"),
            "# 休暇と手当\n休暇中の手当の扱いについて\n",
        )
        .unwrap();
    }

    fn build(dir: &Path) -> (ManualSnapshot, SparseIndex) {
        let snapshot = ManualSnapshot::build(dir, "hr").unwrap();
        let index = SparseIndex::build(&snapshot);
        (snapshot, index)
    }

    /// Twelve single-node files; 休暇 appears in ten of them, 手当 in two.
    fn setup_large(dir: &Path) {
        fs::create_dir_all(dir.join("big")).unwrap();
        for i in 0..10 {
            fs::write(
                dir.join(format!("big/leave_{i:02}.md")),
                format!("# 規程{i}\n休暇の条文その{i}\n"),
            )
            .unwrap();
        }
        fs::write(dir.join("big/allow_a.md"), "# 手当A\n通勤手当の条文\n").unwrap();
        fs::write(dir.join("big/allow_b.md"), "# 手当B\n住宅手当の条文\n").unwrap();
    }

    fn build_large(dir: &Path) -> (ManualSnapshot, SparseIndex) {
        let snapshot = ManualSnapshot::build(dir, "big").unwrap();
        let index = SparseIndex::build(&snapshot);
        (snapshot, index)
    }

    fn required(terms: &[&str]) -> Vec<RequiredTermTokens> {
        terms.iter().map(|t| RequiredTermTokens::new(t)).collect()
    }

    #[test]
    fn test_g0_accepts_matching_nodes() {
        let dir = tempfile::tempdir().unwrap();
        setup(dir.path());
        let (_snapshot, index) = build(dir.path());
        let cfg = Config::default();
        let query = QueryView::new("休暇");

        let outcome = run_g0(&index, &cfg, &query, &[], &[]);
        assert!(outcome.candidates.len() >= 2);
        assert!(!outcome.truncated);
        assert_eq!(outcome.run.pass, "all");
        for candidate in &outcome.candidates {
            assert!(candidate.signals.contains(&Signal::Exact));
            assert!(candidate.score > 0.0);
        }
    }

    #[test]
    fn test_g0_scan_hard_cap() {
        let dir = tempfile::tempdir().unwrap();
        setup(dir.path());
        let (_snapshot, index) = build(dir.path());
        let mut cfg = Config::default();
        cfg.scan_hard_cap = 1;
        let query = QueryView::new("休暇");

        let outcome = run_g0(&index, &cfg, &query, &[], &[]);
        assert!(outcome.truncated);
        assert_eq!(outcome.scanned_nodes, 1);
    }

    #[test]
    fn test_single_required_term() {
        let dir = tempfile::tempdir().unwrap();
        setup(dir.path());
        let (snapshot, index) = build(dir.path());
        let cfg = Config::default();
        let query = QueryView::new("休暇の説明");

        let baseline = run_g0(&index, &cfg, &query, &required(&["休暇"]), &[]);
        let outcome = run_required_gate(
            &index,
            &cfg,
            &query,
            &required(&["休暇"]),
            &baseline.candidates,
        );

        assert!(!outcome.candidates.is_empty());
        assert_eq!(outcome.kept_terms, vec!["休暇"]);
        for candidate in &outcome.candidates {
            assert!(candidate.signals.contains(&Signal::RequiredTerm));
            assert!(snapshot.text(candidate.node_id).contains("休暇"));
        }
    }

    #[test]
    fn test_two_terms_and_node_ranks_first() {
        let dir = tempfile::tempdir().unwrap();
        setup(dir.path());
        let (snapshot, index) = build(dir.path());
        let cfg = Config::default();
        let query = QueryView::new("休暇 手当");
        let req = required(&["休暇", "手当"]);

        let baseline = run_g0(&index, &cfg, &query, &req, &[]);
        let outcome = run_required_gate(&index, &cfg, &query, &req, &baseline.candidates);

        assert!(!outcome.candidates.is_empty());
        let top = &outcome.candidates[0];
        let text = snapshot.text(top.node_id);
        assert!(text.contains("休暇") && text.contains("手当"));
        assert!(
            top.signals.contains(&Signal::RequiredTermAnd)
                || top.signals.contains(&Signal::RequiredTermsRrf)
        );
        assert_eq!(outcome.strict_candidates, 1);
        assert_eq!(outcome.runs.len(), 3);
    }

    #[test]
    fn test_df_guard_drops_too_common() {
        let dir = tempfile::tempdir().unwrap();
        setup_large(dir.path());
        let (_snapshot, index) = build_large(dir.path());
        let cfg = Config::default();
        // 休暇 appears in 10 of 12 nodes (> 0.80).
        let query = QueryView::new("休暇 手当");
        let req = required(&["休暇", "手当"]);

        let baseline = run_g0(&index, &cfg, &query, &req, &[]);
        let outcome = run_required_gate(&index, &cfg, &query, &req, &baseline.candidates);

        let dropped: Vec<&DfFilterDecision> =
            outcome.df_decisions.iter().filter(|d| d.dropped).collect();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].term, "休暇");
        assert_eq!(dropped[0].reason, DfFilterReason::TooCommon);
        // The effective search behaves as if the term were removed.
        assert_eq!(outcome.kept_terms, vec!["手当"]);
    }

    #[test]
    fn test_df_guard_skipped_on_tiny_corpus() {
        let dir = tempfile::tempdir().unwrap();
        setup(dir.path());
        let (_snapshot, index) = build(dir.path());
        let mut cfg = Config::default();
        cfg.required_term_df_too_common = 0.5;
        let query = QueryView::new("休暇");
        let req = required(&["休暇"]);

        let baseline = run_g0(&index, &cfg, &query, &req, &[]);
        let outcome = run_required_gate(&index, &cfg, &query, &req, &baseline.candidates);
        assert!(outcome.df_decisions.iter().all(|d| !d.dropped));
        assert_eq!(outcome.kept_terms, vec!["休暇"]);
    }

    #[test]
    fn test_df_guard_marks_too_rare_but_keeps() {
        let dir = tempfile::tempdir().unwrap();
        setup(dir.path());
        let (_snapshot, index) = build(dir.path());
        let mut cfg = Config::default();
        cfg.required_term_df_too_rare = 0.5;
        let query = QueryView::new("通勤");
        let req = required(&["通勤"]);

        let baseline = run_g0(&index, &cfg, &query, &req, &[]);
        let outcome = run_required_gate(&index, &cfg, &query, &req, &baseline.candidates);

        assert_eq!(outcome.df_decisions.len(), 1);
        assert!(!outcome.df_decisions[0].dropped);
        assert_eq!(outcome.df_decisions[0].reason, DfFilterReason::TooRare);
        assert_eq!(outcome.kept_terms, vec!["通勤"]);
        assert!(!outcome.candidates.is_empty());
    }

    #[test]
    fn test_all_terms_dropped_yields_empty_gate() {
        let dir = tempfile::tempdir().unwrap();
        setup_large(dir.path());
        let (_snapshot, index) = build_large(dir.path());
        let mut cfg = Config::default();
        cfg.required_term_df_too_common = 0.0;
        let query = QueryView::new("休暇");
        let req = required(&["休暇"]);

        let baseline = run_g0(&index, &cfg, &query, &req, &[]);
        let outcome = run_required_gate(&index, &cfg, &query, &req, &baseline.candidates);
        assert!(outcome.candidates.is_empty());
        assert!(outcome.kept_terms.is_empty());
    }

    #[test]
    fn test_missing_required_term_yields_empty_gate() {
        let dir = tempfile::tempdir().unwrap();
        setup(dir.path());
        let (_snapshot, index) = build(dir.path());
        let cfg = Config::default();
        let query = QueryView::new("休暇");
        let req = required(&["存在しない語句"]);

        let baseline = run_g0(&index, &cfg, &query, &req, &[]);
        let outcome = run_required_gate(&index, &cfg, &query, &req, &baseline.candidates);
        assert!(outcome.candidates.is_empty());
        assert!(!outcome.kept_terms.is_empty());
    }
}
