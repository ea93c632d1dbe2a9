//! The find pipeline
//!
//! This module provides:
//! - `execute`: gates -> decomposition -> fusion -> PRF -> diversity ->
//!   cutoff -> exploration -> summary, producing one `TracePayload`
//!
//! Cache consultation and persistence happen in the engine facade; this
//! module is pure computation over one manual snapshot. The time budget is
//! enforced cooperatively between phases: an exceeded deadline skips the
//! remaining optional phases and records `cutoff_reason=time_budget`, but
//! the payload is always well-formed.

use crate::params::FindParams;
use crate::summary::{build_summary, plan_next_actions, SummaryInputs};
use manualfind_core::{
    AppliedDiagnostics, CandidateItem, ClaimEdge, ClaimItem, Config, CutoffReason, EvidenceItem,
    FusionDebugInfo, GateRunInfo, NodeId, RequiredEffectStatus, Result, SelectedGate, SemCacheMode,
    Signal, TracePayload, UnscannedItem,
};
use manualfind_search::{
    apply_cutoff, apply_path_decay, decompose_query, fuse_blend, inject_exploration, prf_boosts,
    prf_terms, run_g0, run_required_gate, sort_candidates, Candidate, IndexRegistry, QueryView,
    Ranking, RequiredTermTokens,
};
use manualfind_store::ManualSnapshot;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

/// Candidates surfaced in `integrated_top`
const INTEGRATED_TOP_LIMIT: usize = 20;
/// Fusion diagnostics kept per trace
const FUSION_DEBUG_LIMIT: usize = 50;
/// Final top-k window inspected for required signals
const REQUIRED_EFFECT_TOP_K: usize = 10;

// ============================================================================
// PipelineInputs
// ============================================================================

/// Everything `execute` needs besides the stores
pub struct PipelineInputs<'a> {
    /// Process configuration
    pub cfg: &'a Config,
    /// Index registry (built-once per fingerprint)
    pub registry: &'a IndexRegistry,
    /// Manuals root directory
    pub manuals_root: &'a Path,
    /// Validated request
    pub params: &'a FindParams,
    /// Fingerprint computed at request entry
    pub fingerprint: &'a str,
    /// Trace id assigned to the produced payload
    pub trace_id: String,
    /// Low-candidate threshold in effect
    pub candidate_low_threshold: u32,
    /// File-bias threshold in effect
    pub file_bias_threshold: f32,
    /// Restrict candidates to these paths (unscanned replay)
    pub allowed_paths: Option<HashSet<String>>,
}

// ============================================================================
// execute
// ============================================================================

/// Run the full retrieval pipeline for one query
pub fn execute(inputs: PipelineInputs<'_>) -> Result<TracePayload> {
    let started = Instant::now();
    let deadline = started + Duration::from_millis(inputs.params.budget.time_ms);
    let cfg = inputs.cfg;
    let params = inputs.params;

    let entry = inputs
        .registry
        .get_or_build(inputs.manuals_root, &params.manual_id, inputs.fingerprint)?;
    let snapshot = entry.snapshot.as_ref();
    let index = entry.index.as_ref();

    let query = QueryView::new(&params.query);
    let required: Vec<RequiredTermTokens> = params
        .required_terms
        .iter()
        .map(|term| RequiredTermTokens::new(term))
        .collect();

    // --- gates ---
    let mut gate_runs: Vec<GateRunInfo> = Vec::new();
    let baseline = run_g0(index, cfg, &query, &required, &[]);
    gate_runs.push(baseline.run.clone());
    let scan_truncated = baseline.truncated;
    let mut time_exhausted = Instant::now() >= deadline;

    let req_outcome = run_required_gate(index, cfg, &query, &required, &baseline.candidates);
    gate_runs.extend(req_outcome.runs.iter().cloned());
    time_exhausted |= Instant::now() >= deadline;

    let required_gate_empty = req_outcome.candidates.is_empty();
    let (selected_gate, mut candidates) = if required_gate_empty {
        (SelectedGate::G0, baseline.candidates.clone())
    } else {
        (SelectedGate::GReq, req_outcome.candidates.clone())
    };
    debug!(
        gate = selected_gate.as_str(),
        candidates = candidates.len(),
        "gate selected"
    );

    // --- decomposition ---
    let mut query_decomposed = false;
    let mut sub_queries: Vec<String> = Vec::new();
    let mut fusion_debug: Vec<FusionDebugInfo> = Vec::new();
    if cfg.query_decomp_enabled && !time_exhausted {
        let decomposition = decompose_query(&params.query, cfg.query_decomp_max_sub_queries);
        if !decomposition.is_empty() {
            query_decomposed = true;
            sub_queries = decomposition.sub_queries.clone();

            let mut sub_rankings: Vec<Ranking> = Vec::new();
            for (idx, sub_query) in decomposition.sub_queries.iter().enumerate() {
                if Instant::now() >= deadline {
                    time_exhausted = true;
                    break;
                }
                let sub_view = QueryView::new(sub_query);
                if sub_view.is_empty() {
                    // Sub-query failures are tolerated.
                    continue;
                }
                let outcome = run_g0(index, cfg, &sub_view, &[], &[]);
                gate_runs.push(GateRunInfo {
                    gate: SelectedGate::G0,
                    pass: format!("sub:{idx}"),
                    candidates: outcome.candidates.len() as u32,
                });
                if !outcome.candidates.is_empty() {
                    sub_rankings.push(Ranking::new(
                        format!("sub:{idx}"),
                        outcome
                            .candidates
                            .iter()
                            .map(|c| (c.node_id, c.score))
                            .collect(),
                    ));
                }
            }

            // Fold only when at least one sub-query produced a ranking;
            // otherwise the undecomposed ranking stands.
            if !sub_rankings.is_empty() {
                let (fused_candidates, debug_rows) = fold_sub_rankings(
                    cfg,
                    &candidates,
                    &baseline.candidates,
                    &sub_rankings,
                    snapshot,
                );
                candidates = fused_candidates;
                fusion_debug = debug_rows;
            }
        }
    }

    // --- pseudo-relevance feedback ---
    if cfg.prf_enabled && !time_exhausted && !candidates.is_empty() {
        let ranking: Vec<(NodeId, f32)> =
            candidates.iter().map(|c| (c.node_id, c.score)).collect();
        let terms = prf_terms(index, cfg, &query, &ranking);
        let boosts = prf_boosts(index, cfg, &terms);
        for candidate in &mut candidates {
            if let Some(boost) = boosts.get(&candidate.node_id) {
                candidate.score += *boost;
                candidate.signals.insert(Signal::Prf);
            }
        }
        sort_candidates(&mut candidates);
    }

    // --- unscanned replay restriction ---
    if let Some(allowed) = &inputs.allowed_paths {
        candidates.retain(|c| allowed.contains(&snapshot.node(c.node_id).path));
    }

    // --- diversity ---
    let diversity = apply_path_decay(
        candidates,
        |node| snapshot.node(node).path.clone(),
        cfg.diversity_decay_alpha,
        cfg.per_file_candidate_cap,
    );
    time_exhausted |= Instant::now() >= deadline;

    // --- cutoff + exploration ---
    let mut cutoff = apply_cutoff(diversity.candidates, params.budget.max_candidates, cfg);
    let exploration_injected = if time_exhausted {
        0
    } else {
        inject_exploration(&mut cutoff, cfg)
    };

    let cutoff_reason = if time_exhausted {
        Some(CutoffReason::TimeBudget)
    } else if cutoff.reason.is_some() {
        cutoff.reason
    } else if diversity.dropped_by_file_cap > 0 || scan_truncated {
        Some(CutoffReason::StageCap)
    } else {
        None
    };

    // --- unscanned files ---
    let unscanned = if scan_truncated {
        unscanned_beyond(snapshot, baseline.scanned_nodes)
    } else {
        Vec::new()
    };

    // --- required-effect status ---
    let kept = cutoff.kept;
    let required_in_top = kept
        .iter()
        .take(REQUIRED_EFFECT_TOP_K)
        .filter(|c| has_required_signal(c))
        .count();
    let any_dropped = req_outcome.df_decisions.iter().any(|d| d.dropped);
    let required_effect_status = if any_dropped {
        RequiredEffectStatus::TermDroppedOrWeakened
    } else if required_gate_empty {
        RequiredEffectStatus::RequiredFallback
    } else if required_in_top == 0 {
        RequiredEffectStatus::RequiredNoneMatched
    } else {
        RequiredEffectStatus::RequiredEffective
    };
    let (required_terms_relaxed, required_terms_relax_reason, required_failure_reason) =
        if required_gate_empty {
            let failure = if req_outcome.kept_terms.is_empty() {
                "all_required_terms_df_filtered"
            } else {
                "required_terms_matched_no_nodes"
            };
            (
                true,
                Some("zero_candidates_with_required_terms".to_string()),
                Some(failure.to_string()),
            )
        } else {
            (false, None, None)
        };

    // --- wire items ---
    let candidate_items: Vec<CandidateItem> =
        kept.iter().map(|c| to_item(snapshot, c)).collect();
    let integrated_top: Vec<CandidateItem> = candidate_items
        .iter()
        .take(INTEGRATED_TOP_LIMIT)
        .cloned()
        .collect();

    let (summary, gaps) = build_summary(SummaryInputs {
        candidates: &candidate_items,
        scanned_files: snapshot.files.len() as u32,
        scanned_nodes: baseline.scanned_nodes,
        conflict_count: 0,
        candidate_low_threshold: inputs.candidate_low_threshold,
        file_bias_threshold: inputs.file_bias_threshold,
    });

    let (claims, evidences, edges) = if params.include_claim_graph && cfg.claim_graph_enabled {
        build_claim_graph(&integrated_top)
    } else {
        (Vec::new(), Vec::new(), Vec::new())
    };

    let applied = AppliedDiagnostics {
        selected_gate,
        sem_cache_hit: false,
        sem_cache_mode: SemCacheMode::Miss,
        sem_cache_score: None,
        latency_saved_ms: None,
        required_terms: params.required_terms.clone(),
        required_terms_df_filtered: req_outcome.df_decisions.clone(),
        required_terms_relaxed,
        required_terms_relax_reason,
        required_effect_status,
        required_failure_reason,
        cutoff_reason,
        query_decomposed,
        sub_queries,
        exploration_injected,
    };

    Ok(TracePayload {
        trace_id: inputs.trace_id,
        manual_id: params.manual_id.clone(),
        applied,
        candidates: candidate_items,
        integrated_top,
        unscanned,
        gaps,
        conflicts: Vec::new(),
        claims,
        evidences,
        edges,
        gate_runs,
        fusion_debug,
        summary,
        source_latency_ms: started.elapsed().as_millis() as u64,
        manuals_fingerprint: inputs.fingerprint.to_string(),
    })
}

/// Follow-up suggestions for the non-compact shape
pub fn next_actions_for(payload: &TracePayload, query: &str) -> Vec<crate::response::NextAction> {
    plan_next_actions(&payload.summary, query)
}

// ============================================================================
// Internals
// ============================================================================

fn has_required_signal(candidate: &Candidate) -> bool {
    candidate.signals.contains(&Signal::RequiredTerm)
        || candidate.signals.contains(&Signal::RequiredTermAnd)
        || candidate.signals.contains(&Signal::RequiredTermsRrf)
}

fn to_item(snapshot: &ManualSnapshot, candidate: &Candidate) -> CandidateItem {
    CandidateItem {
        node_ref: snapshot.node_ref(candidate.node_id),
        score: (candidate.score * 10_000.0).round() / 10_000.0,
        signals: candidate.signals.iter().copied().collect(),
        matched_tokens: candidate.matched_tokens.clone(),
        token_hits: (candidate.token_hits > 0).then_some(candidate.token_hits),
        match_coverage: candidate.match_coverage,
        rank_explain: (!candidate.rank_explain.is_empty())
            .then(|| candidate.rank_explain.clone()),
    }
}

/// Fold sub-query rankings into the gate ranking via RRF
fn fold_sub_rankings(
    cfg: &Config,
    gate_candidates: &[Candidate],
    baseline_candidates: &[Candidate],
    sub_rankings: &[Ranking],
    snapshot: &ManualSnapshot,
) -> (Vec<Candidate>, Vec<FusionDebugInfo>) {
    let base = Ranking::new(
        "base",
        gate_candidates.iter().map(|c| (c.node_id, c.score)).collect(),
    );
    let fused = fuse_blend(
        &base,
        sub_rankings,
        cfg.query_decomp_rrf_k,
        cfg.query_decomp_base_weight,
    );

    let gate_by_node: HashMap<NodeId, &Candidate> =
        gate_candidates.iter().map(|c| (c.node_id, c)).collect();
    let baseline_by_node: HashMap<NodeId, &Candidate> =
        baseline_candidates.iter().map(|c| (c.node_id, c)).collect();

    let mut out: Vec<Candidate> = Vec::with_capacity(fused.len());
    let mut debug_rows: Vec<FusionDebugInfo> = Vec::new();
    for node in &fused {
        let mut candidate = match gate_by_node
            .get(&node.node_id)
            .or_else(|| baseline_by_node.get(&node.node_id))
        {
            Some(existing) => (*existing).clone(),
            // Reachable only through a sub-query ranking.
            None => Candidate {
                node_id: node.node_id,
                score: 0.0,
                signals: manualfind_core::SignalSet::new(),
                matched_tokens: Vec::new(),
                token_hits: 0,
                match_coverage: 0.0,
                rank_explain: String::new(),
            },
        };
        candidate.score = node.blended;
        if node.sources.iter().any(|label| label.starts_with("sub:")) {
            candidate.signals.insert(Signal::QueryDecompRrf);
        }
        if debug_rows.len() < FUSION_DEBUG_LIMIT {
            debug_rows.push(FusionDebugInfo {
                node_key: snapshot.node_ref(node.node_id).key(),
                base_score: node.base_norm,
                rrf_score: node.rrf_norm,
                blended: node.blended,
                sources: node.sources.clone(),
            });
        }
        out.push(candidate);
    }
    (out, debug_rows)
}

/// Files whose nodes fell beyond the scan hard cap
fn unscanned_beyond(snapshot: &ManualSnapshot, scanned_nodes: u32) -> Vec<UnscannedItem> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out: Vec<UnscannedItem> = Vec::new();
    for node in snapshot.nodes().skip(scanned_nodes as usize) {
        if seen.insert(node.path.as_str()) {
            out.push(UnscannedItem {
                manual_id: snapshot.manual_id.clone(),
                path: node.path.clone(),
                reason: CutoffReason::StageCap,
            });
        }
    }
    out
}

/// Minimal retrieval-derived claim graph over the integrated top
fn build_claim_graph(
    integrated_top: &[CandidateItem],
) -> (Vec<ClaimItem>, Vec<EvidenceItem>, Vec<ClaimEdge>) {
    let mut claims = Vec::with_capacity(integrated_top.len());
    let mut evidences = Vec::with_capacity(integrated_top.len());
    let mut edges = Vec::with_capacity(integrated_top.len());
    for (idx, item) in integrated_top.iter().enumerate() {
        let claim_id = format!("c{idx}");
        let evidence_id = format!("e{idx}");
        claims.push(ClaimItem {
            claim_id: claim_id.clone(),
            text: item.node_ref.title.clone(),
            node_ref: item.node_ref.clone(),
        });
        evidences.push(EvidenceItem {
            evidence_id: evidence_id.clone(),
            claim_id: claim_id.clone(),
            node_ref: item.node_ref.clone(),
        });
        edges.push(ClaimEdge {
            from: evidence_id,
            to: claim_id,
            kind: "supports".to_string(),
        });
    }
    (claims, evidences, edges)
}
