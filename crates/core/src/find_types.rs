//! Contract types for `find`, `hits`, and the trace payload
//!
//! This module defines the serializable shapes shared by the pipeline, the
//! trace store, and the semantic cache:
//! - `CandidateItem`: one scored evidence item (wire shape)
//! - `AppliedDiagnostics`: what the pipeline actually did for a query
//! - `FindSummary`: retrieval-only summary counters
//! - `TracePayload`: everything `hits` can page over
//!
//! # Invariant
//!
//! All search paths produce `TracePayload`. The cache stores a cloned
//! payload so it survives trace eviction; no type here borrows from the
//! index or the document store.

use crate::types::{
    CutoffReason, IntegrationStatus, NodeRef, RequiredEffectStatus, SelectedGate, SemCacheMode,
    Signal,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// CandidateItem
// ============================================================================

/// One scored evidence item, in wire shape
///
/// `hits(kind=candidates)` returns this compressed form; `integrated_top`
/// and `inline_hits` carry the same items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Stable reference to the source node
    #[serde(rename = "ref")]
    pub node_ref: NodeRef,
    /// Final blended score
    pub score: f32,
    /// Evidence markers, in deterministic order
    pub signals: Vec<Signal>,
    /// Query tokens that matched this node
    pub matched_tokens: Vec<String>,
    /// Total token occurrences hit in the node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_hits: Option<u32>,
    /// Fraction of unique query terms present in the node
    pub match_coverage: f32,
    /// Short human-readable scoring note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank_explain: Option<String>,
}

// ============================================================================
// AppliedDiagnostics
// ============================================================================

/// One DF-guard decision for a required term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DfFilterDecision {
    /// The required term inspected
    pub term: String,
    /// Document-frequency ratio observed for the term
    pub df_ratio: f32,
    /// True when the term was removed from the effective search
    pub dropped: bool,
    /// `too_common` or `too_rare`
    pub reason: DfFilterReason,
}

/// Why the DF guard acted on a term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DfFilterReason {
    /// Ratio above the upper bound; term dropped
    TooCommon,
    /// Ratio below the lower bound; term kept but marked
    TooRare,
}

/// What the pipeline actually did for a query
///
/// Returned in the non-compact response shape and persisted on the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedDiagnostics {
    /// Gate whose ranking was returned
    pub selected_gate: SelectedGate,
    /// True when a cache entry was served
    pub sem_cache_hit: bool,
    /// Cache consultation outcome
    pub sem_cache_mode: SemCacheMode,
    /// Similarity score for a semantic hit (reserved; provider `none` never sets it)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sem_cache_score: Option<f32>,
    /// Pipeline latency recovered by the cache hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_saved_ms: Option<u64>,
    /// Required terms as received (after trimming)
    pub required_terms: Vec<String>,
    /// DF-guard decisions, one per inspected term
    pub required_terms_df_filtered: Vec<DfFilterDecision>,
    /// True when the required gate was abandoned for the baseline gate
    pub required_terms_relaxed: bool,
    /// Reason the gate was relaxed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_terms_relax_reason: Option<String>,
    /// How much the required terms shaped the result
    pub required_effect_status: RequiredEffectStatus,
    /// Non-fatal required-gate failure note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_failure_reason: Option<String>,
    /// Why the candidate list was reduced, if it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutoff_reason: Option<CutoffReason>,
    /// True when the query matched a comparative pattern
    pub query_decomposed: bool,
    /// Sub-queries actually executed
    pub sub_queries: Vec<String>,
    /// Number of exploration candidates injected
    pub exploration_injected: u32,
}

impl AppliedDiagnostics {
    /// Diagnostics for a query where the required gate never ran
    pub fn baseline(required_terms: Vec<String>) -> Self {
        AppliedDiagnostics {
            selected_gate: SelectedGate::G0,
            sem_cache_hit: false,
            sem_cache_mode: SemCacheMode::Miss,
            sem_cache_score: None,
            latency_saved_ms: None,
            required_terms,
            required_terms_df_filtered: Vec::new(),
            required_terms_relaxed: false,
            required_terms_relax_reason: None,
            required_effect_status: RequiredEffectStatus::RequiredFallback,
            required_failure_reason: None,
            cutoff_reason: None,
            query_decomposed: false,
            sub_queries: Vec::new(),
            exploration_injected: 0,
        }
    }
}

// ============================================================================
// FindSummary
// ============================================================================

/// Retrieval-only summary counters
///
/// `gap_count` and `conflict_count` always equal the lengths of the
/// corresponding trace collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindSummary {
    /// Files opened during the scan
    pub scanned_files: u32,
    /// Nodes scored during the scan
    pub scanned_nodes: u32,
    /// Candidates returned
    pub candidates: u32,
    /// Share of candidates concentrated in the most frequent file
    pub file_bias_ratio: f32,
    /// Length of the conflicts collection
    pub conflict_count: u32,
    /// Length of the gaps collection
    pub gap_count: u32,
    /// Overall readiness of the evidence set
    pub integration_status: IntegrationStatus,
}

// ============================================================================
// Trace collections
// ============================================================================

/// A file skipped by a cutoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnscannedItem {
    /// Manual the file belongs to
    pub manual_id: String,
    /// File path relative to the manual root
    pub path: String,
    /// Which cutoff skipped it
    pub reason: CutoffReason,
}

/// A detected coverage gap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapItem {
    /// Machine-readable gap class
    pub reason: String,
    /// Hint for the follow-up query
    pub gap_hint: String,
}

/// Conflicting evidence reported by an adjacent subsystem
///
/// The retrieval core never synthesizes conflicts; the collection exists so
/// the payload shape is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictItem {
    /// Nodes in conflict
    pub refs: Vec<NodeRef>,
    /// Conflict description
    pub reason: String,
}

/// One claim in the diagnostic claim graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimItem {
    /// Claim id, unique within the trace
    pub claim_id: String,
    /// Claim text (the candidate title)
    pub text: String,
    /// Node the claim was derived from
    pub node_ref: NodeRef,
}

/// One evidence link in the diagnostic claim graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Evidence id, unique within the trace
    pub evidence_id: String,
    /// Claim this evidence supports
    pub claim_id: String,
    /// Source node
    pub node_ref: NodeRef,
}

/// One edge in the diagnostic claim graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimEdge {
    /// Source vertex id (claim or evidence)
    pub from: String,
    /// Target vertex id
    pub to: String,
    /// Edge kind (`supports`)
    pub kind: String,
}

/// Execution diagnostics for one gate pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRunInfo {
    /// Gate that ran
    pub gate: SelectedGate,
    /// Pass label (`all`, `term:a`, `and`, `sub:0`, ...)
    pub pass: String,
    /// Candidates the pass produced
    pub candidates: u32,
}

/// Fusion scoring diagnostics for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionDebugInfo {
    /// Canonical node key
    pub node_key: String,
    /// Normalized base score
    pub base_score: f32,
    /// Normalized RRF score
    pub rrf_score: f32,
    /// Blended final score
    pub blended: f32,
    /// Ranking labels that contributed
    pub sources: Vec<String>,
}

// ============================================================================
// TracePayload
// ============================================================================

/// Everything `hits` can page over for one query
///
/// Created on every cache miss; a cache hit clones the stored payload and
/// re-registers it under a fresh trace id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracePayload {
    /// Trace id the payload is registered under
    pub trace_id: String,
    /// Manual searched
    pub manual_id: String,
    /// Pipeline diagnostics
    pub applied: AppliedDiagnostics,
    /// Full scored candidate list
    pub candidates: Vec<CandidateItem>,
    /// Final integrated ranking
    pub integrated_top: Vec<CandidateItem>,
    /// Files skipped by cutoffs
    pub unscanned: Vec<UnscannedItem>,
    /// Coverage gaps
    pub gaps: Vec<GapItem>,
    /// Conflicting evidence (adjacent subsystems only)
    pub conflicts: Vec<ConflictItem>,
    /// Diagnostic claim-graph claims (empty when the graph is disabled)
    pub claims: Vec<ClaimItem>,
    /// Diagnostic claim-graph evidences
    pub evidences: Vec<EvidenceItem>,
    /// Diagnostic claim-graph edges
    pub edges: Vec<ClaimEdge>,
    /// Per-gate execution diagnostics
    pub gate_runs: Vec<GateRunInfo>,
    /// Fusion scoring diagnostics
    pub fusion_debug: Vec<FusionDebugInfo>,
    /// Summary counters
    pub summary: FindSummary,
    /// Wall-clock latency of the producing pipeline run
    pub source_latency_ms: u64,
    /// Fingerprint of the manual content the payload was computed from
    pub manuals_fingerprint: String,
}

impl TracePayload {
    /// Consistency check: summary counters vs collection lengths
    ///
    /// `hits(kind=gaps)` and `hits(kind=conflicts)` totals must equal the
    /// summary counts; callers assert this in tests.
    pub fn counts_consistent(&self) -> bool {
        self.summary.gap_count as usize == self.gaps.len()
            && self.summary.conflict_count as usize == self.conflicts.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
