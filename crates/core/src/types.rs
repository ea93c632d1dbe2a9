//! Foundational types for the retrieval core
//!
//! This module defines the small closed enums used throughout the system:
//! - `Signal`: the lexical evidence markers attached to candidates
//! - `SemCacheMode`, `CutoffReason`, `RequiredEffectStatus`,
//!   `IntegrationStatus`, `SelectedGate`, `HitsKind`
//! - `FileKind`, `NodeId`, `NodeRef`: document addressing
//! - `FindBudget`: time and candidate limits for a single query
//!
//! # Invariant
//!
//! Each enum is a closed set represented as a sum type internally and a
//! `snake_case` string on the wire. New variants require a contract bump.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// FileKind
// ============================================================================

/// Kind of an indexable manual file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Markdown file; each heading section is one node
    Md,
    /// JSON file; the whole file is one node
    Json,
}

impl FileKind {
    /// File extension without the dot
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Md => "md",
            FileKind::Json => "json",
        }
    }

    /// Classify a casefolded file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "md" => Some(FileKind::Md),
            "json" => Some(FileKind::Json),
            _ => None,
        }
    }
}

// ============================================================================
// NodeId / NodeRef
// ============================================================================

/// Arena index of a node within one manual snapshot
///
/// Stable for a given manual fingerprint; posting lists store this 32-bit
/// index instead of pointers, which keeps the index `Send + Sync` for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Index into the node arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable external reference to a searchable node
///
/// The `path#L{start_line}` pair identifies a node across processes as long
/// as the manual content is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    /// Manual the node belongs to
    pub manual_id: String,
    /// File path relative to the manual root, `/`-separated
    pub path: String,
    /// 1-based first line of the node
    pub start_line: u32,
    /// Heading text or file name
    pub title: String,
}

impl NodeRef {
    /// Canonical `manual|path#Lline` key used for dedup and tie-breaking
    pub fn key(&self) -> String {
        format!("{}|{}#L{}", self.manual_id, self.path, self.start_line)
    }
}

// ============================================================================
// Signal
// ============================================================================

/// Lexical evidence markers attached to candidates
///
/// Closed set; `Exceptions` alone never qualifies a candidate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// A query token matched the node verbatim
    Exact,
    /// Node matched a single required term
    RequiredTerm,
    /// Node matched both required terms in the AND pass
    RequiredTermAnd,
    /// Fused rank influenced by more than one required-term pass
    RequiredTermsRrf,
    /// Rank produced by gate-level RRF fusion
    GateRrf,
    /// Every query token appeared in order within a small window
    Phrase,
    /// Node title or first line matched the query head
    Anchor,
    /// Digit token with a unit or particle neighbor
    NumberContext,
    /// Two required tokens within the proximity window
    Proximity,
    /// Node contains exception vocabulary (tie-breaker only)
    Exceptions,
    /// Verbatim match of a punctuated code token
    CodeExact,
    /// Pseudo-relevance-feedback second-pass boost
    Prf,
    /// Injected low-prior exploration candidate
    Exploration,
    /// Rank influenced by sub-query RRF fusion
    QueryDecompRrf,
    /// Node title is a definition-style match of the query head
    DefinitionTitle,
}

impl Signal {
    /// Wire name of the signal
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Exact => "exact",
            Signal::RequiredTerm => "required_term",
            Signal::RequiredTermAnd => "required_term_and",
            Signal::RequiredTermsRrf => "required_terms_rrf",
            Signal::GateRrf => "gate_rrf",
            Signal::Phrase => "phrase",
            Signal::Anchor => "anchor",
            Signal::NumberContext => "number_context",
            Signal::Proximity => "proximity",
            Signal::Exceptions => "exceptions",
            Signal::CodeExact => "code_exact",
            Signal::Prf => "prf",
            Signal::Exploration => "exploration",
            Signal::QueryDecompRrf => "query_decomp_rrf",
            Signal::DefinitionTitle => "definition_title",
        }
    }

    /// True for signals that qualify a candidate on their own
    ///
    /// `Exceptions` is evidence only in combination with something else.
    pub fn is_qualifying(&self) -> bool {
        !matches!(self, Signal::Exceptions)
    }
}

/// Ordered signal set; `BTreeSet` keeps wire output deterministic
pub type SignalSet = BTreeSet<Signal>;

// ============================================================================
// SemCacheMode
// ============================================================================

/// Outcome of the semantic-cache consultation for one query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemCacheMode {
    /// Cache not consulted (unscanned replay, claim graph, opt-out, compact path)
    Bypass,
    /// Key hit
    Exact,
    /// Reserved; never fires with the `none` embedding provider
    Semantic,
    /// No usable entry
    Miss,
    /// Key hit rejected by the summary-quality guard; re-executed
    GuardRevalidate,
}

impl SemCacheMode {
    /// Wire name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            SemCacheMode::Bypass => "bypass",
            SemCacheMode::Exact => "exact",
            SemCacheMode::Semantic => "semantic",
            SemCacheMode::Miss => "miss",
            SemCacheMode::GuardRevalidate => "guard_revalidate",
        }
    }
}

// ============================================================================
// CutoffReason
// ============================================================================

/// Why the candidate list was reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoffReason {
    /// Cooperative time budget exhausted between phases
    TimeBudget,
    /// `budget.max_candidates` reached
    CandidateCap,
    /// Coverage-aware tail drop fired
    DynamicCutoff,
    /// Scan hard cap or per-stage cap reached
    StageCap,
}

impl CutoffReason {
    /// Wire name of the reason
    pub fn as_str(&self) -> &'static str {
        match self {
            CutoffReason::TimeBudget => "time_budget",
            CutoffReason::CandidateCap => "candidate_cap",
            CutoffReason::DynamicCutoff => "dynamic_cutoff",
            CutoffReason::StageCap => "stage_cap",
        }
    }
}

// ============================================================================
// RequiredEffectStatus
// ============================================================================

/// How much the required terms actually shaped the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredEffectStatus {
    /// All terms survived and the top of the ranking carries required signals
    RequiredEffective,
    /// The DF guard dropped or weakened at least one term
    TermDroppedOrWeakened,
    /// Terms survived but no returned candidate carries a required signal
    RequiredNoneMatched,
    /// The required gate produced nothing; fell back to the baseline gate
    RequiredFallback,
}

impl RequiredEffectStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            RequiredEffectStatus::RequiredEffective => "required_effective",
            RequiredEffectStatus::TermDroppedOrWeakened => "term_dropped_or_weakened",
            RequiredEffectStatus::RequiredNoneMatched => "required_none_matched",
            RequiredEffectStatus::RequiredFallback => "required_fallback",
        }
    }
}

// ============================================================================
// IntegrationStatus / SelectedGate
// ============================================================================

/// Overall readiness of the retrieved evidence set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    /// Sufficient, low-bias evidence
    Ready,
    /// Usable but a follow-up query is advisable
    NeedsFollowup,
    /// Nothing matched
    Blocked,
}

impl IntegrationStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationStatus::Ready => "ready",
            IntegrationStatus::NeedsFollowup => "needs_followup",
            IntegrationStatus::Blocked => "blocked",
        }
    }
}

/// Which gate produced the returned ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectedGate {
    /// Baseline gate over all query tokens
    G0,
    /// Required-terms gate
    GReq,
}

impl SelectedGate {
    /// Wire name of the gate
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectedGate::G0 => "g0",
            SelectedGate::GReq => "g_req",
        }
    }
}

// ============================================================================
// HitsKind
// ============================================================================

/// Pageable collections stored in a trace payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitsKind {
    /// Full scored candidate list (compressed items)
    Candidates,
    /// Files left unscanned by a cutoff
    Unscanned,
    /// Conflicting evidence pairs
    Conflicts,
    /// Coverage gaps
    Gaps,
    /// Final integrated ranking
    IntegratedTop,
    /// Claim-graph claims
    Claims,
    /// Claim-graph evidences
    Evidences,
    /// Claim-graph edges
    Edges,
    /// Per-gate execution diagnostics
    GateRuns,
    /// Fusion scoring diagnostics
    FusionDebug,
}

impl HitsKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            HitsKind::Candidates => "candidates",
            HitsKind::Unscanned => "unscanned",
            HitsKind::Conflicts => "conflicts",
            HitsKind::Gaps => "gaps",
            HitsKind::IntegratedTop => "integrated_top",
            HitsKind::Claims => "claims",
            HitsKind::Evidences => "evidences",
            HitsKind::Edges => "edges",
            HitsKind::GateRuns => "gate_runs",
            HitsKind::FusionDebug => "fusion_debug",
        }
    }

    /// Parse a caller-supplied kind string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "candidates" => Some(HitsKind::Candidates),
            "unscanned" => Some(HitsKind::Unscanned),
            "conflicts" => Some(HitsKind::Conflicts),
            "gaps" => Some(HitsKind::Gaps),
            "integrated_top" => Some(HitsKind::IntegratedTop),
            "claims" => Some(HitsKind::Claims),
            "evidences" => Some(HitsKind::Evidences),
            "edges" => Some(HitsKind::Edges),
            "gate_runs" => Some(HitsKind::GateRuns),
            "fusion_debug" => Some(HitsKind::FusionDebug),
            _ => None,
        }
    }
}

// ============================================================================
// FindBudget
// ============================================================================

/// Limits on a single `find` execution
///
/// The pipeline respects these limits cooperatively and returns truncated
/// results (with a recorded [`CutoffReason`]) rather than erroring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FindBudget {
    /// Wall-clock budget in milliseconds (>= 1)
    pub time_ms: u64,
    /// Maximum candidates assembled (>= 1)
    pub max_candidates: usize,
}

impl Default for FindBudget {
    fn default() -> Self {
        FindBudget {
            time_ms: 60_000,
            max_candidates: 200,
        }
    }
}

impl FindBudget {
    /// Builder: set the time budget
    pub fn with_time_ms(mut self, time_ms: u64) -> Self {
        self.time_ms = time_ms;
        self
    }

    /// Builder: set the candidate cap
    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    /// Stable key fragment used in the cache key
    pub fn key_bits(&self) -> String {
        format!("{}:{}", self.time_ms, self.max_candidates)
    }
}

// ============================================================================
// Tests
// ============================================================================
