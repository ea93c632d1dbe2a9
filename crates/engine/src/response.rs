//! Response shapes
//!
//! This module provides:
//! - `FindResponse`: the non-compact shape with full diagnostics
//! - `CompactFindResponse`: the minimal public-facing shape
//! - `HitsResponse`: one page over a trace collection
//! - `NextAction`: a suggested follow-up call
//!
//! # Invariant
//!
//! The compact shape always carries `next_actions = []`, and its inline
//! hits are exactly what `hits(kind=integrated_top, offset=0, limit<=5)`
//! would return.

use manualfind_core::{
    AppliedDiagnostics, CandidateItem, FindSummary, HitsKind, IntegrationStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// NextAction
// ============================================================================

/// A suggested follow-up call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextAction {
    /// Tool to call next (`manual_find`, `manual_hits`, `manual_read`, `stop`)
    pub action: String,
    /// Confidence in the suggestion
    pub confidence: f32,
    /// Parameters to pass, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

// ============================================================================
// FindResponse
// ============================================================================

/// Non-compact result of one `find`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindResponse {
    /// Trace the payload is registered under
    pub trace_id: String,
    /// What the pipeline actually did
    pub applied: AppliedDiagnostics,
    /// Retrieval-only summary counters
    pub summary: FindSummary,
    /// Suggested follow-ups
    pub next_actions: Vec<NextAction>,
}

// ============================================================================
// CompactFindResponse
// ============================================================================

/// Minimal public-facing result of one `find`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactFindResponse {
    /// Trace the payload is registered under
    pub trace_id: String,
    /// Number of candidates returned
    pub candidates: u32,
    /// Overall readiness of the evidence set
    pub status: IntegrationStatus,
    /// Set when the search was degraded (wire name of the cutoff reason)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Top hits, identical to `hits(kind=integrated_top, offset=0)`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_hits: Option<Vec<CandidateItem>>,
    /// Always empty on the compact surface
    pub next_actions: Vec<Value>,
}

// ============================================================================
// HitsResponse
// ============================================================================

/// One page over a trace collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitsResponse {
    /// Trace paged over
    pub trace_id: String,
    /// Collection paged
    pub kind: HitsKind,
    /// Applied offset
    pub offset: usize,
    /// Applied limit
    pub limit: usize,
    /// Total items in the collection
    pub total: usize,
    /// The page
    pub items: Vec<Value>,
}

// ============================================================================
// Tests
// ============================================================================
