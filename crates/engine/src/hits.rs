//! Stateless paging over trace payloads
//!
//! This module provides:
//! - `Engine::hits`: one page over any of the ten trace collections
//!
//! Paging is stateless over the trace store: an expired or unknown trace
//! id is `not_found`, never a silent rescan. `kind=candidates` returns
//! the compressed item shape (no signal set).

use crate::params::HitsParams;
use crate::response::HitsResponse;
use crate::state::Engine;
use manualfind_core::{CandidateItem, HitsKind, Result, ToolError, TracePayload};
use serde_json::Value;

/// Compressed candidate item for `kind=candidates`
fn compress(item: &CandidateItem) -> Value {
    let mut out = serde_json::json!({
        "ref": item.node_ref,
        "score": item.score,
        "matched_tokens": item.matched_tokens,
        "match_coverage": item.match_coverage,
    });
    if let Some(token_hits) = item.token_hits {
        out["token_hits"] = serde_json::json!(token_hits);
    }
    if let Some(rank_explain) = &item.rank_explain {
        out["rank_explain"] = serde_json::json!(rank_explain);
    }
    out
}

fn collection(payload: &TracePayload, kind: HitsKind) -> Vec<Value> {
    fn values<T: serde::Serialize>(items: &[T]) -> Vec<Value> {
        items
            .iter()
            .map(|item| serde_json::to_value(item).unwrap_or(Value::Null))
            .collect()
    }
    match kind {
        HitsKind::Candidates => payload.candidates.iter().map(compress).collect(),
        HitsKind::Unscanned => values(&payload.unscanned),
        HitsKind::Conflicts => values(&payload.conflicts),
        HitsKind::Gaps => values(&payload.gaps),
        HitsKind::IntegratedTop => values(&payload.integrated_top),
        HitsKind::Claims => values(&payload.claims),
        HitsKind::Evidences => values(&payload.evidences),
        HitsKind::Edges => values(&payload.edges),
        HitsKind::GateRuns => values(&payload.gate_runs),
        HitsKind::FusionDebug => values(&payload.fusion_debug),
    }
}

impl Engine {
    /// Page over one collection of a saved trace
    pub fn hits(&self, params: &HitsParams) -> Result<HitsResponse> {
        let payload = self.traces().get(&params.trace_id).ok_or_else(|| {
            ToolError::not_found("trace_id not found").with_details(serde_json::json!({
                "trace_id": params.trace_id,
                "reason": "trace_expired_or_missing",
            }))
        })?;

        let rows = collection(&payload, params.kind);
        let total = rows.len();
        let items: Vec<Value> = rows
            .into_iter()
            .skip(params.offset)
            .take(params.limit)
            .collect();

        Ok(HitsResponse {
            trace_id: params.trace_id.clone(),
            kind: params.kind,
            offset: params.offset,
            limit: params.limit,
            total,
            items,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
