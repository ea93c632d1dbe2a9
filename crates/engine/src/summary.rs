//! Summary assembly and follow-up planning
//!
//! This module provides:
//! - `build_summary`: counters, file bias, gap detection, readiness
//! - `plan_next_actions`: the follow-up suggestions of the non-compact shape
//!
//! Gap detection mirrors the adaptive thresholds: too few candidates, or a
//! result set dominated by one file, counts as a coverage gap.

use crate::response::NextAction;
use manualfind_core::{CandidateItem, FindSummary, GapItem, IntegrationStatus};
use std::collections::HashMap;

/// Inputs of one summary computation
#[derive(Debug, Clone, Copy)]
pub struct SummaryInputs<'a> {
    /// Candidates returned (exploration items included)
    pub candidates: &'a [CandidateItem],
    /// Files opened during the scan
    pub scanned_files: u32,
    /// Nodes scored during the scan
    pub scanned_nodes: u32,
    /// Conflicts reported by adjacent subsystems
    pub conflict_count: u32,
    /// Low-candidate threshold in effect
    pub candidate_low_threshold: u32,
    /// File-bias threshold in effect
    pub file_bias_threshold: f32,
}

/// Share of candidates concentrated in the most frequent file
pub fn file_bias_ratio(candidates: &[CandidateItem]) -> f32 {
    if candidates.is_empty() {
        return 0.0;
    }
    let mut per_file: HashMap<&str, u32> = HashMap::new();
    for item in candidates {
        *per_file.entry(item.node_ref.path.as_str()).or_insert(0) += 1;
    }
    let max = per_file.values().copied().max().unwrap_or(0);
    max as f32 / candidates.len() as f32
}

/// Build the summary and its gap list
pub fn build_summary(inputs: SummaryInputs<'_>) -> (FindSummary, Vec<GapItem>) {
    let total = inputs.candidates.len() as u32;
    let bias = file_bias_ratio(inputs.candidates);

    let gap = total == 0
        || total < inputs.candidate_low_threshold
        || (total >= 5 && bias >= inputs.file_bias_threshold);
    let gaps = if gap {
        vec![GapItem {
            reason: "gap".to_string(),
            gap_hint: "no candidates matched the current query scope".to_string(),
        }]
    } else {
        Vec::new()
    };

    let sufficiency = (total as f32 / 5.0).min(1.0) * (1.0 - bias.min(1.0) * 0.2);
    let integration_status = if total == 0 {
        IntegrationStatus::Blocked
    } else if sufficiency >= 0.6 && gaps.is_empty() {
        IntegrationStatus::Ready
    } else {
        IntegrationStatus::NeedsFollowup
    };

    let summary = FindSummary {
        scanned_files: inputs.scanned_files,
        scanned_nodes: inputs.scanned_nodes,
        candidates: total,
        file_bias_ratio: (bias * 10_000.0).round() / 10_000.0,
        conflict_count: inputs.conflict_count,
        gap_count: gaps.len() as u32,
        integration_status,
    };
    (summary, gaps)
}

/// Plan the follow-up suggestions of the non-compact shape
pub fn plan_next_actions(summary: &FindSummary, query: &str) -> Vec<NextAction> {
    if summary.conflict_count > 0 {
        return vec![NextAction {
            action: "manual_read".to_string(),
            confidence: 0.7,
            params: Some(serde_json::json!({"scope": "section"})),
        }];
    }
    if summary.gap_count > 0 {
        return vec![NextAction {
            action: "manual_find".to_string(),
            confidence: 0.6,
            params: Some(serde_json::json!({"query": query, "expand_scope": true})),
        }];
    }
    if summary.integration_status == IntegrationStatus::Ready {
        return vec![NextAction {
            action: "stop".to_string(),
            confidence: 0.8,
            params: None,
        }];
    }
    vec![NextAction {
        action: "manual_hits".to_string(),
        confidence: 0.7,
        params: Some(serde_json::json!({"kind": "integrated_top", "offset": 0, "limit": 20})),
    }]
}

// ============================================================================
// Tests
// ============================================================================
