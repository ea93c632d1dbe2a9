//! Per-path diversity rerank
//!
//! This module provides:
//! - `apply_path_decay`: the `1/(1 + alpha * k)` score decay for the k-th
//!   candidate sharing a file path with a higher-ranked one
//! - the per-file candidate cap
//!
//! The decay keeps one file from monopolizing the result set while still
//! letting a strongly relevant file place several sections.

use crate::gates::{sort_candidates, Candidate};
use manualfind_core::NodeId;
use std::collections::HashMap;

/// Outcome of the diversity pass
#[derive(Debug, Clone)]
pub struct DiversityOutcome {
    /// Reranked candidates, best first
    pub candidates: Vec<Candidate>,
    /// Candidates removed by the per-file cap
    pub dropped_by_file_cap: u32,
}

/// Apply the per-path decay, re-rank, then enforce the per-file cap
///
/// `path_of` maps a node to its file path (the snapshot provides it).
pub fn apply_path_decay<F>(
    mut candidates: Vec<Candidate>,
    path_of: F,
    alpha: f32,
    per_file_cap: usize,
) -> DiversityOutcome
where
    F: Fn(NodeId) -> String,
{
    // Candidates arrive ranked; the k-th candidate sharing a path decays.
    let mut seen_per_path: HashMap<String, u32> = HashMap::new();
    for candidate in candidates.iter_mut() {
        let path = path_of(candidate.node_id);
        let k = seen_per_path.entry(path).or_insert(0);
        if *k > 0 {
            candidate.score /= 1.0 + alpha * *k as f32;
        }
        *k += 1;
    }
    sort_candidates(&mut candidates);

    let mut kept_per_path: HashMap<String, usize> = HashMap::new();
    let mut dropped = 0u32;
    let cap = per_file_cap.max(1);
    candidates.retain(|candidate| {
        let count = kept_per_path.entry(path_of(candidate.node_id)).or_insert(0);
        *count += 1;
        if *count > cap {
            dropped += 1;
            false
        } else {
            true
        }
    });

    DiversityOutcome {
        candidates,
        dropped_by_file_cap: dropped,
    }
}

// ============================================================================
// Tests
// ============================================================================
