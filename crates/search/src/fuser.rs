//! Reciprocal-Rank Fusion with base-weight blending
//!
//! This module provides:
//! - `Ranking`: a labelled `(node, score)` sequence in descending order
//! - `fuse_blend`: RRF over all rankings, blended against the base scores
//!
//! Standard RRF: `fused(node) = sum_i 1 / (k + rank_i(node))`. The final
//! blended score is `base_weight * norm(base) + (1 - base_weight) *
//! norm(rrf)` with min-max normalization inside the evaluated set.
//! Tie-breaking is deterministic: blended score descending, then node id.

use manualfind_core::NodeId;
use std::collections::HashMap;

// ============================================================================
// Ranking
// ============================================================================

/// One labelled ranking, descending by score
#[derive(Debug, Clone)]
pub struct Ranking {
    /// Label recorded in fusion diagnostics (`and`, `term:x`, `sub:0`, ...)
    pub label: String,
    /// `(node, score)` pairs, best first
    pub items: Vec<(NodeId, f32)>,
}

impl Ranking {
    /// Create a ranking from pre-sorted items
    pub fn new(label: impl Into<String>, items: Vec<(NodeId, f32)>) -> Self {
        Ranking {
            label: label.into(),
            items,
        }
    }

    /// True when the ranking holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// FusedNode
// ============================================================================

/// Fusion outcome for one node
#[derive(Debug, Clone, PartialEq)]
pub struct FusedNode {
    /// The node
    pub node_id: NodeId,
    /// Blended final score
    pub blended: f32,
    /// Min-max normalized base score
    pub base_norm: f32,
    /// Min-max normalized RRF score
    pub rrf_norm: f32,
    /// Number of rankings that contained the node
    pub appearances: u32,
    /// Labels of the rankings that contained the node
    pub sources: Vec<String>,
}

// ============================================================================
// fuse_blend
// ============================================================================

/// Fuse `rankings` with RRF and blend against `base`
///
/// Every node appearing in `base` or any ranking is evaluated. `base`
/// itself participates in the RRF sum, so its ordering influences both
/// blend components.
pub fn fuse_blend(base: &Ranking, rankings: &[Ranking], k: u32, base_weight: f32) -> Vec<FusedNode> {
    let mut rrf: HashMap<NodeId, f32> = HashMap::new();
    let mut sources: HashMap<NodeId, Vec<String>> = HashMap::new();

    let all = std::iter::once(base).chain(rankings.iter());
    for ranking in all {
        for (rank0, (node, _score)) in ranking.items.iter().enumerate() {
            *rrf.entry(*node).or_insert(0.0) += 1.0 / (k as f32 + rank0 as f32 + 1.0);
            sources.entry(*node).or_default().push(ranking.label.clone());
        }
    }
    if rrf.is_empty() {
        return Vec::new();
    }

    let mut nodes: Vec<NodeId> = rrf.keys().copied().collect();
    nodes.sort();

    let base_scores: HashMap<NodeId, f32> = base.items.iter().copied().collect();
    let base_norm = min_max(
        &nodes
            .iter()
            .map(|n| base_scores.get(n).copied().unwrap_or(0.0))
            .collect::<Vec<_>>(),
    );
    let rrf_norm = min_max(&nodes.iter().map(|n| rrf[n]).collect::<Vec<_>>());

    let mut fused: Vec<FusedNode> = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| {
            let mut labels = sources.remove(node).unwrap_or_default();
            labels.sort();
            labels.dedup();
            FusedNode {
                node_id: *node,
                blended: base_weight * base_norm[idx] + (1.0 - base_weight) * rrf_norm[idx],
                base_norm: base_norm[idx],
                rrf_norm: rrf_norm[idx],
                appearances: labels.len() as u32,
                sources: labels,
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.blended
            .partial_cmp(&a.blended)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    fused
}

/// Min-max normalize within the evaluated set
///
/// A constant set normalizes to all-ones so the blend stays meaningful.
fn min_max(values: &[f32]) -> Vec<f32> {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !min.is_finite() || !max.is_finite() || (max - min).abs() < f32::EPSILON {
        return vec![1.0; values.len()];
    }
    values.iter().map(|v| (v - min) / (max - min)).collect()
}

// ============================================================================
// Tests
// ============================================================================
