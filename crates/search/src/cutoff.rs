//! Dynamic result cutoff and exploration injection
//!
//! This module provides:
//! - `apply_cutoff`: the candidate cap plus the coverage-aware tail drop
//! - `inject_exploration`: low-prior candidates re-admitted at a scaled
//!   score to reduce ranking stagnation
//!
//! The cap is `min(budget.max_candidates, RETURN_HARD_CAP)`; a tail
//! candidate is dropped when its score falls under `head_score * ratio`
//! AND its match coverage is below the configured floor.

use crate::gates::Candidate;
use manualfind_core::{Config, CutoffReason, Signal};

/// Upper bound on returned candidates regardless of budget
pub const RETURN_HARD_CAP: usize = 50;

// ============================================================================
// CutoffOutcome
// ============================================================================

/// Result of the cutoff pass
#[derive(Debug, Clone)]
pub struct CutoffOutcome {
    /// Candidates kept, best first
    pub kept: Vec<Candidate>,
    /// Candidates removed (exploration draws from these)
    pub dropped: Vec<Candidate>,
    /// Recorded when a reduction occurred
    pub reason: Option<CutoffReason>,
}

/// Apply the candidate cap and the coverage-aware tail drop
pub fn apply_cutoff(
    mut candidates: Vec<Candidate>,
    budget_max_candidates: usize,
    cfg: &Config,
) -> CutoffOutcome {
    let cap = budget_max_candidates.min(RETURN_HARD_CAP).max(1);
    let mut reason = None;
    let mut dropped: Vec<Candidate> = Vec::new();

    if candidates.len() > cap {
        dropped.extend(candidates.split_off(cap));
        reason = Some(CutoffReason::CandidateCap);
    }

    let head_score = candidates.first().map(|c| c.score).unwrap_or(0.0);
    if head_score > 0.0 {
        let floor = head_score * cfg.cutoff_score_ratio;
        let mut tail_dropped = false;
        while candidates.len() > 1 {
            let weak_tail = candidates
                .last()
                .map(|c| c.score < floor && c.match_coverage < cfg.cutoff_min_coverage)
                .unwrap_or(false);
            if !weak_tail {
                break;
            }
            if let Some(removed) = candidates.pop() {
                dropped.push(removed);
                tail_dropped = true;
            }
        }
        if tail_dropped {
            reason = Some(CutoffReason::DynamicCutoff);
        }
    }

    CutoffOutcome {
        kept: candidates,
        dropped,
        reason,
    }
}

/// Inject exploration candidates from the dropped pool
///
/// Takes up to `exploration_ratio` of the kept count from dropped
/// candidates that cleared the coverage floor, scales their scores, marks
/// them, and appends them at the tail. Returns the injected count.
pub fn inject_exploration(outcome: &mut CutoffOutcome, cfg: &Config) -> u32 {
    if cfg.exploration_ratio <= 0.0 || outcome.kept.is_empty() {
        return 0;
    }
    let slots = (outcome.kept.len() as f32 * cfg.exploration_ratio).floor() as usize;
    if slots == 0 {
        return 0;
    }

    let mut injected = 0u32;
    let mut remaining: Vec<Candidate> = Vec::new();
    for mut candidate in outcome.dropped.drain(..) {
        if (injected as usize) < slots && candidate.match_coverage >= cfg.cutoff_min_coverage {
            candidate.score *= cfg.exploration_score_scale;
            candidate.signals.insert(Signal::Exploration);
            candidate.rank_explain = format!("{} explore", candidate.rank_explain);
            outcome.kept.push(candidate);
            injected += 1;
        } else {
            remaining.push(candidate);
        }
    }
    outcome.dropped = remaining;
    injected
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use manualfind_core::{NodeId, SignalSet};

    fn candidate(id: u32, score: f32, coverage: f32) -> Candidate {
        Candidate {
            node_id: NodeId(id),
            score,
            signals: SignalSet::new(),
            matched_tokens: Vec::new(),
            token_hits: 0,
            match_coverage: coverage,
            rank_explain: String::new(),
        }
    }

    #[test]
    fn test_candidate_cap() {
        let candidates: Vec<Candidate> =
            (0..10).map(|i| candidate(i, 1.0 - i as f32 * 0.01, 1.0)).collect();
        let outcome = apply_cutoff(candidates, 3, &Config::default());
        assert_eq!(outcome.kept.len(), 3);
        assert_eq!(outcome.dropped.len(), 7);
        assert_eq!(outcome.reason, Some(CutoffReason::CandidateCap));
    }

    #[test]
    fn test_return_hard_cap_wins_over_budget() {
        let candidates: Vec<Candidate> =
            (0..80).map(|i| candidate(i, 1.0, 1.0)).collect();
        let outcome = apply_cutoff(candidates, 200, &Config::default());
        assert_eq!(outcome.kept.len(), RETURN_HARD_CAP);
    }

    #[test]
    fn test_dynamic_tail_drop() {
        let candidates = vec![
            candidate(0, 1.0, 1.0),
            candidate(1, 0.8, 0.5),
            // Below head * 0.25 with weak coverage: dropped.
            candidate(2, 0.1, 0.1),
        ];
        let outcome = apply_cutoff(candidates, 50, &Config::default());
        assert_eq!(outcome.kept.len(), 2);
        assert_eq!(outcome.reason, Some(CutoffReason::DynamicCutoff));
    }

    #[test]
    fn test_weak_score_with_good_coverage_survives() {
        let candidates = vec![candidate(0, 1.0, 1.0), candidate(1, 0.1, 0.9)];
        let outcome = apply_cutoff(candidates, 50, &Config::default());
        assert_eq!(outcome.kept.len(), 2);
        assert_eq!(outcome.reason, None);
    }

    #[test]
    fn test_no_reduction_no_reason() {
        let candidates = vec![candidate(0, 1.0, 1.0)];
        let outcome = apply_cutoff(candidates, 50, &Config::default());
        assert_eq!(outcome.reason, None);
        assert!(outcome.dropped.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let outcome = apply_cutoff(Vec::new(), 50, &Config::default());
        assert!(outcome.kept.is_empty());
        assert_eq!(outcome.reason, None);
    }

    #[test]
    fn test_exploration_injection() {
        let mut cfg = Config::default();
        cfg.exploration_ratio = 0.5;
        let candidates: Vec<Candidate> =
            (0..4).map(|i| candidate(i, 1.0 - i as f32 * 0.1, 1.0)).collect();
        let mut outcome = apply_cutoff(candidates, 2, &cfg);
        assert_eq!(outcome.kept.len(), 2);

        let injected = inject_exploration(&mut outcome, &cfg);
        assert_eq!(injected, 1);
        assert_eq!(outcome.kept.len(), 3);
        let tail = outcome.kept.last().unwrap();
        assert!(tail.signals.contains(&Signal::Exploration));
        assert!((tail.score - 0.8 * cfg.exploration_score_scale).abs() < 1e-6);
    }

    #[test]
    fn test_exploration_respects_coverage_floor() {
        let mut cfg = Config::default();
        cfg.exploration_ratio = 1.0;
        let candidates = vec![
            candidate(0, 1.0, 1.0),
            candidate(1, 0.9, 1.0),
            candidate(2, 0.05, 0.0),
        ];
        let mut outcome = apply_cutoff(candidates, 2, &cfg);
        let injected = inject_exploration(&mut outcome, &cfg);
        assert_eq!(injected, 0);
        assert_eq!(outcome.dropped.len(), 1);
    }

    #[test]
    fn test_exploration_disabled() {
        let mut cfg = Config::default();
        cfg.exploration_ratio = 0.0;
        let candidates: Vec<Candidate> = (0..4).map(|i| candidate(i, 1.0, 1.0)).collect();
        let mut outcome = apply_cutoff(candidates, 2, &cfg);
        assert_eq!(inject_exploration(&mut outcome, &cfg), 0);
    }
}
