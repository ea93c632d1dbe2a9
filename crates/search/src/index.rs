//! Per-manual inverted index and BM25 scoring
//!
//! This module provides:
//! - `SparseIndex`: postings with positions plus df / avgdl statistics
//! - `score_query`: BM25 with query-coverage, node-coverage, and length
//!   corrections
//! - phrase containment over token positions (required-term matching)
//!
//! # Thread Safety
//!
//! An index is built once per `(manual, fingerprint)` and never mutated;
//! posting lists store 32-bit arena ids, so the index is `Send + Sync`
//! without locks.

use crate::normalize::normalize_text;
use crate::tokenizer::{is_code_token, tokenize};
use manualfind_core::{Config, NodeId};
use manualfind_store::ManualSnapshot;
use std::collections::HashMap;

/// BM25 term-saturation parameter
pub const BM25_K1: f32 = 1.2;
/// BM25 length-normalization parameter
pub const BM25_B: f32 = 0.75;

// ============================================================================
// Posting
// ============================================================================

/// Occurrences of one term in one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    /// Arena id of the node
    pub node_id: NodeId,
    /// Term frequency in the node
    pub tf: u32,
    /// Token positions of each occurrence, ascending
    pub positions: Vec<u32>,
}

// ============================================================================
// ScoreParts
// ============================================================================

/// Scoring breakdown for one node against one term set
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreParts {
    /// Corrected BM25 score
    pub score: f32,
    /// Total term occurrences hit in the node
    pub token_hits: u32,
    /// Unique query terms present / unique query terms
    pub match_coverage: f32,
    /// Terms that matched, in query order
    pub matched_terms: Vec<String>,
}

impl ScoreParts {
    /// A zero score with no matches
    pub fn zero() -> Self {
        ScoreParts {
            score: 0.0,
            token_hits: 0,
            match_coverage: 0.0,
            matched_terms: Vec::new(),
        }
    }
}

// ============================================================================
// SparseIndex
// ============================================================================

/// Inverted index over one manual snapshot
#[derive(Debug)]
pub struct SparseIndex {
    /// Fingerprint of the content the index was built from
    pub fingerprint: String,
    postings: HashMap<String, Vec<Posting>>,
    doc_len: Vec<u32>,
    doc_chars: Vec<u32>,
    titles_norm: Vec<String>,
    first_lines_norm: Vec<String>,
    texts_norm: Vec<String>,
    avg_doc_len: f32,
    total_docs: u32,
}

impl SparseIndex {
    /// Build the index eagerly from a snapshot
    pub fn build(snapshot: &ManualSnapshot) -> Self {
        let total = snapshot.len();
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_len = Vec::with_capacity(total);
        let mut doc_chars = Vec::with_capacity(total);
        let mut titles_norm = Vec::with_capacity(total);
        let mut first_lines_norm = Vec::with_capacity(total);
        let mut texts_norm = Vec::with_capacity(total);

        for node in snapshot.nodes() {
            let raw = snapshot.text(node.id);
            let normalized = normalize_text(raw);
            let tokens = tokenize(&normalized);

            let mut per_term: HashMap<&str, Vec<u32>> = HashMap::new();
            for token in &tokens {
                per_term.entry(token.text.as_str()).or_default().push(token.pos);
            }
            for (term, positions) in per_term {
                postings.entry(term.to_string()).or_default().push(Posting {
                    node_id: node.id,
                    tf: positions.len() as u32,
                    positions,
                });
            }

            doc_len.push((tokens.len() as u32).max(1));
            doc_chars.push(normalized.chars().count() as u32);
            titles_norm.push(normalize_text(&node.title));
            first_lines_norm.push(
                normalized.lines().next().unwrap_or("").to_string(),
            );
            texts_norm.push(normalized);
        }

        // Node iteration order is arena order, so every posting list is
        // already sorted by node id.
        let avg_doc_len = if doc_len.is_empty() {
            1.0
        } else {
            doc_len.iter().map(|l| *l as f32).sum::<f32>() / doc_len.len() as f32
        };

        SparseIndex {
            fingerprint: snapshot.fingerprint.clone(),
            postings,
            doc_len,
            doc_chars,
            titles_norm,
            first_lines_norm,
            texts_norm,
            avg_doc_len: avg_doc_len.max(1.0),
            total_docs: total as u32,
        }
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Total nodes indexed
    pub fn total_docs(&self) -> u32 {
        self.total_docs
    }

    /// Average node length in tokens
    pub fn avg_doc_len(&self) -> f32 {
        self.avg_doc_len
    }

    /// Number of nodes containing a term
    pub fn doc_freq(&self, term: &str) -> u32 {
        self.postings.get(term).map(|p| p.len() as u32).unwrap_or(0)
    }

    /// Document-frequency ratio of a term
    pub fn df_ratio(&self, term: &str) -> f32 {
        if self.total_docs == 0 {
            return 0.0;
        }
        self.doc_freq(term) as f32 / self.total_docs as f32
    }

    /// Smoothed IDF: `ln((N - df + 0.5) / (df + 0.5) + 1)`
    pub fn idf(&self, term: &str) -> f32 {
        let n = self.total_docs as f32;
        let df = self.doc_freq(term) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Posting list of a term, sorted by node id
    pub fn posting_of(&self, term: &str) -> &[Posting] {
        self.postings.get(term).map(|p| p.as_slice()).unwrap_or(&[])
    }

    /// Occurrence positions of a term in one node
    pub fn positions(&self, term: &str, node: NodeId) -> Option<&[u32]> {
        let list = self.postings.get(term)?;
        let idx = list.binary_search_by_key(&node, |p| p.node_id).ok()?;
        Some(&list[idx].positions)
    }

    /// Term frequency of a term in one node
    pub fn tf(&self, term: &str, node: NodeId) -> u32 {
        self.positions(term, node).map(|p| p.len() as u32).unwrap_or(0)
    }

    /// Node length in tokens
    pub fn doc_len(&self, node: NodeId) -> u32 {
        self.doc_len[node.index()]
    }

    /// Node length in characters (normalized)
    pub fn doc_chars(&self, node: NodeId) -> u32 {
        self.doc_chars[node.index()]
    }

    /// Normalized node title
    pub fn title_norm(&self, node: NodeId) -> &str {
        &self.titles_norm[node.index()]
    }

    /// Normalized first line of the node
    pub fn first_line_norm(&self, node: NodeId) -> &str {
        &self.first_lines_norm[node.index()]
    }

    /// Normalized node text
    pub fn text_norm(&self, node: NodeId) -> &str {
        &self.texts_norm[node.index()]
    }

    // ========================================================================
    // Scoring
    // ========================================================================

    /// Raw BM25 for one term in one node; code-exact terms double their tf
    fn bm25_term(&self, term: &str, node: NodeId) -> f32 {
        let mut tf = self.tf(term, node) as f32;
        if tf == 0.0 {
            return 0.0;
        }
        if is_code_token(term) {
            tf *= 2.0;
        }
        let doc_len = self.doc_len(node) as f32;
        let denom = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / self.avg_doc_len);
        self.idf(term) * (tf * (BM25_K1 + 1.0)) / denom
    }

    /// Corrected BM25 for a unique term set against one node
    ///
    /// Applies, in order: the query-coverage multiplier, the node-coverage
    /// multiplier, and the length penalty. Weights come from `cfg` only.
    pub fn score_query(&self, unique_terms: &[String], node: NodeId, cfg: &Config) -> ScoreParts {
        if unique_terms.is_empty() {
            return ScoreParts::zero();
        }
        let mut raw = 0.0f32;
        let mut token_hits = 0u32;
        let mut matched: Vec<String> = Vec::new();
        for term in unique_terms {
            let tf = self.tf(term, node);
            if tf == 0 {
                continue;
            }
            token_hits += tf;
            matched.push(term.clone());
            raw += self.bm25_term(term, node);
        }
        if matched.is_empty() {
            return ScoreParts::zero();
        }

        let query_coverage = matched.len() as f32 / unique_terms.len() as f32;
        let node_coverage = (token_hits as f32 / self.doc_len(node) as f32).min(1.0);
        let mut score = raw
            * (1.0 + cfg.sparse_query_coverage_weight * query_coverage)
            * (1.0 + cfg.lexical_coverage_weight * node_coverage);
        score -= cfg.lexical_length_penalty_weight
            * (1.0 + self.doc_chars(node) as f32 / 4000.0).ln();

        ScoreParts {
            score: score.max(0.0),
            token_hits,
            match_coverage: query_coverage,
            matched_terms: matched,
        }
    }

    // ========================================================================
    // Phrase containment
    // ========================================================================

    /// True when `term_tokens` occur at consecutive positions in the node
    pub fn contains_phrase(&self, node: NodeId, term_tokens: &[String]) -> bool {
        let Some(first) = term_tokens.first() else {
            return false;
        };
        let Some(starts) = self.positions(first, node) else {
            return false;
        };
        if term_tokens.len() == 1 {
            return true;
        }
        'starts: for &start in starts {
            for (offset, token) in term_tokens.iter().enumerate().skip(1) {
                let want = start + offset as u32;
                match self.positions(token, node) {
                    Some(positions) if positions.binary_search(&want).is_ok() => {}
                    _ => continue 'starts,
                }
            }
            return true;
        }
        false
    }

    /// Nodes containing the token sequence, in arena order
    pub fn nodes_containing_phrase(&self, term_tokens: &[String]) -> Vec<NodeId> {
        let Some(first) = term_tokens.first() else {
            return Vec::new();
        };
        self.posting_of(first)
            .iter()
            .map(|p| p.node_id)
            .filter(|node| self.contains_phrase(*node, term_tokens))
            .collect()
    }

    /// Document frequency of a token sequence (phrase containment)
    pub fn phrase_doc_freq(&self, term_tokens: &[String]) -> u32 {
        self.nodes_containing_phrase(term_tokens).len() as u32
    }

    /// Mean IDF of a token sequence
    pub fn phrase_idf(&self, term_tokens: &[String]) -> f32 {
        if term_tokens.is_empty() {
            return 0.0;
        }
        term_tokens.iter().map(|t| self.idf(t)).sum::<f32>() / term_tokens.len() as f32
    }
}

// ============================================================================
// Tests
// ============================================================================
