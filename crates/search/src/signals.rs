//! Lexical evidence signals
//!
//! This module provides:
//! - `QueryView`: the tokenized query with synonyms and code tokens
//! - `compute_signals`: signal set + score bonus for one node
//! - `prf_terms` / `prf_boosts`: the optional pseudo-relevance second pass
//!
//! Weights come exclusively from [`Config`]; the built-in vocabularies
//! (exception words, number-context units, synonyms) are data, not weights.

use crate::index::SparseIndex;
use crate::normalize::{loose_find, loose_needle, normalize_text, split_terms};
use crate::tokenizer::{is_code_token, tokenize, unique_terms};
use manualfind_core::{Config, NodeId, Signal, SignalSet};
use std::collections::{HashMap, HashSet};

/// Words marking exception clauses; evidence only as a tie-breaker
pub const EXCEPTION_WORDS: [&str; 6] = ["注意", "留意", "対象外", "除外", "不適用", "支払われない"];

/// Units and counters that give a digit token its context
const NUMBER_UNIT_WORDS: [&str; 18] = [
    "日", "円", "年", "月", "週", "回", "件", "名", "人", "時間", "分", "割", "%", "か月", "ヶ月",
    "days", "hours", "percent",
];

/// Particles preceding a digit that give it context
const NUMBER_LEAD_WORDS: [&str; 4] = ["から", "まで", "約", "第"];

fn builtin_synonyms(term: &str) -> &'static [&'static str] {
    match term {
        "対象外" => &["除外", "不適用"],
        "手順" => &["フロー", "手続き"],
        _ => &[],
    }
}

// ============================================================================
// QueryView
// ============================================================================

/// Tokenized view of one query
#[derive(Debug, Clone)]
pub struct QueryView {
    /// Token texts in query order (duplicates kept)
    pub tokens: Vec<String>,
    /// Unique token texts in first-seen order
    pub unique: Vec<String>,
    /// Code-exact tokens present in the query
    pub code_tokens: Vec<String>,
    /// First token of the query (title / anchor matching)
    pub head: Option<String>,
    /// Synonym expansions of query terms, tokenized
    pub synonym_tokens: Vec<Vec<String>>,
    /// Glue-free character sequence of the whole query (loose rescue)
    pub loose: Vec<char>,
}

impl QueryView {
    /// Build the view from a raw query string
    pub fn new(query: &str) -> Self {
        let normalized = normalize_text(query);
        let tokens = tokenize(&normalized);
        let unique = unique_terms(&tokens);
        let code_tokens: Vec<String> = unique
            .iter()
            .filter(|t| is_code_token(t))
            .cloned()
            .collect();
        let head = tokens.first().map(|t| t.text.clone());

        let mut synonym_tokens: Vec<Vec<String>> = Vec::new();
        for term in split_terms(query) {
            for synonym in builtin_synonyms(&term) {
                let toks: Vec<String> = tokenize(&normalize_text(synonym))
                    .into_iter()
                    .map(|t| t.text)
                    .collect();
                if !toks.is_empty() {
                    synonym_tokens.push(toks);
                }
            }
        }

        QueryView {
            tokens: tokens.into_iter().map(|t| t.text).collect(),
            unique,
            code_tokens,
            head,
            synonym_tokens,
            loose: loose_needle(query),
        }
    }

    /// True when the query produced no tokens
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

// ============================================================================
// NodeSignals
// ============================================================================

/// Signal set and score delta for one node
#[derive(Debug, Clone, Default)]
pub struct NodeSignals {
    /// Evidence markers
    pub signals: SignalSet,
    /// Score bonus to add to the base score
    pub bonus: f32,
}

/// Compute the lexical signals of one node
///
/// `required_token_seqs` are the tokenized required terms (possibly empty).
/// The base BM25 parts are computed separately; this function only decides
/// markers and bonuses.
pub fn compute_signals(
    index: &SparseIndex,
    cfg: &Config,
    query: &QueryView,
    required_token_seqs: &[Vec<String>],
    extra_exception_words: &[String],
    node: NodeId,
    matched_terms: &[String],
) -> NodeSignals {
    let mut out = NodeSignals::default();

    if !matched_terms.is_empty() {
        out.signals.insert(Signal::Exact);
    } else {
        // Synonym rescue: an expansion counts as a (weaker) exact marker.
        for synonym in &query.synonym_tokens {
            if index.contains_phrase(node, synonym) {
                out.signals.insert(Signal::Exact);
                break;
            }
        }
        // Loose rescue: the whole query occurs with glue characters
        // interleaved (社会・保険 for 社会保険), which bigram postings miss.
        if !out.signals.contains(&Signal::Exact)
            && loose_find(&query.loose, index.text_norm(node))
        {
            out.signals.insert(Signal::Exact);
        }
        if out.signals.contains(&Signal::Exact) {
            // Rescued nodes carry no BM25 mass; half a phrase weight keeps
            // them above the acceptance floor.
            out.bonus += cfg.lexical_phrase_weight * 0.5;
        }
    }

    if query.unique.len() >= 2 && phrase_in_order(index, node, &query.tokens) {
        out.signals.insert(Signal::Phrase);
        out.bonus += cfg.lexical_phrase_weight;
    }

    if required_token_seqs.len() >= 2 {
        if let Some(distance) = required_pair_distance(index, node, required_token_seqs) {
            if distance <= cfg.lexical_proximity_near_window as u32 {
                out.signals.insert(Signal::Proximity);
                out.bonus += cfg.lexical_proximity_bonus_near;
            } else if distance <= cfg.lexical_proximity_far_window as u32 {
                out.signals.insert(Signal::Proximity);
                out.bonus += cfg.lexical_proximity_bonus_far;
            }
        }
    }

    // A numeric fact only counts as evidence on top of a real match.
    if !matched_terms.is_empty() && has_number_context(index.text_norm(node)) {
        out.signals.insert(Signal::NumberContext);
        out.bonus += cfg.lexical_number_context_bonus;
    }

    for code in &query.code_tokens {
        if index.tf(code, node) > 0 {
            out.signals.insert(Signal::CodeExact);
            break;
        }
    }

    if let Some(head) = &query.head {
        let title = index.title_norm(node);
        if title.contains(head.as_str()) {
            out.signals.insert(Signal::DefinitionTitle);
            out.bonus += cfg.lexical_title_bonus;
        } else if index.first_line_norm(node).contains(head.as_str()) {
            out.signals.insert(Signal::Anchor);
            out.bonus += cfg.lexical_title_bonus * 0.5;
        }
    }

    let text = index.text_norm(node);
    let has_exception = EXCEPTION_WORDS.iter().any(|w| text.contains(w))
        || extra_exception_words
            .iter()
            .any(|w| !w.is_empty() && text.contains(normalize_text(w).as_str()));
    if has_exception {
        out.signals.insert(Signal::Exceptions);
    }

    out
}

/// True when the signal set qualifies a candidate
///
/// `Exceptions` alone is never sufficient evidence.
pub fn qualifies(signals: &SignalSet) -> bool {
    signals.iter().any(|s| s.is_qualifying())
}

// ============================================================================
// Signal primitives
// ============================================================================

/// All query tokens in order, each within two positions of the previous
fn phrase_in_order(index: &SparseIndex, node: NodeId, tokens: &[String]) -> bool {
    let Some(first) = tokens.first() else {
        return false;
    };
    let Some(starts) = index.positions(first, node) else {
        return false;
    };
    'starts: for &start in starts {
        let mut prev = start;
        for token in &tokens[1..] {
            let Some(positions) = index.positions(token, node) else {
                return false;
            };
            // Next token must follow within a two-position window.
            let next = positions.iter().find(|&&p| p > prev && p <= prev + 2);
            match next {
                Some(&p) => prev = p,
                None => continue 'starts,
            }
        }
        return true;
    }
    false
}

/// Minimum position distance between occurrences of two required terms
fn required_pair_distance(
    index: &SparseIndex,
    node: NodeId,
    required_token_seqs: &[Vec<String>],
) -> Option<u32> {
    let first = required_token_seqs.first()?.first()?;
    let second = required_token_seqs.get(1)?.first()?;
    let a = index.positions(first, node)?;
    let b = index.positions(second, node)?;

    let mut best: Option<u32> = None;
    for &pa in a {
        for &pb in b {
            let distance = pa.abs_diff(pb);
            if best.map(|d| distance < d).unwrap_or(true) {
                best = Some(distance);
            }
        }
    }
    best
}

/// Digit run with a unit suffix or particle prefix in the normalized text
fn has_number_context(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let mut after = i;
            if after < chars.len() && chars[after] == ' ' {
                after += 1;
            }
            let tail: String = chars[after..chars.len().min(after + 8)].iter().collect();
            if NUMBER_UNIT_WORDS.iter().any(|unit| tail.starts_with(unit)) {
                return true;
            }
            let head: String = chars[start.saturating_sub(4)..start].iter().collect();
            if NUMBER_LEAD_WORDS.iter().any(|lead| head.ends_with(lead)) {
                return true;
            }
        } else {
            i += 1;
        }
    }
    false
}

// ============================================================================
// Pseudo-relevance feedback
// ============================================================================

/// Most distinctive terms of the top-ranked nodes
///
/// Terms already in the query are excluded; at most `cfg.prf_terms` terms
/// are returned, ordered by `tf * idf` over the inspected nodes.
pub fn prf_terms(
    index: &SparseIndex,
    cfg: &Config,
    query: &QueryView,
    ranking: &[(NodeId, f32)],
) -> Vec<String> {
    let query_terms: HashSet<&String> = query.unique.iter().collect();
    let mut weights: HashMap<String, f32> = HashMap::new();

    for (node, _) in ranking.iter().take(cfg.prf_top_k) {
        let tokens = tokenize(index.text_norm(*node));
        let mut tf_local: HashMap<&str, u32> = HashMap::new();
        for token in &tokens {
            *tf_local.entry(token.text.as_str()).or_insert(0) += 1;
        }
        for (term, tf) in tf_local {
            if query_terms.contains(&term.to_string()) {
                continue;
            }
            *weights.entry(term.to_string()).or_insert(0.0) += tf as f32 * index.idf(term);
        }
    }

    let mut ranked: Vec<(String, f32)> = weights.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(cfg.prf_terms).map(|(t, _)| t).collect()
}

/// Second-pass boosts for nodes containing PRF terms
pub fn prf_boosts(index: &SparseIndex, cfg: &Config, terms: &[String]) -> HashMap<NodeId, f32> {
    let mut boosts: HashMap<NodeId, f32> = HashMap::new();
    if terms.is_empty() {
        return boosts;
    }
    let share = cfg.prf_weight / terms.len() as f32;
    for term in terms {
        for posting in index.posting_of(term) {
            *boosts.entry(posting.node_id).or_insert(0.0) += share * index.idf(term);
        }
    }
    boosts
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use manualfind_store::ManualSnapshot;
    use std::fs;
    use std::path::Path;

    fn setup(dir: &Path) {
        fs::create_dir_all(dir.join("hr")).unwrap();
        fs::write(
            dir.join("hr/leave.md"),
            "# 年次有給休暇\n年次有給休暇は10日以上付与される\n対象外の場合は注意\n",
        )
        .unwrap();
        fs::write(dir.join("hr/misc.md"), "# 雑則\n特筆なし\n").unwrap();
        fs::write(dir.join("hr/api.md"), "# 設定\nfoo.bar を使うこと\n").unwrap();
    }

    fn build(dir: &Path) -> (ManualSnapshot, SparseIndex) {
        let snapshot = ManualSnapshot::build(dir, "hr").unwrap();
        let index = SparseIndex::build(&snapshot);
        (snapshot, index)
    }

    fn node_with(snapshot: &ManualSnapshot, needle: &str) -> NodeId {
        snapshot
            .nodes()
            .find(|n| snapshot.text(n.id).contains(needle))
            .unwrap()
            .id
    }

    #[test]
    fn test_query_view() {
        let view = QueryView::new("年次有給休暇の付与 foo.bar");
        assert!(!view.is_empty());
        assert_eq!(view.head.as_deref(), Some("年次"));
        assert_eq!(view.code_tokens, vec!["foo.bar"]);
    }

    #[test]
    fn test_query_view_synonyms() {
        let view = QueryView::new("対象外");
        assert_eq!(view.synonym_tokens.len(), 2);
    }

    #[test]
    fn test_exact_and_title_signals() {
        let dir = tempfile::tempdir().unwrap();
        setup(dir.path());
        let (snapshot, index) = build(dir.path());
        let cfg = Config::default();
        let query = QueryView::new("年次有給休暇");
        let node = node_with(&snapshot, "付与される");

        let parts = index.score_query(&query.unique, node, &cfg);
        let signals = compute_signals(&index, &cfg, &query, &[], &[], node, &parts.matched_terms);
        assert!(signals.signals.contains(&Signal::Exact));
        assert!(signals.signals.contains(&Signal::DefinitionTitle));
        assert!(signals.bonus > 0.0);
    }

    #[test]
    fn test_number_context_signal() {
        let dir = tempfile::tempdir().unwrap();
        setup(dir.path());
        let (snapshot, index) = build(dir.path());
        let cfg = Config::default();
        let query = QueryView::new("付与");
        let node = node_with(&snapshot, "10日以上");

        let parts = index.score_query(&query.unique, node, &cfg);
        let signals = compute_signals(&index, &cfg, &query, &[], &[], node, &parts.matched_terms);
        assert!(signals.signals.contains(&Signal::NumberContext));
    }

    #[test]
    fn test_code_exact_signal() {
        let dir = tempfile::tempdir().unwrap();
        setup(dir.path());
        let (snapshot, index) = build(dir.path());
        let cfg = Config::default();
        let query = QueryView::new("foo.bar");
        let node = node_with(&snapshot, "foo.bar");

        let parts = index.score_query(&query.unique, node, &cfg);
        let signals = compute_signals(&index, &cfg, &query, &[], &[], node, &parts.matched_terms);
        assert!(signals.signals.contains(&Signal::CodeExact));
    }

    #[test]
    fn test_exceptions_alone_does_not_qualify() {
        let dir = tempfile::tempdir().unwrap();
        setup(dir.path());
        let (snapshot, index) = build(dir.path());
        let cfg = Config::default();
        let query = QueryView::new("zzzz");
        let node = node_with(&snapshot, "対象外");

        let signals = compute_signals(&index, &cfg, &query, &[], &[], node, &[]);
        assert!(signals.signals.contains(&Signal::Exceptions));
        assert!(!qualifies(&signals.signals));
    }

    #[test]
    fn test_proximity_signal_for_required_pair() {
        let dir = tempfile::tempdir().unwrap();
        setup(dir.path());
        let (snapshot, index) = build(dir.path());
        let cfg = Config::default();
        let query = QueryView::new("休暇 付与");
        let node = node_with(&snapshot, "付与される");
        let required: Vec<Vec<String>> = vec![vec!["休暇".into()], vec!["付与".into()]];

        let parts = index.score_query(&query.unique, node, &cfg);
        let signals =
            compute_signals(&index, &cfg, &query, &required, &[], node, &parts.matched_terms);
        assert!(signals.signals.contains(&Signal::Proximity));
    }

    #[test]
    fn test_loose_rescue_marks_exact() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("hr")).unwrap();
        // Interleaved middle dot splits the bigram run.
        fs::write(dir.path().join("hr/glue.md"), "# 表記\n休・暇の扱い\n").unwrap();
        let (snapshot, index) = build(dir.path());
        let cfg = Config::default();
        let query = QueryView::new("休暇");
        let node = snapshot.nodes().next().unwrap().id;

        let parts = index.score_query(&query.unique, node, &cfg);
        assert!(parts.matched_terms.is_empty());
        let signals = compute_signals(&index, &cfg, &query, &[], &[], node, &parts.matched_terms);
        assert!(signals.signals.contains(&Signal::Exact));
        assert!(signals.bonus > 0.0);
    }

    #[test]
    fn test_has_number_context() {
        assert!(has_number_context("10日まで有効"));
        assert!(has_number_context("about 3 days total"));
        assert!(has_number_context("第3章"));
        assert!(!has_number_context("記号 1234 のみ"));
        assert!(!has_number_context("数字なし"));
    }

    #[test]
    fn test_prf_terms_exclude_query() {
        let dir = tempfile::tempdir().unwrap();
        setup(dir.path());
        let (snapshot, index) = build(dir.path());
        let mut cfg = Config::default();
        cfg.prf_enabled = true;
        let query = QueryView::new("休暇");
        let node = node_with(&snapshot, "付与される");

        let terms = prf_terms(&index, &cfg, &query, &[(node, 1.0)]);
        assert!(!terms.is_empty());
        assert!(terms.iter().all(|t| t != "休暇"));

        let boosts = prf_boosts(&index, &cfg, &terms);
        assert!(boosts.values().all(|b| *b > 0.0));
    }
}
