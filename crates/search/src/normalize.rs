//! Text normalization
//!
//! This module provides:
//! - `normalize_text`: the canonical folding pipeline under all scoring
//! - `split_terms`: whitespace term splitting over normalized text
//! - `loose_contains`: containment that ignores interleaved glue characters
//!
//! Pipeline order: roman-numeral digits → NFKC → newline unification →
//! symbol-variant folds → casefold → per-line whitespace collapse.
//!
//! # Invariant
//!
//! `normalize_text` is idempotent and preserves the line count.

use unicode_normalization::UnicodeNormalization;

// ============================================================================
// Folding tables
// ============================================================================

/// Hyphen-class characters folded to ASCII `-`
const HYPHEN_CLASS: [char; 5] = ['\u{2010}', '\u{2011}', '\u{2013}', '\u{2014}', '\u{2212}'];

/// Characters treated as glue by [`loose_contains`]
const GLUE_CLASS: [char; 9] = [' ', '\t', '\n', '-', '・', '/', '(', ')', '、'];

fn roman_digit(c: char) -> Option<&'static str> {
    // Dedicated roman-numeral codepoints only; letter sequences like "II"
    // are left alone. NFKC would otherwise map these to ASCII letters, so
    // this fold runs first.
    match c {
        '\u{2160}' | '\u{2170}' => Some("1"),
        '\u{2161}' | '\u{2171}' => Some("2"),
        '\u{2162}' | '\u{2172}' => Some("3"),
        '\u{2163}' | '\u{2173}' => Some("4"),
        '\u{2164}' | '\u{2174}' => Some("5"),
        '\u{2165}' | '\u{2175}' => Some("6"),
        '\u{2166}' | '\u{2176}' => Some("7"),
        '\u{2167}' | '\u{2177}' => Some("8"),
        '\u{2168}' | '\u{2178}' => Some("9"),
        '\u{2169}' | '\u{2179}' => Some("10"),
        '\u{216A}' | '\u{217A}' => Some("11"),
        '\u{216B}' | '\u{217B}' => Some("12"),
        _ => None,
    }
}

fn fold_symbol(c: char) -> char {
    if HYPHEN_CLASS.contains(&c) {
        return '-';
    }
    match c {
        '\u{FF65}' => '・',
        '（' => '(',
        '）' => ')',
        '／' => '/',
        '\t' => ' ',
        '\u{3000}' => ' ',
        _ => c,
    }
}

// ============================================================================
// normalize_text
// ============================================================================

/// Normalize text for indexing and matching
pub fn normalize_text(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for c in text.chars() {
        match roman_digit(c) {
            Some(digits) => folded.push_str(digits),
            None => folded.push(c),
        }
    }

    let nfkc: String = folded.nfkc().collect();
    let unified = nfkc.replace("\r\n", "\n").replace('\r', "\n");

    let mut symbols = String::with_capacity(unified.len());
    for c in unified.chars() {
        symbols.push(fold_symbol(c));
    }
    let lowered = symbols.to_lowercase();

    // Collapse whitespace runs within each line; newlines stay so the line
    // count is preserved.
    let mut out = String::with_capacity(lowered.len());
    let mut first = true;
    for line in lowered.split('\n') {
        if !first {
            out.push('\n');
        }
        first = false;
        let mut prev_space = false;
        let trimmed = line.trim();
        for c in trimmed.chars() {
            if c == ' ' {
                if !prev_space {
                    out.push(' ');
                }
                prev_space = true;
            } else {
                out.push(c);
                prev_space = false;
            }
        }
    }
    out
}

/// Split a query into normalized whitespace-separated terms
pub fn split_terms(query: &str) -> Vec<String> {
    normalize_text(query)
        .split_whitespace()
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}

// ============================================================================
// loose_contains
// ============================================================================

fn is_glue(c: char) -> bool {
    GLUE_CLASS.contains(&c)
}

/// Glue-free character sequence of a term, for repeated [`loose_find`] calls
pub fn loose_needle(term: &str) -> Vec<char> {
    normalize_text(term).chars().filter(|c| !is_glue(*c)).collect()
}

/// True when `needle` occurs in already-normalized `text`, ignoring
/// interleaved glue characters
pub fn loose_find(needle: &[char], text: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let haystack: Vec<char> = text.chars().collect();

    'outer: for start in 0..haystack.len() {
        if haystack[start] != needle[0] {
            continue;
        }
        let mut n_idx = 1;
        let mut h_idx = start + 1;
        while n_idx < needle.len() {
            match haystack.get(h_idx) {
                Some(c) if *c == needle[n_idx] => {
                    n_idx += 1;
                    h_idx += 1;
                }
                Some(c) if is_glue(*c) => h_idx += 1,
                _ => continue 'outer,
            }
        }
        return true;
    }
    false
}

/// True when `term` occurs in `text` ignoring interleaved glue characters
///
/// Matches `社会 保険` against `社会・保険` or `社会-保険`; both sides are
/// normalized first.
pub fn loose_contains(term: &str, text: &str) -> bool {
    loose_find(&loose_needle(term), &normalize_text(text))
}

// ============================================================================
// Tests
// ============================================================================
