//! Comparative query decomposition
//!
//! This module provides:
//! - `decompose_query`: detect comparison structures and emit sub-queries
//!
//! Only clearly comparative patterns decompose (`AとBの違い`, `A vs B`,
//! `difference between A and B`, ...). Anything else returns no
//! sub-queries and the pipeline proceeds undecomposed.

/// Sub-queries extracted from a comparative query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Decomposition {
    /// Extracted sub-queries, in query order
    pub sub_queries: Vec<String>,
}

impl Decomposition {
    /// True when no comparative pattern matched
    pub fn is_empty(&self) -> bool {
        self.sub_queries.is_empty()
    }
}

/// Japanese comparison suffixes stripped before splitting on `と`
const JA_COMPARE_SUFFIXES: [&str; 4] = ["の違い", "の比較", "はどっち", "どっち"];

/// Detect a comparison structure and emit up to `max_sub_queries` parts
pub fn decompose_query(query: &str, max_sub_queries: usize) -> Decomposition {
    if max_sub_queries == 0 {
        return Decomposition::default();
    }
    let trimmed = query.trim();

    let parts = japanese_comparison(trimmed)
        .or_else(|| split_on_separator(trimmed, " vs "))
        .or_else(|| split_on_separator(trimmed, " versus "))
        .or_else(|| english_comparison(trimmed));

    let Some(parts) = parts else {
        return Decomposition::default();
    };

    let mut sub_queries: Vec<String> = Vec::new();
    for part in parts {
        let part = part.trim();
        if part.is_empty() || sub_queries.iter().any(|existing| existing == part) {
            continue;
        }
        sub_queries.push(part.to_string());
        if sub_queries.len() == max_sub_queries {
            break;
        }
    }
    if sub_queries.len() < 2 {
        return Decomposition::default();
    }
    Decomposition { sub_queries }
}

fn japanese_comparison(query: &str) -> Option<Vec<String>> {
    for suffix in JA_COMPARE_SUFFIXES {
        if let Some(stripped) = query.strip_suffix(suffix) {
            if stripped.contains('と') {
                return Some(stripped.split('と').map(String::from).collect());
            }
        }
    }
    None
}

fn split_on_separator(query: &str, separator: &str) -> Option<Vec<String>> {
    let lowered = query.to_lowercase();
    // Lowercasing must be length-preserving for byte offsets to transfer.
    if lowered.len() != query.len() || !lowered.contains(separator) {
        return None;
    }
    // Split on the lowered form but slice the original so casing survives.
    let idx = lowered.find(separator)?;
    let left = &query[..idx];
    let right = &query[idx + separator.len()..];
    Some(vec![left.to_string(), right.to_string()])
}

fn english_comparison(query: &str) -> Option<Vec<String>> {
    let lowered = query.to_lowercase();
    if lowered.len() != query.len() {
        return None;
    }
    for prefix in ["difference between ", "compare "] {
        if let Some(idx) = lowered.find(prefix) {
            let rest = &query[idx + prefix.len()..];
            let rest_lower = &lowered[idx + prefix.len()..];
            for joiner in [" and ", " with ", " to "] {
                if let Some(join_idx) = rest_lower.find(joiner) {
                    return Some(vec![
                        rest[..join_idx].to_string(),
                        rest[join_idx + joiner.len()..].to_string(),
                    ]);
                }
            }
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_japanese_difference_pattern() {
        let d = decompose_query("忌引休暇と特別休暇の違い", 3);
        assert_eq!(d.sub_queries, vec!["忌引休暇", "特別休暇"]);
    }

    #[test]
    fn test_japanese_comparison_pattern() {
        let d = decompose_query("A案とB案の比較", 3);
        assert_eq!(d.sub_queries, vec!["A案", "B案"]);
    }

    #[test]
    fn test_vs_pattern() {
        let d = decompose_query("grpc vs rest", 3);
        assert_eq!(d.sub_queries, vec!["grpc", "rest"]);
        let d = decompose_query("GRPC VS REST", 3);
        assert_eq!(d.sub_queries, vec!["GRPC", "REST"]);
    }

    #[test]
    fn test_versus_pattern() {
        let d = decompose_query("tokio versus async-std", 3);
        assert_eq!(d.sub_queries, vec!["tokio", "async-std"]);
    }

    #[test]
    fn test_difference_between_pattern() {
        let d = decompose_query("difference between sick leave and annual leave", 3);
        assert_eq!(d.sub_queries, vec!["sick leave", "annual leave"]);
    }

    #[test]
    fn test_compare_with_pattern() {
        let d = decompose_query("compare postgres with mysql", 3);
        assert_eq!(d.sub_queries, vec!["postgres", "mysql"]);
    }

    #[test]
    fn test_non_comparative_query() {
        assert!(decompose_query("年次有給休暇の付与日数", 3).is_empty());
        assert!(decompose_query("annual leave days", 3).is_empty());
    }

    #[test]
    fn test_max_sub_queries_bound() {
        let d = decompose_query("AとBとCとDの違い", 3);
        assert_eq!(d.sub_queries.len(), 3);
        assert_eq!(d.sub_queries, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_duplicate_parts_collapse() {
        let d = decompose_query("AとAの違い", 3);
        assert!(d.is_empty());
    }

    #[test]
    fn test_zero_budget() {
        assert!(decompose_query("a vs b", 0).is_empty());
    }
}
