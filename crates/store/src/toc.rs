//! Markdown sectioning
//!
//! This module provides:
//! - `parse_markdown_toc`: ATX heading tree with section line ranges
//! - `json_line_count`: display line count for a JSON file node
//!
//! A heading's section runs until the next heading of the same or a higher
//! level, so a node body includes all of its descendant headings. Files
//! without headings become a single node titled by the file stem.

use serde::Serialize;

// ============================================================================
// MdNode
// ============================================================================

/// One heading node of a markdown file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MdNode {
    /// `heading` (kept for wire compatibility with json_file nodes)
    pub kind: &'static str,
    /// Stable node id: `path#L{line_start}`
    pub node_id: String,
    /// File path relative to the manual root
    pub path: String,
    /// Heading text
    pub title: String,
    /// Heading level 1..=6
    pub level: u8,
    /// Node id of the nearest shallower heading
    pub parent_id: Option<String>,
    /// 1-based first line (the heading line)
    pub line_start: u32,
    /// 1-based last line of the section, descendants included
    pub line_end: u32,
}

// ============================================================================
// Parsing
// ============================================================================

fn match_heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    let title = rest.trim();
    if title.is_empty() {
        return None;
    }
    Some((hashes as u8, title))
}

fn compute_line_ends(total_lines: u32, headings: &[(u32, u8)]) -> Vec<u32> {
    let mut ends = Vec::with_capacity(headings.len());
    for (idx, &(start, level)) in headings.iter().enumerate() {
        let mut end = total_lines;
        for &(next_start, next_level) in &headings[idx + 1..] {
            if next_level <= level {
                end = next_start - 1;
                break;
            }
        }
        ends.push(end.max(start));
    }
    ends
}

/// Parse the heading tree of a markdown file
pub fn parse_markdown_toc(relative_path: &str, text: &str) -> Vec<MdNode> {
    let lines: Vec<&str> = text.lines().collect();
    let mut headings: Vec<(u32, u8)> = Vec::new();
    let mut titles: Vec<&str> = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if let Some((level, title)) = match_heading(line) {
            headings.push((idx as u32 + 1, level));
            titles.push(title);
        }
    }

    if headings.is_empty() {
        let stem = relative_path
            .rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.').map(|(stem, _)| stem))
            .filter(|stem| !stem.is_empty())
            .unwrap_or(relative_path);
        return vec![MdNode {
            kind: "heading",
            node_id: format!("{relative_path}#L1"),
            path: relative_path.to_string(),
            title: stem.to_string(),
            level: 1,
            parent_id: None,
            line_start: 1,
            line_end: (lines.len() as u32).max(1),
        }];
    }

    let ends = compute_line_ends(lines.len() as u32, &headings);
    let mut nodes: Vec<MdNode> = Vec::with_capacity(headings.len());
    let mut stack: Vec<(u8, String)> = Vec::new();
    for ((&(line_start, level), &title), &line_end) in
        headings.iter().zip(titles.iter()).zip(ends.iter())
    {
        while stack.last().map(|(l, _)| *l >= level).unwrap_or(false) {
            stack.pop();
        }
        let parent_id = stack.last().map(|(_, id)| id.clone());
        let node_id = format!("{relative_path}#L{line_start}");
        nodes.push(MdNode {
            kind: "heading",
            node_id: node_id.clone(),
            path: relative_path.to_string(),
            title: title.to_string(),
            level,
            parent_id,
            line_start,
            line_end,
        });
        stack.push((level, node_id));
    }
    nodes
}

/// Display line count for a JSON file node
///
/// Pretty-printed length when the file parses, raw line count otherwise.
pub fn json_line_count(text: &str) -> u32 {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => serde_json::to_string_pretty(&value)
            .map(|pretty| pretty.lines().count() as u32)
            .unwrap_or(1)
            .max(1),
        Err(_) => (text.lines().count() as u32).max(1),
    }
}

// ============================================================================
// Tests
// ============================================================================
