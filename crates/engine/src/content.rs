//! Read-only content access
//!
//! This module provides:
//! - `Engine::manual_ls`: the indexable files of one or all manuals
//! - `Engine::manual_toc`: the heading tree of one manual
//! - `Engine::manual_read`: scoped section reads with hard caps
//!
//! These operations share the document store with the search pipeline but
//! never touch the index, the cache, or the trace store.

use crate::state::Engine;
use manualfind_core::{ensure, FileKind, Result, ToolError};
use manualfind_store::{
    discover_manual_ids, json_line_count, list_manual_files, manual_exists, parse_markdown_toc,
    resolve_inside_root, ManualFile,
};
use serde::{Deserialize, Serialize};

/// Default characters around a snippet target line
const SNIPPET_CONTEXT_CHARS: usize = 240;

// ============================================================================
// Shapes
// ============================================================================

/// One row of `manual_toc`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocItem {
    /// `heading` or `json_file`
    pub kind: String,
    /// Stable node id (`path#L{line}` or `path#file`)
    pub node_id: String,
    /// File path relative to the manual root
    pub path: String,
    /// Heading text or file name
    pub title: String,
    /// Heading level (1 for json files)
    pub level: u8,
    /// Nearest shallower heading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// 1-based first line
    pub line_start: u32,
    /// 1-based last line
    pub line_end: u32,
}

/// Read scope of `manual_read`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadScope {
    /// Characters around the target line
    Snippet,
    /// One heading section
    Section,
    /// The target section and its following sections
    Sections,
    /// The whole file (json only)
    File,
}

impl ReadScope {
    /// Parse a caller-supplied scope string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "snippet" => Some(ReadScope::Snippet),
            "section" => Some(ReadScope::Section),
            "sections" => Some(ReadScope::Sections),
            "file" => Some(ReadScope::File),
            _ => None,
        }
    }
}

/// Result of `manual_read`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResult {
    /// Extracted text
    pub text: String,
    /// True when the hard caps trimmed the output
    pub truncated: bool,
    /// Scope actually applied
    pub applied_scope: ReadScope,
}

fn trim_text(text: String, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text, false);
    }
    (text.chars().take(max_chars).collect(), true)
}

// ============================================================================
// Operations
// ============================================================================

impl Engine {
    /// List indexable files, of one manual or all of them
    pub fn manual_ls(&self, manual_id: Option<&str>) -> Result<Vec<ManualFile>> {
        let root = &self.config().manuals_root;
        match manual_id {
            Some(id) => list_manual_files(root, id),
            None => {
                let mut rows = Vec::new();
                for id in discover_manual_ids(root) {
                    rows.extend(list_manual_files(root, &id)?);
                }
                Ok(rows)
            }
        }
    }

    /// Heading tree of one manual, sorted by `(path, line_start)`
    pub fn manual_toc(&self, manual_id: &str) -> Result<Vec<TocItem>> {
        let root = &self.config().manuals_root;
        ensure(
            manual_exists(root, manual_id),
            ToolError::not_found("manual_id not found")
                .with_details(serde_json::json!({"manual_id": manual_id})),
        )?;

        let mut items: Vec<TocItem> = Vec::new();
        for file in list_manual_files(root, manual_id)? {
            let full = resolve_inside_root(&root.join(manual_id), &file.path, true)?;
            let Ok(text) = std::fs::read_to_string(&full) else {
                continue;
            };
            match file.file_kind {
                FileKind::Md => {
                    for node in parse_markdown_toc(&file.path, &text) {
                        items.push(TocItem {
                            kind: node.kind.to_string(),
                            node_id: node.node_id,
                            path: node.path,
                            title: node.title,
                            level: node.level,
                            parent_id: node.parent_id,
                            line_start: node.line_start,
                            line_end: node.line_end,
                        });
                    }
                }
                FileKind::Json => {
                    let title = file.path.rsplit('/').next().unwrap_or(&file.path).to_string();
                    items.push(TocItem {
                        kind: "json_file".to_string(),
                        node_id: format!("{}#file", file.path),
                        path: file.path.clone(),
                        title,
                        level: 1,
                        parent_id: None,
                        line_start: 1,
                        line_end: json_line_count(&text),
                    });
                }
            }
        }
        items.sort_by(|a, b| a.path.cmp(&b.path).then(a.line_start.cmp(&b.line_start)));
        Ok(items)
    }

    /// Read a scoped portion of one manual file
    ///
    /// Markdown defaults to `snippet`; json defaults to (and only
    /// supports) `file`. Markdown `file` scope is refused. Output is
    /// capped by the configured hard limits.
    pub fn manual_read(
        &self,
        manual_id: &str,
        path: &str,
        start_line: Option<u32>,
        scope: Option<ReadScope>,
        max_sections: Option<usize>,
        max_chars: Option<usize>,
    ) -> Result<ReadResult> {
        let cfg = self.config();
        let root = &cfg.manuals_root;
        ensure(
            manual_exists(root, manual_id),
            ToolError::not_found("manual_id not found")
                .with_details(serde_json::json!({"manual_id": manual_id})),
        )?;
        let full = resolve_inside_root(&root.join(manual_id), path, true)?;
        ensure(
            full.is_file(),
            ToolError::not_found("manual file not found")
                .with_details(serde_json::json!({"path": path})),
        )?;

        let is_json = full
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let text = std::fs::read_to_string(&full)
            .map_err(|_| ToolError::not_found("manual file not found"))?;

        let max_sections = max_sections.unwrap_or(20).min(cfg.read_hard_max_sections);
        let max_chars = max_chars.unwrap_or(8000).min(cfg.read_hard_max_chars);

        if is_json {
            let applied = scope.unwrap_or(ReadScope::File);
            if matches!(applied, ReadScope::Section | ReadScope::Sections) {
                return Err(ToolError::invalid_scope("json does not support section scopes"));
            }
            let (output, truncated) = trim_text(text, max_chars);
            return Ok(ReadResult {
                text: output,
                truncated,
                applied_scope: ReadScope::File,
            });
        }

        let applied = scope.unwrap_or(ReadScope::Snippet);
        let lines: Vec<&str> = text.lines().collect();
        let nodes = parse_markdown_toc(path, &text);
        let target = start_line
            .and_then(|line| nodes.iter().find(|n| n.line_start == line))
            .unwrap_or(&nodes[0]);

        let output = match applied {
            ReadScope::File => {
                return Err(ToolError::forbidden("md file scope is not allowed"));
            }
            ReadScope::Section => lines
                [target.line_start as usize - 1..(target.line_end as usize).min(lines.len())]
                .join("\n"),
            ReadScope::Sections => {
                let start_idx = nodes
                    .iter()
                    .position(|n| n.node_id == target.node_id)
                    .unwrap_or(0);
                let mut selected: Vec<String> = Vec::new();
                for node in nodes.iter().skip(start_idx).take(max_sections.max(1)) {
                    selected.push(
                        lines[node.line_start as usize - 1
                            ..(node.line_end as usize).min(lines.len())]
                            .join("\n"),
                    );
                }
                selected.join("\n\n")
            }
            ReadScope::Snippet => {
                let line_no = start_line.unwrap_or(1).clamp(1, lines.len().max(1) as u32) as usize;
                let char_cursor: usize = lines[..line_no - 1]
                    .iter()
                    .map(|l| l.chars().count() + 1)
                    .sum();
                let line_len = lines.get(line_no - 1).map(|l| l.chars().count()).unwrap_or(0);
                let chars: Vec<char> = text.chars().collect();
                let start = char_cursor.saturating_sub(SNIPPET_CONTEXT_CHARS);
                let end = (char_cursor + line_len + SNIPPET_CONTEXT_CHARS).min(chars.len());
                chars[start..end].iter().collect()
            }
        };
        let (output, truncated) = trim_text(output, max_chars);
        Ok(ReadResult {
            text: output,
            truncated,
            applied_scope: applied,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
