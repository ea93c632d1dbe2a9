//! Immutable per-request view of one manual
//!
//! This module provides:
//! - `Node`: one searchable unit with its line range and title
//! - `ManualSnapshot`: node arena + section texts + fingerprint
//!
//! A snapshot is built from the filesystem at request entry and never
//! mutated; the sparse index references nodes by their arena `NodeId`
//! only, so snapshot and index share no ownership.

use crate::manifest::{list_manual_files, manual_fingerprint, ManualFile};
use crate::toc::{json_line_count, parse_markdown_toc};
use manualfind_core::{FileKind, NodeId, NodeRef, Result};
use std::path::Path;
use tracing::warn;

// ============================================================================
// Node
// ============================================================================

/// One searchable unit
///
/// For `.md` files: a heading section whose body includes all descendant
/// headings. For `.json` files: the whole file. Insertion order within a
/// file is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Arena index within the snapshot
    pub id: NodeId,
    /// File path relative to the manual root
    pub path: String,
    /// 1-based first line
    pub start_line: u32,
    /// 1-based last line
    pub end_line: u32,
    /// Heading text or file name
    pub title: String,
    /// Source file kind
    pub file_kind: FileKind,
}

// ============================================================================
// ManualSnapshot
// ============================================================================

/// Immutable node arena for one manual at one fingerprint
#[derive(Debug)]
pub struct ManualSnapshot {
    /// Manual this snapshot was built from
    pub manual_id: String,
    /// Content fingerprint at build time
    pub fingerprint: String,
    /// Indexable files, sorted by path
    pub files: Vec<ManualFile>,
    /// Unreadable files skipped during the build
    pub warnings: u32,
    nodes: Vec<Node>,
    texts: Vec<String>,
}

impl ManualSnapshot {
    /// Build a snapshot by reading every indexable file of the manual
    ///
    /// Unreadable files are skipped with a warning; the build itself only
    /// fails when the manual does not exist.
    pub fn build(manuals_root: &Path, manual_id: &str) -> Result<Self> {
        let fingerprint = manual_fingerprint(manuals_root, manual_id)?;
        let files = list_manual_files(manuals_root, manual_id)?;
        let root = manuals_root.join(manual_id);

        let mut nodes: Vec<Node> = Vec::new();
        let mut texts: Vec<String> = Vec::new();
        let mut warnings = 0u32;

        for file in &files {
            let text = match std::fs::read_to_string(root.join(&file.path)) {
                Ok(text) => text,
                Err(err) => {
                    warn!(manual_id, path = %file.path, %err, "skipping unreadable manual file");
                    warnings += 1;
                    continue;
                }
            };
            match file.file_kind {
                FileKind::Md => {
                    let lines: Vec<&str> = text.lines().collect();
                    for md_node in parse_markdown_toc(&file.path, &text) {
                        let id = NodeId(nodes.len() as u32);
                        let start = md_node.line_start as usize;
                        let end = (md_node.line_end as usize).min(lines.len().max(1));
                        let body = if lines.is_empty() {
                            String::new()
                        } else {
                            lines[start - 1..end].join("\n")
                        };
                        nodes.push(Node {
                            id,
                            path: file.path.clone(),
                            start_line: md_node.line_start,
                            end_line: md_node.line_end,
                            title: md_node.title,
                            file_kind: FileKind::Md,
                        });
                        texts.push(body);
                    }
                }
                FileKind::Json => {
                    let id = NodeId(nodes.len() as u32);
                    let title = file
                        .path
                        .rsplit('/')
                        .next()
                        .unwrap_or(&file.path)
                        .to_string();
                    nodes.push(Node {
                        id,
                        path: file.path.clone(),
                        start_line: 1,
                        end_line: json_line_count(&text),
                        title,
                        file_kind: FileKind::Json,
                    });
                    texts.push(text);
                }
            }
        }

        Ok(ManualSnapshot {
            manual_id: manual_id.to_string(),
            fingerprint,
            files,
            warnings,
            nodes,
            texts,
        })
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the manual has no indexable content
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by arena id
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Raw section text of a node
    pub fn text(&self, id: NodeId) -> &str {
        &self.texts[id.index()]
    }

    /// Iterate all nodes in arena order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// External reference for a node
    pub fn node_ref(&self, id: NodeId) -> NodeRef {
        let node = self.node(id);
        NodeRef {
            manual_id: self.manual_id.clone(),
            path: node.path.clone(),
            start_line: node.start_line,
            title: node.title.clone(),
        }
    }

    /// First line of a node's text (used by the anchor signal)
    pub fn first_line(&self, id: NodeId) -> &str {
        self.text(id).lines().next().unwrap_or("")
    }
}

// ============================================================================
// Tests
// ============================================================================
