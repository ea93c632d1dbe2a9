//! Manual discovery and content fingerprints
//!
//! This module provides:
//! - `discover_manual_ids`: sorted manual directory listing
//! - `list_manual_files`: the indexable `.md` / `.json` files of a manual
//! - `manual_fingerprint`: stable hash over `(path, size, mtime)` tuples
//!
//! # Invariant
//!
//! The fingerprint changes iff any indexable file changes. Cache and index
//! entries keyed by a stale fingerprint are never served; invalidation is
//! lazy (stale keys simply stop matching).

use manualfind_core::{FileKind, Result, ToolError};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Reserved root id: the manuals directory itself is not a manual
pub const RESERVED_ROOT_ID: &str = "manuals";

// ============================================================================
// ManualFile
// ============================================================================

/// One indexable file of a manual
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualFile {
    /// Manual the file belongs to
    pub manual_id: String,
    /// Path relative to the manual root, `/`-separated
    pub path: String,
    /// `md` or `json`
    pub file_kind: FileKind,
}

// ============================================================================
// Discovery
// ============================================================================

/// List manual ids (sorted subdirectory names of the manuals root)
pub fn discover_manual_ids(manuals_root: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(manuals_root) else {
        return Vec::new();
    };
    let mut ids: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir() && !entry.path().is_symlink())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    ids.sort();
    ids
}

/// True when the manual directory exists
pub fn manual_exists(manuals_root: &Path, manual_id: &str) -> bool {
    manual_id != RESERVED_ROOT_ID && manuals_root.join(manual_id).is_dir()
}

/// List the indexable files of one manual, sorted by path
///
/// Symlinked files and directories are skipped; only `.md` and `.json`
/// files are indexable.
pub fn list_manual_files(manuals_root: &Path, manual_id: &str) -> Result<Vec<ManualFile>> {
    let root = manuals_root.join(manual_id);
    if !root.is_dir() {
        return Err(ToolError::not_found("manual_id not found")
            .with_details(serde_json::json!({"manual_id": manual_id})));
    }

    let mut rows: Vec<ManualFile> = Vec::new();
    let walker = WalkDir::new(&root).follow_links(false).into_iter();
    for entry in walker.filter_entry(|e| !e.path_is_symlink()) {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let Some(kind) = FileKind::from_extension(&ext.to_lowercase()) else {
            continue;
        };
        let Ok(rel) = entry.path().strip_prefix(&root) else {
            continue;
        };
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        rows.push(ManualFile {
            manual_id: manual_id.to_string(),
            path: rel,
            file_kind: kind,
        });
    }
    rows.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(rows)
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Stable content fingerprint for one manual
///
/// SHA-256 over the sorted `(path, size, mtime_millis)` tuples of every
/// indexable file, truncated to 32 hex chars.
pub fn manual_fingerprint(manuals_root: &Path, manual_id: &str) -> Result<String> {
    let files = list_manual_files(manuals_root, manual_id)?;
    let root = manuals_root.join(manual_id);

    let mut hasher = Sha256::new();
    for file in &files {
        let meta = match std::fs::metadata(root.join(&file.path)) {
            Ok(meta) => meta,
            Err(_) => continue,
        };
        let mtime_millis = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis())
            .unwrap_or(0);
        hasher.update(file.path.as_bytes());
        hasher.update([0x1f]);
        hasher.update(meta.len().to_le_bytes());
        hasher.update(mtime_millis.to_le_bytes());
        hasher.update([0x1e]);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for byte in digest.iter().take(16) {
        out.push_str(&format!("{byte:02x}"));
    }
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================
