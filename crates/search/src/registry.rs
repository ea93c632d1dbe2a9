//! Built-once index registry
//!
//! This module provides:
//! - `IndexRegistry`: per-manual slots holding `(snapshot, index)` pairs
//! - build serialization per manual; readers share `Arc`s without locks
//! - fingerprint revalidation and explicit invalidation
//!
//! # Thread Safety
//!
//! Each manual has one slot. A builder takes the slot's build lock; every
//! other request for the same manual waits on that lock instead of building
//! twice. Readers clone the current `Arc` under a short read lock.

use crate::index::SparseIndex;
use dashmap::DashMap;
use manualfind_core::Result;
use manualfind_store::{manual_fingerprint, ManualSnapshot};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// IndexEntry
// ============================================================================

/// One built `(snapshot, index)` pair at a fingerprint
#[derive(Debug)]
pub struct IndexEntry {
    /// Immutable node arena the index was built from
    pub snapshot: Arc<ManualSnapshot>,
    /// The inverted index
    pub index: Arc<SparseIndex>,
}

impl IndexEntry {
    /// Fingerprint the pair was built at
    pub fn fingerprint(&self) -> &str {
        &self.index.fingerprint
    }
}

#[derive(Default)]
struct ManualSlot {
    build_lock: Mutex<()>,
    current: RwLock<Option<Arc<IndexEntry>>>,
}

// ============================================================================
// IndexRegistry
// ============================================================================

/// Registry of built indexes, keyed by manual id
#[derive(Default)]
pub struct IndexRegistry {
    slots: DashMap<String, Arc<ManualSlot>>,
}

impl IndexRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        IndexRegistry {
            slots: DashMap::new(),
        }
    }

    /// Get the current entry, rebuilding when the fingerprint moved
    ///
    /// `expected_fingerprint` is the fingerprint computed at request entry;
    /// a cached entry built at any other fingerprint is stale and replaced.
    pub fn get_or_build(
        &self,
        manuals_root: &Path,
        manual_id: &str,
        expected_fingerprint: &str,
    ) -> Result<Arc<IndexEntry>> {
        let slot = self
            .slots
            .entry(manual_id.to_string())
            .or_insert_with(|| Arc::new(ManualSlot::default()))
            .clone();

        if let Some(entry) = slot.current.read().as_ref() {
            if entry.fingerprint() == expected_fingerprint {
                return Ok(entry.clone());
            }
        }

        let _build_guard = slot.build_lock.lock();
        // Re-check: another builder may have finished while we waited.
        if let Some(entry) = slot.current.read().as_ref() {
            if entry.fingerprint() == expected_fingerprint {
                return Ok(entry.clone());
            }
        }

        debug!(manual_id, fingerprint = expected_fingerprint, "building sparse index");
        let snapshot = Arc::new(ManualSnapshot::build(manuals_root, manual_id)?);
        let index = Arc::new(SparseIndex::build(&snapshot));
        let entry = Arc::new(IndexEntry { snapshot, index });
        *slot.current.write() = Some(entry.clone());
        Ok(entry)
    }

    /// Recompute the fingerprint and return a current entry
    pub fn refresh(&self, manuals_root: &Path, manual_id: &str) -> Result<Arc<IndexEntry>> {
        let fingerprint = manual_fingerprint(manuals_root, manual_id)?;
        self.get_or_build(manuals_root, manual_id, &fingerprint)
    }

    /// Drop the built index of one manual
    pub fn invalidate(&self, manual_id: &str) {
        if let Some(slot) = self.slots.get(manual_id) {
            *slot.current.write() = None;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
