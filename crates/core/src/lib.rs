//! Shared foundation for the manualfind workspace
//!
//! This crate provides:
//! - `error`: the unified `ToolError` with frozen wire codes
//! - `config`: the immutable process-wide configuration
//! - `types`: closed enums, node addressing, and the find budget
//! - `find_types`: the `find` / `hits` contract shapes and `TracePayload`
//!
//! Nothing here performs I/O; the crate only defines the vocabulary the
//! store, search, cache, and engine crates speak.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod find_types;
pub mod types;

pub use config::Config;
pub use error::{ensure, ErrorCode, Result, ToolError};
pub use find_types::{
    AppliedDiagnostics, CandidateItem, ClaimEdge, ClaimItem, ConflictItem, DfFilterDecision,
    DfFilterReason, EvidenceItem, FindSummary, FusionDebugInfo, GapItem, GateRunInfo, TracePayload,
    UnscannedItem,
};
pub use types::{
    CutoffReason, FileKind, FindBudget, HitsKind, IntegrationStatus, NodeId, NodeRef,
    RequiredEffectStatus, SelectedGate, SemCacheMode, Signal, SignalSet,
};
