//! # manualfind
//!
//! Lexical retrieval core for manual-oriented document servers — a sparse
//! index, a multi-gate search pipeline, and a fingerprint-keyed result
//! cache over directories of markdown and JSON manuals.
//!
//! manualfind answers one question fast: *given a query plus one or two
//! mandatory terms, which sections of this manual are the evidence?* It
//! normalizes mixed Japanese/ASCII text, scores BM25 with lexical signal
//! bonuses, fuses required-term passes and comparative sub-queries with
//! reciprocal-rank fusion, reranks for file diversity, and memoizes
//! payloads keyed by a manual-content fingerprint.
//!
//! # Quick Start
//!
//! ```no_run
//! use manualfind::{Config, Engine, FindParams, HitsParams};
//! use manualfind_core::HitsKind;
//!
//! fn main() -> manualfind::Result<()> {
//!     let engine = Engine::new(Config::from_env())?;
//!
//!     let params = FindParams::new(
//!         "年次有給休暇の付与日数",
//!         "hr",
//!         vec!["休暇".to_string()],
//!     );
//!     let found = engine.find(&params)?;
//!
//!     // Page the saved trace later.
//!     let page = engine.hits(&HitsParams::new(&found.trace_id, HitsKind::IntegratedTop))?;
//!     println!("{} of {} hits", page.items.len(), page.total);
//!     Ok(())
//! }
//! ```
//!
//! # Operations
//!
//! | Operation | Purpose |
//! |-----------|---------|
//! | `Engine::find` | ranked evidence with full diagnostics |
//! | `Engine::find_compact` | the minimal public-facing shape |
//! | `Engine::hits` | stateless paging over a saved trace |
//! | `Engine::invalidate` | drop one manual's index and cache entries |
//! | `Engine::manual_ls` / `manual_toc` / `manual_read` | read-only content access |
//!
//! # Architecture
//!
//! The [`Engine`] facade is the entry point. Internal crates (store,
//! search, cache) are implementation detail; only the surface re-exported
//! here is stable.

pub use manualfind_core::{Config, ErrorCode, Result, ToolError};
pub use manualfind_engine::{
    CompactFindResponse, Engine, FindParams, FindResponse, HitsParams, HitsResponse, NextAction,
};
