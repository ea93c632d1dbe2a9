//! The manual search engine
//!
//! This crate provides:
//! - `Engine`: the `find` / `hits` / `invalidate` facade over the document
//!   store, sparse index, semantic cache, trace store, and stats sink
//! - `params`: strict request validation
//! - `pipeline`: gates, fusion, diversity, cutoff, summary assembly
//! - `content`: the read-only `manual_ls` / `manual_toc` / `manual_read`
//!   companions
//!
//! # Quick start
//!
//! ```no_run
//! use manualfind_core::Config;
//! use manualfind_engine::{Engine, FindParams};
//!
//! fn main() -> manualfind_core::Result<()> {
//!     let engine = Engine::new(Config::from_env())?;
//!     let params = FindParams::new(
//!         "年次有給休暇の付与日数",
//!         "hr",
//!         vec!["休暇".to_string()],
//!     );
//!     let response = engine.find(&params)?;
//!     println!("{} candidates", response.summary.candidates);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod content;
pub mod hits;
pub mod params;
pub mod pipeline;
pub mod response;
pub mod state;
pub mod summary;

pub use content::{ReadResult, ReadScope, TocItem};
pub use params::{FindParams, HitsParams};
pub use response::{CompactFindResponse, FindResponse, HitsResponse, NextAction};
pub use state::{Engine, IdGen};
