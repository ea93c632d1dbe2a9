//! Lexical retrieval for the manual search core
//!
//! This crate provides:
//! - `normalize` / `tokenizer`: the text pipeline under all scoring
//! - `index`: the per-manual inverted index with BM25 scoring
//! - `registry`: built-once index slots with fingerprint revalidation
//! - `signals`: lexical evidence markers and bonuses
//! - `gates`: the baseline and required-terms candidate gates
//! - `decompose` / `fuser`: comparative sub-queries and RRF blending
//! - `diversity` / `cutoff`: per-path decay, candidate caps, exploration
//!
//! The pipeline that wires these together lives in `manualfind-engine`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cutoff;
pub mod decompose;
pub mod diversity;
pub mod fuser;
pub mod gates;
pub mod index;
pub mod normalize;
pub mod registry;
pub mod signals;
pub mod tokenizer;

pub use cutoff::{apply_cutoff, inject_exploration, CutoffOutcome, RETURN_HARD_CAP};
pub use decompose::{decompose_query, Decomposition};
pub use diversity::{apply_path_decay, DiversityOutcome};
pub use fuser::{fuse_blend, FusedNode, Ranking};
pub use gates::{
    run_g0, run_required_gate, sort_candidates, BaselineOutcome, Candidate, RequiredOutcome,
    RequiredTermTokens,
};
pub use index::{Posting, ScoreParts, SparseIndex, BM25_B, BM25_K1};
pub use normalize::{loose_contains, loose_find, loose_needle, normalize_text, split_terms};
pub use registry::{IndexEntry, IndexRegistry};
pub use signals::{compute_signals, prf_boosts, prf_terms, qualifies, NodeSignals, QueryView};
pub use tokenizer::{is_cjk, is_code_token, tokenize, token_texts, unique_terms, Token};
