//! Memoization and telemetry for the manual search core
//!
//! This crate provides:
//! - `trace`: the bounded trace store paged by `hits`
//! - `semantic`: the fingerprint-keyed semantic cache with guard
//!   revalidation and the (no-op) embedding provider slot
//! - `stats`: the append-only adaptive stats sink and threshold feedback
//!
//! All state is process memory only, except the stats JSONL file.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod semantic;
pub mod stats;
pub mod trace;

pub use semantic::{
    cache_key, embedding_provider_from_name, CacheLookup, EmbeddingProvider, NoopEmbeddingProvider,
    SemanticCache,
};
pub use stats::{query_hash, AdaptiveStats, StatsRecord};
pub use trace::{system_now, NowFn, TraceStore};
