//! Résumé/job matching over embedding stores.
//!
//! [`MatchEngine`] owns one store per side, optionally a deadline-bounded
//! [`EmbeddingProvider`], and runs match cycles in either direction. Every
//! reported score is cosine similarity regardless of the storage backend.

pub mod embedding;
pub mod engine;
pub mod error;
pub mod ranking;

pub use embedding::{EmbeddingProvider, HashingEmbedder, TimedEmbedder};
pub use engine::{EngineStats, MatchEngine, MatchGroup, MatchOutcome, MATCH_METRIC};
pub use error::{MatchError, Result};
pub use ranking::MatchResult;
