//! Embedding storage for the ATS matcher.
//!
//! Provides an id-addressed cosine collection, an append-only flat L2 index
//! with byte-blob persistence, and a collection adapter over that index. Both
//! collections implement [`VectorStore`] so callers stay backend-agnostic.

pub mod collection;
pub mod distance;
pub mod error;
pub mod index;
pub mod store;
pub mod traits;

pub use collection::{Collection, FlatCollection};
pub use distance::DistanceMetric;
pub use error::{Result, VectorDbError};
pub use index::FlatIndex;
pub use store::{BlobStore, FileStore, MemoryKvStore};
pub use traits::{AllEntries, Neighbor, Record, VectorStore, DEFAULT_TOP_K};
