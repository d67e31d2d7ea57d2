//! Blob stores backing collection and flat-index persistence.

mod file_store;
mod kv;

pub use file_store::FileStore;
pub use kv::{BlobStore, MemoryKvStore};
