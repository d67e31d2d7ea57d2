//! Flat (brute-force) vector index with offset identity.

mod flat;

pub use flat::FlatIndex;
