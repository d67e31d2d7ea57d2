use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::distance::DistanceMetric;
use crate::error::Result;

/// Number of neighbours returned when the caller does not ask for a specific count.
pub const DEFAULT_TOP_K: usize = 10;

/// Metadata a store can hold next to each vector.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Record for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// One ranked query hit. `score` is in the store's native metric, higher is better.
#[derive(Debug, Clone)]
pub struct Neighbor<R> {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: R,
    pub score: f32,
}

/// Column-wise dump of a store, in insertion order.
#[derive(Debug, Clone)]
pub struct AllEntries<R> {
    pub ids: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub metadatas: Vec<R>,
}

impl<R> AllEntries<R> {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<R> Default for AllEntries<R> {
    fn default() -> Self {
        Self { ids: Vec::new(), embeddings: Vec::new(), metadatas: Vec::new() }
    }
}

/// Id-addressed vector storage shared by every backend.
pub trait VectorStore<R: Record>: Send + Sync {
    fn name(&self) -> &str;

    /// Store a vector with its metadata under a fresh id. Durable before returning.
    fn insert(&self, embedding: &[f32], metadata: R) -> Result<String>;

    /// Embedding and metadata stored under `id`.
    fn get(&self, id: &str) -> Option<(Vec<f32>, R)>;

    fn get_all(&self) -> AllEntries<R>;

    /// At most `k` entries, best first. An empty store yields an empty list.
    fn query(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor<R>>>;

    fn query_default(&self, query: &[f32]) -> Result<Vec<Neighbor<R>>> {
        self.query(query, DEFAULT_TOP_K)
    }

    /// Returns `false` if no entry had this id.
    fn delete(&self, id: &str) -> Result<bool>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `None` until the first vector establishes it.
    fn dimension(&self) -> Option<usize>;

    /// Metric behind `Neighbor::score`.
    fn metric(&self) -> DistanceMetric;
}
