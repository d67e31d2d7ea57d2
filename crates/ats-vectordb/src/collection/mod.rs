//! Collections: id-addressed vector storage with metadata and k-NN search.

mod flat;

pub use flat::FlatCollection;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::distance::{self, check_dimensions, validate_vector, DistanceMetric};
use crate::error::{Result, VectorDbError};
use crate::store::{BlobStore, FileStore};
use crate::traits::{AllEntries, Neighbor, Record, VectorStore};

const SNAPSHOT_KEY: &str = "collection.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "R: Record")]
struct Entry<R> {
    id: String,
    /// Insertion sequence; breaks score ties in favour of older entries.
    seq: u64,
    embedding: Vec<f32>,
    metadata: R,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(bound = "R: Record")]
struct SnapshotRef<'a, R> {
    name: &'a str,
    dimension: Option<usize>,
    next_seq: u64,
    entries: Vec<&'a Entry<R>>,
}

#[derive(Deserialize)]
#[serde(bound = "R: Record")]
struct Snapshot<R> {
    name: String,
    dimension: Option<usize>,
    next_seq: u64,
    entries: Vec<Entry<R>>,
}

struct Inner<R> {
    dimension: Option<usize>,
    next_seq: u64,
    entries: BTreeMap<u64, Entry<R>>,
    by_id: HashMap<String, u64>,
}

impl<R> Inner<R> {
    fn empty(dimension: Option<usize>) -> Self {
        Self { dimension, next_seq: 0, entries: BTreeMap::new(), by_id: HashMap::new() }
    }
}

/// A named set of (id, vector, metadata) entries ranked by exact cosine similarity.
///
/// Every insert and delete is written through to the backing store before it
/// returns. A failed write leaves the in-memory state as it was.
pub struct Collection<R> {
    name: String,
    inner: RwLock<Inner<R>>,
    store: Option<Box<dyn BlobStore>>,
}

impl<R: Record> Collection<R> {
    /// Create a new in-memory collection. The first insert fixes the dimension.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), inner: RwLock::new(Inner::empty(None)), store: None }
    }

    /// In-memory collection with a fixed dimension.
    pub fn with_dimension(name: impl Into<String>, dimension: usize) -> Self {
        Self { name: name.into(), inner: RwLock::new(Inner::empty(Some(dimension))), store: None }
    }

    /// Open (or create) a collection persisted under `path`.
    pub fn open(name: impl Into<String>, path: impl Into<PathBuf>, dimension: Option<usize>) -> Result<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path)?;
        Self::with_store(name, Box::new(FileStore::new(path)), dimension)
    }

    /// Open a collection on an arbitrary blob store. An unreadable snapshot is
    /// an error: unlike the flat index, a collection never discards data silently.
    pub fn with_store(name: impl Into<String>, store: Box<dyn BlobStore>, dimension: Option<usize>) -> Result<Self> {
        let name = name.into();
        let inner = match store.get(SNAPSHOT_KEY)? {
            None => Inner::empty(dimension),
            Some(bytes) => {
                let snapshot: Snapshot<R> = serde_json::from_slice(&bytes).map_err(|e| {
                    VectorDbError::Persistence(format!("collection {name}: unreadable snapshot: {e}"))
                })?;
                Self::recover(&name, snapshot, dimension)?
            }
        };
        info!(collection = %name, entries = inner.entries.len(), dimension = ?inner.dimension, "opened collection");
        Ok(Self { name, inner: RwLock::new(inner), store: Some(store) })
    }

    fn recover(name: &str, snapshot: Snapshot<R>, configured: Option<usize>) -> Result<Inner<R>> {
        if snapshot.name != name {
            debug!(collection = name, stored = %snapshot.name, "snapshot written under another name");
        }
        let dimension = match (configured, snapshot.dimension) {
            (Some(expected), Some(got)) if expected != got => {
                return Err(VectorDbError::DimensionMismatch { expected, got });
            }
            (Some(d), _) | (None, Some(d)) => Some(d),
            (None, None) => None,
        };
        let mut inner = Inner::empty(dimension);
        inner.next_seq = snapshot.next_seq;
        for entry in snapshot.entries {
            if let Some(d) = dimension {
                check_dimensions(d, entry.embedding.len())?;
            }
            inner.next_seq = inner.next_seq.max(entry.seq + 1);
            inner.by_id.insert(entry.id.clone(), entry.seq);
            inner.entries.insert(entry.seq, entry);
        }
        Ok(inner)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().by_id.contains_key(id)
    }

    fn persist(&self, inner: &Inner<R>) -> Result<()> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };
        let snapshot = SnapshotRef {
            name: &self.name,
            dimension: inner.dimension,
            next_seq: inner.next_seq,
            entries: inner.entries.values().collect(),
        };
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| VectorDbError::Serialization(e.to_string()))?;
        store.put(SNAPSHOT_KEY, &bytes)
    }
}

impl<R: Record> VectorStore<R> for Collection<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, embedding: &[f32], metadata: R) -> Result<String> {
        validate_vector(embedding)?;
        let mut inner = self.inner.write();
        if let Some(expected) = inner.dimension {
            check_dimensions(expected, embedding.len())?;
        }

        let prev_dimension = inner.dimension;
        let seq = inner.next_seq;
        let id = Uuid::new_v4().to_string();
        inner.dimension = Some(embedding.len());
        inner.next_seq += 1;
        inner.by_id.insert(id.clone(), seq);
        inner.entries.insert(seq, Entry {
            id: id.clone(),
            seq,
            embedding: embedding.to_vec(),
            metadata,
            created_at: Utc::now(),
        });

        if let Err(e) = self.persist(&inner) {
            inner.entries.remove(&seq);
            inner.by_id.remove(&id);
            inner.next_seq = seq;
            inner.dimension = prev_dimension;
            return Err(e);
        }
        debug!(collection = %self.name, %id, "inserted entry");
        Ok(id)
    }

    fn get(&self, id: &str) -> Option<(Vec<f32>, R)> {
        let inner = self.inner.read();
        let seq = inner.by_id.get(id)?;
        inner.entries.get(seq).map(|e| (e.embedding.clone(), e.metadata.clone()))
    }

    fn get_all(&self) -> AllEntries<R> {
        let inner = self.inner.read();
        let mut all = AllEntries::default();
        for entry in inner.entries.values() {
            all.ids.push(entry.id.clone());
            all.embeddings.push(entry.embedding.clone());
            all.metadatas.push(entry.metadata.clone());
        }
        all
    }

    fn query(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor<R>>> {
        validate_vector(query)?;
        let inner = self.inner.read();
        if inner.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if let Some(expected) = inner.dimension {
            check_dimensions(expected, query.len())?;
        }

        let mut scored: Vec<(&Entry<R>, f32)> = inner
            .entries
            .values()
            .map(|e| (e, distance::cosine_similarity(query, &e.embedding)))
            .collect();
        distance::sort_by_score_desc(&mut scored, |s| s.1);
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(e, score)| Neighbor {
                id: e.id.clone(),
                embedding: e.embedding.clone(),
                metadata: e.metadata.clone(),
                score,
            })
            .collect())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write();
        let Some(seq) = inner.by_id.remove(id) else {
            return Ok(false);
        };
        let entry = inner.entries.remove(&seq);

        if let Err(e) = self.persist(&inner) {
            inner.by_id.insert(id.to_string(), seq);
            if let Some(entry) = entry {
                inner.entries.insert(seq, entry);
            }
            return Err(e);
        }
        debug!(collection = %self.name, id, "deleted entry");
        Ok(true)
    }

    fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.read().dimension
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Cosine
    }
}
