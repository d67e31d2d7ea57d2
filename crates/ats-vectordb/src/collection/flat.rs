use std::collections::HashMap;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::distance::{check_dimensions, validate_vector, DistanceMetric};
use crate::error::{Result, VectorDbError};
use crate::index::FlatIndex;
use crate::store::BlobStore;
use crate::traits::{AllEntries, Neighbor, Record, VectorStore};

const INDEX_KEY: &str = "flat_index.bin";
const TABLE_KEY: &str = "offsets.json";

/// Row of the offset table. `None` marks a deleted offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "R: Record")]
struct Slot<R> {
    id: String,
    metadata: R,
    created_at: DateTime<Utc>,
}

struct Table<R> {
    rows: Vec<Option<Slot<R>>>,
    by_id: HashMap<String, usize>,
    live: usize,
}

impl<R> Table<R> {
    fn from_rows(rows: Vec<Option<Slot<R>>>) -> Self {
        let by_id: HashMap<String, usize> = rows
            .iter()
            .enumerate()
            .filter_map(|(offset, row)| row.as_ref().map(|s| (s.id.clone(), offset)))
            .collect();
        let live = by_id.len();
        Self { rows, by_id, live }
    }
}

/// Collection over an append-only [`FlatIndex`] plus an offset -> id table.
///
/// The index is never compacted: deleting an id tombstones its table row and
/// the vector stays at its offset, so offsets remain valid across restarts.
/// Neighbours are picked by L2 distance and scored as negated distance.
pub struct FlatCollection<R> {
    name: String,
    index: FlatIndex,
    table: RwLock<Table<R>>,
    store: Box<dyn BlobStore>,
}

impl<R: Record> FlatCollection<R> {
    /// Restore from `store`, falling back to an empty index when nothing usable was saved.
    pub fn open(name: impl Into<String>, store: Box<dyn BlobStore>, dimension: usize) -> Self {
        let name = name.into();
        let index = FlatIndex::load_or_empty(store.as_ref(), INDEX_KEY, dimension);

        let mut rows: Vec<Option<Slot<R>>> = match store.get(TABLE_KEY) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(collection = %name, error = %e, "failed to decode offset table, ids lost");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(collection = %name, error = %e, "failed to read offset table, ids lost");
                Vec::new()
            }
        };

        // Rows and vectors must line up one-to-one by offset.
        let vectors = index.len();
        if rows.len() != vectors {
            warn!(collection = %name, rows = rows.len(), vectors, "offset table out of step with index, reconciling");
            rows.truncate(vectors);
            rows.resize_with(vectors, || None);
        }

        let table = Table::from_rows(rows);
        info!(collection = %name, live = table.live, vectors, "opened flat collection");
        Self { name, index, table: RwLock::new(table), store }
    }

    /// Total offsets in the index, deleted ones included.
    pub fn offsets(&self) -> usize {
        self.index.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.table.read().by_id.contains_key(id)
    }

    fn save_table(&self, table: &Table<R>) -> Result<()> {
        let bytes = serde_json::to_vec(&table.rows)
            .map_err(|e| VectorDbError::Serialization(e.to_string()))?;
        self.store.put(TABLE_KEY, &bytes)
    }
}

impl<R: Record> VectorStore<R> for FlatCollection<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, embedding: &[f32], metadata: R) -> Result<String> {
        validate_vector(embedding)?;
        check_dimensions(self.index.dimension(), embedding.len())?;
        let mut table = self.table.write();

        let offset = self.index.len();
        let id = Uuid::new_v4().to_string();
        self.index.add(embedding)?;
        table.rows.push(Some(Slot { id: id.clone(), metadata, created_at: Utc::now() }));
        table.by_id.insert(id.clone(), offset);
        table.live += 1;

        let saved = self
            .index
            .save(self.store.as_ref(), INDEX_KEY)
            .and_then(|_| self.save_table(&table));
        if let Err(e) = saved {
            self.index.truncate(offset);
            table.rows.truncate(offset);
            table.by_id.remove(&id);
            table.live -= 1;
            return Err(e);
        }
        debug!(collection = %self.name, %id, offset, "appended vector");
        Ok(id)
    }

    fn get(&self, id: &str) -> Option<(Vec<f32>, R)> {
        let table = self.table.read();
        let offset = *table.by_id.get(id)?;
        let slot = table.rows.get(offset)?.as_ref()?;
        Some((self.index.get(offset)?, slot.metadata.clone()))
    }

    fn get_all(&self) -> AllEntries<R> {
        let table = self.table.read();
        let mut all = AllEntries::default();
        for (offset, row) in table.rows.iter().enumerate() {
            let Some(slot) = row else { continue };
            let Some(vector) = self.index.get(offset) else { continue };
            all.ids.push(slot.id.clone());
            all.embeddings.push(vector);
            all.metadatas.push(slot.metadata.clone());
        }
        all
    }

    fn query(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor<R>>> {
        validate_vector(query)?;
        let table = self.table.read();
        if table.live == 0 || k == 0 {
            return Ok(Vec::new());
        }

        // Tombstoned offsets still occupy the index, so rank all of them and skip the dead.
        let ranked = self.index.search_with_distances(query, self.index.len())?;
        let mut out = Vec::with_capacity(k.min(table.live));
        for (offset, dist) in ranked {
            if out.len() == k {
                break;
            }
            let Some(Some(slot)) = table.rows.get(offset) else { continue };
            let Some(embedding) = self.index.get(offset) else { continue };
            out.push(Neighbor {
                id: slot.id.clone(),
                embedding,
                metadata: slot.metadata.clone(),
                score: -dist,
            });
        }
        Ok(out)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut table = self.table.write();
        let Some(offset) = table.by_id.remove(id) else {
            return Ok(false);
        };
        let slot = table.rows[offset].take();
        table.live -= 1;

        if let Err(e) = self.save_table(&table) {
            table.rows[offset] = slot;
            table.by_id.insert(id.to_string(), offset);
            table.live += 1;
            return Err(e);
        }
        debug!(collection = %self.name, id, offset, "tombstoned offset");
        Ok(true)
    }

    fn len(&self) -> usize {
        self.table.read().live
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.index.dimension())
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::L2
    }
}
