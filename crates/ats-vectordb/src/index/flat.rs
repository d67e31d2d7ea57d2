use std::io::{Cursor, Read};
use byteorder::{LittleEndian, ReadBytesExt};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::distance::{self, check_dimensions, validate_vector};
use crate::error::{Result, VectorDbError};
use crate::store::BlobStore;

const MAGIC: &[u8; 4] = b"ATSF";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1 + 4 + 8;

/// Brute-force (flat) vector index.
///
/// Vectors live in one dense row-major buffer. A vector's identity is its
/// offset, so the buffer is append-only: nothing is reordered or compacted
/// once it has been persisted.
pub struct FlatIndex {
    dimension: usize,
    data: RwLock<Vec<f32>>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self { dimension, data: RwLock::new(Vec::new()) }
    }

    /// Create with pre-allocated capacity.
    pub fn with_capacity(dimension: usize, capacity: usize) -> Self {
        Self {
            dimension,
            data: RwLock::new(Vec::with_capacity(dimension * capacity)),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.data.read().len().checked_div(self.dimension).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a vector. It becomes visible at offset `len() - 1`.
    pub fn add(&self, vector: &[f32]) -> Result<()> {
        validate_vector(vector)?;
        check_dimensions(self.dimension, vector.len())?;
        self.data.write().extend_from_slice(vector);
        Ok(())
    }

    /// Copy of the vector at `offset`.
    pub fn get(&self, offset: usize) -> Option<Vec<f32>> {
        let data = self.data.read();
        let start = offset.checked_mul(self.dimension)?;
        data.get(start..start + self.dimension).map(<[f32]>::to_vec)
    }

    /// Offsets of the `top_k` nearest vectors by ascending L2 distance.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<usize>> {
        Ok(self
            .search_with_distances(query, top_k)?
            .into_iter()
            .map(|(offset, _)| offset)
            .collect())
    }

    /// `(offset, l2_distance)` pairs, nearest first. Equal distances keep offset order.
    pub fn search_with_distances(&self, query: &[f32], top_k: usize) -> Result<Vec<(usize, f32)>> {
        validate_vector(query)?;
        check_dimensions(self.dimension, query.len())?;
        let data = self.data.read();
        if data.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(offset, vec)| (offset, distance::l2_distance(query, vec)))
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Drop vectors appended after `len`. Only used to undo an append whose
    /// save failed, before any caller could have observed the new offset.
    pub(crate) fn truncate(&self, len: usize) {
        self.data.write().truncate(len * self.dimension);
    }

    /// Format: magic | version(u8) | dim(u32) | count(u64) | [f32 * dim] * count, little-endian.
    pub fn serialize(&self) -> Vec<u8> {
        let data = self.data.read();
        let count = data.len().checked_div(self.dimension).unwrap_or(0) as u64;
        let mut buf = Vec::with_capacity(HEADER_LEN + data.len() * 4);
        buf.extend_from_slice(MAGIC);
        buf.push(FORMAT_VERSION);
        buf.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        buf.extend_from_slice(&count.to_le_bytes());
        for &val in data.iter() {
            buf.extend_from_slice(&val.to_le_bytes());
        }
        buf
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let corrupt = |what: &str| VectorDbError::Persistence(format!("corrupt flat index blob: {what}"));
        let mut cursor = Cursor::new(bytes);

        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic).map_err(|_| corrupt("truncated header"))?;
        if &magic != MAGIC {
            return Err(corrupt("bad magic"));
        }
        let version = cursor.read_u8().map_err(|_| corrupt("truncated header"))?;
        if version != FORMAT_VERSION {
            return Err(corrupt(&format!("unsupported version {version}")));
        }
        let dimension = cursor.read_u32::<LittleEndian>().map_err(|_| corrupt("truncated header"))? as usize;
        let count = cursor.read_u64::<LittleEndian>().map_err(|_| corrupt("truncated header"))? as usize;
        if dimension == 0 {
            return Err(corrupt("zero dimension"));
        }

        let values = count
            .checked_mul(dimension)
            .ok_or_else(|| corrupt("vector count overflows"))?;
        let payload = values
            .checked_mul(4)
            .ok_or_else(|| corrupt("vector count overflows"))?;
        let found = bytes.len() - HEADER_LEN;
        if found != payload {
            return Err(corrupt(&format!("expected {payload} payload bytes, found {found}")));
        }

        let mut data = vec![0f32; values];
        cursor
            .read_f32_into::<LittleEndian>(&mut data)
            .map_err(|_| corrupt("truncated payload"))?;
        Ok(Self { dimension, data: RwLock::new(data) })
    }

    pub fn save(&self, store: &dyn BlobStore, key: &str) -> Result<()> {
        store.put(key, &self.serialize())?;
        debug!(key, vectors = self.len(), "saved flat index");
        Ok(())
    }

    /// Restore from `key`, or start empty if the blob is missing, unreadable,
    /// or was written for another dimension. A cold start is a valid state.
    pub fn load_or_empty(store: &dyn BlobStore, key: &str, dimension: usize) -> Self {
        let bytes = match store.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(key, "no saved flat index, starting empty");
                return Self::new(dimension);
            }
            Err(e) => {
                warn!(key, error = %e, "failed to read flat index, starting empty");
                return Self::new(dimension);
            }
        };
        match Self::deserialize(&bytes) {
            Ok(index) if index.dimension == dimension => {
                info!(key, vectors = index.len(), "restored flat index");
                index
            }
            Ok(index) => {
                warn!(key, saved = index.dimension, configured = dimension, "flat index dimension changed, starting empty");
                Self::new(dimension)
            }
            Err(e) => {
                warn!(key, error = %e, "failed to decode flat index, starting empty");
                Self::new(dimension)
            }
        }
    }
}
