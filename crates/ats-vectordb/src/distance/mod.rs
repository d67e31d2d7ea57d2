//! Distance metrics and score ordering for vector similarity search.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Result, VectorDbError};

/// Supported distance metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity, in [-1, 1].
    Cosine,
    /// Euclidean distance, reported negated so that higher is better.
    L2,
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Cosine
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::L2 => write!(f, "l2"),
        }
    }
}

impl DistanceMetric {
    /// Score two vectors under this metric. Higher = more similar.
    pub fn score(self, a: &[f32], b: &[f32]) -> Result<f32> {
        check_dimensions(a.len(), b.len())?;
        Ok(compute_score(self, a, b))
    }
}

/// Compute inner product (dot product) of two vectors.
#[inline]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute L2 squared distance.
#[inline]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| {
        let d = x - y;
        d * d
    }).sum()
}

/// Euclidean distance.
#[inline]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    l2_squared(a, b).sqrt()
}

/// Negated Euclidean distance, so the nearest vector has the highest score.
#[inline]
pub fn neg_l2(a: &[f32], b: &[f32]) -> f32 {
    -l2_distance(a, b)
}

/// Compute cosine similarity (returns value in [-1, 1]).
/// A zero vector has no direction and scores 0 against everything.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = inner_product(a, b);
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Compute a similarity score. Higher = more similar.
pub fn compute_score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine_similarity(a, b),
        DistanceMetric::L2 => neg_l2(a, b),
    }
}

pub fn check_dimensions(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(VectorDbError::DimensionMismatch { expected, got });
    }
    Ok(())
}

/// Reject vectors no metric can score: empty, NaN or infinite components.
pub fn validate_vector(v: &[f32]) -> Result<()> {
    if v.is_empty() {
        return Err(VectorDbError::InvalidInput("embedding is empty".into()));
    }
    if let Some(pos) = v.iter().position(|x| !x.is_finite()) {
        return Err(VectorDbError::InvalidInput(format!(
            "embedding component {pos} is not finite"
        )));
    }
    Ok(())
}

/// Stable sort by descending score; equal scores keep their input order.
pub fn sort_by_score_desc<T>(items: &mut [T], score: impl Fn(&T) -> f32) {
    items.sort_by(|a, b| score(b).partial_cmp(&score(a)).unwrap_or(Ordering::Equal));
}
