//! Turning raw neighbour lists into scored, ordered match results.

use ats_core::{MatchMetadata, MetadataPolicy};
use ats_vectordb::{distance, DistanceMetric, Neighbor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// One scored peer of a source entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub peer_id: String,
    pub score: f32,
    pub metadata: Value,
}

/// Sort by descending score. Equal scores keep their input order.
pub fn rank(mut results: Vec<MatchResult>) -> Vec<MatchResult> {
    distance::sort_by_score_desc(&mut results, |r| r.score);
    results
}

/// Re-score every neighbour against `query` under `metric`, attach the
/// requested metadata view, and rank. Whatever metric the store used to pick
/// the neighbours, the returned scores are all in `metric`.
pub fn score_neighbors<R: MatchMetadata>(
    query: &[f32],
    neighbors: Vec<Neighbor<R>>,
    metric: DistanceMetric,
    policy: MetadataPolicy,
) -> Result<Vec<MatchResult>> {
    let results = neighbors
        .into_iter()
        .map(|n| -> Result<MatchResult> {
            Ok(MatchResult {
                score: metric.score(query, &n.embedding)?,
                metadata: n.metadata.view(policy),
                peer_id: n.id,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(rank(results))
}
