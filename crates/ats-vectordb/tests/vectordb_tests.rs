//! Distance, flat index and collection behaviour.

use ats_vectordb::{
    distance::{self, DistanceMetric},
    error::VectorDbError,
    index::FlatIndex,
    Collection, FlatCollection, MemoryKvStore, VectorStore,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Tag {
    label: String,
}

fn tag(label: &str) -> Tag {
    Tag { label: label.to_string() }
}

fn stores() -> Vec<Box<dyn VectorStore<Tag>>> {
    vec![
        Box::new(Collection::<Tag>::new("coll")),
        Box::new(FlatCollection::<Tag>::open("flat", Box::new(MemoryKvStore::new()), 3)),
    ]
}

// ============================================================
// Distance / Metric Tests
// ============================================================

#[test]
fn test_inner_product() {
    let a = vec![1.0, 2.0, 3.0];
    let b = vec![4.0, 5.0, 6.0];
    assert!((distance::inner_product(&a, &b) - 32.0).abs() < 1e-6);
}

#[test]
fn test_l2_distance() {
    let a = vec![0.0, 0.0];
    let b = vec![3.0, 4.0];
    assert!((distance::l2_squared(&a, &b) - 25.0).abs() < 1e-6);
    assert!((distance::l2_distance(&a, &b) - 5.0).abs() < 1e-6);
    assert!((distance::neg_l2(&a, &b) + 5.0).abs() < 1e-6);
}

#[test]
fn test_cosine_similarity_identical() {
    let a = vec![1.0, 2.0, 3.0];
    assert!((distance::cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
}

#[test]
fn test_cosine_similarity_orthogonal_and_opposite() {
    assert!(distance::cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    assert!((distance::cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]) + 1.0).abs() < 1e-6);
}

#[test]
fn test_cosine_zero_vector_scores_zero() {
    assert_eq!(distance::cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
}

#[test]
fn test_metric_score_rejects_mismatch() {
    let err = DistanceMetric::Cosine.score(&[1.0, 0.0], &[1.0, 0.0, 0.0]).unwrap_err();
    assert!(matches!(err, VectorDbError::DimensionMismatch { expected: 2, got: 3 }));
    let s = DistanceMetric::L2.score(&[1.0, 0.0], &[1.0, 0.0]).unwrap();
    assert_eq!(s, 0.0);
}

#[test]
fn test_validate_vector() {
    assert!(distance::validate_vector(&[0.1, 0.2]).is_ok());
    assert!(matches!(distance::validate_vector(&[]), Err(VectorDbError::InvalidInput(_))));
    assert!(matches!(distance::validate_vector(&[f32::NAN]), Err(VectorDbError::InvalidInput(_))));
}

#[test]
fn test_sort_by_score_is_stable() {
    let mut items = vec![("a", 0.5), ("b", 0.9), ("c", 0.5), ("d", 0.9)];
    distance::sort_by_score_desc(&mut items, |i| i.1);
    let order: Vec<&str> = items.iter().map(|i| i.0).collect();
    assert_eq!(order, vec!["b", "d", "a", "c"]);
}

// ============================================================
// Flat Index Tests
// ============================================================

#[test]
fn test_flat_index_orders_by_l2() {
    let idx = FlatIndex::new(2);
    idx.add(&[10.0, 10.0]).unwrap();
    idx.add(&[0.0, 0.0]).unwrap();
    idx.add(&[1.0, 0.0]).unwrap();
    assert_eq!(idx.len(), 3);
    assert_eq!(idx.search(&[0.0, 0.0], 3).unwrap(), vec![1, 2, 0]);
}

#[test]
fn test_flat_index_top_k_bound() {
    let idx = FlatIndex::new(2);
    for i in 0..5 {
        idx.add(&[i as f32, 0.0]).unwrap();
    }
    assert_eq!(idx.search(&[0.0, 0.0], 2).unwrap().len(), 2);
    assert_eq!(idx.search(&[0.0, 0.0], 50).unwrap().len(), 5);
    assert!(idx.search(&[0.0, 0.0], 0).unwrap().is_empty());
}

#[test]
fn test_flat_index_ties_keep_offset_order() {
    let idx = FlatIndex::new(2);
    idx.add(&[1.0, 0.0]).unwrap();
    idx.add(&[0.0, 1.0]).unwrap();
    idx.add(&[-1.0, 0.0]).unwrap();
    assert_eq!(idx.search(&[0.0, 0.0], 3).unwrap(), vec![0, 1, 2]);
}

#[test]
fn test_flat_index_empty_search() {
    let idx = FlatIndex::new(4);
    assert!(idx.search(&[1.0, 0.0, 0.0, 0.0], 10).unwrap().is_empty());
}

#[test]
fn test_flat_index_dimension_mismatch() {
    let idx = FlatIndex::new(3);
    assert!(matches!(
        idx.add(&[1.0, 0.0]),
        Err(VectorDbError::DimensionMismatch { expected: 3, got: 2 })
    ));
    idx.add(&[1.0, 0.0, 0.0]).unwrap();
    assert!(idx.search(&[1.0, 0.0], 1).is_err());
    assert_eq!(idx.len(), 1);
}

#[test]
fn test_flat_index_get_by_offset() {
    let idx = FlatIndex::with_capacity(2, 4);
    idx.add(&[1.0, 2.0]).unwrap();
    idx.add(&[3.0, 4.0]).unwrap();
    assert_eq!(idx.get(1), Some(vec![3.0, 4.0]));
    assert_eq!(idx.get(2), None);
}

#[test]
fn test_flat_index_serialize_roundtrip_same_neighbours() {
    let idx = FlatIndex::new(3);
    let vectors = [
        [0.2, 0.1, 0.9],
        [0.8, 0.3, 0.1],
        [0.5, 0.5, 0.5],
        [-0.4, 0.2, 0.7],
        [0.9, -0.1, 0.0],
    ];
    for v in &vectors {
        idx.add(v).unwrap();
    }
    let query = [0.6, 0.2, 0.3];
    let before = idx.search(&query, 3).unwrap();

    let restored = FlatIndex::deserialize(&idx.serialize()).unwrap();
    assert_eq!(restored.dimension(), 3);
    assert_eq!(restored.len(), 5);
    assert_eq!(restored.search(&query, 3).unwrap(), before);
}

#[test]
fn test_flat_index_deserialize_rejects_garbage() {
    assert!(matches!(FlatIndex::deserialize(b"nope"), Err(VectorDbError::Persistence(_))));

    let idx = FlatIndex::new(2);
    idx.add(&[1.0, 1.0]).unwrap();
    let mut blob = idx.serialize();
    blob.pop();
    assert!(matches!(FlatIndex::deserialize(&blob), Err(VectorDbError::Persistence(_))));
}

// ============================================================
// Collection Tests (both backends)
// ============================================================

#[test]
fn test_self_query_ranks_first() {
    let coll = Collection::<Tag>::new("c");
    coll.insert(&[0.3, 0.4, 0.5], tag("other")).unwrap();
    let id = coll.insert(&[0.9, 0.1, 0.2], tag("me")).unwrap();
    let hits = coll.query(&[0.9, 0.1, 0.2], 1).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, id);
    assert!((hits[0].score - 1.0).abs() < 1e-5);
    assert_eq!(hits[0].metadata, tag("me"));
}

#[test]
fn test_query_returns_min_k_size() {
    for store in stores() {
        for i in 0..4 {
            store.insert(&[1.0, i as f32, 0.5], tag(&i.to_string())).unwrap();
        }
        assert_eq!(store.query(&[1.0, 0.0, 0.0], 2).unwrap().len(), 2, "{}", store.name());
        assert_eq!(store.query(&[1.0, 0.0, 0.0], 10).unwrap().len(), 4, "{}", store.name());
        assert_eq!(store.query_default(&[1.0, 0.0, 0.0]).unwrap().len(), 4, "{}", store.name());
    }
}

#[test]
fn test_query_scores_descend() {
    for store in stores() {
        let vectors = [[0.1, 0.9, 0.3], [0.8, 0.1, 0.1], [0.4, 0.4, 0.4], [-0.5, 0.2, 0.1]];
        for (i, v) in vectors.iter().enumerate() {
            store.insert(v, tag(&i.to_string())).unwrap();
        }
        let hits = store.query(&[0.7, 0.2, 0.1], 4).unwrap();
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score, "{}", store.name());
        }
    }
}

#[test]
fn test_cosine_ties_prefer_earlier_insert() {
    let coll = Collection::<Tag>::new("c");
    let first = coll.insert(&[2.0, 0.0], tag("first")).unwrap();
    let second = coll.insert(&[1.0, 0.0], tag("second")).unwrap();
    let hits = coll.query(&[1.0, 0.0], 2).unwrap();
    assert_eq!(hits[0].id, first);
    assert_eq!(hits[1].id, second);
}

#[test]
fn test_delete_removes_visibility() {
    for store in stores() {
        let a = store.insert(&[1.0, 0.0, 0.0], tag("a")).unwrap();
        let b = store.insert(&[0.0, 1.0, 0.0], tag("b")).unwrap();
        assert!(store.delete(&a).unwrap());
        assert_eq!(store.len(), 1);

        let hits = store.query(&[1.0, 0.0, 0.0], 10).unwrap();
        assert!(hits.iter().all(|h| h.id != a), "{}", store.name());
        assert!(!store.get_all().ids.contains(&a));
        assert_eq!(store.get_all().ids, vec![b.clone()]);

        assert!(!store.delete(&a).unwrap());
        assert!(!store.delete("missing").unwrap());
    }
}

#[test]
fn test_empty_store_contract() {
    for store in stores() {
        assert!(store.is_empty());
        assert!(store.query(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
        let all = store.get_all();
        assert!(all.ids.is_empty() && all.embeddings.is_empty() && all.metadatas.is_empty());
    }
}

#[test]
fn test_dimension_enforced_and_state_unchanged() {
    for store in stores() {
        store.insert(&[1.0, 0.0, 0.0], tag("a")).unwrap();
        let err = store.insert(&[1.0, 0.0], tag("bad")).unwrap_err();
        assert!(matches!(err, VectorDbError::DimensionMismatch { expected: 3, got: 2 }));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_all().metadatas, vec![tag("a")]);
        assert!(store.query(&[1.0, 0.0], 1).is_err());
    }
}

#[test]
fn test_first_insert_establishes_dimension() {
    let coll = Collection::<Tag>::new("c");
    assert_eq!(coll.dimension(), None);
    coll.insert(&[1.0, 2.0, 3.0, 4.0], tag("a")).unwrap();
    assert_eq!(coll.dimension(), Some(4));
    coll.delete(&coll.get_all().ids[0]).unwrap();
    assert!(coll.insert(&[1.0], tag("b")).is_err());
}

#[test]
fn test_fixed_dimension_collection() {
    let coll = Collection::<Tag>::with_dimension("c", 2);
    assert_eq!(coll.dimension(), Some(2));
    assert!(coll.insert(&[1.0, 2.0, 3.0], tag("a")).is_err());
    assert!(coll.is_empty());
}

#[test]
fn test_invalid_vectors_rejected() {
    for store in stores() {
        assert!(matches!(store.insert(&[], tag("a")), Err(VectorDbError::InvalidInput(_))));
        assert!(matches!(
            store.insert(&[f32::INFINITY, 0.0, 0.0], tag("a")),
            Err(VectorDbError::InvalidInput(_))
        ));
        assert!(matches!(store.query(&[], 3), Err(VectorDbError::InvalidInput(_))));
        assert!(store.is_empty());
    }
}

#[test]
fn test_ids_are_unique_and_not_reused() {
    let coll = Collection::<Tag>::new("c");
    let a = coll.insert(&[1.0, 0.0], tag("a")).unwrap();
    coll.delete(&a).unwrap();
    let b = coll.insert(&[1.0, 0.0], tag("a")).unwrap();
    assert_ne!(a, b);
    assert!(uuid::Uuid::parse_str(&b).is_ok());
}

#[test]
fn test_get_all_in_insertion_order() {
    for store in stores() {
        let ids: Vec<String> = (0..5)
            .map(|i| store.insert(&[i as f32 + 1.0, 1.0, 0.0], tag(&i.to_string())).unwrap())
            .collect();
        let all = store.get_all();
        assert_eq!(all.ids, ids);
        assert_eq!(all.embeddings[2], vec![3.0, 1.0, 0.0]);
        assert_eq!(all.metadatas[4], tag("4"));
    }
}

#[test]
fn test_get_by_id() {
    for store in stores() {
        let a = store.insert(&[0.5, 0.5, 0.0], tag("x")).unwrap();
        let b = store.insert(&[0.0, 1.0, 0.0], tag("y")).unwrap();
        assert_eq!(store.get(&a), Some((vec![0.5, 0.5, 0.0], tag("x"))), "{}", store.name());
        assert_eq!(store.get(&b).map(|(_, m)| m), Some(tag("y")));
        assert_eq!(store.get("nope"), None);

        store.delete(&a).unwrap();
        assert_eq!(store.get(&a), None, "{}", store.name());
        assert!(store.get(&b).is_some());
    }
}

#[test]
fn test_collection_contains() {
    let coll = Collection::<Tag>::new("c");
    let id = coll.insert(&[0.5, 0.5], tag("x")).unwrap();
    assert!(coll.contains(&id));
    assert!(!coll.contains("nope"));
}

#[test]
fn test_flat_collection_scores_are_negated_l2() {
    let flat = FlatCollection::<Tag>::open("f", Box::new(MemoryKvStore::new()), 2);
    flat.insert(&[3.0, 4.0], tag("far")).unwrap();
    flat.insert(&[0.0, 1.0], tag("near")).unwrap();
    let hits = flat.query(&[0.0, 0.0], 2).unwrap();
    assert_eq!(hits[0].metadata, tag("near"));
    assert!((hits[0].score + 1.0).abs() < 1e-6);
    assert!((hits[1].score + 5.0).abs() < 1e-6);
    assert_eq!(flat.metric(), DistanceMetric::L2);
}

#[test]
fn test_flat_collection_delete_keeps_offsets() {
    let flat = FlatCollection::<Tag>::open("f", Box::new(MemoryKvStore::new()), 2);
    let a = flat.insert(&[1.0, 0.0], tag("a")).unwrap();
    flat.insert(&[0.0, 1.0], tag("b")).unwrap();
    flat.delete(&a).unwrap();
    assert_eq!(flat.offsets(), 2);
    assert_eq!(flat.len(), 1);
    assert!(!flat.contains(&a));
    let c = flat.insert(&[1.0, 1.0], tag("c")).unwrap();
    assert_eq!(flat.offsets(), 3);
    assert_eq!(flat.query(&[1.0, 1.0], 1).unwrap()[0].id, c);
}

// ============================================================
// Concurrency Tests (both backends)
// ============================================================

const WRITERS: usize = 4;
const PER_WRITER: usize = 40;

/// Writers insert and delete every third of their own ids while readers query.
/// Returns the ids that should still be live.
fn concurrent_workload(store: Arc<dyn VectorStore<Tag>>) -> Vec<String> {
    std::thread::scope(|s| {
        let writers: Vec<_> = (0..WRITERS)
            .map(|w| {
                let store = Arc::clone(&store);
                s.spawn(move || {
                    let mut kept = Vec::new();
                    for i in 0..PER_WRITER {
                        let v = [w as f32 + 1.0, i as f32, 1.0];
                        let id = store.insert(&v, tag(&format!("{w}-{i}"))).unwrap();
                        if i % 3 == 0 {
                            assert!(store.delete(&id).unwrap());
                        } else {
                            kept.push(id);
                        }
                    }
                    kept
                })
            })
            .collect();

        let readers: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                s.spawn(move || {
                    for _ in 0..50 {
                        let hits = store.query(&[1.0, 1.0, 1.0], 5).unwrap();
                        assert!(hits.len() <= 5);
                        for pair in hits.windows(2) {
                            assert!(pair[0].score >= pair[1].score);
                        }
                        let all = store.get_all();
                        assert_eq!(all.ids.len(), all.embeddings.len());
                        assert_eq!(all.ids.len(), all.metadatas.len());
                    }
                })
            })
            .collect();

        for r in readers {
            r.join().unwrap();
        }
        writers.into_iter().flat_map(|w| w.join().unwrap()).collect()
    })
}

fn assert_consistent(store: &dyn VectorStore<Tag>, live: &[String]) {
    let deleted = WRITERS * PER_WRITER.div_ceil(3);
    assert_eq!(live.len(), WRITERS * PER_WRITER - deleted);
    assert_eq!(store.len(), live.len(), "{}", store.name());

    let all = store.get_all();
    let stored: HashSet<&String> = all.ids.iter().collect();
    assert_eq!(stored.len(), all.ids.len(), "duplicate ids in {}", store.name());
    let expected: HashSet<&String> = live.iter().collect();
    assert_eq!(stored, expected);
    for id in live {
        assert!(store.get(id).is_some());
    }
}

#[test]
fn test_concurrent_collection_access() {
    let store: Arc<dyn VectorStore<Tag>> = Arc::new(Collection::<Tag>::with_dimension("coll", 3));
    let live = concurrent_workload(Arc::clone(&store));
    assert_consistent(store.as_ref(), &live);
}

#[test]
fn test_concurrent_flat_collection_access() {
    let flat = Arc::new(FlatCollection::<Tag>::open("flat", Box::new(MemoryKvStore::new()), 3));
    let store: Arc<dyn VectorStore<Tag>> = flat.clone();
    let live = concurrent_workload(Arc::clone(&store));
    assert_consistent(store.as_ref(), &live);
    assert_eq!(flat.offsets(), WRITERS * PER_WRITER);
}
