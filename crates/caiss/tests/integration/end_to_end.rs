//! End-to-end scenario with production-sized vectors.

use caiss::{Caiss, EngineConfig, ExternalId, HnswConfig, ManagementMode, Query, Status};

use super::{random_vectors, APPROX, EXACT, INNER_PRODUCT, PROCESS};

const COUNT: usize = 1000;
const DIMENSION: usize = 768;

#[test]
fn test_inner_product_self_search_768d() {
    let caiss = Caiss::new();
    let config = EngineConfig::new(4, ManagementMode::Sync)
        .with_normalize(true)
        .with_hnsw(HnswConfig::new(16).with_ef_construction(200).with_ef_search(50).with_seed(2024));
    let (status, handle) = caiss.create_handle(config);
    assert_eq!(status, Status::Ok);
    assert_eq!(caiss.init(handle, PROCESS, INNER_PRODUCT, DIMENSION as u32, None), Status::Ok);

    let vectors = random_vectors(COUNT, DIMENSION, 768);
    let items = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (ExternalId::Int(i as u64), v.clone()))
        .collect();
    assert_eq!(caiss.insert_batch(handle, items), (Status::Ok, COUNT));

    for target in [0usize, 517, 999] {
        let (status, hits) = caiss.search(handle, Query::Vector(&vectors[target]), APPROX, 5, 0);
        assert_eq!(status, Status::Ok);
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].external_id, ExternalId::Int(target as u64));
        assert!((hits[0].distance + 1.0).abs() < 1e-4, "self distance {}", hits[0].distance);
        assert!(hits[1].distance > hits[0].distance);
    }
}

#[test]
fn test_recall_against_exact_search() {
    let caiss = Caiss::new();
    let config = EngineConfig::default()
        .with_hnsw(HnswConfig::new(16).with_ef_construction(200).with_ef_search(64).with_seed(5));
    let (_, handle) = caiss.create_handle(config);
    assert_eq!(caiss.init(handle, PROCESS, super::EUCLIDEAN, 32, None), Status::Ok);
    super::fill(&caiss, handle, &random_vectors(2000, 32, 31));

    let queries = random_vectors(50, 32, 32);
    let mut matched = 0;
    for query in &queries {
        let (_, approx) = caiss.search(handle, Query::Vector(query), APPROX, 10, 0);
        let (_, exact) = caiss.search(handle, Query::Vector(query), EXACT, 10, 0);
        matched += approx.iter().filter(|h| exact.iter().any(|e| e.external_id == h.external_id)).count();
    }
    let recall = matched as f64 / (queries.len() * 10) as f64;
    assert!(recall >= 0.9, "recall@10 = {recall}");
}
