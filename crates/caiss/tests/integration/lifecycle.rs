//! Handle lifecycle: create, init, insert, search, remove, destroy.

use caiss::{Caiss, EngineConfig, ExternalId, Query, Status};

use super::{fill, open, random_vectors, seeded_config, APPROX, EUCLIDEAN, EXACT, PROCESS};

// ============================================================================
// Happy path
// ============================================================================

#[test]
fn test_full_lifecycle() {
    let caiss = Caiss::new();
    let handle = open(&caiss, seeded_config(), EUCLIDEAN, 16);
    let vectors = random_vectors(200, 16, 1);
    fill(&caiss, handle, &vectors);

    let (status, hits) = caiss.search(handle, Query::Vector(&vectors[42]), APPROX, 5, 0);
    assert_eq!(status, Status::Ok);
    assert_eq!(hits.len(), 5);
    assert_eq!(hits[0].external_id, ExternalId::Int(42));
    assert!(hits[0].distance.abs() < 1e-5);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

    assert_eq!(caiss.remove(handle, &ExternalId::Int(42)), Status::Ok);
    let (_, hits) = caiss.search(handle, Query::Vector(&vectors[42]), EXACT, 5, 0);
    assert!(hits.iter().all(|h| h.external_id != ExternalId::Int(42)));

    assert_eq!(caiss.destroy(handle), Status::Ok);
    assert!(caiss.is_empty());
}

#[test]
fn test_string_ids() {
    let caiss = Caiss::new();
    let handle = open(&caiss, seeded_config(), EUCLIDEAN, 2);
    for (word, v) in [("river", [0.0, 1.0]), ("stone", [1.0, 0.0]), ("cloud", [0.7, 0.7])] {
        assert_eq!(caiss.insert(handle, &v, ExternalId::from(word)), Status::Ok);
    }

    let (status, hits) = caiss.search(handle, Query::Id(ExternalId::from("river")), 3, 2, 0);
    assert_eq!(status, Status::Ok);
    assert_eq!(hits[0].external_id, ExternalId::from("river"));
    assert_eq!(hits[1].external_id, ExternalId::from("cloud"));
}

// ============================================================================
// Guards
// ============================================================================

#[test]
fn test_calls_before_init_fail_with_config() {
    let caiss = Caiss::new();
    let (status, handle) = caiss.create_handle(EngineConfig::default());
    assert_eq!(status, Status::Ok);

    assert_eq!(caiss.insert(handle, &[1.0], ExternalId::Int(1)), Status::Config);
    assert_eq!(caiss.search(handle, Query::Vector(&[1.0]), APPROX, 1, 0).0, Status::Config);
    assert_eq!(caiss.remove(handle, &ExternalId::Int(1)), Status::Config);
    assert_eq!(caiss.persist(handle, None).0, Status::Config);

    // destroying an uninitialized engine is fine
    assert_eq!(caiss.destroy(handle), Status::Ok);
}

#[test]
fn test_second_init_is_rejected() {
    let caiss = Caiss::new();
    let handle = open(&caiss, seeded_config(), EUCLIDEAN, 3);
    fill(&caiss, handle, &random_vectors(10, 3, 2));

    assert_eq!(caiss.init(handle, PROCESS, EUCLIDEAN, 3, None), Status::Config);
    let stats = caiss.engine(handle).expect("live handle").stats().expect("stats");
    assert_eq!(stats.live, 10);
}

#[test]
fn test_dimension_guard_leaves_index_unchanged() {
    let caiss = Caiss::new();
    let handle = open(&caiss, seeded_config(), EUCLIDEAN, 4);
    fill(&caiss, handle, &random_vectors(20, 4, 3));
    let engine = caiss.engine(handle).expect("live handle");
    let before = engine.stats().expect("stats");

    assert_eq!(caiss.insert(handle, &[1.0, 2.0, 3.0], ExternalId::Int(99)), Status::DimensionMismatch);
    assert_eq!(caiss.insert(handle, &[1.0; 5], ExternalId::Int(99)), Status::DimensionMismatch);
    assert_eq!(
        caiss.search(handle, Query::Vector(&[1.0; 5]), APPROX, 3, 0).0,
        Status::DimensionMismatch
    );

    assert_eq!(engine.stats().expect("stats"), before);
    assert_eq!(caiss.remove(handle, &ExternalId::Int(99)), Status::NotFound);
}

#[test]
fn test_overwrite_replaces_vector() {
    let caiss = Caiss::new();
    let handle = open(&caiss, seeded_config(), EUCLIDEAN, 2);
    assert_eq!(caiss.insert(handle, &[0.0, 0.0], ExternalId::Int(1)), Status::Ok);
    assert_eq!(caiss.insert(handle, &[5.0, 5.0], ExternalId::Int(2)), Status::Ok);
    assert_eq!(caiss.insert(handle, &[5.0, 5.1], ExternalId::Int(1)), Status::Ok);

    let (_, hits) = caiss.search(handle, Query::Vector(&[0.0, 0.0]), EXACT, 2, 0);
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.distance > 40.0));
}

#[test]
fn test_zero_top_k_returns_nothing() {
    let caiss = Caiss::new();
    let handle = open(&caiss, seeded_config(), EUCLIDEAN, 2);
    fill(&caiss, handle, &random_vectors(5, 2, 4));
    let (status, hits) = caiss.search(handle, Query::Vector(&[0.0, 0.0]), APPROX, 0, 0);
    assert_eq!(status, Status::Ok);
    assert!(hits.is_empty());
}
