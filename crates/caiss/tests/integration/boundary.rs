//! Status codes at the boundary.

use caiss::{Caiss, EngineConfig, ExternalId, Query, Status};

use super::{open, seeded_config, APPROX, APPROX_BY_ID, EUCLIDEAN, PROCESS};

#[test]
fn test_status_codes_are_stable() {
    let codes = [
        (Status::Ok, 0),
        (Status::Config, 1),
        (Status::InvalidHandle, 2),
        (Status::ModelLoad, 3),
        (Status::Format, 4),
        (Status::DimensionMismatch, 5),
        (Status::NotFound, 6),
        (Status::ResourceExhausted, 7),
        (Status::InvalidInput, 8),
        (Status::Internal, 99),
    ];
    for (status, code) in codes {
        assert_eq!(status.code(), code);
        assert_eq!(status.is_ok(), code == 0);
    }
}

#[test]
fn test_unsupported_modes_rejected() {
    let caiss = Caiss::new();
    let (_, handle) = caiss.create_handle(EngineConfig::default());
    // networked mode
    assert_eq!(caiss.init(handle, 1, EUCLIDEAN, 4, None), Status::Config);
    assert_eq!(caiss.init(handle, PROCESS, 17, 4, None), Status::Config);
    assert_eq!(caiss.init(handle, PROCESS, EUCLIDEAN, 0, None), Status::Config);
}

#[test]
fn test_invalid_engine_config_rejected_at_create() {
    let caiss = Caiss::new();
    let (status, handle) = caiss.create_handle(EngineConfig::default().with_cache_capacity(0));
    assert_eq!(status, Status::Ok);
    assert_ne!(handle, 0);

    let mut config = EngineConfig::default();
    config.max_threads = 0;
    assert_eq!(caiss.create_handle(config), (Status::Config, 0));
}

#[test]
fn test_handle_limit() {
    let caiss = Caiss::with_max_handles(2);
    let (_, first) = caiss.create_handle(EngineConfig::default());
    let (_, _second) = caiss.create_handle(EngineConfig::default());
    assert_eq!(caiss.create_handle(EngineConfig::default()), (Status::ResourceExhausted, 0));

    assert_eq!(caiss.destroy(first), Status::Ok);
    assert_eq!(caiss.create_handle(EngineConfig::default()).0, Status::Ok);
}

#[test]
fn test_capacity_limit() {
    let caiss = Caiss::new();
    let handle = open(&caiss, seeded_config().with_max_elements(Some(3)), EUCLIDEAN, 2);
    for i in 0..3u64 {
        assert_eq!(caiss.insert(handle, &[1.0, 2.0], ExternalId::Int(i)), Status::Ok);
    }
    assert_eq!(caiss.insert(handle, &[1.0, 2.0], ExternalId::Int(3)), Status::ResourceExhausted);
}

#[test]
fn test_non_finite_input() {
    let caiss = Caiss::new();
    let handle = open(&caiss, seeded_config(), EUCLIDEAN, 2);
    assert_eq!(caiss.insert(handle, &[f32::NAN, 1.0], ExternalId::Int(1)), Status::InvalidInput);
    assert_eq!(caiss.insert(handle, &[f32::INFINITY, 1.0], ExternalId::Int(1)), Status::InvalidInput);
    assert_eq!(caiss.search(handle, Query::Vector(&[f32::NAN, 0.0]), APPROX, 1, 0).0, Status::InvalidInput);
}

#[test]
fn test_unknown_ids() {
    let caiss = Caiss::new();
    let handle = open(&caiss, seeded_config(), EUCLIDEAN, 2);
    assert_eq!(caiss.insert(handle, &[1.0, 2.0], ExternalId::Int(1)), Status::Ok);

    assert_eq!(caiss.remove(handle, &ExternalId::Int(2)), Status::NotFound);
    assert_eq!(caiss.search(handle, Query::Id(ExternalId::Int(2)), APPROX_BY_ID, 1, 0).0, Status::NotFound);
    assert_eq!(caiss.remove(handle, &ExternalId::Int(1)), Status::Ok);
    assert_eq!(caiss.search(handle, Query::Id(ExternalId::Int(1)), APPROX_BY_ID, 1, 0).0, Status::NotFound);
}

#[test]
fn test_timeout_still_returns_results() {
    let caiss = Caiss::new();
    let handle = open(&caiss, seeded_config(), EUCLIDEAN, 2);
    for i in 0..50u64 {
        #[allow(clippy::cast_precision_loss)]
        let x = i as f32;
        assert_eq!(caiss.insert(handle, &[x, x], ExternalId::Int(i)), Status::Ok);
    }
    let (status, hits) = caiss.search(handle, Query::Vector(&[10.0, 10.0]), APPROX, 3, 1000);
    assert_eq!(status, Status::Ok);
    assert_eq!(hits[0].external_id, ExternalId::Int(10));
}
