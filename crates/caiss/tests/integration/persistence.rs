//! Model files: persist, reload, version guard, training.

use std::fs;
use std::io::Write;

use caiss::{Caiss, EngineConfig, ExternalId, Query, Status, TrainOptions};
use tempfile::tempdir;

use super::{fill, open, random_vectors, seeded_config, APPROX, EUCLIDEAN, INNER_PRODUCT, PROCESS};

#[test]
fn test_persist_and_reload_reproduces_results() {
    let dir = tempdir().expect("tempdir");
    let caiss = Caiss::new();
    let handle = open(&caiss, seeded_config(), EUCLIDEAN, 8);
    let vectors = random_vectors(300, 8, 11);
    fill(&caiss, handle, &vectors);
    assert_eq!(caiss.remove(handle, &ExternalId::Int(3)), Status::Ok);

    let (status, written) = caiss.persist(handle, Some(dir.path().join("model").as_path()));
    assert_eq!(status, Status::Ok);
    let written = written.expect("persisted path");
    assert_eq!(written, dir.path().join("model.caiss"));

    let (_, reloaded) = caiss.create_handle(seeded_config());
    assert_eq!(caiss.init(reloaded, PROCESS, EUCLIDEAN, 8, Some(dir.path().join("model").as_path())), Status::Ok);

    for query in random_vectors(20, 8, 12) {
        let (_, before) = caiss.search(handle, Query::Vector(&query), APPROX, 10, 0);
        let (_, after) = caiss.search(reloaded, Query::Vector(&query), APPROX, 10, 0);
        let ids = |hits: &[caiss::Hit]| hits.iter().map(|h| h.external_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&before), ids(&after));
        assert!(!ids(&after).contains(&ExternalId::Int(3)));
    }
}

#[test]
fn test_persist_defaults_to_init_path() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("index.caiss");
    let caiss = Caiss::new();

    let handle = open(&caiss, seeded_config(), EUCLIDEAN, 4);
    fill(&caiss, handle, &random_vectors(10, 4, 13));
    assert_eq!(caiss.persist(handle, Some(path.as_path())).0, Status::Ok);

    let (_, second) = caiss.create_handle(seeded_config());
    assert_eq!(caiss.init(second, PROCESS, EUCLIDEAN, 4, Some(path.as_path())), Status::Ok);
    assert_eq!(caiss.insert(second, &[0.5; 4], ExternalId::Int(100)), Status::Ok);
    let (status, written) = caiss.persist(second, None);
    assert_eq!(status, Status::Ok);
    assert_eq!(written.as_deref(), Some(path.as_path()));

    let (_, third) = caiss.create_handle(seeded_config());
    assert_eq!(caiss.init(third, PROCESS, EUCLIDEAN, 4, Some(path.as_path())), Status::Ok);
    let stats = caiss.engine(third).expect("live handle").stats().expect("stats");
    assert_eq!(stats.live, 11);
}

#[test]
fn test_incompatible_version_is_format_error_and_engine_untouched() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("old.caiss");
    let caiss = Caiss::new();
    let source = open(&caiss, seeded_config(), EUCLIDEAN, 4);
    fill(&caiss, source, &random_vectors(10, 4, 14));
    assert_eq!(caiss.persist(source, Some(path.as_path())).0, Status::Ok);

    let mut bytes = fs::read(&path).expect("read model");
    bytes[8..10].copy_from_slice(&99u16.to_le_bytes());
    fs::write(&path, &bytes).expect("write model");

    let (_, target) = caiss.create_handle(seeded_config());
    assert_eq!(caiss.init(target, PROCESS, EUCLIDEAN, 4, Some(path.as_path())), Status::Format);
    let engine = caiss.engine(target).expect("live handle");
    assert!(!engine.is_initialized());

    // the engine can still be initialized afterwards
    assert_eq!(caiss.init(target, PROCESS, EUCLIDEAN, 4, None), Status::Ok);
    assert_eq!(engine.stats().expect("stats").live, 0);
}

#[test]
fn test_model_mismatch_and_missing_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("m.caiss");
    let caiss = Caiss::new();
    let source = open(&caiss, seeded_config(), EUCLIDEAN, 4);
    fill(&caiss, source, &random_vectors(5, 4, 15));
    assert_eq!(caiss.persist(source, Some(path.as_path())).0, Status::Ok);

    let (_, wrong_dim) = caiss.create_handle(seeded_config());
    assert_eq!(caiss.init(wrong_dim, PROCESS, EUCLIDEAN, 5, Some(path.as_path())), Status::Config);
    let (_, wrong_metric) = caiss.create_handle(seeded_config());
    assert_eq!(caiss.init(wrong_metric, PROCESS, INNER_PRODUCT, 4, Some(path.as_path())), Status::Config);
    let (_, missing) = caiss.create_handle(seeded_config());
    assert_eq!(
        caiss.init(missing, PROCESS, EUCLIDEAN, 4, Some(dir.path().join("absent").as_path())),
        Status::ModelLoad
    );
}

#[test]
fn test_corrupt_body_is_format_error() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("c.caiss");
    let caiss = Caiss::new();
    let source = open(&caiss, seeded_config(), EUCLIDEAN, 4);
    fill(&caiss, source, &random_vectors(5, 4, 16));
    assert_eq!(caiss.persist(source, Some(path.as_path())).0, Status::Ok);

    let mut bytes = fs::read(&path).expect("read model");
    let last = bytes.len() - 10;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).expect("write model");

    let (_, target) = caiss.create_handle(seeded_config());
    assert_eq!(caiss.init(target, PROCESS, EUCLIDEAN, 4, Some(path.as_path())), Status::Format);
}

#[test]
fn test_persist_on_destroy() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("auto.caiss");
    let caiss = Caiss::new();

    let (_, seed) = caiss.create_handle(seeded_config());
    assert_eq!(caiss.init(seed, PROCESS, EUCLIDEAN, 2, None), Status::Ok);
    assert_eq!(caiss.persist(seed, Some(path.as_path())).0, Status::Ok);

    let (_, handle) = caiss.create_handle(seeded_config().with_persist_on_destroy(true));
    assert_eq!(caiss.init(handle, PROCESS, EUCLIDEAN, 2, Some(path.as_path())), Status::Ok);
    assert_eq!(caiss.insert(handle, &[1.0, 1.0], ExternalId::Int(1)), Status::Ok);
    assert_eq!(caiss.destroy(handle), Status::Ok);

    let (_, check) = caiss.create_handle(EngineConfig::default());
    assert_eq!(caiss.init(check, PROCESS, EUCLIDEAN, 2, Some(path.as_path())), Status::Ok);
    let (_, hits) = caiss.search(check, Query::Id(ExternalId::Int(1)), 1, 1, 0);
    assert_eq!(hits.len(), 1);
}

#[test]
fn test_train_rebuilds_and_saves() {
    let dir = tempdir().expect("tempdir");
    let data = dir.path().join("corpus.jsonl");
    let vectors = random_vectors(200, 6, 17);
    let mut file = fs::File::create(&data).expect("create corpus");
    for (i, v) in vectors.iter().enumerate() {
        let line = serde_json::json!({ "index": i, "node": v });
        writeln!(file, "{line}").expect("write corpus");
    }
    drop(file);

    let caiss = Caiss::new();
    let handle = open(&caiss, seeded_config(), EUCLIDEAN, 6);
    assert_eq!(caiss.insert(handle, &[0.0; 6], ExternalId::from("stale")), Status::Ok);

    let options = TrainOptions::default()
        .with_precision(0.5)
        .with_model_path(dir.path().join("trained"));
    let (status, report) = caiss.train(handle, &data, &options);
    assert_eq!(status, Status::Ok);
    let report = report.expect("train report");
    assert_eq!(report.records, 200);
    assert!(report.converged);

    // the trained index replaces the old one
    assert_eq!(caiss.search(handle, Query::Id(ExternalId::from("stale")), 1, 1, 0).0, Status::NotFound);
    let (_, hits) = caiss.search(handle, Query::Vector(&vectors[9]), APPROX, 1, 0);
    assert_eq!(hits[0].external_id, ExternalId::Int(9));

    let (_, reloaded) = caiss.create_handle(seeded_config());
    assert_eq!(
        caiss.init(reloaded, PROCESS, EUCLIDEAN, 6, Some(dir.path().join("trained").as_path())),
        Status::Ok
    );
    let stats = caiss.engine(reloaded).expect("live handle").stats().expect("stats");
    assert_eq!(stats.live, 200);
}

#[test]
fn test_train_with_bad_corpus() {
    let dir = tempdir().expect("tempdir");
    let caiss = Caiss::new();
    let handle = open(&caiss, seeded_config(), EUCLIDEAN, 2);

    let missing = dir.path().join("missing.jsonl");
    assert_eq!(caiss.train(handle, &missing, &TrainOptions::default()).0, Status::ModelLoad);

    let wrong = dir.path().join("wrong.jsonl");
    fs::write(&wrong, "{\"index\": 1, \"node\": [1.0, 2.0, 3.0]}\n").expect("write corpus");
    assert_eq!(caiss.train(handle, &wrong, &TrainOptions::default()).0, Status::DimensionMismatch);

    let garbage = dir.path().join("garbage.jsonl");
    fs::write(&garbage, "not json\n").expect("write corpus");
    assert_eq!(caiss.train(handle, &garbage, &TrainOptions::default()).0, Status::Format);
}
