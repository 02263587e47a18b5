//! Concurrent callers on one handle and across handles.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

use caiss::{Caiss, EngineConfig, Error, ExternalId, HnswConfig, ManagementMode, Query, Status};

use super::{open, random_vectors, APPROX, EUCLIDEAN, EXACT};

const WRITERS: usize = 4;
const PER_WRITER: usize = 150;

fn async_config() -> EngineConfig {
    EngineConfig::new(4, ManagementMode::Async).with_hnsw(HnswConfig::new(8).with_ef_construction(64))
}

#[test]
fn test_concurrent_inserts_and_searches() {
    let caiss = Caiss::new();
    let handle = open(&caiss, async_config(), EUCLIDEAN, 8);
    let vectors = random_vectors(WRITERS * PER_WRITER, 8, 21);
    let barrier = Barrier::new(WRITERS + 2);
    let searches = AtomicUsize::new(0);
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        let mut writers = Vec::new();
        for w in 0..WRITERS {
            let (caiss, vectors, barrier) = (&caiss, &vectors, &barrier);
            writers.push(s.spawn(move || {
                barrier.wait();
                for i in (w * PER_WRITER)..((w + 1) * PER_WRITER) {
                    assert_eq!(caiss.insert(handle, &vectors[i], ExternalId::Int(i as u64)), Status::Ok);
                }
            }));
        }
        for _ in 0..2 {
            let (caiss, vectors, barrier, searches, done) = (&caiss, &vectors, &barrier, &searches, &done);
            s.spawn(move || {
                barrier.wait();
                while !done.load(Ordering::Acquire) {
                    let (status, hits) = caiss.search(handle, Query::Vector(&vectors[7]), APPROX, 5, 0);
                    assert_eq!(status, Status::Ok);
                    assert!(hits.len() <= 5);
                    searches.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
        for writer in writers {
            writer.join().expect("writer thread");
        }
        done.store(true, Ordering::Release);
    });

    assert!(searches.load(Ordering::Relaxed) > 0);
    let engine = caiss.engine(handle).expect("live handle");
    assert_eq!(engine.stats().expect("stats").live, WRITERS * PER_WRITER);

    // every completed insert is visible to a later search
    let found = vectors
        .iter()
        .enumerate()
        .filter(|(i, v)| {
            let (_, hits) = caiss.search(handle, Query::Vector(v), APPROX, 1, 0);
            hits.first().map(|h| h.external_id.clone()) == Some(ExternalId::Int(*i as u64))
        })
        .count();
    assert!(found * 100 >= vectors.len() * 98, "self match {found}/{}", vectors.len());
}

#[test]
fn test_insert_then_search_sees_the_insert() {
    let caiss = Caiss::new();
    let handle = open(&caiss, async_config(), EUCLIDEAN, 3);
    for i in 0..50u64 {
        #[allow(clippy::cast_precision_loss)]
        let x = i as f32;
        assert_eq!(caiss.insert(handle, &[x, -x, 1.0], ExternalId::Int(i)), Status::Ok);
        let (status, hits) = caiss.search(handle, Query::Vector(&[x, -x, 1.0]), EXACT, 1, 0);
        assert_eq!(status, Status::Ok);
        assert_eq!(hits[0].external_id, ExternalId::Int(i));
    }
}

#[test]
fn test_destroying_one_handle_leaves_another_running() {
    let caiss = Caiss::new();
    let a = open(&caiss, async_config(), EUCLIDEAN, 8);
    let b = open(&caiss, async_config(), EUCLIDEAN, 8);
    let vectors = random_vectors(300, 8, 22);
    for (i, v) in vectors.iter().enumerate() {
        assert_eq!(caiss.insert(a, v, ExternalId::Int(i as u64)), Status::Ok);
        assert_eq!(caiss.insert(b, v, ExternalId::Int(i as u64)), Status::Ok);
    }

    let barrier = Barrier::new(3);
    thread::scope(|s| {
        for _ in 0..2 {
            let (caiss, vectors, barrier) = (&caiss, &vectors, &barrier);
            s.spawn(move || {
                barrier.wait();
                for (i, v) in vectors.iter().enumerate() {
                    let (status, hits) = caiss.search(b, Query::Vector(v), EXACT, 1, 0);
                    assert_eq!(status, Status::Ok);
                    assert_eq!(hits[0].external_id, ExternalId::Int(i as u64));
                }
            });
        }
        barrier.wait();
        assert_eq!(caiss.destroy(a), Status::Ok);
    });

    assert_eq!(caiss.search(a, Query::Vector(&vectors[0]), APPROX, 1, 0).0, Status::InvalidHandle);
    assert_eq!(caiss.len(), 1);
    assert_eq!(caiss.destroy(b), Status::Ok);
}

#[test]
fn test_destroy_waits_for_queued_work() {
    let caiss = Caiss::new();
    let handle = open(&caiss, async_config(), EUCLIDEAN, 16);
    let engine = caiss.engine(handle).expect("live handle");

    let pending: Vec<_> = random_vectors(200, 16, 23)
        .into_iter()
        .enumerate()
        .map(|(i, v)| engine.submit_insert(v, ExternalId::Int(i as u64)))
        .collect();
    assert_eq!(caiss.destroy(handle), Status::Ok);

    // queued inserts either ran before the engine closed or saw it closed
    for completion in pending {
        let result = completion.wait();
        assert!(matches!(result, Ok(_) | Err(Error::Config(_))), "{result:?}");
    }
    assert_eq!(engine.stats().map(|_| ()).map_err(|e| e.status()), Err(Status::Config));
}
