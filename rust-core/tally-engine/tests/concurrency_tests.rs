// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Concurrency tests: many threads adding through one engine.
//
// Every accepted record must land in exactly one finalized file as one
// complete JSON line, whatever interleaving of adds, batch appends,
// rotations and flushes the threads produce.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use tally_engine::Engine;
use tally_event::Event;
use tally_log::{list_log_files, read_records};
use tempfile::TempDir;

const THREADS: usize = 8;
const PER_THREAD: usize = 250;

fn run_concurrent_adds(engine: Arc<Engine>) {
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let event = Event::track(format!("thread-{t}"), "tick", "rust")
                        .with_property("i", i as i64);
                    engine.add(event).unwrap();
                    if i % 97 == 0 {
                        engine.flush().unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    engine.close().unwrap();
}

fn collect_records(dir: &Path) -> HashSet<(String, i64)> {
    let mut seen = HashSet::new();
    for file in list_log_files(dir, "c_").unwrap() {
        // read_records fails on any partial or corrupt line.
        for record in read_records(&file.path).unwrap() {
            let subject = record["#dt_id"].as_str().unwrap().to_string();
            let i = record["i"].as_i64().unwrap();
            assert!(seen.insert((subject, i)), "duplicate record");
        }
    }
    seen
}

#[test]
fn test_concurrent_adds_file_log() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(Engine::new());
    let payload = serde_json::json!({
        "consumer": "log",
        "path": dir.path(),
        "name_prefix": "c_",
        "max_batch_len": 7,
        "max_file_size_bytes": 8 * 1024,
    });
    engine
        .init_from_bytes(payload.to_string().as_bytes())
        .unwrap();

    run_concurrent_adds(engine);
    assert_eq!(collect_records(dir.path()).len(), THREADS * PER_THREAD);
}

#[test]
fn test_concurrent_adds_mmap_log() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(Engine::new());
    let payload = serde_json::json!({
        "consumer": "mlog",
        "path": dir.path(),
        "name_prefix": "c_",
        "file_size": 8 * 1024,
        "flush_size": 1024,
    });
    engine
        .init_from_bytes(payload.to_string().as_bytes())
        .unwrap();

    run_concurrent_adds(engine);
    assert_eq!(collect_records(dir.path()).len(), THREADS * PER_THREAD);
}
