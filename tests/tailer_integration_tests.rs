// SPDX-License-Identifier: Apache-2.0

//! Tailer Integration Tests
//!
//! End-to-end runs of spawned tailers against real files and a real
//! checkpoint file, including a restart that resumes from the recorded
//! position.

use logtail::init::wait::wait_for_tasks_with_timeout;
use logtail::receivers::file::convert::record_body;
use logtail::receivers::file::{
    CheckpointConfig, CheckpointStore, LogFormat, LogRecordBatch, Tailer, TailerConfig, file_key,
    open_tailers,
};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn append(path: &Path, data: &[u8]) {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    f.write_all(data).unwrap();
    f.flush().unwrap();
}

fn tailer_config(format: LogFormat) -> TailerConfig {
    TailerConfig {
        source: "integration".to_string(),
        format,
        from_beginning: true,
        poll_interval: Duration::from_millis(10),
        check_interval: Duration::from_millis(50),
        ..Default::default()
    }
}

async fn collect_bodies(rx: &flume::Receiver<LogRecordBatch>, count: usize) -> Vec<String> {
    let mut bodies = Vec::new();
    while bodies.len() < count {
        let batch = timeout(TEST_TIMEOUT, rx.recv_async())
            .await
            .expect("timed out waiting for records")
            .expect("records channel closed");
        bodies.extend(
            batch
                .log_records
                .iter()
                .map(|r| record_body(r).unwrap().to_string()),
        );
    }
    bodies
}

#[tokio::test]
async fn test_restart_resumes_from_checkpoint() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("app.log");
    let checkpoint = CheckpointConfig {
        path: temp_dir.path().join("state").join("checkpoint.json"),
        flush_threshold: 32,
    };
    append(&log_path, b"one\ntwo\n");

    // First run
    {
        let store = Arc::new(CheckpointStore::open(&checkpoint));
        let (tx, rx) = flume::unbounded();
        let cancel = CancellationToken::new();
        let tailer = Tailer::open(&log_path, tailer_config(LogFormat::Text), store.clone(), tx)
            .unwrap();
        let handle = tailer.spawn(cancel.clone());

        assert_eq!(collect_bodies(&rx, 2).await, vec!["one", "two"]);

        cancel.cancel();
        handle.await.unwrap().unwrap();
        store.close().unwrap();
    }

    let persisted = std::fs::read_to_string(&checkpoint.path).unwrap();
    let key = file_key(&log_path).unwrap();
    let expected = serde_json::json!({
        "history": { key.clone(): { "source": "integration", "offset": 8 } }
    });
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&persisted).unwrap(),
        expected
    );

    append(&log_path, b"three\n");

    // Second run only sees the new line
    {
        let store = Arc::new(CheckpointStore::open(&checkpoint));
        assert_eq!(store.get(&key).unwrap().map(|e| e.offset), Some(8));

        let (tx, rx) = flume::unbounded();
        let cancel = CancellationToken::new();
        let tailer = Tailer::open(&log_path, tailer_config(LogFormat::Text), store.clone(), tx)
            .unwrap();
        assert_eq!(tailer.offset(), 8);
        let handle = tailer.spawn(cancel.clone());

        assert_eq!(collect_bodies(&rx, 1).await, vec!["three"]);

        cancel.cancel();
        handle.await.unwrap().unwrap();
        store.close().unwrap();
    }
}

#[tokio::test]
async fn test_cri_records_across_many_small_reads() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("container.log");
    let store = Arc::new(CheckpointStore::open(&CheckpointConfig {
        path: temp_dir.path().join("checkpoint.json"),
        flush_threshold: 32,
    }));

    append(
        &log_path,
        b"2024-04-20T18:39:20.1Z stdout P a long record \n\
          2024-04-20T18:39:20.2Z stdout P split over \n\
          2024-04-20T18:39:20.3Z stdout F three lines\n\
          2024-04-20T18:39:20.4Z stderr F second\n",
    );

    let mut config = tailer_config(LogFormat::Cri);
    config.reader.buf_size = 7;

    let (tx, rx) = flume::unbounded();
    let cancel = CancellationToken::new();
    let tailer = Tailer::open(&log_path, config, store.clone(), tx).unwrap();
    let handle = tailer.spawn(cancel.clone());

    assert_eq!(
        collect_bodies(&rx, 2).await,
        vec!["a long record split over three lines", "second"]
    );

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_removed_file_stops_tailer() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("app.log");
    let store = Arc::new(CheckpointStore::open(&CheckpointConfig {
        path: temp_dir.path().join("checkpoint.json"),
        flush_threshold: 32,
    }));
    append(&log_path, b"only line\n");
    let key = file_key(&log_path).unwrap();

    let (tx, rx) = flume::unbounded();
    let tailer = Tailer::open(&log_path, tailer_config(LogFormat::Text), store.clone(), tx)
        .unwrap();
    let handle = tailer.spawn(CancellationToken::new());

    assert_eq!(collect_bodies(&rx, 1).await, vec!["only line"]);
    std::fs::remove_file(&log_path).unwrap();

    timeout(TEST_TIMEOUT, handle).await.unwrap().unwrap().unwrap();
    assert!(store.get(&key).unwrap().is_none());
}

#[test]
fn test_unavailable_store_does_not_block_tailing() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();
    let store = Arc::new(CheckpointStore::open(&CheckpointConfig {
        path: blocker.join("checkpoint.json"),
        flush_threshold: 1,
    }));
    assert!(!store.is_available());

    let log_path = temp_dir.path().join("app.log");
    append(&log_path, b"still forwarded\n");

    let (tx, rx) = flume::unbounded();
    let mut tailer =
        Tailer::open(&log_path, tailer_config(LogFormat::Text), store.clone(), tx).unwrap();
    tailer.read_once().unwrap();

    let batch = rx.try_recv().unwrap();
    assert_eq!(record_body(&batch.log_records[0]), Some("still forwarded"));
    assert!(store.get(tailer.key()).is_err());
}

#[tokio::test]
async fn test_missing_path_does_not_stop_other_files() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(CheckpointStore::open(&CheckpointConfig {
        path: temp_dir.path().join("checkpoint.json"),
        flush_threshold: 32,
    }));

    let mut paths = Vec::new();
    for i in 0..5 {
        let path = temp_dir.path().join(format!("app{}.log", i));
        append(&path, format!("hello {}\n", i).as_bytes());
        paths.push(path);
    }
    paths.insert(2, temp_dir.path().join("missing.log"));

    let (tx, rx) = flume::unbounded();
    let tailers = open_tailers(&paths, &tailer_config(LogFormat::Text), &store, &tx);
    drop(tx);
    assert_eq!(tailers.len(), 5);

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();
    for tailer in tailers {
        let token = cancel.clone();
        tasks.spawn_blocking(move || tailer.run(&token));
    }

    let mut bodies = collect_bodies(&rx, 5).await;
    bodies.sort();
    assert_eq!(
        bodies,
        vec!["hello 0", "hello 1", "hello 2", "hello 3", "hello 4"]
    );

    cancel.cancel();
    wait_for_tasks_with_timeout(&mut tasks, TEST_TIMEOUT)
        .await
        .unwrap();
    store.close().unwrap();
    assert_eq!(store.len(), 5);
}
