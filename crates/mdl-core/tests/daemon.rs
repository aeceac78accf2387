//! Worker daemon over a Unix socket, driven through `DaemonClient`.
#![cfg(unix)]

mod common;

use common::{harness, FakeWeb};
use mdl_core::model::JobState;
use mdl_core::remote::{serve, DaemonClient};
use mdl_core::status_bus::StatusBus;
use mdl_core::supervisor::{DownloadBackend, JobSupervisor};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

async fn wait_for_socket(path: &std::path::Path) {
    for _ in 0..200 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("daemon socket never appeared");
}

#[tokio::test]
async fn client_starts_jobs_and_relays_status() {
    let mut web = FakeWeb::with_chapters(2, 2);
    web.delay = Duration::from_millis(5);
    let h = harness(web).await;
    let sock_dir = tempfile::tempdir().unwrap();
    let socket = sock_dir.path().join("control.sock");
    let shutdown = CancellationToken::new();
    let supervisor = Arc::new(JobSupervisor::new(h.runner.clone(), None));
    let server = tokio::spawn({
        let supervisor = Arc::clone(&supervisor);
        let socket = socket.clone();
        let shutdown = shutdown.clone();
        async move { serve(supervisor, &socket, shutdown).await }
    });
    wait_for_socket(&socket).await;

    let client = DaemonClient::connect(&socket, h.store.clone(), StatusBus::new(1024))
        .await
        .unwrap();
    let mut sub = client.status_bus().subscribe();
    let op = h.operation("remote-job", 2);
    assert!(client.start_job(op.clone()).await.unwrap());

    let finished = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let update = sub.recv().await.unwrap();
            if update.job_id == "remote-job" && update.is_finished {
                return update;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(finished.progress, Some(1.0));
    assert!(finished.error_message.is_none());
    assert!(h.archive_path(&op).exists());

    client.stop_all_jobs().await.unwrap();
    shutdown.cancel();
    server.await.unwrap().unwrap();
    assert!(!socket.exists());
}

#[tokio::test]
async fn second_start_leaves_the_running_job_record_alone() {
    let mut web = FakeWeb::with_chapters(4, 3);
    web.delay = Duration::from_millis(50);
    let h = harness(web).await;
    let sock_dir = tempfile::tempdir().unwrap();
    let socket = sock_dir.path().join("control.sock");
    let shutdown = CancellationToken::new();
    let supervisor = Arc::new(JobSupervisor::new(h.runner.clone(), None));
    let server = tokio::spawn({
        let supervisor = Arc::clone(&supervisor);
        let socket = socket.clone();
        let shutdown = shutdown.clone();
        async move { serve(supervisor, &socket, shutdown).await }
    });
    wait_for_socket(&socket).await;

    let client = DaemonClient::connect(&socket, h.store.clone(), StatusBus::new(1024))
        .await
        .unwrap();
    let op = h.operation("first-run", 4);
    let key = op.location_key();
    assert!(client.start_job(op).await.unwrap());
    for _ in 0..200 {
        if h.store.state(&key).await.unwrap() == Some(JobState::Running) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(h.store.state(&key).await.unwrap(), Some(JobState::Running));

    let again = h.operation("second-run", 4);
    assert!(!client.start_job(again).await.unwrap());
    let stored = h.store.load(&key).await.unwrap().unwrap();
    assert_eq!(stored.job_id, "first-run");

    client.stop_all_jobs().await.unwrap();
    shutdown.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn daemon_rejects_unknown_jobs_and_garbage() {
    let h = harness(FakeWeb::default()).await;
    let sock_dir = tempfile::tempdir().unwrap();
    let socket = sock_dir.path().join("control.sock");
    let shutdown = CancellationToken::new();
    let supervisor = Arc::new(JobSupervisor::new(h.runner.clone(), None));
    let server = tokio::spawn({
        let socket = socket.clone();
        let shutdown = shutdown.clone();
        async move { serve(supervisor, &socket, shutdown).await }
    });
    wait_for_socket(&socket).await;

    let stream = tokio::net::UnixStream::connect(&socket).await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    write.write_all(b"start no-such-key\n").await.unwrap();
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "err unknown job no-such-key");
    write.write_all(b"pause 7\n").await.unwrap();
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "err unknown command");
    write.write_all(b"stop nothing-running\n").await.unwrap();
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "ok stopped");

    shutdown.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn connecting_without_a_daemon_fails() {
    let h = harness(FakeWeb::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let err = DaemonClient::connect(dir.path().join("absent.sock"), h.store.clone(), StatusBus::default())
        .await
        .err()
        .unwrap();
    assert!(format!("{err:#}").contains("no daemon"));
}
