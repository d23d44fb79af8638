use std::path::Path;
use std::time::Duration;

use harvest_watch::{DownloadWatcher, WatchOptions, await_stable_file};
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn options(timeout_ms: u64, settle_ms: u64) -> WatchOptions {
  WatchOptions {
    timeout: Duration::from_millis(timeout_ms),
    poll_interval: Duration::from_millis(25),
    settle_interval: Duration::from_millis(settle_ms),
    ..WatchOptions::default()
  }
}

async fn grow(path: &Path, chunks: usize, every: Duration) {
  let mut file = tokio::fs::File::create(path).await.unwrap();
  for _ in 0..chunks {
    file.write_all(&[b'x'; 64]).await.unwrap();
    file.flush().await.unwrap();
    tokio::time::sleep(every).await;
  }
}

#[tokio::test]
async fn test_returns_stable_file_and_skips_in_progress() {
  let dir = tempfile::tempdir().unwrap();
  let mut body = b"%PDF-1.7\n".to_vec();
  body.resize(500, b'0');
  std::fs::write(dir.path().join("a.pdf"), &body).unwrap();

  let partial = dir.path().join("b.pdf.crdownload");
  let writer = tokio::spawn(async move { grow(&partial, 40, Duration::from_millis(20)).await });

  let stable = await_stable_file(dir.path(), Duration::from_millis(600), Duration::from_millis(100)).await;
  writer.abort();

  assert_eq!(stable, vec![dir.path().join("a.pdf")]);
}

#[tokio::test]
async fn test_empty_directory_times_out_with_empty_result() {
  let dir = tempfile::tempdir().unwrap();
  let timeout = Duration::from_millis(200);

  let start = Instant::now();
  let stable = DownloadWatcher::new(options(200, 50))
    .wait(dir.path(), &CancellationToken::new())
    .await;

  assert!(stable.is_empty());
  assert!(start.elapsed() >= timeout);
}

#[tokio::test]
async fn test_missing_directory_is_not_an_error() {
  let dir = tempfile::tempdir().unwrap();
  let missing = dir.path().join("not-created-yet");

  let stable = DownloadWatcher::new(options(150, 50))
    .wait(&missing, &CancellationToken::new())
    .await;
  assert!(stable.is_empty());
}

#[tokio::test]
async fn test_zero_byte_file_is_never_stable() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("empty.pdf"), b"").unwrap();

  let stable = DownloadWatcher::new(options(300, 50))
    .wait(dir.path(), &CancellationToken::new())
    .await;
  assert!(stable.is_empty());
}

#[tokio::test]
async fn test_file_that_appears_later_is_picked_up() {
  let dir = tempfile::tempdir().unwrap();
  let target = dir.path().join("late.pdf");
  let path = target.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(100)).await;
    tokio::fs::write(&path, b"%PDF-1.4 late").await.unwrap();
  });

  let stable = DownloadWatcher::new(options(2_000, 100))
    .wait(dir.path(), &CancellationToken::new())
    .await;
  assert_eq!(stable, vec![target]);
}

#[tokio::test]
async fn test_cancellation_returns_early() {
  let dir = tempfile::tempdir().unwrap();
  let cancel = CancellationToken::new();
  let trigger = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(50)).await;
    trigger.cancel();
  });

  let start = Instant::now();
  let stable = DownloadWatcher::new(options(10_000, 50)).wait(dir.path(), &cancel).await;

  assert!(stable.is_empty());
  assert!(start.elapsed() < Duration::from_secs(5));
}
