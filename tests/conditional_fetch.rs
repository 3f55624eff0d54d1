//! Conditional retrieval against a local HTTP origin.
//!
//! A minimal HTTP/1.1 responder honors `If-None-Match`, which is enough to
//! exercise the fetch contract: 304 moves no bytes and leaves the cached
//! file untouched; changed content replaces the file and reports a new ETag.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use feeacquire::fingerprint::fingerprint_file;
use feeacquire::retrieval::{DocumentFetcher, FetchOutcome};

#[derive(Clone)]
struct Origin {
    body: Vec<u8>,
    etag: String,
}

/// Serve the current origin state, honoring If-None-Match.
async fn serve(listener: TcpListener, state: Arc<Mutex<Origin>>) {
    loop {
        let Ok((mut socket, _)) = listener.accept().await else {
            break;
        };
        let state = state.clone();
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                match socket.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        buf.extend_from_slice(&chunk[..n]);
                        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    Err(_) => return,
                }
            }

            let request = String::from_utf8_lossy(&buf);
            let sent_etag = request
                .lines()
                .find_map(|line| line.strip_prefix("if-none-match:").or_else(|| {
                    line.strip_prefix("If-None-Match:")
                }))
                .map(|v| v.trim().to_string());

            let origin = state.lock().unwrap().clone();
            let response = if sent_etag.as_deref() == Some(origin.etag.as_str()) {
                format!(
                    "HTTP/1.1 304 Not Modified\r\nETag: {}\r\nConnection: close\r\n\r\n",
                    origin.etag
                )
                .into_bytes()
            } else {
                let mut head = format!(
                    "HTTP/1.1 200 OK\r\nETag: {}\r\nContent-Type: application/pdf\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    origin.etag,
                    origin.body.len()
                )
                .into_bytes();
                head.extend_from_slice(&origin.body);
                head
            };
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        });
    }
}

async fn start_origin(initial: Origin) -> (Url, Arc<Mutex<Origin>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(Mutex::new(initial));
    tokio::spawn(serve(listener, state.clone()));
    let url = Url::parse(&format!("http://{}/fees/price-list.pdf", addr)).unwrap();
    (url, state)
}

fn target_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("alpha").join("price-list.pdf")
}

#[tokio::test]
async fn unchanged_origin_moves_no_bytes() {
    let (url, _state) = start_origin(Origin {
        body: b"fee schedule v1".to_vec(),
        etag: "\"v1\"".to_string(),
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let target = target_path(&dir);
    let fetcher = DocumentFetcher::new(Duration::from_secs(5));

    // Initial fetch downloads the body and reports the ETag.
    let outcome = fetcher.fetch(&url, None, &target).await.unwrap();
    let etag = match outcome {
        FetchOutcome::Downloaded { etag, size } => {
            assert_eq!(size, 15);
            etag.expect("origin sent an ETag")
        }
        other => panic!("expected Downloaded, got {:?}", other),
    };
    assert_eq!(etag, "\"v1\"");
    assert_eq!(std::fs::read(&target).unwrap(), b"fee schedule v1");
    let digest_before = fingerprint_file(&target).unwrap();
    let mtime_before = std::fs::metadata(&target).unwrap().modified().unwrap();

    // Conditional refetch with the stored token: not modified, and the
    // on-disk file and its fingerprint are untouched.
    let outcome = fetcher.fetch(&url, Some(&etag), &target).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::NotModified));
    assert_eq!(fingerprint_file(&target).unwrap(), digest_before);
    assert_eq!(
        std::fs::metadata(&target).unwrap().modified().unwrap(),
        mtime_before
    );
}

#[tokio::test]
async fn changed_origin_replaces_the_file() {
    let (url, state) = start_origin(Origin {
        body: b"fee schedule v1".to_vec(),
        etag: "\"v1\"".to_string(),
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let target = target_path(&dir);
    let fetcher = DocumentFetcher::new(Duration::from_secs(5));

    let outcome = fetcher.fetch(&url, None, &target).await.unwrap();
    let old_etag = match outcome {
        FetchOutcome::Downloaded { etag, .. } => etag.unwrap(),
        other => panic!("expected Downloaded, got {:?}", other),
    };

    // The origin publishes new content under a new validator.
    {
        let mut origin = state.lock().unwrap();
        origin.body = b"fee schedule v2, now with more fees".to_vec();
        origin.etag = "\"v2\"".to_string();
    }

    let outcome = fetcher.fetch(&url, Some(&old_etag), &target).await.unwrap();
    match outcome {
        FetchOutcome::Downloaded { etag, .. } => assert_eq!(etag.as_deref(), Some("\"v2\"")),
        other => panic!("expected Downloaded, got {:?}", other),
    }
    assert_eq!(
        std::fs::read(&target).unwrap(),
        b"fee schedule v2, now with more fees"
    );
}
