//! Download engine — stream a release archive to disk with progress.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::Client;
use reqwest::header::{REFERER, USER_AGENT};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use pineapple_core::error::{Result, UpdaterError};
use pineapple_core::progress::{ProgressSample, ProgressSender};
use pineapple_core::release::DownloadTarget;

/// Bytes written (and flushed) between two progress samples.
pub const CHUNK_SIZE: usize = 50 * 1024;

/// Result of a finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub path: PathBuf,
    pub bytes: u64,
    /// The file on disk already had the declared length; nothing was written.
    pub reused: bool,
}

/// Performs HTTP transfers of release archives.
pub struct DownloadEngine {
    client: Client,
    user_agent: String,
    read_timeout: Duration,
}

impl DownloadEngine {
    pub fn new(
        user_agent: impl Into<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| UpdaterError::Config(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            client,
            user_agent: user_agent.into(),
            read_timeout,
        })
    }

    /// Download `target` unless an identical-length file is already there.
    ///
    /// Every failure is reported as [`UpdaterError::Download`] carrying the
    /// asset URL. A half-written file is left in place; the next attempt
    /// overwrites it.
    pub async fn download(
        &self,
        target: &DownloadTarget,
        progress: &mut ProgressSender,
    ) -> Result<DownloadReport> {
        self.transfer(target, progress)
            .await
            .map_err(|e| UpdaterError::download(&target.asset_url, e))
    }

    async fn transfer(
        &self,
        target: &DownloadTarget,
        progress: &mut ProgressSender,
    ) -> Result<DownloadReport> {
        let url = target.asset_url.as_str();
        let dest = target.local_path.as_path();

        let request = self
            .client
            .get(url)
            .header(REFERER, url)
            .header(USER_AGENT, &self.user_agent)
            .send();
        let response = within_idle(self.read_timeout, request)
            .await??
            .error_for_status()?;

        let total = response.content_length();
        if let Some(total) = total {
            if has_length(dest, total).await {
                debug!("{} already has {} bytes, skipping transfer", dest.display(), total);
                progress.send(ProgressSample::complete(total));
                return Ok(DownloadReport {
                    path: dest.to_path_buf(),
                    bytes: total,
                    reused: true,
                });
            }
        }

        clear_destination(dest).await?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut sink = ChunkSink {
            file: fs::File::create(dest).await?,
            written: 0,
            total,
        };
        let mut stream = Box::pin(response.bytes_stream());
        let mut pending: Vec<u8> = Vec::with_capacity(CHUNK_SIZE);

        while let Some(chunk) = next_chunk(&mut stream, self.read_timeout).await? {
            pending.extend_from_slice(&chunk);
            while pending.len() >= CHUNK_SIZE {
                let rest = pending.split_off(CHUNK_SIZE);
                sink.write(&pending, progress).await?;
                pending = rest;
            }
        }
        if !pending.is_empty() {
            sink.write(&pending, progress).await?;
        }
        sink.file.shutdown().await?;

        let written = sink.written;
        ensure_complete(written, total)?;

        // Unknown or zero declared length never reaches 1.0 on its own.
        if !progress.is_closed() {
            progress.send(ProgressSample::complete(written));
        }

        info!("Downloaded {} ({} bytes)", dest.display(), written);
        Ok(DownloadReport {
            path: dest.to_path_buf(),
            bytes: written,
            reused: false,
        })
    }
}

struct ChunkSink {
    file: fs::File,
    written: u64,
    total: Option<u64>,
}

impl ChunkSink {
    async fn write(&mut self, chunk: &[u8], progress: &mut ProgressSender) -> Result<()> {
        self.file.write_all(chunk).await?;
        self.file.flush().await?;
        self.written += chunk.len() as u64;
        progress.send(ProgressSample::new(self.written, self.total));
        Ok(())
    }
}

async fn has_length(path: &Path, len: u64) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_file() && meta.len() == len)
        .unwrap_or(false)
}

/// Remove whatever occupies `path`: a stale file or a whole directory.
async fn clear_destination(path: &Path) -> Result<()> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await?,
        Ok(_) => fs::remove_file(path).await?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// A body shorter than its declared length is a failed transfer.
fn ensure_complete(written: u64, total: Option<u64>) -> Result<()> {
    match total {
        Some(expected) if written < expected => Err(UpdaterError::IncompleteTransfer {
            received: written,
            expected,
        }),
        _ => Ok(()),
    }
}

/// Await `work`, failing if it takes longer than `idle`.
/// A zero `idle` waits forever.
async fn within_idle<F: Future>(idle: Duration, work: F) -> Result<F::Output> {
    if idle.is_zero() {
        return Ok(work.await);
    }
    tokio::time::timeout(idle, work)
        .await
        .map_err(|_| UpdaterError::StalledTransfer(idle.as_secs()))
}

/// Next body chunk, failing if nothing arrives within `idle`.
async fn next_chunk<S, B>(stream: &mut S, idle: Duration) -> Result<Option<B>>
where
    S: Stream<Item = reqwest::Result<B>> + Unpin,
{
    within_idle(idle, stream.next())
        .await?
        .transpose()
        .map_err(UpdaterError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pineapple_core::progress::progress_channel;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ASSET: &str = "/releases/download/EA-1/Windows-Yuzu-EA-1.zip";

    fn engine() -> DownloadEngine {
        DownloadEngine::new("test-agent", Duration::from_secs(5), Duration::from_secs(5)).unwrap()
    }

    fn target(server: &MockServer, dir: &Path) -> DownloadTarget {
        DownloadTarget {
            tag: "EA-1".into(),
            asset_url: format!("{}{}", server.uri(), ASSET),
            local_path: dir.join("Windows-Yuzu-EA-1.zip"),
        }
    }

    async fn serve(body: Vec<u8>) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ASSET))
            .and(header("user-agent", "test-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_download_streams_with_monotonic_progress() {
        let body: Vec<u8> = (0..(CHUNK_SIZE * 2 + 1000)).map(|i| (i % 251) as u8).collect();
        let server = serve(body.clone()).await;
        let dir = tempfile::tempdir().unwrap();
        let target = target(&server, dir.path());

        let (mut tx, mut rx) = progress_channel();
        let consumer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(sample) = rx.recv().await {
                seen.push(sample);
            }
            seen
        });

        let report = engine().download(&target, &mut tx).await.unwrap();
        drop(tx);
        let seen = consumer.await.unwrap();

        assert!(!report.reused);
        assert_eq!(report.bytes, body.len() as u64);
        assert_eq!(std::fs::read(&target.local_path).unwrap(), body);

        assert!(seen.windows(2).all(|w| w[0].fraction <= w[1].fraction));
        assert_eq!(seen.last().map(|s| s.fraction), Some(1.0));
        assert_eq!(seen.iter().filter(|s| s.fraction == 1.0).count(), 1);
    }

    #[tokio::test]
    async fn test_existing_file_with_same_length_is_reused() {
        let body = vec![b'a'; 4096];
        let server = serve(body).await;
        let dir = tempfile::tempdir().unwrap();
        let target = target(&server, dir.path());
        std::fs::write(&target.local_path, vec![0u8; 4096]).unwrap();

        let (mut tx, mut rx) = progress_channel();
        let report = engine().download(&target, &mut tx).await.unwrap();

        assert!(report.reused);
        assert_eq!(rx.recv().await, Some(ProgressSample::complete(4096)));
        assert_eq!(rx.recv().await, None);
        // Identity check only: the stale bytes were not replaced.
        assert_eq!(std::fs::read(&target.local_path).unwrap(), vec![0u8; 4096]);
    }

    #[tokio::test]
    async fn test_length_mismatch_replaces_file_and_directory() {
        let body = vec![b'z'; 1000];
        let server = serve(body.clone()).await;
        let dir = tempfile::tempdir().unwrap();
        let target = target(&server, dir.path());

        std::fs::create_dir_all(target.local_path.join("junk")).unwrap();
        let (mut tx, _rx) = progress_channel();
        engine().download(&target, &mut tx).await.unwrap();
        assert_eq!(std::fs::read(&target.local_path).unwrap(), body);

        std::fs::write(&target.local_path, b"short").unwrap();
        let (mut tx, _rx) = progress_channel();
        let report = engine().download(&target, &mut tx).await.unwrap();
        assert!(!report.reused);
        assert_eq!(std::fs::read(&target.local_path).unwrap(), body);
    }

    #[tokio::test]
    async fn test_http_error_is_download_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let target = target(&server, dir.path());

        let (mut tx, _rx) = progress_channel();
        let err = engine().download(&target, &mut tx).await.unwrap_err();
        assert_eq!(err.user_message(), format!("Download error: {}", target.asset_url));
        assert!(!target.local_path.exists());
    }

    /// Serve one connection by hand: write each part, pausing `pause`
    /// after every part, then close. Returns the asset URL.
    async fn raw_server(parts: Vec<&'static str>, pause: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            for part in parts {
                if socket.write_all(part.as_bytes()).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
                tokio::time::sleep(pause).await;
            }
            tokio::time::sleep(pause).await;
        });
        format!("http://{}{}", addr, ASSET)
    }

    fn raw_target(url: String, dir: &Path) -> DownloadTarget {
        DownloadTarget {
            tag: "EA-1".into(),
            asset_url: url,
            local_path: dir.join("Windows-Yuzu-EA-1.zip"),
        }
    }

    async fn collect(mut rx: pineapple_core::progress::ProgressReceiver) -> Vec<ProgressSample> {
        let mut seen = Vec::new();
        while let Some(sample) = rx.recv().await {
            seen.push(sample);
        }
        seen
    }

    fn failure_cause(err: UpdaterError) -> UpdaterError {
        match err {
            UpdaterError::Download { source, .. } => *source,
            other => panic!("expected a download failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_large_download_ends_on_full_byte_count() {
        let len = CHUNK_SIZE * 1000 + 1;
        let server = serve(vec![7u8; len]).await;
        let dir = tempfile::tempdir().unwrap();
        let target = target(&server, dir.path());

        let (mut tx, rx) = progress_channel();
        let consumer = tokio::spawn(collect(rx));
        let report = engine().download(&target, &mut tx).await.unwrap();
        drop(tx);
        let seen = consumer.await.unwrap();

        assert_eq!(report.bytes, len as u64);
        assert_eq!(seen.last(), Some(&ProgressSample::complete(len as u64)));
        assert_eq!(seen.iter().filter(|s| s.is_complete()).count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_length_reports_zero_then_completes() {
        let url = raw_server(
            vec![
                "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                "5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
            ],
            Duration::from_millis(10),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let target = raw_target(url, dir.path());

        let (mut tx, rx) = progress_channel();
        let consumer = tokio::spawn(collect(rx));
        let report = engine().download(&target, &mut tx).await.unwrap();
        drop(tx);
        let seen = consumer.await.unwrap();

        assert_eq!(report.bytes, 11);
        assert_eq!(std::fs::read(&target.local_path).unwrap(), b"hello world");
        assert_eq!(seen.last(), Some(&ProgressSample::complete(11)));
        assert!(seen[..seen.len() - 1].iter().all(|s| s.fraction == 0.0));
    }

    #[tokio::test]
    async fn test_silent_body_is_stalled_transfer() {
        let url = raw_server(
            vec!["HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nabc"],
            Duration::from_secs(5),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let target = raw_target(url, dir.path());
        let engine =
            DownloadEngine::new("test-agent", Duration::from_secs(5), Duration::from_millis(200))
                .unwrap();

        let (mut tx, _rx) = progress_channel();
        let err = engine.download(&target, &mut tx).await.unwrap_err();
        assert!(matches!(failure_cause(err), UpdaterError::StalledTransfer(_)));
    }

    #[tokio::test]
    async fn test_missing_headers_is_stalled_transfer() {
        let url = raw_server(Vec::new(), Duration::from_secs(5)).await;
        let dir = tempfile::tempdir().unwrap();
        let target = raw_target(url, dir.path());
        let engine =
            DownloadEngine::new("test-agent", Duration::from_secs(5), Duration::from_millis(200))
                .unwrap();

        let (mut tx, _rx) = progress_channel();
        let err = engine.download(&target, &mut tx).await.unwrap_err();
        assert!(matches!(failure_cause(err), UpdaterError::StalledTransfer(_)));
        assert!(!target.local_path.exists());
    }

    #[tokio::test]
    async fn test_zero_read_timeout_waits_for_slow_body() {
        let url = raw_server(
            vec![
                "HTTP/1.1 200 OK\r\nContent-Length: 6\r\nConnection: close\r\n\r\nabc",
                "def",
            ],
            Duration::from_millis(300),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let target = raw_target(url, dir.path());
        let engine =
            DownloadEngine::new("test-agent", Duration::from_secs(5), Duration::ZERO).unwrap();

        let (mut tx, _rx) = progress_channel();
        let report = engine.download(&target, &mut tx).await.unwrap();
        assert_eq!(report.bytes, 6);
        assert_eq!(std::fs::read(&target.local_path).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn test_truncated_body_is_download_failure() {
        let url = raw_server(
            vec!["HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nabc"],
            Duration::from_millis(10),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let target = raw_target(url, dir.path());

        let (mut tx, _rx) = progress_channel();
        let err = engine().download(&target, &mut tx).await.unwrap_err();
        assert_eq!(err.user_message(), format!("Download error: {}", target.asset_url));
        assert!(matches!(
            failure_cause(err),
            UpdaterError::IncompleteTransfer { .. } | UpdaterError::Network(_)
        ));
    }

    #[test]
    fn test_short_body_against_declared_length_is_incomplete() {
        let err = ensure_complete(3, Some(100)).unwrap_err();
        assert!(matches!(
            err,
            UpdaterError::IncompleteTransfer {
                received: 3,
                expected: 100
            }
        ));
        assert!(ensure_complete(100, Some(100)).is_ok());
        assert!(ensure_complete(3, None).is_ok());
    }
}
