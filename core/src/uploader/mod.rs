//! Injected upload transport.
//!
//! The orchestrator never moves bytes itself: it calls an [`Uploader`]
//! and records whether the returned future resolves or rejects. Any
//! `Fn(FileHandle) -> impl Future<Output = UploadResult>` is an uploader,
//! and two adapters ship with the crate:
//!
//! - [`HttpUploader`] - POSTs the raw bytes to an endpoint
//! - [`SimulatedUploader`] - sleeps, then succeeds or fails by file name

use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use crate::error::{UploadError, UploadResult};
use crate::models::FileHandle;

/// Header carrying the original file name.
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// Moves one file somewhere. Rejections become the entry's error verbatim.
pub trait Uploader: Send + Sync {
    fn upload(&self, file: FileHandle) -> BoxFuture<'static, UploadResult>;
}

impl<F, Fut> Uploader for F
where
    F: Fn(FileHandle) -> Fut + Send + Sync,
    Fut: Future<Output = UploadResult> + Send + 'static,
{
    fn upload(&self, file: FileHandle) -> BoxFuture<'static, UploadResult> {
        (self)(file).boxed()
    }
}

// =============================================================================
// HTTP
// =============================================================================

/// POSTs file bytes to a fixed endpoint.
#[derive(Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
}

impl HttpUploader {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Extra headers sent with every request (e.g. authorization).
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

impl Uploader for HttpUploader {
    fn upload(&self, file: FileHandle) -> BoxFuture<'static, UploadResult> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let mut headers = self.headers.clone();

        async move {
            let body = file.read().await?;

            if let Ok(mime) = HeaderValue::from_str(file.mime()) {
                headers.insert(CONTENT_TYPE, mime);
            }
            if let Ok(name) = HeaderValue::from_str(file.name()) {
                headers.insert(FILE_NAME_HEADER, name);
            }

            log::debug!("POST {} ({} bytes) -> {}", file.name(), body.len(), endpoint);
            let response = client.post(&endpoint).headers(headers).body(body).send().await?;

            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(UploadError::new(format!("Server responded with {}", status)))
            }
        }
        .boxed()
    }
}

// =============================================================================
// Simulation
// =============================================================================

/// Waits `delay`, then rejects files named in `failing` and accepts the rest.
#[derive(Debug, Clone, Default)]
pub struct SimulatedUploader {
    delay: Duration,
    failing: HashSet<String>,
}

impl SimulatedUploader {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            failing: HashSet::new(),
        }
    }

    pub fn failing<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(names.into_iter().map(Into::into));
        self
    }
}

impl Uploader for SimulatedUploader {
    fn upload(&self, file: FileHandle) -> BoxFuture<'static, UploadResult> {
        let delay = self.delay;
        let fail = self.failing.contains(file.name());
        async move {
            tokio::time::sleep(delay).await;
            if fail {
                Err(UploadError::new(format!("Simulated failure for {}", file.name())))
            } else {
                Ok(())
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> FileHandle {
        FileHandle::from_bytes(name, "text/plain", b"hello".to_vec())
    }

    #[tokio::test]
    async fn test_closures_are_uploaders() {
        let uploader = |file: FileHandle| async move {
            if file.size() > 3 {
                Err(UploadError::new("too slow"))
            } else {
                Ok(())
            }
        };
        let err = Uploader::upload(&uploader, file("a.txt")).await.unwrap_err();
        assert_eq!(err.message(), "too slow");
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_uploader() {
        let uploader = SimulatedUploader::new(Duration::from_millis(100)).failing(["bad.txt"]);
        assert!(uploader.upload(file("good.txt")).await.is_ok());

        let err = uploader.upload(file("bad.txt")).await.unwrap_err();
        assert!(err.message().contains("bad.txt"));
    }

    #[tokio::test]
    async fn test_http_uploader_reports_connection_failure() {
        // port 9 (discard) is closed on test machines
        let uploader = HttpUploader::new("http://127.0.0.1:9/upload");
        let err = uploader.upload(file("a.txt")).await.unwrap_err();
        assert!(err.message().starts_with("HTTP request failed"));
    }

    #[tokio::test]
    async fn test_http_uploader_reports_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        std::fs::write(&path, b"x").unwrap();
        let handle = FileHandle::from_path(&path).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        let err = HttpUploader::new("http://127.0.0.1:9/upload")
            .upload(handle)
            .await
            .unwrap_err();
        assert!(err.message().starts_with("Failed to read file"));
    }
}
