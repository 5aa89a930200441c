//! Queue scheduling primitives.
//!
//! - [`UploadQueue`] - FIFO queue and bounded active set
//! - [`ProgressReporter`] - pluggable progress for in-flight uploads
//! - [`drive_upload`] - runs one upload callback to completion
//!
//! The orchestrator owns the queue and calls its tick after every
//! state change; this module holds no shared state of its own.

mod progress;
mod queue;

pub use progress::{
    next_progress, NoProgress, ProgressReporter, ProgressSink, SimulatedProgress, PROGRESS_CEILING,
    PROGRESS_DONE,
};
pub use queue::UploadQueue;

use futures::FutureExt;
use std::panic::AssertUnwindSafe;

use crate::error::{UploadError, UploadResult};
use crate::models::FileHandle;
use crate::uploader::Uploader;

/// Run the upload callback for `file` while `reporter` feeds `sink`.
///
/// The reporter future is dropped once the upload settles. A panicking
/// callback is turned into an [`UploadError`] carrying the default
/// message, so one broken upload never wedges the queue.
pub async fn drive_upload(
    uploader: &dyn Uploader,
    reporter: &dyn ProgressReporter,
    file: FileHandle,
    sink: ProgressSink,
) -> UploadResult {
    let mut tracking = reporter.track(&file, sink);
    let name = file.name().to_string();
    let upload = match std::panic::catch_unwind(AssertUnwindSafe(|| uploader.upload(file))) {
        Ok(upload) => AssertUnwindSafe(upload).catch_unwind(),
        Err(_) => {
            log::error!("Upload callback for {} panicked", name);
            return Err(UploadError::default());
        }
    };
    tokio::pin!(upload);
    let mut tracking_done = false;

    let outcome = loop {
        tokio::select! {
            outcome = &mut upload => break outcome,
            _ = &mut tracking, if !tracking_done => tracking_done = true,
        }
    };

    match outcome {
        Ok(result) => result,
        Err(_) => {
            log::error!("Upload callback for {} panicked", name);
            Err(UploadError::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DEFAULT_UPLOAD_ERROR;
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn file() -> FileHandle {
        FileHandle::from_bytes("a.bin", "application/octet-stream", vec![0u8; 4])
    }

    fn recording_sink() -> (ProgressSink, Arc<AtomicU8>) {
        let progress = Arc::new(AtomicU8::new(0));
        let p = progress.clone();
        let sink = ProgressSink::new(move |v| {
            let current = p.load(Ordering::SeqCst);
            p.store(next_progress(current, v), Ordering::SeqCst);
        });
        (sink, progress)
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_runs_while_upload_pending() {
        let uploader = |_file: FileHandle| async {
            tokio::time::sleep(Duration::from_millis(450)).await;
            Ok::<(), UploadError>(())
        };
        let (sink, progress) = recording_sink();

        let result = drive_upload(&uploader, &SimulatedProgress::default(), file(), sink).await;
        assert!(result.is_ok());
        assert_eq!(progress.load(Ordering::SeqCst), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_outlives_reporter() {
        let uploader = |_file: FileHandle| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Err::<(), UploadError>(UploadError::new("network down"))
        };
        let (sink, progress) = recording_sink();

        let result = drive_upload(&uploader, &SimulatedProgress::default(), file(), sink).await;
        assert_eq!(result.unwrap_err().message(), "network down");
        assert_eq!(progress.load(Ordering::SeqCst), PROGRESS_CEILING);
    }

    #[tokio::test]
    async fn test_panicking_callback_becomes_upload_error() {
        let uploader = |_file: FileHandle| async {
            if true {
                panic!("transport bug");
            }
            Ok::<(), UploadError>(())
        };
        let (sink, _) = recording_sink();

        let result = drive_upload(&uploader, &NoProgress, file(), sink).await;
        assert_eq!(result.unwrap_err().message(), DEFAULT_UPLOAD_ERROR);
    }
}
