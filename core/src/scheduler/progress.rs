//! Upload progress reporting.
//!
//! While an upload is in flight its progress is capped at
//! [`PROGRESS_CEILING`]; only a successful upload sets 100. A failed
//! upload keeps whatever value it had reached.

use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::models::FileHandle;

/// Highest value reported before the upload settles.
pub const PROGRESS_CEILING: u8 = 90;

/// Progress after success.
pub const PROGRESS_DONE: u8 = 100;

/// Clamp a reported value: never backwards, never past the ceiling.
pub fn next_progress(current: u8, reported: u8) -> u8 {
    reported.min(PROGRESS_CEILING).max(current)
}

/// Where a reporter pushes progress for one upload.
#[derive(Clone)]
pub struct ProgressSink {
    report: Arc<dyn Fn(u8) + Send + Sync>,
}

impl ProgressSink {
    pub fn new(report: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            report: Arc::new(report),
        }
    }

    /// Report a percentage; the receiver applies [`next_progress`].
    pub fn report(&self, percent: u8) {
        (self.report)(percent)
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink").finish_non_exhaustive()
    }
}

/// Produces progress for an in-flight upload.
///
/// The returned future is polled alongside the upload and dropped as
/// soon as the upload settles, so it may run forever.
pub trait ProgressReporter: Send + Sync {
    fn track(&self, file: &FileHandle, sink: ProgressSink) -> BoxFuture<'static, ()>;
}

/// Stepped synthetic progress: `+step` every `interval` up to `ceiling`.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedProgress {
    pub interval: Duration,
    pub step: u8,
    pub ceiling: u8,
}

impl Default for SimulatedProgress {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(200),
            step: 10,
            ceiling: PROGRESS_CEILING,
        }
    }
}

impl ProgressReporter for SimulatedProgress {
    fn track(&self, _file: &FileHandle, sink: ProgressSink) -> BoxFuture<'static, ()> {
        let SimulatedProgress { interval, step, ceiling } = *self;
        let ceiling = ceiling.min(PROGRESS_CEILING);
        async move {
            let mut value: u8 = 0;
            while value < ceiling {
                tokio::time::sleep(interval).await;
                value = value.saturating_add(step.max(1)).min(ceiling);
                sink.report(value);
            }
        }
        .boxed()
    }
}

/// Reports nothing; progress jumps from 0 to 100 on success.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn track(&self, _file: &FileHandle, _sink: ProgressSink) -> BoxFuture<'static, ()> {
        futures::future::ready(()).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_next_progress_is_monotonic_and_capped() {
        assert_eq!(next_progress(0, 10), 10);
        assert_eq!(next_progress(40, 20), 40);
        assert_eq!(next_progress(80, 95), PROGRESS_CEILING);
        assert_eq!(next_progress(0, 100), PROGRESS_CEILING);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_progress_steps_to_ceiling() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            ProgressSink::new(move |p| seen.lock().unwrap().push(p))
        };
        let file = FileHandle::from_bytes("a.bin", "application/octet-stream", vec![0u8]);

        SimulatedProgress::default().track(&file, sink).await;

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![10, 20, 30, 40, 50, 60, 70, 80, 90]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uneven_step_stops_at_ceiling() {
        let last = Arc::new(Mutex::new(0u8));
        let sink = {
            let last = last.clone();
            ProgressSink::new(move |p| *last.lock().unwrap() = p)
        };
        let file = FileHandle::from_bytes("a.bin", "application/octet-stream", vec![0u8]);
        let reporter = SimulatedProgress {
            interval: Duration::from_millis(50),
            step: 35,
            ceiling: 100,
        };

        reporter.track(&file, sink).await;
        assert_eq!(*last.lock().unwrap(), PROGRESS_CEILING);
    }
}
