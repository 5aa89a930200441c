//! Notification Bridge - best-effort reporting to a toast-like sink.
//!
//! The orchestrator receives a [`NotificationSink`] at construction and
//! reports config failures, intake summaries, upload outcomes and
//! capacity rejections through a [`NotificationBridge`]. Sink failures
//! (errors or panics) are logged and swallowed: entries are the system
//! of record, notifications only mirror them.

mod sinks;

pub use sinks::{BroadcastSink, LogSink, NoopSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{CapacityError, ConfigError, NotifyError};
use crate::models::Entry;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
    Info,
}

/// A single notification, as fanned out by [`BroadcastSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            description: description.into(),
            timestamp: Utc::now(),
        }
    }
}

/// External toast collaborator.
pub trait NotificationSink: Send + Sync {
    fn notify_success(&self, title: &str, description: &str) -> Result<(), NotifyError>;
    fn notify_error(&self, title: &str, description: &str) -> Result<(), NotifyError>;
    fn notify_info(&self, title: &str, description: &str) -> Result<(), NotifyError>;
}

/// Turns orchestrator events into sink calls.
#[derive(Clone)]
pub struct NotificationBridge {
    sink: Arc<dyn NotificationSink>,
}

impl NotificationBridge {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    pub fn config_invalid(&self, err: &ConfigError) {
        self.emit(NotificationLevel::Error, "Invalid configuration", &err.to_string());
    }

    /// One summary per intake batch.
    pub fn batch_summary(&self, admitted: usize, rejected: usize) {
        match (admitted, rejected) {
            (0, 0) => {}
            (n, 0) => self.emit(
                NotificationLevel::Success,
                "Files added",
                &format!("{} file(s) ready to upload", n),
            ),
            (0, r) => self.emit(
                NotificationLevel::Error,
                "Files rejected",
                &format!("{} file(s) failed validation", r),
            ),
            (n, r) => self.emit(
                NotificationLevel::Info,
                "Files added",
                &format!("{} file(s) ready to upload, {} failed validation", n, r),
            ),
        }
    }

    pub fn upload_succeeded(&self, entry: &Entry) {
        self.emit(
            NotificationLevel::Success,
            "Upload complete",
            &format!("{} uploaded successfully", entry.name),
        );
    }

    pub fn upload_failed(&self, entry: &Entry, message: &str) {
        self.emit(
            NotificationLevel::Error,
            "Upload failed",
            &format!("{}: {}", entry.name, message),
        );
    }

    pub fn capacity_exceeded(&self, err: &CapacityError) {
        self.emit(NotificationLevel::Error, "Too many files", &err.to_string());
    }

    fn emit(&self, level: NotificationLevel, title: &str, description: &str) {
        let sink = &self.sink;
        let outcome = catch_unwind(AssertUnwindSafe(|| match level {
            NotificationLevel::Success => sink.notify_success(title, description),
            NotificationLevel::Error => sink.notify_error(title, description),
            NotificationLevel::Info => sink.notify_info(title, description),
        }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Dropped notification '{}': {}", title, e),
            Err(_) => log::warn!("Notification sink panicked on '{}'", title),
        }
    }
}
