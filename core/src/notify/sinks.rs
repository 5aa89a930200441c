//! Built-in notification sinks.

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt as _};

use super::{Notification, NotificationLevel, NotificationSink};
use crate::error::NotifyError;

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify_success(&self, _title: &str, _description: &str) -> Result<(), NotifyError> {
        Ok(())
    }

    fn notify_error(&self, _title: &str, _description: &str) -> Result<(), NotifyError> {
        Ok(())
    }

    fn notify_info(&self, _title: &str, _description: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Writes notifications through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify_success(&self, title: &str, description: &str) -> Result<(), NotifyError> {
        log::info!("✓ {}: {}", title, description);
        Ok(())
    }

    fn notify_error(&self, title: &str, description: &str) -> Result<(), NotifyError> {
        log::error!("❌ {}: {}", title, description);
        Ok(())
    }

    fn notify_info(&self, title: &str, description: &str) -> Result<(), NotifyError> {
        log::info!("{}: {}", title, description);
        Ok(())
    }
}

/// Fans notifications out to every subscriber.
///
/// Sending with no subscribers is not an error; lagging subscribers
/// simply miss entries.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Get a receiver for every notification sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Same as [`subscribe`](Self::subscribe), as a stream that skips lag gaps.
    pub fn stream(&self) -> impl Stream<Item = Notification> {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|result| result.ok())
    }

    fn send(&self, level: NotificationLevel, title: &str, description: &str) -> Result<(), NotifyError> {
        // no receivers is fine
        let _ = self.sender.send(Notification::new(level, title, description));
        Ok(())
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(100)
    }
}

impl NotificationSink for BroadcastSink {
    fn notify_success(&self, title: &str, description: &str) -> Result<(), NotifyError> {
        self.send(NotificationLevel::Success, title, description)
    }

    fn notify_error(&self, title: &str, description: &str) -> Result<(), NotifyError> {
        self.send(NotificationLevel::Error, title, description)
    }

    fn notify_info(&self, title: &str, description: &str) -> Result<(), NotifyError> {
        self.send(NotificationLevel::Info, title, description)
    }
}
