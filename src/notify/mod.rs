//! Notification collaborator: send and edit operator alerts.
//!
//! [`Notifier::send`] always creates a new message and returns its handle.
//! [`Notifier::edit`] rewrites a previous message in place and reports
//! `false` when the target is gone, so the dispatcher can fall back to a
//! fresh send.

pub mod format;
pub mod telegram;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::domain::MessageHandle;
use crate::error::RadarError;

pub use format::render_alert;
pub use telegram::TelegramNotifier;

/// Delivers alert content to the operator channel.
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Sends a new message.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::Notify`] if delivery failed.
    async fn send(&self, content: &str) -> Result<MessageHandle, RadarError>;

    /// Edits a previously sent message. Returns `Ok(false)` when the
    /// message no longer exists or cannot be edited.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::Notify`] on transport failure.
    async fn edit(&self, handle: &MessageHandle, content: &str) -> Result<bool, RadarError>;
}

/// Writes alerts to the log. Used when no bot token is configured.
#[derive(Debug, Default)]
pub struct LogNotifier {
    next_id: AtomicU64,
}

impl LogNotifier {
    /// Creates a log-only notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, content: &str) -> Result<MessageHandle, RadarError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(handle = id, %content, "alert");
        Ok(MessageHandle::new(format!("log-{id}")))
    }

    async fn edit(&self, handle: &MessageHandle, content: &str) -> Result<bool, RadarError> {
        tracing::info!(%handle, %content, "alert updated");
        Ok(true)
    }
}
