//! Per-token alert state and alert decisions.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Mint, RiskFlag};

/// Opaque reference to a previously sent notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHandle(String);

impl MessageHandle {
    /// Wraps a notifier-specific message id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw message id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of alert state per token.
///
/// A token is *Unalerted* while `last_score` is `None` and *Alerted*
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    /// Token the state belongs to.
    pub mint: Mint,
    /// Score carried by the last notification.
    pub last_score: Option<u8>,
    /// When the last notification was sent or edited.
    pub last_sent_at: Option<DateTime<Utc>>,
    /// Handle of the live notification.
    pub message_handle: Option<MessageHandle>,
    /// Number of notifications sent or edited.
    pub alert_count: u32,
    /// Flags carried by the last notification.
    pub last_risk_flags: BTreeSet<RiskFlag>,
}

impl AlertState {
    /// Fresh, unalerted state.
    #[must_use]
    pub fn unalerted(mint: Mint) -> Self {
        Self {
            mint,
            last_score: None,
            last_sent_at: None,
            message_handle: None,
            alert_count: 0,
            last_risk_flags: BTreeSet::new(),
        }
    }

    /// Returns `true` once a notification has gone out.
    #[must_use]
    pub fn is_alerted(&self) -> bool {
        self.last_score.is_some()
    }
}

/// Outcome of the alert transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertDecision {
    /// Create a new notification.
    Send,
    /// Edit the existing notification, falling back to a new one.
    Update,
    /// Stay silent; alert state untouched.
    Suppress,
}

impl AlertDecision {
    /// Returns the decision as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Update => "update",
            Self::Suppress => "suppress",
        }
    }
}
