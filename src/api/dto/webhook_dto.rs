//! Webhook acknowledgement body.

use serde::Serialize;

/// Returned with `202 Accepted` once a delivery is queued.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    /// Always `"accepted"`.
    pub status: &'static str,
    /// Records queued from this delivery.
    pub events: usize,
}

impl WebhookAck {
    /// Acknowledges `events` queued records.
    #[must_use]
    pub const fn accepted(events: usize) -> Self {
        Self {
            status: "accepted",
            events,
        }
    }
}
