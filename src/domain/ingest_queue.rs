//! Bounded hand-off between the webhook boundary and ingestion.
//!
//! [`IngestQueue`] wraps a [`tokio::sync::mpsc`] channel. The webhook
//! handler enqueues and acknowledges immediately; the ingest worker owns
//! the receiving end and processes batches with its own error boundary.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::RawEvent;
use crate::error::RadarError;

/// One webhook delivery awaiting processing.
#[derive(Debug, Clone)]
pub struct IngestBatch {
    /// Records in delivery order.
    pub events: Vec<RawEvent>,
    /// When the delivery was accepted.
    pub received_at: DateTime<Utc>,
}

impl IngestBatch {
    /// Wraps records received now.
    #[must_use]
    pub fn new(events: Vec<RawEvent>) -> Self {
        Self {
            events,
            received_at: Utc::now(),
        }
    }
}

/// Sending half of the ingestion queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct IngestQueue {
    sender: mpsc::Sender<IngestBatch>,
}

impl IngestQueue {
    /// Creates a queue with the given capacity, returning the receiver the
    /// ingest worker consumes.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<IngestBatch>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Enqueues without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::QueueFull`] when the queue is at capacity and
    /// [`RadarError::Internal`] when the worker has shut down.
    pub fn try_enqueue(&self, batch: IngestBatch) -> Result<(), RadarError> {
        self.sender.try_send(batch).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RadarError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => {
                RadarError::Internal("ingest worker stopped".to_string())
            }
        })
    }

    /// Free slots left in the queue.
    #[must_use]
    pub fn remaining_capacity(&self) -> usize {
        self.sender.capacity()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueued_batch_is_received() {
        let (queue, mut rx) = IngestQueue::new(4);
        let result = queue.try_enqueue(IngestBatch::new(vec![RawEvent::default()]));
        assert!(result.is_ok());

        let Some(batch) = rx.recv().await else {
            panic!("expected batch");
        };
        assert_eq!(batch.events.len(), 1);
    }

    #[test]
    fn full_queue_rejects() {
        let (queue, _rx) = IngestQueue::new(1);
        assert!(queue.try_enqueue(IngestBatch::new(vec![])).is_ok());
        let Err(err) = queue.try_enqueue(IngestBatch::new(vec![])) else {
            panic!("second enqueue should fail");
        };
        assert!(matches!(err, RadarError::QueueFull));
        assert_eq!(queue.remaining_capacity(), 0);
    }

    #[test]
    fn closed_queue_is_internal_error() {
        let (queue, rx) = IngestQueue::new(1);
        drop(rx);
        let Err(err) = queue.try_enqueue(IngestBatch::new(vec![])) else {
            panic!("enqueue on closed queue should fail");
        };
        assert!(matches!(err, RadarError::Internal(_)));
    }
}
