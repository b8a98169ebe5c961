//! Ingestion: raw webhook batches into persisted swaps, pools and tokens.
//!
//! [`IngestService::process_batch`] is the per-batch error boundary: every
//! event is handled independently and a failure is counted, logged, and
//! skipped. [`IngestWorker`] consumes the [`IngestQueue`] receiver and runs
//! batches concurrently up to a fixed in-flight limit.
//!
//! [`IngestQueue`]: crate::domain::IngestQueue

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};

use super::normalizer::EventNormalizer;
use crate::domain::{IngestBatch, KeySpace, Mint, NormalizedEvent, RawEvent};
use crate::error::RadarError;
use crate::persistence::Storage;

/// Per-batch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Events in the batch.
    pub received: usize,
    /// Events rejected by the dedup gate.
    pub duplicates: usize,
    /// Swaps newly stored.
    pub swaps: usize,
    /// Pools newly stored.
    pub pools: usize,
    /// Transfers that only registered a token sighting.
    pub sightings: usize,
    /// Tokens created by this batch.
    pub new_tokens: usize,
    /// Events with nothing usable.
    pub unrecognized: usize,
    /// Events that failed normalization or persistence.
    pub failed: usize,
}

/// Normalizes and persists webhook batches.
#[derive(Debug, Clone)]
pub struct IngestService {
    storage: Arc<dyn Storage>,
    normalizer: EventNormalizer,
    store_raw_events: bool,
}

impl IngestService {
    /// Creates an ingest service. With `store_raw_events`, every incoming
    /// event is also archived verbatim.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, normalizer: EventNormalizer, store_raw_events: bool) -> Self {
        Self {
            storage,
            normalizer,
            store_raw_events,
        }
    }

    /// Processes one batch in order. Never fails as a whole.
    pub async fn process_batch(&self, events: &[RawEvent], now: DateTime<Utc>) -> IngestSummary {
        let mut summary = IngestSummary {
            received: events.len(),
            ..IngestSummary::default()
        };
        for event in events {
            if self.store_raw_events
                && let Err(e) = self.storage.store_raw_event(event).await
            {
                tracing::debug!(signature = ?event.signature, error = %e, "raw event not archived");
            }
            if !self.normalizer.admit(event) {
                summary.duplicates += 1;
                continue;
            }
            let normalized = match self.normalizer.normalize(event, now) {
                Ok(normalized) => normalized,
                Err(e) => {
                    tracing::warn!(signature = ?event.signature, error = %e, "event normalization failed");
                    summary.failed += 1;
                    continue;
                }
            };
            if let Err(e) = self.persist(&normalized, &mut summary).await {
                tracing::warn!(
                    signature = ?event.signature,
                    kind = normalized.kind_str(),
                    error = %e,
                    "event persistence failed"
                );
                summary.failed += 1;
            }
        }
        if summary.received > 0 {
            tracing::info!(
                received = summary.received,
                duplicates = summary.duplicates,
                swaps = summary.swaps,
                pools = summary.pools,
                new_tokens = summary.new_tokens,
                failed = summary.failed,
                "batch ingested"
            );
        }
        summary
    }

    async fn persist(
        &self,
        event: &NormalizedEvent,
        summary: &mut IngestSummary,
    ) -> Result<(), RadarError> {
        match event {
            NormalizedEvent::Swap(swap) => {
                self.ensure_token(&swap.token_mint, swap.timestamp, summary)
                    .await?;
                if self.storage.insert_swap(swap).await? {
                    summary.swaps += 1;
                } else {
                    tracing::debug!(signature = %swap.signature, "swap already stored");
                }
            }
            NormalizedEvent::PoolCreation(pool) => {
                self.ensure_token(&pool.token_mint, pool.created_at, summary)
                    .await?;
                if self.storage.upsert_pool(pool).await? {
                    summary.pools += 1;
                    tracing::info!(mint = %pool.token_mint, dex = %pool.dex, "pool created");
                } else {
                    tracing::debug!(mint = %pool.token_mint, "pool already stored");
                }
            }
            NormalizedEvent::TokenSighting(sighting) => {
                self.ensure_token(&sighting.token_mint, sighting.seen_at, summary)
                    .await?;
                summary.sightings += 1;
            }
            NormalizedEvent::Unrecognized => summary.unrecognized += 1,
        }
        Ok(())
    }

    /// Creates the token row the first time a mint is seen. The mint is
    /// only marked once the write succeeds, so a failed insert is retried
    /// by the next event for that mint.
    async fn ensure_token(
        &self,
        mint: &Mint,
        seen_at: DateTime<Utc>,
        summary: &mut IngestSummary,
    ) -> Result<(), RadarError> {
        let dedup = self.normalizer.dedup();
        if dedup.seen(KeySpace::Mint, mint.as_str()) {
            return Ok(());
        }
        if self.storage.upsert_token(mint, seen_at).await? {
            summary.new_tokens += 1;
            tracing::info!(%mint, "new token");
        }
        dedup.mark(KeySpace::Mint, mint.as_str());
        Ok(())
    }
}

/// Consumes queued batches with bounded concurrency.
#[derive(Debug)]
pub struct IngestWorker {
    service: Arc<IngestService>,
    max_in_flight: usize,
}

impl IngestWorker {
    /// Creates a worker running at most `max_in_flight` batches at once.
    #[must_use]
    pub fn new(service: Arc<IngestService>, max_in_flight: usize) -> Self {
        Self {
            service,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Spawns the consume loop. It exits when `shutdown` flips to `true`
    /// or every queue sender is dropped. Batches already queued and those
    /// in flight are processed before the task completes.
    #[must_use]
    pub fn spawn(
        self,
        receiver: mpsc::Receiver<IngestBatch>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver, shutdown))
    }

    async fn run(self, mut receiver: mpsc::Receiver<IngestBatch>, mut shutdown: watch::Receiver<bool>) {
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();
        loop {
            let batch = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                batch = receiver.recv() => batch,
            };
            let Some(batch) = batch else { break };
            self.submit(batch, &permits, &mut tasks).await;
            while let Some(Ok(())) = tasks.try_join_next() {}
        }

        receiver.close();
        let mut drained = 0usize;
        while let Some(batch) = receiver.recv().await {
            drained += 1;
            self.submit(batch, &permits, &mut tasks).await;
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "ingest task panicked");
            }
        }
        tracing::info!(drained, "ingest worker stopped");
    }

    async fn submit(&self, batch: IngestBatch, permits: &Arc<Semaphore>, tasks: &mut JoinSet<()>) {
        let Ok(permit) = Arc::clone(permits).acquire_owned().await else {
            tracing::error!("ingest semaphore closed");
            return;
        };
        let service = Arc::clone(&self.service);
        tasks.spawn(async move {
            let _permit = permit;
            let lag_ms = (Utc::now() - batch.received_at).num_milliseconds();
            tracing::debug!(events = batch.events.len(), lag_ms, "processing batch");
            service.process_batch(&batch.events, Utc::now()).await;
        });
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::mint::WSOL_MINT;
    use crate::domain::{DedupCache, DedupCapacities, IngestQueue, TokenTransfer};
    use crate::persistence::InMemoryStorage;

    fn service(storage: &Arc<InMemoryStorage>, store_raw: bool) -> IngestService {
        let dedup = Arc::new(DedupCache::new(DedupCapacities::default()));
        IngestService::new(
            Arc::clone(storage) as Arc<dyn Storage>,
            EventNormalizer::new(dedup, 150.0),
            store_raw,
        )
    }

    fn transfer(mint: &str, from: &str, to: &str, amount: f64) -> TokenTransfer {
        TokenTransfer {
            mint: mint.to_string(),
            from_user_account: Some(from.to_string()),
            to_user_account: Some(to.to_string()),
            token_amount: amount,
        }
    }

    fn swap_event(sig: &str, mint: &str) -> RawEvent {
        RawEvent {
            signature: Some(sig.to_string()),
            declared_type: Some("SWAP".to_string()),
            fee_payer: Some("Trader".to_string()),
            timestamp: Some(Utc::now().timestamp()),
            token_transfers: vec![
                transfer(WSOL_MINT, "Trader", "Pool", 2.0),
                transfer(mint, "Pool", "Trader", 1_000.0),
            ],
            ..RawEvent::default()
        }
    }

    #[tokio::test]
    async fn swaps_create_token_and_are_idempotent() {
        let storage = Arc::new(InMemoryStorage::default());
        let svc = service(&storage, false);
        let events = vec![swap_event("s1", "MintA"), swap_event("s2", "MintA")];

        let first = svc.process_batch(&events, Utc::now()).await;
        assert_eq!(first.swaps, 2);
        assert_eq!(first.new_tokens, 1);
        assert_eq!(storage.swap_count().await, 2);
        assert_eq!(storage.token_count().await, 1);

        let replay = svc.process_batch(&events, Utc::now()).await;
        assert_eq!(replay.duplicates, 2);
        assert_eq!(replay.swaps, 0);
        assert_eq!(storage.swap_count().await, 2);
    }

    #[tokio::test]
    async fn replay_through_fresh_cache_is_absorbed_by_storage() {
        let storage = Arc::new(InMemoryStorage::default());
        let events = vec![swap_event("s1", "MintA")];
        let _ = service(&storage, false).process_batch(&events, Utc::now()).await;

        let restarted = service(&storage, false);
        let summary = restarted.process_batch(&events, Utc::now()).await;
        assert_eq!(summary.duplicates, 0);
        assert_eq!(summary.swaps, 0);
        assert_eq!(summary.new_tokens, 0);
        assert_eq!(storage.swap_count().await, 1);
    }

    #[tokio::test]
    async fn unrecognized_and_raw_archive_are_counted() {
        let storage = Arc::new(InMemoryStorage::default());
        let svc = service(&storage, true);
        let events = vec![
            RawEvent {
                signature: Some("empty".to_string()),
                ..RawEvent::default()
            },
            swap_event("s1", "MintB"),
        ];
        let summary = svc.process_batch(&events, Utc::now()).await;
        assert_eq!(summary.received, 2);
        assert_eq!(summary.unrecognized, 1);
        assert_eq!(summary.swaps, 1);
        assert_eq!(storage.raw_event_count().await, 2);
    }

    #[tokio::test]
    async fn worker_drains_queue_on_shutdown() {
        let storage = Arc::new(InMemoryStorage::default());
        let svc = Arc::new(service(&storage, false));
        let (queue, receiver) = IngestQueue::new(16);
        let (stop_tx, stop_rx) = watch::channel(false);

        for i in 0..5 {
            let enqueued = queue.try_enqueue(IngestBatch::new(vec![swap_event(&format!("s{i}"), "MintA")]));
            assert!(enqueued.is_ok());
        }
        let handle = IngestWorker::new(svc, 2).spawn(receiver, stop_rx);
        let _ = stop_tx.send(true);

        let Ok(joined) = tokio::time::timeout(Duration::from_secs(5), handle).await else {
            panic!("worker did not stop");
        };
        assert!(joined.is_ok());
        assert_eq!(storage.swap_count().await, 5);
    }
}
