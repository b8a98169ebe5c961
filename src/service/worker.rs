//! Periodic batch workers with start/stop lifecycle.
//!
//! A [`PeriodicWorker`] drives one [`BatchJob`] on a fixed interval. Runs
//! never overlap: the next tick is only awaited once the current batch has
//! returned, and late ticks are delayed rather than bunched. Stopping
//! signals the loop and waits for the in-flight batch to finish.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::RadarError;

/// One unit of periodic work.
#[async_trait]
pub trait BatchJob: Send + Sync + std::fmt::Debug + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Runs one batch at `now`, returning how many items it processed.
    ///
    /// # Errors
    ///
    /// Returns an error only when the batch as a whole could not run
    /// (for example the work list could not be loaded). Per-item failures
    /// are handled inside the job.
    async fn run_once(&self, now: DateTime<Utc>) -> Result<usize, RadarError>;
}

/// Runs a [`BatchJob`] on an interval until stopped.
#[derive(Debug)]
pub struct PeriodicWorker {
    job: Arc<dyn BatchJob>,
    interval: Duration,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicWorker {
    /// Creates a stopped worker.
    #[must_use]
    pub fn new(job: Arc<dyn BatchJob>, interval: Duration) -> Self {
        Self {
            job,
            interval,
            shutdown: None,
            handle: None,
        }
    }

    /// Whether the worker loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Spawns the worker loop. Starting a running worker is a no-op.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let (tx, rx) = watch::channel(false);
        let job = Arc::clone(&self.job);
        let interval = self.interval.max(Duration::from_millis(1));
        tracing::info!(worker = job.name(), interval_ms = interval.as_millis(), "worker started");
        self.handle = Some(tokio::spawn(run_loop(job, interval, rx)));
        self.shutdown = Some(tx);
    }

    /// Signals the loop to exit and waits for the current batch to drain.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            tracing::error!(worker = self.job.name(), error = %e, "worker task panicked");
        }
        tracing::info!(worker = self.job.name(), "worker stopped");
    }
}

async fn run_loop(job: Arc<dyn BatchJob>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                // A running branch body is never cancelled by the other branch.
                run_batch(job.as_ref()).await;
            }
        }
    }
}

async fn run_batch(job: &dyn BatchJob) {
    let started = std::time::Instant::now();
    match job.run_once(Utc::now()).await {
        Ok(0) => tracing::debug!(worker = job.name(), "nothing to do"),
        Ok(processed) => tracing::info!(
            worker = job.name(),
            processed,
            elapsed_ms = started.elapsed().as_millis(),
            "batch complete"
        ),
        Err(e) => tracing::error!(worker = job.name(), error = %e, "batch failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, Default)]
    struct CountingJob {
        runs: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl BatchJob for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run_once(&self, _now: DateTime<Utc>) -> Result<usize, RadarError> {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RadarError::Internal("boom".to_string()));
            }
            Ok(1)
        }
    }

    #[tokio::test]
    async fn runs_repeatedly_without_overlap() {
        let job = Arc::new(CountingJob::default());
        let mut worker = PeriodicWorker::new(Arc::clone(&job) as Arc<dyn BatchJob>, Duration::from_millis(5));
        worker.start();
        assert!(worker.is_running());
        tokio::time::sleep(Duration::from_millis(150)).await;
        worker.stop().await;

        assert!(!worker.is_running());
        assert!(job.runs.load(Ordering::SeqCst) >= 2);
        assert_eq!(job.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_waits_for_in_flight_batch() {
        let job = Arc::new(CountingJob::default());
        let mut worker = PeriodicWorker::new(Arc::clone(&job) as Arc<dyn BatchJob>, Duration::from_secs(60));
        worker.start();
        // First tick fires immediately; stop lands while it sleeps.
        tokio::time::sleep(Duration::from_millis(10)).await;
        worker.stop().await;

        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        assert_eq!(job.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_batches_keep_the_loop_alive() {
        let job = Arc::new(CountingJob {
            fail: true,
            ..CountingJob::default()
        });
        let mut worker = PeriodicWorker::new(Arc::clone(&job) as Arc<dyn BatchJob>, Duration::from_millis(5));
        worker.start();
        tokio::time::sleep(Duration::from_millis(120)).await;
        worker.stop().await;
        assert!(job.runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn stop_before_start_is_harmless() {
        let mut worker =
            PeriodicWorker::new(Arc::new(CountingJob::default()), Duration::from_millis(5));
        worker.stop().await;
        assert!(!worker.is_running());
    }
}
