use geotrack_domain::{LocationHistoryRepository, LocationPing};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify, Semaphore};
use tracing::{debug, error, warn};

/// Configuration for the flush executor
#[derive(Debug, Clone)]
pub struct FlushExecutorConfig {
    /// Maximum number of flush jobs executing at once. The default of 1
    /// serializes bulk writes: job i+1 never starts before job i completes.
    pub concurrency: usize,
}

impl Default for FlushExecutorConfig {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

/// An immutable snapshot of pings detached from the batch buffer.
///
/// Once submitted a job never changes; it is the unit of the bulk durable
/// write and of failure handling.
#[derive(Debug, Clone)]
pub struct FlushJob {
    pings: Vec<LocationPing>,
}

impl FlushJob {
    pub fn new(pings: Vec<LocationPing>) -> Self {
        Self { pings }
    }

    pub fn len(&self) -> usize {
        self.pings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pings.is_empty()
    }

    pub fn pings(&self) -> &[LocationPing] {
        &self.pings
    }
}

/// Bounded-concurrency runner for bulk history writes.
///
/// Jobs are queued unbounded and dispatched under a semaphore. A failed job
/// is logged and discarded with no retry; ingestion is never blocked on the
/// durable store. `on_idle` resolves once every submitted job has finished,
/// success or failure, and exists for the drain path.
#[derive(Clone)]
pub struct FlushExecutor {
    tx: mpsc::UnboundedSender<FlushJob>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl FlushExecutor {
    /// Creates the executor and spawns its dispatch task.
    pub fn new(
        location_history: Arc<dyn LocationHistoryRepository>,
        config: FlushExecutorConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());

        tokio::spawn(dispatch_loop(
            rx,
            location_history,
            config.concurrency.max(1),
            Arc::clone(&in_flight),
            Arc::clone(&idle),
        ));

        Self {
            tx,
            in_flight,
            idle,
        }
    }

    /// Enqueues a flush job. Empty jobs are ignored.
    pub fn submit(&self, job: FlushJob) {
        if job.is_empty() {
            return;
        }

        // Counted before the send so queue_depth/on_idle observe the job
        // as soon as submit returns.
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(job).is_err() {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            self.idle.notify_waiters();
            error!("flush executor dispatch task is gone, discarding job");
        }
    }

    /// Number of submitted jobs that have not yet finished.
    pub fn queue_depth(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Resolves once all submitted jobs have completed, success or failure.
    pub async fn on_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.queue_depth() == 0 {
                return;
            }
            notified.await;
        }
    }
}

async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<FlushJob>,
    location_history: Arc<dyn LocationHistoryRepository>,
    concurrency: usize,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
) {
    let semaphore = Arc::new(Semaphore::new(concurrency));

    while let Some(job) = rx.recv().await {
        // Acquire before spawning so dispatch order is execution order;
        // with a single permit the next job waits for the previous write.
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let location_history = Arc::clone(&location_history);
        let in_flight = Arc::clone(&in_flight);
        let idle = Arc::clone(&idle);
        tokio::spawn(async move {
            let rows = job.len();
            match location_history.insert_batch(job.pings()).await {
                Ok(()) => debug!(rows, "flushed location batch"),
                // No retry: the job is permanently discarded.
                Err(e) => warn!(error = %e, rows, "failed to flush location batch, discarding"),
            }
            drop(permit);
            in_flight.fetch_sub(1, Ordering::AcqRel);
            idle.notify_waiters();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingHistoryStore;
    use std::time::Duration;

    fn ping(n: i64) -> LocationPing {
        LocationPing {
            device_id: format!("driver_{n:03}"),
            lat: 14.5,
            lng: 121.0,
            timestamp: n,
        }
    }

    fn job(count: usize) -> FlushJob {
        FlushJob::new((0..count as i64).map(ping).collect())
    }

    #[tokio::test]
    async fn test_submitted_job_is_written() {
        let store = Arc::new(RecordingHistoryStore::new());
        let executor = FlushExecutor::new(store.clone(), FlushExecutorConfig::default());

        executor.submit(job(3));
        executor.on_idle().await;

        let batches = store.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(executor.queue_depth(), 0);
    }

    #[tokio::test]
    async fn test_empty_job_is_ignored() {
        let store = Arc::new(RecordingHistoryStore::new());
        let executor = FlushExecutor::new(store.clone(), FlushExecutorConfig::default());

        executor.submit(FlushJob::new(Vec::new()));
        executor.on_idle().await;

        assert!(store.batches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_one_never_overlaps_writes() {
        let store = Arc::new(
            RecordingHistoryStore::new().with_write_delay(Duration::from_millis(200)),
        );
        let executor = FlushExecutor::new(store.clone(), FlushExecutorConfig { concurrency: 1 });

        // Back-to-back jobs: the second durable write must start only after
        // the first completes.
        executor.submit(job(100));
        executor.submit(job(37));
        executor.on_idle().await;

        assert!(!store.writes_overlapped());
        let batches = store.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[1].len(), 37);
    }

    #[tokio::test]
    async fn test_failed_job_is_discarded_and_executor_keeps_running() {
        let store = Arc::new(RecordingHistoryStore::new().with_failures(1));
        let executor = FlushExecutor::new(store.clone(), FlushExecutorConfig::default());

        executor.submit(job(5));
        executor.on_idle().await;
        assert!(store.batches().is_empty());

        // Subsequent jobs still execute after a failure.
        executor.submit(job(2));
        executor.on_idle().await;
        let batches = store.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[tokio::test]
    async fn test_on_idle_returns_immediately_when_nothing_submitted() {
        let store = Arc::new(RecordingHistoryStore::new());
        let executor = FlushExecutor::new(store, FlushExecutorConfig::default());

        executor.on_idle().await;
        assert_eq!(executor.queue_depth(), 0);
    }
}
