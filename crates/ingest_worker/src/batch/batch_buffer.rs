use crate::batch::{FlushExecutor, FlushJob};
use geotrack_domain::LocationPing;
use std::mem;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Configuration for the batch buffer
#[derive(Debug, Clone)]
pub struct BatchBufferConfig {
    /// Number of buffered pings that triggers an immediate flush
    pub max_size: usize,
    /// Idle time after the last append before the buffer flushes itself
    pub flush_interval: Duration,
}

impl Default for BatchBufferConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            flush_interval: Duration::from_millis(5000),
        }
    }
}

/// Buffer introspection snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferStats {
    /// Pings waiting in the live buffer
    pub pending: usize,
    /// Flush jobs submitted but not yet completed
    pub queue_depth: usize,
}

struct Inner {
    pending: Vec<LocationPing>,
    idle_timer: Option<JoinHandle<()>>,
}

/// In-memory accumulator of pending history records.
///
/// Two independent flush triggers: reaching `max_size` flushes immediately,
/// and a single-shot idle timer re-armed on every non-flushing append covers
/// the "quiet topic" case ("flush if idle for the interval", not "flush every
/// interval"). Detach-and-replace happens in one critical section, so when a
/// size trigger and a firing timer race, exactly one of them produces a
/// non-empty FlushJob and the other observes an empty buffer and no-ops; no
/// ping is ever lost between jobs or included twice.
#[derive(Clone)]
pub struct BatchBuffer {
    inner: Arc<Mutex<Inner>>,
    executor: FlushExecutor,
    config: BatchBufferConfig,
}

impl BatchBuffer {
    pub fn new(executor: FlushExecutor, config: BatchBufferConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                pending: Vec::new(),
                idle_timer: None,
            })),
            executor,
            config,
        }
    }

    /// Appends a ping, flushing immediately when the size threshold is
    /// reached and re-arming the idle timer otherwise. Initiates the flush
    /// without waiting for the durable write.
    pub async fn append(&self, ping: LocationPing) {
        let job = {
            let mut inner = self.inner.lock().await;
            inner.pending.push(ping);

            if inner.pending.len() >= self.config.max_size {
                Some(Self::detach(&mut inner))
            } else {
                // Re-arm the single-shot timer from now; the previous one
                // is cancelled so only silence flushes the buffer.
                if let Some(timer) = inner.idle_timer.take() {
                    timer.abort();
                }
                let buffer = self.clone();
                let interval = self.config.flush_interval;
                inner.idle_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(interval).await;
                    debug!("idle interval elapsed, flushing batch");
                    buffer.flush().await;
                }));
                None
            }
        };

        if let Some(job) = job {
            debug!(rows = job.len(), "size threshold reached, flushing batch");
            self.executor.submit(job);
        }
    }

    /// Detaches the current buffer into a FlushJob and submits it. No-op on
    /// an empty buffer. Safe to call concurrently with `append`.
    pub async fn flush(&self) {
        let job = {
            let mut inner = self.inner.lock().await;
            if inner.pending.is_empty() {
                return;
            }
            Self::detach(&mut inner)
        };

        self.executor.submit(job);
    }

    // Caller holds the lock: the swap and timer cancellation are one
    // indivisible step.
    fn detach(inner: &mut Inner) -> FlushJob {
        if let Some(timer) = inner.idle_timer.take() {
            timer.abort();
        }
        FlushJob::new(mem::take(&mut inner.pending))
    }

    /// Number of pings currently buffered.
    pub async fn current_size(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    /// Buffer and executor introspection; no side effects.
    pub async fn stats(&self) -> BufferStats {
        BufferStats {
            pending: self.inner.lock().await.pending.len(),
            queue_depth: self.executor.queue_depth(),
        }
    }
}
