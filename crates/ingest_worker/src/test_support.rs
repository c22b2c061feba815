use async_trait::async_trait;
use geotrack_domain::{
    DomainError, DomainResult, LocationHistory, LocationHistoryRepository, LocationPing,
    NearbyDevice,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory history store for pipeline tests: records every batch it is
/// asked to write, optionally fails the first N writes, optionally delays
/// each write, and detects overlapping writes.
pub struct RecordingHistoryStore {
    batches: Mutex<Vec<Vec<LocationPing>>>,
    remaining_failures: AtomicUsize,
    write_delay: Option<Duration>,
    active_writes: AtomicUsize,
    overlapped: AtomicBool,
}

impl RecordingHistoryStore {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            remaining_failures: AtomicUsize::new(0),
            write_delay: None,
            active_writes: AtomicUsize::new(0),
            overlapped: AtomicBool::new(false),
        }
    }

    /// Fail the next `count` insert_batch calls.
    pub fn with_failures(self, count: usize) -> Self {
        self.remaining_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Hold each write open for `delay` to expose overlapping execution.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub fn batches(&self) -> Vec<Vec<LocationPing>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn total_pings(&self) -> usize {
        self.batches.lock().unwrap().iter().map(Vec::len).sum()
    }

    pub fn writes_overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationHistoryRepository for RecordingHistoryStore {
    async fn insert_batch(&self, pings: &[LocationPing]) -> DomainResult<()> {
        if self.active_writes.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }

        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            Err(DomainError::RepositoryError(anyhow::anyhow!(
                "injected store failure"
            )))
        } else {
            self.batches.lock().unwrap().push(pings.to_vec());
            Ok(())
        };

        self.active_writes.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn find_within_radius(
        &self,
        _lat: f64,
        _lng: f64,
        _radius_meters: f64,
    ) -> DomainResult<Vec<NearbyDevice>> {
        Ok(Vec::new())
    }

    async fn get_history(
        &self,
        device_id: &str,
        _start_millis: i64,
        _end_millis: i64,
    ) -> DomainResult<LocationHistory> {
        Ok(LocationHistory {
            device_id: device_id.to_string(),
            locations: Vec::new(),
        })
    }

    async fn distance_meters(&self, _a: &LocationPing, _b: &LocationPing) -> DomainResult<f64> {
        Ok(0.0)
    }
}

/// Poll `condition` until it returns true, sleeping in between. Panics after
/// `attempts` polls so a broken pipeline fails fast instead of hanging.
pub async fn wait_until<F>(attempts: usize, mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..attempts {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached after {attempts} polls");
}
