use crate::metrics::snapshot::StatsSnapshot;
use chrono::{DateTime, Utc};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::{Duration, Instant};

/// Running counters of the collector itself.
#[derive(Clone)]
pub struct CollectorStats {
    cycles_completed: Arc<AtomicU64>,
    pages_fetched: Arc<AtomicU64>,
    rows_recorded: Arc<AtomicU64>,
    rows_dropped: Arc<AtomicU64>,
    fetch_failures: Arc<AtomicU64>,
    decode_failures: Arc<AtomicU64>,
    targets_aborted: Arc<AtomicU64>,
    last_cycle_ms: Arc<AtomicU64>,
    last_cycle_started: Arc<Mutex<Option<DateTime<Utc>>>>,
    start_time: Arc<Instant>,
}

impl Default for CollectorStats {
    fn default() -> Self {
        Self {
            cycles_completed: Arc::new(AtomicU64::new(0)),
            pages_fetched: Arc::new(AtomicU64::new(0)),
            rows_recorded: Arc::new(AtomicU64::new(0)),
            rows_dropped: Arc::new(AtomicU64::new(0)),
            fetch_failures: Arc::new(AtomicU64::new(0)),
            decode_failures: Arc::new(AtomicU64::new(0)),
            targets_aborted: Arc::new(AtomicU64::new(0)),
            last_cycle_ms: Arc::new(AtomicU64::new(0)),
            last_cycle_started: Arc::new(Mutex::new(None)),
            start_time: Arc::new(Instant::now()),
        }
    }
}

impl CollectorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle_started(&self) {
        let mut started = self
            .last_cycle_started
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *started = Some(Utc::now());
    }

    pub fn record_cycle_completed(&self, duration: Duration) {
        self.cycles_completed.fetch_add(1, Ordering::SeqCst);
        self.last_cycle_ms
            .store(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn increment_pages_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add_rows_recorded(&self, rows: u64) {
        self.rows_recorded.fetch_add(rows, Ordering::SeqCst);
    }

    pub fn add_rows_dropped(&self, rows: u64) {
        self.rows_dropped.fetch_add(rows, Ordering::SeqCst);
    }

    pub fn increment_fetch_failures(&self) {
        self.fetch_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_decode_failures(&self) {
        self.decode_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_targets_aborted(&self) {
        self.targets_aborted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let started = *self
            .last_cycle_started
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let last_cycle_started = started.map(|at| at.to_rfc3339());

        StatsSnapshot {
            cycles_completed: self.cycles_completed.load(Ordering::SeqCst),
            pages_fetched: self.pages_fetched.load(Ordering::SeqCst),
            rows_recorded: self.rows_recorded.load(Ordering::SeqCst),
            rows_dropped: self.rows_dropped.load(Ordering::SeqCst),
            fetch_failures: self.fetch_failures.load(Ordering::SeqCst),
            decode_failures: self.decode_failures.load(Ordering::SeqCst),
            targets_aborted: self.targets_aborted.load(Ordering::SeqCst),
            last_cycle_ms: self.last_cycle_ms.load(Ordering::SeqCst),
            last_cycle_started,
            uptime_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}
