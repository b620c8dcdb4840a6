use crate::fetcher::Fetcher;
use crate::metrics::{CollectorStats, MetricSet, StatsSnapshot};
use crate::paginator::Paginator;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorState {
    Idle,
    RunningCycle,
    Stopped,
}

/// Drives poll cycles over every target on one task.
pub struct CollectorEngine {
    paginator: Paginator,
    stats: CollectorStats,
    state_watcher: watch::Sender<CollectorState>,
}

impl CollectorEngine {
    pub fn new(fetcher: Arc<dyn Fetcher>, metrics: MetricSet, stats: Option<CollectorStats>) -> Self {
        let (state_tx, _) = watch::channel(CollectorState::Idle);
        let stats = stats.unwrap_or_default();

        Self {
            paginator: Paginator::new(fetcher, metrics, stats.clone()),
            stats,
            state_watcher: state_tx,
        }
    }

    /// Runs one cycle right away, then one per `interval` tick until
    /// `cancel` fires.
    ///
    /// Cycles never overlap. Ticks that fall due while a cycle is running
    /// are dropped rather than replayed. Cancellation is only observed
    /// between cycles.
    pub async fn run(&self, cancel: CancellationToken, interval: Duration, targets: &[String]) {
        log::info!("Starting exporter for {} targets every {:?}", targets.len(), interval);

        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        if !cancel.is_cancelled() {
            self.run_cycle(targets).await;
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::info!("Gracefully stopping exporter");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_cycle(targets).await;
                }
            }
        }

        self.set_state(CollectorState::Stopped);
    }

    /// Polls every target in order, each to completion. A failing target is
    /// logged and skipped; it never ends the cycle.
    pub async fn run_cycle(&self, targets: &[String]) {
        self.set_state(CollectorState::RunningCycle);
        self.stats.record_cycle_started();
        let started = std::time::Instant::now();

        for url in targets {
            match self.paginator.drive(url).await {
                Ok(outcome) => {
                    log::debug!(
                        "{}: {} requests, {} rows, total {}",
                        url,
                        outcome.requests,
                        outcome.rows,
                        outcome.total
                    );
                }
                Err(e) => {
                    self.stats.increment_targets_aborted();
                    log::error!("Stopped collecting {} for this cycle: {}", url, e);
                }
            }
        }

        self.stats.record_cycle_completed(started.elapsed());
        let snapshot = self.stats.snapshot();
        log::info!(
            "Cycle {} finished in {}ms | Pages: {} | Rows: {} | Fetch errors: {} | Decode errors: {}",
            snapshot.cycles_completed,
            snapshot.last_cycle_ms,
            snapshot.pages_fetched,
            snapshot.rows_recorded,
            snapshot.fetch_failures,
            snapshot.decode_failures
        );
        self.set_state(CollectorState::Idle);
    }

    pub fn get_stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn state(&self) -> CollectorState {
        *self.state_watcher.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<CollectorState> {
        self.state_watcher.subscribe()
    }

    fn set_state(&self, state: CollectorState) {
        self.state_watcher.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::fetcher::Fetched;
    use crate::query::PageQuery;
    use crate::timing::TimingSample;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ONE_ROW: &str = r#"{"data":{"cruiseSearch":{"results":{"total":1,"cruises":[
        {"id":"c","sailings":[{"sailDate":"d","stateroomClassPricing":[{"price":{"value":10},"stateroomClass":{"id":"s"}}]}]}
    ]}}}}"#;

    /// Takes `delay` per request and tracks how many requests overlap.
    struct Slow {
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        started: Mutex<Vec<Instant>>,
        urls: Mutex<Vec<String>>,
    }

    impl Slow {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                started: Mutex::new(Vec::new()),
                urls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Fetcher for Slow {
        async fn fetch(&self, url: &str, _query: &PageQuery) -> Result<Fetched> {
            self.started.lock().unwrap().push(Instant::now());
            self.urls.lock().unwrap().push(url.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            time::sleep(self.delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if url.contains("down") {
                return Err(Error::Config("connection refused".into()));
            }
            Ok(Fetched {
                body: ONE_ROW.as_bytes().to_vec(),
                timing: TimingSample {
                    status: 200,
                    ..TimingSample::default()
                },
            })
        }
    }

    fn engine(fetcher: Arc<Slow>) -> Arc<CollectorEngine> {
        Arc::new(CollectorEngine::new(fetcher, MetricSet::new("test").unwrap(), None))
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycles_never_overlap() {
        let fetcher = Arc::new(Slow::new(Duration::from_secs(3)));
        let engine = engine(fetcher.clone());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let engine = engine.clone();
            let cancel = cancel.clone();
            async move {
                engine
                    .run(cancel, Duration::from_secs(1), &["https://a.example".to_string()])
                    .await
            }
        });

        time::sleep(Duration::from_secs(10)).await;
        cancel.cancel();
        handle.await.unwrap();

        let started = fetcher.started.lock().unwrap().clone();
        assert!(started.len() >= 3);
        assert!(started.len() <= 4);
        for pair in started.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(3));
        }
        assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(engine.state(), CollectorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_runs_before_first_tick() {
        let fetcher = Arc::new(Slow::new(Duration::from_millis(10)));
        let engine = engine(fetcher.clone());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let engine = engine.clone();
            let cancel = cancel.clone();
            async move {
                engine
                    .run(cancel, Duration::from_secs(60), &["https://a.example".to_string()])
                    .await
            }
        });

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(engine.get_stats().cycles_completed, 1);
        assert_eq!(engine.state(), CollectorState::Idle);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(engine.get_stats().cycles_completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_target_does_not_stop_the_cycle() {
        let fetcher = Arc::new(Slow::new(Duration::from_millis(1)));
        let engine = engine(fetcher.clone());
        let targets = vec![
            "https://down.example".to_string(),
            "https://b.example".to_string(),
        ];

        engine.run_cycle(&targets).await;

        assert_eq!(*fetcher.urls.lock().unwrap(), targets);
        let stats = engine.get_stats();
        assert_eq!(stats.targets_aborted, 1);
        assert_eq!(stats.rows_recorded, 1);
        assert_eq!(stats.cycles_completed, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let fetcher = Arc::new(Slow::new(Duration::from_millis(1)));
        let engine = engine(fetcher.clone());
        let cancel = CancellationToken::new();
        let mut states = engine.watch_state();
        cancel.cancel();

        engine.run(cancel, Duration::from_secs(1), &["https://a.example".to_string()]).await;

        assert!(fetcher.started.lock().unwrap().is_empty());
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), CollectorState::Stopped);
    }
}
