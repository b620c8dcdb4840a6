use crate::error::{Error, Result};
use crate::extractor::{self, Page};
use crate::fetcher::Fetcher;
use crate::metrics::{CollectorStats, MetricSet};
use crate::query::{PAGE_SIZE, PageQuery};
use std::sync::Arc;

/// What one target yielded in one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationOutcome {
    pub requests: u32,
    pub rows: u64,
    pub total: i64,
}

/// Walks one target page by page, recording as it goes.
pub struct Paginator {
    fetcher: Arc<dyn Fetcher>,
    sink: MetricSet,
    stats: CollectorStats,
    page_size: u32,
}

impl Paginator {
    pub fn new(fetcher: Arc<dyn Fetcher>, sink: MetricSet, stats: CollectorStats) -> Self {
        Self {
            fetcher,
            sink,
            stats,
            page_size: PAGE_SIZE,
        }
    }

    /// Fetches pages at offsets 0, 20, 40, ... until the offset reaches
    /// `total - page_size`, where `total` is re-read from every page.
    ///
    /// A transport error or a non-positive total stops the walk; rows
    /// recorded before that stay recorded. A page that fails to decode
    /// contributes no rows and keeps the last known total.
    pub async fn drive(&self, url: &str) -> Result<PaginationOutcome> {
        let mut outcome = PaginationOutcome::default();
        let mut offset: u32 = 0;

        loop {
            let query = PageQuery::new(offset, self.page_size);
            let fetched = match self.fetcher.fetch(url, &query).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    self.stats.increment_fetch_failures();
                    return Err(e);
                }
            };
            outcome.requests += 1;
            self.stats.increment_pages_fetched();
            self.sink.record_timing(url, &fetched.timing);

            let page = match extractor::extract(url, &fetched.body) {
                Ok(page) => page,
                Err(e) => {
                    log::warn!(
                        "Could not decode page at offset {} from {}: {}",
                        offset,
                        url,
                        e
                    );
                    self.stats.increment_decode_failures();
                    Page::empty(outcome.total)
                }
            };

            for row in &page.rows {
                self.sink.record_price(row);
            }
            let rows = page.rows.len() as u64;
            outcome.rows += rows;
            outcome.total = page.total;
            self.stats.add_rows_recorded(rows);
            self.stats.add_rows_dropped(page.dropped);

            log::info!(
                "Pulled {} rows from {} skipping the first {} of {} total",
                rows,
                url,
                offset,
                page.total
            );

            if page.total <= 0 {
                return Err(Error::NonPositiveTotal {
                    total: page.total,
                    offset,
                });
            }
            if i64::from(offset) >= page.total - i64::from(self.page_size) {
                break;
            }
            offset += self.page_size;
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::Fetched;
    use crate::timing::TimingSample;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned bodies and remembers the offsets it was asked for.
    struct Scripted {
        bodies: Mutex<VecDeque<Result<Vec<u8>>>>,
        offsets: Mutex<Vec<u32>>,
    }

    impl Scripted {
        fn new(bodies: Vec<Result<Vec<u8>>>) -> Self {
            Self {
                bodies: Mutex::new(bodies.into()),
                offsets: Mutex::new(Vec::new()),
            }
        }

        fn offsets(&self) -> Vec<u32> {
            self.offsets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for Scripted {
        async fn fetch(&self, _url: &str, query: &PageQuery) -> Result<Fetched> {
            self.offsets.lock().unwrap().push(query.skip());
            let body = self
                .bodies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Config("script exhausted".into())))?;
            Ok(Fetched {
                body,
                timing: TimingSample {
                    status: 200,
                    ..TimingSample::default()
                },
            })
        }
    }

    fn page_body(rows: usize, total: i64) -> Vec<u8> {
        let pricing: Vec<_> = (0..rows)
            .map(|i| json!({"price": {"value": 100 + i}, "stateroomClass": {"id": format!("C{}", i)}}))
            .collect();
        serde_json::to_vec(&json!({"data": {"cruiseSearch": {"results": {
            "cruises": [{"id": "X", "sailings": [{"itinerary": {"code": "I"}, "sailDate": "d", "stateroomClassPricing": pricing}]}],
            "total": total
        }}}}))
        .unwrap()
    }

    fn paginator(fetcher: Arc<Scripted>) -> (Paginator, CollectorStats) {
        let stats = CollectorStats::new();
        let metrics = MetricSet::new("test").unwrap();
        (Paginator::new(fetcher, metrics, stats.clone()), stats)
    }

    #[tokio::test]
    async fn test_two_pages_then_stop() {
        let fetcher = Arc::new(Scripted::new(vec![Ok(page_body(20, 25)), Ok(page_body(5, 25))]));
        let (paginator, _) = paginator(fetcher.clone());

        let outcome = paginator.drive("u").await.unwrap();

        assert_eq!(fetcher.offsets(), vec![0, 20]);
        assert_eq!(outcome.requests, 2);
        assert_eq!(outcome.rows, 25);
    }

    #[tokio::test]
    async fn test_total_within_first_page_issues_one_request() {
        let fetcher = Arc::new(Scripted::new(vec![Ok(page_body(20, 20)), Ok(page_body(1, 20))]));
        let (paginator, _) = paginator(fetcher.clone());

        paginator.drive("u").await.unwrap();

        assert_eq!(fetcher.offsets(), vec![0]);
    }

    #[tokio::test]
    async fn test_total_is_reread_every_page() {
        let fetcher = Arc::new(Scripted::new(vec![
            Ok(page_body(20, 100)),
            Ok(page_body(20, 30)),
            Ok(page_body(20, 30)),
        ]));
        let (paginator, _) = paginator(fetcher.clone());

        let outcome = paginator.drive("u").await.unwrap();

        assert_eq!(fetcher.offsets(), vec![0, 20]);
        assert_eq!(outcome.total, 30);
    }

    #[tokio::test]
    async fn test_zero_total_aborts() {
        let fetcher = Arc::new(Scripted::new(vec![Ok(page_body(0, 0))]));
        let (paginator, _) = paginator(fetcher.clone());

        let err = paginator.drive("u").await.unwrap_err();

        assert!(matches!(err, Error::NonPositiveTotal { total: 0, offset: 0 }));
        assert_eq!(fetcher.offsets(), vec![0]);
    }

    #[tokio::test]
    async fn test_transport_error_mid_walk_keeps_earlier_rows() {
        let fetcher = Arc::new(Scripted::new(vec![
            Ok(page_body(20, 60)),
            Err(Error::Config("connection reset".into())),
        ]));
        let (paginator, stats) = paginator(fetcher.clone());

        assert!(paginator.drive("u").await.is_err());

        let snapshot = stats.snapshot();
        assert_eq!(fetcher.offsets(), vec![0, 20]);
        assert_eq!(snapshot.rows_recorded, 20);
        assert_eq!(snapshot.fetch_failures, 1);
    }

    #[tokio::test]
    async fn test_decode_failure_keeps_last_total() {
        let fetcher = Arc::new(Scripted::new(vec![
            Ok(page_body(20, 50)),
            Ok(b"not json".to_vec()),
            Ok(page_body(10, 50)),
        ]));
        let (paginator, stats) = paginator(fetcher.clone());

        let outcome = paginator.drive("u").await.unwrap();

        assert_eq!(fetcher.offsets(), vec![0, 20, 40]);
        assert_eq!(outcome.rows, 30);
        assert_eq!(stats.snapshot().decode_failures, 1);
    }

    #[tokio::test]
    async fn test_decode_failure_on_first_page_aborts() {
        let fetcher = Arc::new(Scripted::new(vec![Ok(b"{}".to_vec())]));
        let (paginator, _) = paginator(fetcher.clone());

        let err = paginator.drive("u").await.unwrap_err();

        assert!(matches!(err, Error::NonPositiveTotal { .. }));
    }
}
