pub mod collector;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod metrics;
pub mod paginator;
pub mod query;
pub mod server;
pub mod timing;

pub use collector::{CollectorEngine, CollectorState};
pub use error::{Error, Result};
pub use extractor::{Page, PriceRow};
pub use fetcher::{Fetched, Fetcher, HttpFetcher};
pub use metrics::collector::CollectorStats;
pub use metrics::sink::MetricSet;
pub use metrics::snapshot::StatsSnapshot;
pub use paginator::{PaginationOutcome, Paginator};
pub use timing::{Phase, TimingObserver, TimingSample};
