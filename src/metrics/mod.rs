pub mod collector;
pub mod sink;
pub mod snapshot;

pub use collector::CollectorStats;
pub use sink::{MetricSet, PRICE_LABELS, SUBSYSTEM, URL_LABELS};
pub use snapshot::StatsSnapshot;
