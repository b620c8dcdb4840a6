use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub cycles_completed: u64,
    pub pages_fetched: u64,
    pub rows_recorded: u64,
    pub rows_dropped: u64,
    pub fetch_failures: u64,
    pub decode_failures: u64,
    pub targets_aborted: u64,
    pub last_cycle_ms: u64,
    pub last_cycle_started: Option<String>,
    pub uptime_seconds: f64,
}
