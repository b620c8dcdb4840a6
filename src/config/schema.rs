use crate::fetcher::DEFAULT_USER_AGENT;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExporterConfig {
    /// Search endpoints to poll, in order
    #[serde(default)]
    #[validate(length(min = 1))]
    pub targets: Vec<String>,

    #[serde(default = "default_interval")]
    #[validate(range(min = 1))]
    pub interval_secs: u64,

    /// Prefix of every exported metric family
    #[serde(default = "default_namespace")]
    #[validate(length(min = 1))]
    pub namespace: String,

    #[serde(default = "default_listen_addr")]
    #[validate(length(min = 1))]
    pub listen_addr: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl ExporterConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// One configuration file as written. Keys the file leaves out stay `None`,
/// so a child can inherit them or set them back to their default value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigLayer {
    pub targets: Option<Vec<String>>,
    pub interval_secs: Option<u64>,
    pub namespace: Option<String>,
    pub listen_addr: Option<String>,
    pub user_agent: Option<String>,
    pub request_timeout_secs: Option<u64>,

    /// Optional path to a parent configuration file to inherit from
    pub extends: Option<String>,
}

impl ConfigLayer {
    /// Lays `self` over `parent`: every key set here wins.
    pub fn over(self, parent: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            targets: self.targets.or(parent.targets),
            interval_secs: self.interval_secs.or(parent.interval_secs),
            namespace: self.namespace.or(parent.namespace),
            listen_addr: self.listen_addr.or(parent.listen_addr),
            user_agent: self.user_agent.or(parent.user_agent),
            request_timeout_secs: self.request_timeout_secs.or(parent.request_timeout_secs),
            extends: None,
        }
    }

    /// Fills whatever no layer set with the defaults.
    pub fn resolve(self) -> ExporterConfig {
        ExporterConfig {
            targets: self.targets.unwrap_or_default(),
            interval_secs: self.interval_secs.unwrap_or_else(default_interval),
            namespace: self.namespace.unwrap_or_else(default_namespace),
            listen_addr: self.listen_addr.unwrap_or_else(default_listen_addr),
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}

fn default_interval() -> u64 {
    300
}

fn default_namespace() -> String {
    "royal".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:9100".to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
