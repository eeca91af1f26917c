use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConsolidatorConfig {
    #[serde(default = "d_consolidator_interval_secs")]
    pub interval_secs: u64,
    /// Working entries at or above this relevance score are eligible for
    /// promotion to long-term memory.
    #[serde(default = "d_relevance_threshold")]
    pub relevance_threshold: f64,
    /// Importance score assigned to a freshly promoted long-term entry.
    #[serde(default = "d_promoted_importance")]
    pub promoted_importance: f64,
}

fn d_consolidator_interval_secs() -> u64 {
    6 * 3_600
}
fn d_relevance_threshold() -> f64 {
    0.6
}
fn d_promoted_importance() -> f64 {
    0.5
}

impl Default for ConsolidatorConfig {
    fn default() -> Self {
        Self {
            interval_secs: d_consolidator_interval_secs(),
            relevance_threshold: d_relevance_threshold(),
            promoted_importance: d_promoted_importance(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CleanerConfig {
    #[serde(default = "d_cleaner_interval_secs")]
    pub interval_secs: u64,
}

fn d_cleaner_interval_secs() -> u64 {
    24 * 3_600
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            interval_secs: d_cleaner_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EventRetryConfig {
    #[serde(default = "d_retry_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "d_retry_batch_limit")]
    pub batch_limit: usize,
}

fn d_retry_interval_secs() -> u64 {
    5 * 60
}
fn d_retry_batch_limit() -> usize {
    50
}

impl Default for EventRetryConfig {
    fn default() -> Self {
        Self {
            interval_secs: d_retry_interval_secs(),
            batch_limit: d_retry_batch_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkersConfig {
    #[serde(default)]
    pub consolidator: ConsolidatorConfig,
    #[serde(default)]
    pub cleaner: CleanerConfig,
    #[serde(default)]
    pub event_retry: EventRetryConfig,
    /// Crash-backoff ceiling, in seconds (spec.md §4.8, §8).
    #[serde(default = "d_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

fn d_max_backoff_secs() -> u64 {
    300
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            consolidator: ConsolidatorConfig::default(),
            cleaner: CleanerConfig::default(),
            event_retry: EventRetryConfig::default(),
            max_backoff_secs: d_max_backoff_secs(),
        }
    }
}
