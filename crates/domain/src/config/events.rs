use serde::{Deserialize, Serialize};

/// Event Bus (C4) / Dead-Letter Queue (C5) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "d_channel_name")]
    pub channel_name: String,
    /// Retry delays, in minutes, applied in order (spec.md §4.4).
    #[serde(default = "d_retry_delays_mins")]
    pub retry_delays_mins: Vec<i64>,
    /// Attempts after which a failure is promoted to terminal `failed`.
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    /// Default `cleanupOldResolved` age, in days.
    #[serde(default = "d_resolved_retention_days")]
    pub resolved_retention_days: i64,
    /// Bound on the broadcast channel backing `notify`/`listen`.
    #[serde(default = "d_channel_capacity")]
    pub channel_capacity: usize,
}

fn d_channel_name() -> String {
    "archon_events".to_string()
}
fn d_retry_delays_mins() -> Vec<i64> {
    vec![5, 30, 120]
}
fn d_max_retries() -> u32 {
    3
}
fn d_resolved_retention_days() -> i64 {
    30
}
fn d_channel_capacity() -> usize {
    1024
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_name: d_channel_name(),
            retry_delays_mins: d_retry_delays_mins(),
            max_retries: d_max_retries(),
            resolved_retention_days: d_resolved_retention_days(),
            channel_capacity: d_channel_capacity(),
        }
    }
}
