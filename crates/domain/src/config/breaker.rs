use serde::{Deserialize, Serialize};

/// Circuit Breaker Registry (C6) configuration — shared by every provider's
/// breaker unless a provider overrides it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "d_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "d_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "d_success_threshold")]
    pub success_threshold: u32,
}

fn d_failure_threshold() -> u32 {
    5
}
fn d_timeout_secs() -> u64 {
    60
}
fn d_success_threshold() -> u32 {
    2
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: d_failure_threshold(),
            timeout_secs: d_timeout_secs(),
            success_threshold: d_success_threshold(),
        }
    }
}
