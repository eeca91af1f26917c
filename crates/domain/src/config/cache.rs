use serde::{Deserialize, Serialize};

/// Session Store (C1) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Session TTL in seconds; refreshed on every read or write.
    #[serde(default = "d_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

fn d_session_ttl_secs() -> u64 {
    3_600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: d_session_ttl_secs(),
        }
    }
}
