use serde::{Deserialize, Serialize};

/// Env-var names the substrate reads at startup (spec.md §6).
pub const CACHE_URL_ENV: &str = "CACHE_URL";
pub const RECORD_STORE_URL_ENV: &str = "RECORD_STORE_URL";
pub const EVENT_CHANNEL_NAME_ENV: &str = "EVENT_CHANNEL_NAME";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    /// Default deadlines, per spec.md §7 ("Every external I/O has a
    /// default deadline").
    #[serde(default = "d_cache_timeout_ms")]
    pub cache_timeout_ms: u64,
    #[serde(default = "d_record_store_timeout_ms")]
    pub record_store_timeout_ms: u64,
    #[serde(default = "d_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
}

fn d_host() -> String {
    "127.0.0.1".to_string()
}
fn d_port() -> u16 {
    8080
}
fn d_cache_timeout_ms() -> u64 {
    5_000
}
fn d_record_store_timeout_ms() -> u64 {
    10_000
}
fn d_provider_timeout_ms() -> u64 {
    120_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            cache_timeout_ms: d_cache_timeout_ms(),
            record_store_timeout_ms: d_record_store_timeout_ms(),
            provider_timeout_ms: d_provider_timeout_ms(),
        }
    }
}
