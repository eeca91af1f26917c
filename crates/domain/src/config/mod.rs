//! Top-level configuration, module-per-concern like `domain/src/config/*.rs`.
//! Every sub-config is `Default` and `toml`-loadable; the top-level
//! [`Config`] composes them.

mod aal;
mod breaker;
mod cache;
mod events;
mod record_store;
mod server;
mod workers;

pub use aal::{AalConfig, ModelManifestEntry, ProviderManifestEntry};
pub use breaker::BreakerConfig;
pub use cache::CacheConfig;
pub use events::EventsConfig;
pub use record_store::RecordStoreConfig;
pub use server::ServerConfig;
pub use workers::{
    CleanerConfig, ConsolidatorConfig, EventRetryConfig, WorkersConfig,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub record_store: RecordStoreConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub aal: AalConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
}

impl Config {
    pub fn from_toml_str(s: &str) -> crate::error::Result<Self> {
        toml::from_str(s).map_err(|e| crate::error::Error::Config(e.to_string()))
    }
}

/// Centralizes environment-variable lookups so a missing credential
/// disables the affected provider rather than panicking anywhere deep in
/// business logic.
pub struct EnvResolver;

impl EnvResolver {
    pub fn lookup(var_name: &str) -> Option<String> {
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    }
}
