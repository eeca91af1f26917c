use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-million-token cost, input/output split.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CostPerMillionTokens {
    pub input: f64,
    pub output: f64,
}

/// One model configuration under a provider manifest entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifestEntry {
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub cost_per_million_tokens: CostPerMillionTokens,
}

/// A declarative provider manifest entry (spec.md §4.7, §6). `class`
/// selects from a compile-time registry of constructor functions — there is
/// no dynamic class-loading in a statically compiled implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderManifestEntry {
    pub class: String,
    #[serde(default)]
    pub models: HashMap<String, ModelManifestEntry>,
    /// Env var name holding this provider's credential. Absent/empty means
    /// the provider is disabled, never a crash (spec.md §6).
    #[serde(default)]
    pub auth_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AalConfig {
    #[serde(default)]
    pub providers: Vec<ProviderManifestEntry>,
    #[serde(default = "d_default_timeout_ms")]
    pub default_timeout_ms: u64,
}

fn d_default_timeout_ms() -> u64 {
    120_000
}
