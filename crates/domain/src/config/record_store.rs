use serde::{Deserialize, Serialize};

/// Working/Long-term store (C2/C3) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordStoreConfig {
    /// Default TTL (in days) applied to working entries when the caller
    /// does not specify one.
    #[serde(default = "d_default_working_ttl_days")]
    pub default_working_ttl_days: i64,
    /// Relevance-score threshold below which an expired working entry is
    /// eligible for `cleanupExpired` deletion. spec.md §9 leaves this
    /// unspecified in the source; this spec pins the default to 0.0 so
    /// only expiry drives deletion.
    #[serde(default = "d_cleanup_relevance_threshold")]
    pub cleanup_relevance_threshold: f64,
    /// Long-term importance decay window, in days.
    #[serde(default = "d_decay_window_days")]
    pub decay_window_days: i64,
    /// Long-term importance decay factor (multiplicative, applied once per
    /// `decayImportance` pass to entries outside the window).
    #[serde(default = "d_decay_factor")]
    pub decay_factor: f64,
    /// Floor below which importance never decays further.
    #[serde(default = "d_decay_floor")]
    pub decay_floor: f64,
    /// Threshold above which a long-term entry counts as "important" for
    /// `getImportant` and for context-assembly inclusion.
    #[serde(default = "d_important_threshold")]
    pub important_threshold: f64,
}

fn d_default_working_ttl_days() -> i64 {
    7
}
fn d_cleanup_relevance_threshold() -> f64 {
    0.0
}
fn d_decay_window_days() -> i64 {
    90
}
fn d_decay_factor() -> f64 {
    0.9
}
fn d_decay_floor() -> f64 {
    0.1
}
fn d_important_threshold() -> f64 {
    0.7
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self {
            default_working_ttl_days: d_default_working_ttl_days(),
            cleanup_relevance_threshold: d_cleanup_relevance_threshold(),
            decay_window_days: d_decay_window_days(),
            decay_factor: d_decay_factor(),
            decay_floor: d_decay_floor(),
            important_threshold: d_important_threshold(),
        }
    }
}
