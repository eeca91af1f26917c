//! Store Cleaner (C10) — periodic expired-working-memory deletion and
//! long-term importance decay, publishing `system.cleanup.triggered` on
//! completion. Grounded on
//! `original_source/python/src/workers/cleanup.py`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use archon_domain::config::CleanerConfig;
use archon_domain::error::Result;
use archon_domain::types::event_type;
use archon_events::EventBus;
use archon_memory::{LongTermStore, WorkingStore};
use async_trait::async_trait;

use crate::supervisor::Worker;

pub struct StoreCleaner {
    working: Arc<WorkingStore>,
    long_term: Arc<LongTermStore>,
    events: Arc<EventBus>,
    config: CleanerConfig,
}

impl StoreCleaner {
    pub fn new(working: Arc<WorkingStore>, long_term: Arc<LongTermStore>, events: Arc<EventBus>, config: CleanerConfig) -> Self {
        Self { working, long_term, events, config }
    }
}

#[async_trait]
impl Worker for StoreCleaner {
    fn name(&self) -> &str {
        "store_cleaner"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    async fn run(&self) -> Result<()> {
        let deleted_working = self.working.cleanup_expired().await?;
        let decayed_longterm = self.long_term.decay_importance().await?;

        let mut payload = HashMap::new();
        payload.insert("worker".to_string(), serde_json::json!(self.name()));
        payload.insert("deletedWorking".to_string(), serde_json::json!(deleted_working));
        payload.insert("decayedLongterm".to_string(), serde_json::json!(decayed_longterm));
        if let Err(e) = self.events.publish(event_type::CLEANUP_TRIGGERED, payload, None).await {
            tracing::warn!(error = %e, "cleanup.triggered publish failed");
        }

        tracing::info!(deleted_working, decayed_longterm, "store cleanup pass completed");
        Ok(())
    }
}
