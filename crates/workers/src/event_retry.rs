//! Event Retry Worker (C10) — drains the Dead-Letter Queue's due retries,
//! re-publishing each failed event and recording the outcome, then purges
//! old resolved failures. Grounded on
//! `original_source/python/src/events/retry_worker.py`.

use std::sync::Arc;
use std::time::Duration;

use archon_domain::config::EventRetryConfig;
use archon_domain::error::Result;
use archon_events::{DeadLetterQueue, EventBus};
use async_trait::async_trait;

use crate::supervisor::Worker;

const RESOLVED_RETENTION_DAYS: i64 = 30;

pub struct EventRetryWorker {
    dlq: Arc<DeadLetterQueue>,
    bus: Arc<EventBus>,
    config: EventRetryConfig,
}

impl EventRetryWorker {
    pub fn new(dlq: Arc<DeadLetterQueue>, bus: Arc<EventBus>, config: EventRetryConfig) -> Self {
        Self { dlq, bus, config }
    }
}

#[async_trait]
impl Worker for EventRetryWorker {
    fn name(&self) -> &str {
        "event_retry"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    async fn run(&self) -> Result<()> {
        let pending = self.dlq.get_pending_retries(self.config.batch_limit).await?;
        if pending.is_empty() {
            tracing::debug!("no events to retry");
        } else {
            tracing::info!(count = pending.len(), "processing event retries");
        }

        for failure in pending {
            match self
                .bus
                .publish(failure.event_type.clone(), failure.payload.clone(), failure.user_id.clone())
                .await
            {
                Ok(_) => {
                    self.dlq.mark_retry_attempt(&failure.failure_id, true, None).await?;
                    tracing::info!(event_id = %failure.event_id, event_type = %failure.event_type, "event retry succeeded");
                }
                Err(e) => {
                    self.dlq.mark_retry_attempt(&failure.failure_id, false, Some(e.to_string())).await?;
                    tracing::warn!(event_id = %failure.event_id, event_type = %failure.event_type, error = %e, "event retry failed");
                }
            }
        }

        let cleaned = self.dlq.cleanup_old_resolved(RESOLVED_RETENTION_DAYS).await?;
        if cleaned > 0 {
            tracing::info!(deleted = cleaned, "dlq cleanup completed");
        }

        Ok(())
    }
}
