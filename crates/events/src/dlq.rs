//! Dead-Letter Queue (C5) — records event-publish and handler failures,
//! schedules retries with exponential backoff, and promotes to terminal
//! `failed` after a cap.
//!
//! Grounded on the python original's `dead_letter_queue.py`, including its
//! second audit table (`event_replay_log`) appended on every retry attempt.

use archon_domain::config::EventsConfig;
use archon_domain::error::Result;
use archon_domain::ids::{EventId, FailureId, UserId};
use archon_domain::trace::TraceEvent;
use archon_domain::types::{FailureStatus, EventFailure, ReplayLogEntry};
use archon_store::{RecordFilter, RecordOrder, RecordStore};
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

const TABLE: &str = "event_failures";
const REPLAY_LOG_TABLE: &str = "event_replay_log";

pub struct DeadLetterQueue {
    store: Arc<dyn RecordStore>,
    config: EventsConfig,
}

impl DeadLetterQueue {
    pub fn new(store: Arc<dyn RecordStore>, config: EventsConfig) -> Self {
        Self { store, config }
    }

    /// Record a publish or handler failure. Failures in this path are
    /// logged but never cascade: losing a DLQ write is preferable to
    /// losing the originating operation (spec.md §4.4 "Isolation").
    pub async fn record_failure(
        &self,
        event_id: EventId,
        event_type: String,
        payload: HashMap<String, serde_json::Value>,
        error_message: String,
        user_id: Option<UserId>,
    ) -> Option<EventFailure> {
        let now = Utc::now();
        let first_delay = self.config.retry_delays_mins.first().copied().unwrap_or(5);
        let failure = EventFailure {
            failure_id: FailureId::new(),
            event_id,
            event_type,
            payload,
            user_id,
            error_message,
            stack_trace: None,
            retry_count: 0,
            next_retry_at: Some(now + ChronoDuration::minutes(first_delay)),
            status: FailureStatus::Pending,
            created_at: now,
            last_retry_at: None,
            resolved_at: None,
        };

        match serde_json::to_value(&failure) {
            Ok(row) => {
                if let Err(e) = self.store.put(TABLE, failure.failure_id.as_str(), row).await {
                    tracing::warn!(error = %e, "failed to persist DLQ record; dropping");
                    return None;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize DLQ record; dropping");
                return None;
            }
        }

        TraceEvent::DlqRecorded {
            failure_id: failure.failure_id.to_string(),
            event_type: failure.event_type.clone(),
            retry_count: failure.retry_count,
        }
        .emit();

        Some(failure)
    }

    /// Pending failures whose `nextRetryAt` has arrived, ordered ascending.
    pub async fn get_pending_retries(&self, limit: usize) -> Result<Vec<EventFailure>> {
        let filter = RecordFilter::new()
            .eq("status", serde_json::json!("pending"))
            .order_by("next_retry_at", RecordOrder::Ascending);
        let rows = self.store.query(TABLE, &filter).await?;
        let now = Utc::now();
        let mut failures: Vec<EventFailure> = rows
            .into_iter()
            .filter_map(|v| serde_json::from_value::<EventFailure>(v).ok())
            .filter(|f| f.next_retry_at.map(|t| t <= now).unwrap_or(false))
            .collect();
        failures.truncate(limit);
        Ok(failures)
    }

    /// Record the outcome of a retry attempt, applying the backoff
    /// schedule (5m, 30m, 2h) and promoting to terminal `failed` once
    /// `retryCount` reaches the configured cap.
    pub async fn mark_retry_attempt(
        &self,
        failure_id: &FailureId,
        success: bool,
        error: Option<String>,
    ) -> Result<Option<EventFailure>> {
        let Some(row) = self.store.get(TABLE, failure_id.as_str()).await? else {
            return Ok(None);
        };
        let mut failure: EventFailure = serde_json::from_value(row)?;
        let now = Utc::now();
        failure.last_retry_at = Some(now);

        if success {
            failure.status = FailureStatus::Resolved;
            failure.resolved_at = Some(now);
            failure.next_retry_at = None;
        } else {
            failure.error_message = error.clone().unwrap_or(failure.error_message);
            failure.retry_count += 1;
            if failure.retry_count >= self.config.max_retries {
                failure.status = FailureStatus::Failed;
                failure.next_retry_at = None;
            } else {
                let delay = self
                    .config
                    .retry_delays_mins
                    .get(failure.retry_count as usize)
                    .copied()
                    .unwrap_or_else(|| self.config.retry_delays_mins.last().copied().unwrap_or(5));
                failure.next_retry_at = Some(now + ChronoDuration::minutes(delay));
            }
        }

        self.store
            .put(TABLE, failure_id.as_str(), serde_json::to_value(&failure)?)
            .await?;

        let replay_entry = ReplayLogEntry {
            failure_id: failure_id.clone(),
            attempted_at: now,
            success,
            error,
            retry_count_after: failure.retry_count,
        };
        if let Ok(row) = serde_json::to_value(&replay_entry) {
            let _ = self
                .store
                .put(REPLAY_LOG_TABLE, &uuid::Uuid::new_v4().to_string(), row)
                .await;
        }

        TraceEvent::DlqRetryAttempt {
            failure_id: failure_id.to_string(),
            success,
            retry_count: failure.retry_count,
        }
        .emit();

        Ok(Some(failure))
    }

    pub async fn get_failed_events(
        &self,
        user_id: Option<&UserId>,
        limit: usize,
    ) -> Result<Vec<EventFailure>> {
        let mut filter = RecordFilter::new().eq("status", serde_json::json!("failed"));
        if let Some(user_id) = user_id {
            filter = filter.eq("user_id", serde_json::json!(user_id.as_str()));
        }
        filter = filter.order_by("created_at", RecordOrder::Descending).limit(limit);
        let rows = self.store.query(TABLE, &filter).await?;
        Ok(rows
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect())
    }

    /// Purge only `resolved` entries older than `days`. `failed` entries are
    /// never auto-purged (spec.md §4.4 "Terminal states" — manual only).
    pub async fn cleanup_old_resolved(&self, days: i64) -> Result<usize> {
        let filter = RecordFilter::new().eq("status", serde_json::json!("resolved"));
        let rows = self.store.query(TABLE, &filter).await?;
        let cutoff = Utc::now() - ChronoDuration::days(days);
        let mut removed = 0usize;
        for row in rows {
            if let Ok(failure) = serde_json::from_value::<EventFailure>(row) {
                if failure.resolved_at.map(|t| t < cutoff).unwrap_or(false) {
                    self.store.delete(TABLE, failure.failure_id.as_str()).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
