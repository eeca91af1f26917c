//! Working Store (C2) — time-bounded record store of recent memories,
//! ordered by recency.
//!
//! Grounded on `gateway/src/runtime/deliveries.rs`'s bounded-collection
//! idiom, generalized to the [`archon_store::RecordStore`] row
//! abstraction shared with C3/C4/C5.

use std::collections::HashMap;
use std::sync::Arc;

use archon_domain::config::RecordStoreConfig;
use archon_domain::error::Result;
use archon_domain::ids::{MemoryId, SessionId, UserId};
use archon_domain::types::{event_type, WorkingEntry, WorkingMemoryType};
use archon_events::EventBus;
use archon_store::{RecordFilter, RecordOrder, RecordStore};
use chrono::{Duration as ChronoDuration, Utc};

const TABLE: &str = "working_entries";

pub struct WorkingStore {
    store: Arc<dyn RecordStore>,
    events: Arc<EventBus>,
    config: RecordStoreConfig,
}

impl WorkingStore {
    pub fn new(store: Arc<dyn RecordStore>, events: Arc<EventBus>, config: RecordStoreConfig) -> Self {
        Self { store, events, config }
    }

    pub async fn create(
        &self,
        user_id: UserId,
        memory_type: WorkingMemoryType,
        content: HashMap<String, serde_json::Value>,
        metadata: Option<HashMap<String, serde_json::Value>>,
        session_id: Option<SessionId>,
        ttl_days: Option<i64>,
    ) -> Result<WorkingEntry> {
        let now = Utc::now();
        let ttl_days = ttl_days.unwrap_or(self.config.default_working_ttl_days);
        let entry = WorkingEntry {
            id: MemoryId::new(),
            user_id: user_id.clone(),
            session_id,
            memory_type,
            content,
            metadata,
            created_at: now,
            expires_at: now + ChronoDuration::days(ttl_days),
            relevance_score: 1.0,
            promoted_to: None,
        };
        self.store.put(TABLE, entry.id.as_str(), serde_json::to_value(&entry)?).await?;

        let mut payload = HashMap::new();
        payload.insert("memoryId".to_string(), serde_json::json!(entry.id.as_str()));
        payload.insert("memoryType".to_string(), serde_json::to_value(&entry.memory_type)?);
        if let Err(e) = self.events.publish(event_type::WORKING_CREATED, payload, Some(user_id)).await {
            tracing::warn!(error = %e, "working.created publish failed");
        }

        Ok(entry)
    }

    /// Most-recent entries for a user, optionally filtered by type,
    /// ordered by `createdAt` descending (spec.md §4.2 "Ordering").
    pub async fn get_recent(
        &self,
        user_id: &UserId,
        memory_type: Option<WorkingMemoryType>,
        limit: usize,
    ) -> Result<Vec<WorkingEntry>> {
        let mut filter = RecordFilter::new().eq("user_id", serde_json::json!(user_id.as_str()));
        if let Some(memory_type) = memory_type {
            filter = filter.eq("memory_type", serde_json::to_value(memory_type)?);
        }
        filter = filter.order_by("created_at", RecordOrder::Descending).limit(limit);
        let rows = self.store.query(TABLE, &filter).await?;
        Ok(rows.into_iter().filter_map(|v| serde_json::from_value(v).ok()).collect())
    }

    pub async fn get_by_session(&self, session_id: &SessionId) -> Result<Vec<WorkingEntry>> {
        let filter = RecordFilter::new()
            .eq("session_id", serde_json::json!(session_id.as_str()))
            .order_by("created_at", RecordOrder::Descending);
        let rows = self.store.query(TABLE, &filter).await?;
        Ok(rows.into_iter().filter_map(|v| serde_json::from_value(v).ok()).collect())
    }

    /// Delete rows where `expiresAt <= now`, unless `relevanceScore` falls
    /// below the configured threshold — a rescue window for entries whose
    /// relevance was explicitly lowered rather than left at the default.
    /// At the default threshold (0.0) every expired entry qualifies, so
    /// expiry alone drives deletion.
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let rows = self.store.query(TABLE, &RecordFilter::new()).await?;
        let now = Utc::now();
        let mut removed = 0usize;
        for row in rows {
            if let Ok(entry) = serde_json::from_value::<WorkingEntry>(row) {
                if entry.is_expired(now) && entry.relevance_score >= self.config.cleanup_relevance_threshold {
                    self.store.delete(TABLE, entry.id.as_str()).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Unpromoted entries at or above `relevance_threshold`, across all
    /// users — the Memory Consolidator's scan (spec.md §4.8 supplement).
    pub async fn scan_above_relevance(&self, relevance_threshold: f64) -> Result<Vec<WorkingEntry>> {
        let filter = RecordFilter::new().gte("relevance_score", relevance_threshold);
        let rows = self.store.query(TABLE, &filter).await?;
        Ok(rows
            .into_iter()
            .filter_map(|v| serde_json::from_value::<WorkingEntry>(v).ok())
            .filter(|entry| entry.promoted_to.is_none())
            .collect())
    }

    /// Mark a working entry as promoted to a long-term entry, so the
    /// consolidator never double-promotes it (spec.md §4.8 idempotency
    /// marker).
    pub async fn mark_promoted(&self, id: &MemoryId, long_term_id: &MemoryId) -> Result<()> {
        let Some(row) = self.store.get(TABLE, id.as_str()).await? else {
            return Ok(());
        };
        let mut entry: WorkingEntry = serde_json::from_value(row)?;
        entry.promoted_to = Some(long_term_id.clone());
        self.store.put(TABLE, id.as_str(), serde_json::to_value(&entry)?).await
    }
}
