//! Long-Term Store (C3) — importance-ranked, access-counted record store.

use std::collections::HashMap;
use std::sync::Arc;

use archon_domain::config::RecordStoreConfig;
use archon_domain::error::Result;
use archon_domain::ids::{MemoryId, UserId};
use archon_domain::types::{event_type, LongTermEntry, LongTermMemoryType};
use archon_events::EventBus;
use archon_store::{RecordFilter, RecordOrder, RecordStore};
use chrono::{Duration as ChronoDuration, Utc};

const TABLE: &str = "long_term_entries";

pub struct LongTermStore {
    store: Arc<dyn RecordStore>,
    events: Arc<EventBus>,
    config: RecordStoreConfig,
}

impl LongTermStore {
    pub fn new(store: Arc<dyn RecordStore>, events: Arc<EventBus>, config: RecordStoreConfig) -> Self {
        Self { store, events, config }
    }

    pub async fn create(
        &self,
        user_id: UserId,
        memory_type: LongTermMemoryType,
        content: HashMap<String, serde_json::Value>,
        metadata: Option<HashMap<String, serde_json::Value>>,
        importance_score: f64,
    ) -> Result<LongTermEntry> {
        let entry = LongTermEntry {
            id: MemoryId::new(),
            user_id: user_id.clone(),
            memory_type,
            content,
            metadata,
            created_at: Utc::now(),
            last_accessed_at: None,
            access_count: 0,
            importance_score,
            last_decayed_on: None,
        };
        self.store.put(TABLE, entry.id.as_str(), serde_json::to_value(&entry)?).await?;

        let mut payload = HashMap::new();
        payload.insert("memoryId".to_string(), serde_json::json!(entry.id.as_str()));
        payload.insert("memoryType".to_string(), serde_json::to_value(&entry.memory_type)?);
        if let Err(e) = self.events.publish(event_type::LONGTERM_CREATED, payload, Some(user_id)).await {
            tracing::warn!(error = %e, "longterm.created publish failed");
        }

        Ok(entry)
    }

    pub async fn get_by_type(
        &self,
        user_id: &UserId,
        memory_type: LongTermMemoryType,
        limit: usize,
    ) -> Result<Vec<LongTermEntry>> {
        let filter = RecordFilter::new()
            .eq("user_id", serde_json::json!(user_id.as_str()))
            .eq("memory_type", serde_json::to_value(memory_type)?)
            .order_by("importance_score", RecordOrder::Descending)
            .tie_break_by("created_at")
            .limit(limit);
        let rows = self.store.query(TABLE, &filter).await?;
        Ok(rows.into_iter().filter_map(|v| serde_json::from_value(v).ok()).collect())
    }

    pub async fn get_important(&self, user_id: &UserId, min_importance: f64, limit: usize) -> Result<Vec<LongTermEntry>> {
        let filter = RecordFilter::new()
            .eq("user_id", serde_json::json!(user_id.as_str()))
            .gte("importance_score", min_importance)
            .order_by("importance_score", RecordOrder::Descending)
            .tie_break_by("created_at")
            .limit(limit);
        let rows = self.store.query(TABLE, &filter).await?;
        Ok(rows.into_iter().filter_map(|v| serde_json::from_value(v).ok()).collect())
    }

    /// `lastAccessedAt = now`, `accessCount += 1`. Monotonically
    /// non-decreasing per spec.md §3 "LongTermEntry" invariant.
    pub async fn update_access(&self, id: &MemoryId) -> Result<Option<LongTermEntry>> {
        let Some(row) = self.store.get(TABLE, id.as_str()).await? else {
            return Ok(None);
        };
        let mut entry: LongTermEntry = serde_json::from_value(row)?;
        entry.last_accessed_at = Some(Utc::now());
        entry.access_count += 1;
        self.store.put(TABLE, id.as_str(), serde_json::to_value(&entry)?).await?;
        Ok(Some(entry))
    }

    /// Whether a long-term entry with this content fingerprint already
    /// exists for this user — the consolidator's idempotent-promotion
    /// check (spec.md §9 "Consolidation correctness").
    pub async fn exists_with_fingerprint(&self, user_id: &UserId, fingerprint: &str) -> Result<bool> {
        let filter = RecordFilter::new().eq("user_id", serde_json::json!(user_id.as_str()));
        let rows = self.store.query(TABLE, &filter).await?;
        Ok(rows.into_iter().filter_map(|v| serde_json::from_value::<LongTermEntry>(v).ok())
            .any(|entry| entry.content_fingerprint() == fingerprint))
    }

    /// Reduce importance of entries unaccessed within the decay window by
    /// the configured factor, floored at `decayFloor`. Gated on
    /// `lastDecayedOn`: an entry already decayed today is skipped, so a
    /// second same-day sweep is a no-op rather than compounding the decay
    /// factor (spec.md §4.2 "idempotent across runs within the same day").
    pub async fn decay_importance(&self) -> Result<usize> {
        let rows = self.store.query(TABLE, &RecordFilter::new()).await?;
        let cutoff = Utc::now() - ChronoDuration::days(self.config.decay_window_days);
        let today = Utc::now().date_naive();
        let mut decayed = 0usize;
        for row in rows {
            if let Ok(mut entry) = serde_json::from_value::<LongTermEntry>(row) {
                if entry.last_decayed_on == Some(today) {
                    continue;
                }
                let reference = entry.last_accessed_at.unwrap_or(entry.created_at);
                if reference < cutoff && entry.importance_score > self.config.decay_floor {
                    let next = (entry.importance_score * self.config.decay_factor).max(self.config.decay_floor);
                    if next != entry.importance_score {
                        entry.importance_score = next;
                        entry.last_decayed_on = Some(today);
                        self.store.put(TABLE, entry.id.as_str(), serde_json::to_value(&entry)?).await?;
                        decayed += 1;
                    }
                }
            }
        }
        Ok(decayed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archon_store::InMemoryRecordStore;

    fn longterm_store() -> LongTermStore {
        let record_store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::default());
        let dlq = Arc::new(archon_events::DeadLetterQueue::new(record_store.clone(), Default::default()));
        let events = Arc::new(EventBus::new(record_store.clone(), "archon_events", dlq));
        LongTermStore::new(record_store, events, RecordStoreConfig::default())
    }

    #[tokio::test]
    async fn update_access_increments_and_sets_timestamp() {
        let store = longterm_store();
        let entry = store
            .create(UserId::new(), LongTermMemoryType::Fact, HashMap::new(), None, 0.5)
            .await
            .unwrap();
        assert_eq!(entry.access_count, 0);
        let updated = store.update_access(&entry.id).await.unwrap().unwrap();
        assert_eq!(updated.access_count, 1);
        assert!(updated.last_accessed_at.is_some());
        let updated_again = store.update_access(&entry.id).await.unwrap().unwrap();
        assert_eq!(updated_again.access_count, 2);
    }

    #[tokio::test]
    async fn get_important_filters_by_minimum_and_orders_desc() {
        let store = longterm_store();
        let user = UserId::new();
        store.create(user.clone(), LongTermMemoryType::Fact, HashMap::new(), None, 0.9).await.unwrap();
        store.create(user.clone(), LongTermMemoryType::Fact, HashMap::new(), None, 0.5).await.unwrap();
        store.create(user.clone(), LongTermMemoryType::Fact, HashMap::new(), None, 0.75).await.unwrap();

        let important = store.get_important(&user, 0.7, 10).await.unwrap();
        assert_eq!(important.len(), 2);
        assert!(important[0].importance_score >= important[1].importance_score);
    }

    #[tokio::test]
    async fn exists_with_fingerprint_detects_duplicate_content() {
        let store = longterm_store();
        let user = UserId::new();
        let mut content = HashMap::new();
        content.insert("summary".to_string(), serde_json::json!("likes rust"));
        let entry = store
            .create(user.clone(), LongTermMemoryType::Fact, content, None, 0.8)
            .await
            .unwrap();

        let fingerprint = entry.content_fingerprint();
        assert!(store.exists_with_fingerprint(&user, &fingerprint).await.unwrap());
        assert!(!store.exists_with_fingerprint(&user, "nonexistent-fingerprint").await.unwrap());
    }

    #[tokio::test]
    async fn decay_importance_reduces_unaccessed_entries_to_floor() {
        let store = longterm_store();
        let user = UserId::new();
        let entry = store.create(user, LongTermMemoryType::Fact, HashMap::new(), None, 0.2).await.unwrap();

        // Force the entry outside the decay window by rewriting createdAt.
        let mut raw: LongTermEntry = serde_json::from_value(
            store.store.get(TABLE, entry.id.as_str()).await.unwrap().unwrap(),
        )
        .unwrap();
        raw.created_at = Utc::now() - ChronoDuration::days(365);
        store.store.put(TABLE, entry.id.as_str(), serde_json::to_value(&raw).unwrap()).await.unwrap();

        let decayed = store.decay_importance().await.unwrap();
        assert_eq!(decayed, 1);
        let after = store.store.get(TABLE, entry.id.as_str()).await.unwrap().unwrap();
        let after: LongTermEntry = serde_json::from_value(after).unwrap();
        assert!((after.importance_score - 0.18).abs() < 1e-9);
    }

    #[tokio::test]
    async fn decay_stops_at_floor() {
        let store = longterm_store();
        let user = UserId::new();
        let entry = store.create(user, LongTermMemoryType::Fact, HashMap::new(), None, 0.1).await.unwrap();

        let mut raw: LongTermEntry = serde_json::from_value(
            store.store.get(TABLE, entry.id.as_str()).await.unwrap().unwrap(),
        )
        .unwrap();
        raw.created_at = Utc::now() - ChronoDuration::days(365);
        store.store.put(TABLE, entry.id.as_str(), serde_json::to_value(&raw).unwrap()).await.unwrap();

        let decayed = store.decay_importance().await.unwrap();
        assert_eq!(decayed, 0);
    }

    #[tokio::test]
    async fn decay_importance_is_idempotent_within_the_same_day() {
        let store = longterm_store();
        let user = UserId::new();
        let entry = store.create(user, LongTermMemoryType::Fact, HashMap::new(), None, 0.5).await.unwrap();

        let mut raw: LongTermEntry = serde_json::from_value(
            store.store.get(TABLE, entry.id.as_str()).await.unwrap().unwrap(),
        )
        .unwrap();
        raw.created_at = Utc::now() - ChronoDuration::days(365);
        store.store.put(TABLE, entry.id.as_str(), serde_json::to_value(&raw).unwrap()).await.unwrap();

        let first_pass = store.decay_importance().await.unwrap();
        assert_eq!(first_pass, 1);
        let after_first = store.store.get(TABLE, entry.id.as_str()).await.unwrap().unwrap();
        let after_first: LongTermEntry = serde_json::from_value(after_first).unwrap();
        assert!((after_first.importance_score - 0.45).abs() < 1e-9);

        // A second sweep the same day must not compound the factor again.
        let second_pass = store.decay_importance().await.unwrap();
        assert_eq!(second_pass, 0);
        let after_second = store.store.get(TABLE, entry.id.as_str()).await.unwrap().unwrap();
        let after_second: LongTermEntry = serde_json::from_value(after_second).unwrap();
        assert!((after_second.importance_score - 0.45).abs() < 1e-9);
    }
}
