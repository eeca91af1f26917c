//! Session Store (C1) — ephemeral per-session state in a TTL-refreshed
//! keyed cache, read-modify-write serialized per session.
//!
//! Grounded on `session_lock.rs` (`parking_lot::Mutex<HashMap<
//! String, Arc<Semaphore>>>`, `acquire_owned` single-writer dispatch) and
//! `sessions/src/store.rs`'s JSON-persisted session pattern, generalized
//! from on-disk files to the [`archon_store::KeyedCache`] abstraction.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use archon_domain::config::CacheConfig;
use archon_domain::error::Result;
use archon_domain::ids::{SessionId, UserId};
use archon_domain::types::{event_type, Message, Session};
use archon_events::EventBus;
use archon_store::KeyedCache;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Semaphore, OwnedSemaphorePermit};

/// A patch applied to a session's scratch [`SessionContext`]: `None` fields
/// leave the existing value untouched, set-valued fields are unioned in.
#[derive(Debug, Clone, Default)]
pub struct ContextPatch {
    pub active_project_id: Option<Option<String>>,
    pub add_active_task_ids: HashSet<String>,
    pub add_mentioned_files: HashSet<String>,
    pub free_form: HashMap<String, serde_json::Value>,
}

/// Per-session single-writer lock map, keyed by session id. Every
/// read-modify-write operation acquires the session's permit before
/// touching the cache, so concurrent `addMessage`/`updateContext` calls on
/// the same session never race.
struct SessionLocks {
    locks: SyncMutex<HashMap<String, Arc<Semaphore>>>,
}

impl SessionLocks {
    fn new() -> Self {
        Self {
            locks: SyncMutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, session_id: &str) -> OwnedSemaphorePermit {
        let semaphore = self
            .locks
            .lock()
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone();
        semaphore
            .acquire_owned()
            .await
            .expect("session semaphore never closed")
    }
}

pub struct SessionStore {
    cache: Arc<dyn KeyedCache>,
    events: Arc<EventBus>,
    ttl: Duration,
    locks: SessionLocks,
}

fn cache_key(session_id: &SessionId) -> String {
    format!("session:{}", session_id.as_str())
}

impl SessionStore {
    pub fn new(cache: Arc<dyn KeyedCache>, events: Arc<EventBus>, config: &CacheConfig) -> Self {
        Self {
            cache,
            events,
            ttl: Duration::from_secs(config.session_ttl_secs),
            locks: SessionLocks::new(),
        }
    }

    async fn load(&self, session_id: &SessionId) -> Result<Option<Session>> {
        let Some(bytes) = self.cache.get(&cache_key(session_id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn store(&self, session: &Session) -> Result<()> {
        let bytes = serde_json::to_vec(session)?;
        self.cache.set(&cache_key(&session.session_id), bytes, self.ttl).await
    }

    /// Publish a `memory.session.*` event best-effort: a publish failure
    /// is logged but never surfaces to the caller (spec.md §4.1 "Events").
    async fn publish_best_effort(
        &self,
        event_type: &str,
        payload: HashMap<String, serde_json::Value>,
        user_id: UserId,
    ) {
        if let Err(e) = self.events.publish(event_type, payload, Some(user_id)).await {
            tracing::warn!(error = %e, event_type, "session event publish failed");
        }
    }

    pub async fn create_session(&self, user_id: UserId, session_id: Option<SessionId>) -> Result<Session> {
        let session_id = session_id.unwrap_or_else(SessionId::new);
        let _permit = self.locks.acquire(session_id.as_str()).await;
        let session = Session::new(user_id.clone(), session_id);
        self.store(&session).await?;

        let mut payload = HashMap::new();
        payload.insert("sessionId".to_string(), serde_json::json!(session.session_id.as_str()));
        self.publish_best_effort(event_type::SESSION_CREATED, payload, user_id).await;

        Ok(session)
    }

    /// Returns `None` for expired or unknown sessions. Reading refreshes
    /// the TTL (delegated to the cache's own read-refresh behavior).
    pub async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>> {
        let _permit = self.locks.acquire(session_id.as_str()).await;
        let Some(mut session) = self.load(session_id).await? else {
            return Ok(None);
        };
        session.last_accessed_at = chrono::Utc::now();
        self.store(&session).await?;
        Ok(Some(session))
    }

    pub async fn add_message(&self, session_id: &SessionId, message: Message) -> Result<Option<Session>> {
        let _permit = self.locks.acquire(session_id.as_str()).await;
        let Some(mut session) = self.load(session_id).await? else {
            return Ok(None);
        };
        session.messages.push(message);
        session.last_accessed_at = chrono::Utc::now();
        self.store(&session).await?;

        let mut payload = HashMap::new();
        payload.insert("sessionId".to_string(), serde_json::json!(session.session_id.as_str()));
        payload.insert("messageCount".to_string(), serde_json::json!(session.messages.len()));
        self.publish_best_effort(event_type::SESSION_MESSAGE_ADDED, payload, session.user_id.clone()).await;

        Ok(Some(session))
    }

    pub async fn update_context(&self, session_id: &SessionId, patch: ContextPatch) -> Result<Option<Session>> {
        let _permit = self.locks.acquire(session_id.as_str()).await;
        let Some(mut session) = self.load(session_id).await? else {
            return Ok(None);
        };
        if let Some(project_id) = patch.active_project_id {
            session.context.active_project_id = project_id;
        }
        session.context.active_task_ids.extend(patch.add_active_task_ids);
        session.context.mentioned_files.extend(patch.add_mentioned_files);
        session.context.free_form.extend(patch.free_form);
        session.last_accessed_at = chrono::Utc::now();
        self.store(&session).await?;

        let mut payload = HashMap::new();
        payload.insert("sessionId".to_string(), serde_json::json!(session.session_id.as_str()));
        self.publish_best_effort(event_type::SESSION_CONTEXT_UPDATED, payload, session.user_id.clone()).await;

        Ok(Some(session))
    }

    pub async fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        let _permit = self.locks.acquire(session_id.as_str()).await;
        let user_id = self.load(session_id).await?.map(|s| s.user_id);
        self.cache.delete(&cache_key(session_id)).await?;

        if let Some(user_id) = user_id {
            let mut payload = HashMap::new();
            payload.insert("sessionId".to_string(), serde_json::json!(session_id.as_str()));
            self.publish_best_effort(event_type::SESSION_DELETED, payload, user_id).await;
        }
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        self.cache.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archon_domain::types::Role;
    use archon_store::InMemoryCache;
    use archon_store::InMemoryRecordStore;

    fn store() -> SessionStore {
        let cache: Arc<dyn KeyedCache> = Arc::new(InMemoryCache::default());
        let record_store: Arc<dyn archon_store::RecordStore> = Arc::new(InMemoryRecordStore::default());
        let dlq = Arc::new(archon_events::DeadLetterQueue::new(record_store.clone(), Default::default()));
        let events = Arc::new(EventBus::new(record_store, "archon_events", dlq));
        SessionStore::new(cache, events, &CacheConfig::default())
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = store();
        let user = UserId::new();
        let created = store.create_session(user.clone(), None).await.unwrap();
        let fetched = store.get_session(&created.session_id).await.unwrap().unwrap();
        assert_eq!(fetched.user_id, user);
        assert!(fetched.messages.is_empty());
    }

    #[tokio::test]
    async fn get_unknown_session_is_none() {
        let store = store();
        assert!(store.get_session(&SessionId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn add_message_appends_in_order() {
        let store = store();
        let created = store.create_session(UserId::new(), None).await.unwrap();
        store
            .add_message(&created.session_id, Message::new(Role::User, "hi"))
            .await
            .unwrap();
        let session = store
            .add_message(&created.session_id, Message::new(Role::Assistant, "hello"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].content, "hi");
        assert_eq!(session.messages[1].content, "hello");
    }

    #[tokio::test]
    async fn update_context_merges_sets() {
        let store = store();
        let created = store.create_session(UserId::new(), None).await.unwrap();
        let mut patch = ContextPatch::default();
        patch.add_active_task_ids.insert("task-1".into());
        store.update_context(&created.session_id, patch).await.unwrap();

        let mut patch2 = ContextPatch::default();
        patch2.add_active_task_ids.insert("task-2".into());
        let session = store.update_context(&created.session_id, patch2).await.unwrap().unwrap();

        assert!(session.context.active_task_ids.contains("task-1"));
        assert!(session.context.active_task_ids.contains("task-2"));
    }

    #[tokio::test]
    async fn delete_removes_session() {
        let store = store();
        let created = store.create_session(UserId::new(), None).await.unwrap();
        store.delete_session(&created.session_id).await.unwrap();
        assert!(store.get_session(&created.session_id).await.unwrap().is_none());
    }
}
