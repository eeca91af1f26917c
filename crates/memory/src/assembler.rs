//! Context Assembler (C7) — token-budgeted, priority-ordered assembly of
//! session, working, and long-term memory into a single context, with
//! breaker-guarded layer fetches and last-known-good cached fallback.
//!
//! Grounded on spec.md §4.6 and on the breaker-guarded call pattern in
//! `providers/src/router.rs` (`try_chat` timeout wrapper plus breaker
//! admission before every provider call), generalized here to a
//! transient-error retry loop ahead of each breaker admission check.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use archon_breaker::CircuitBreakerRegistry;
use archon_domain::error::{Error, Result};
use archon_domain::ids::{SessionId, UserId};
use archon_domain::trace::TraceEvent;
use archon_domain::types::{AssembledContext, AssemblyStatus};
use parking_lot::RwLock;

use crate::longterm::LongTermStore;
use crate::session::SessionStore;
use crate::working::WorkingStore;

const WORKING_RESERVE_TOKENS: u32 = 1000;
const WORKING_MAX_CANDIDATES: usize = 10;
const LONGTERM_IMPORTANCE_THRESHOLD: f64 = 0.7;
const LONGTERM_MAX_CANDIDATES: usize = 5;
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_MAX: Duration = Duration::from_secs(10);

const BREAKER_SESSION: &str = "memory.session";
const BREAKER_WORKING: &str = "memory.working";
const BREAKER_LONGTERM: &str = "memory.longterm";

/// Retry a fallible layer fetch up to [`RETRY_ATTEMPTS`] times on
/// transient-class errors, with exponential backoff capped at
/// [`RETRY_MAX`]. Non-transient errors fail immediately.
async fn with_retry<F, Fut, T>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut delay = RETRY_BASE;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < RETRY_ATTEMPTS => {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(RETRY_MAX);
            }
            Err(e) => return Err(e),
        }
    }
}

type CacheKey = (String, Option<String>);

pub struct ContextAssembler {
    sessions: Arc<SessionStore>,
    working: Arc<WorkingStore>,
    long_term: Arc<LongTermStore>,
    breakers: Arc<CircuitBreakerRegistry>,
    cache: RwLock<HashMap<CacheKey, AssembledContext>>,
}

impl ContextAssembler {
    pub fn new(
        sessions: Arc<SessionStore>,
        working: Arc<WorkingStore>,
        long_term: Arc<LongTermStore>,
        breakers: Arc<CircuitBreakerRegistry>,
    ) -> Self {
        Self {
            sessions,
            working,
            long_term,
            breakers,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cache_key(user_id: &UserId, session_id: Option<&SessionId>) -> CacheKey {
        (user_id.as_str().to_string(), session_id.map(|s| s.as_str().to_string()))
    }

    pub async fn assemble_context(
        &self,
        user_id: &UserId,
        session_id: Option<&SessionId>,
        max_tokens: u32,
    ) -> AssembledContext {
        match self.try_assemble(user_id, session_id, max_tokens).await {
            Ok(context) => {
                self.cache
                    .write()
                    .insert(Self::cache_key(user_id, session_id), context.clone());
                context
            }
            Err(e) => {
                tracing::warn!(error = %e, "context assembly failed entirely");
                self.cached_or_empty(user_id, session_id, Some(e.to_string()))
            }
        }
    }

    fn cached_or_empty(&self, user_id: &UserId, session_id: Option<&SessionId>, error: Option<String>) -> AssembledContext {
        if let Some(cached) = self.cache.read().get(&Self::cache_key(user_id, session_id)).cloned() {
            return AssembledContext {
                status: AssemblyStatus::Cached,
                ..cached
            };
        }
        let mut empty = AssembledContext::empty(if error.is_some() {
            AssemblyStatus::Error
        } else {
            AssemblyStatus::NoCache
        });
        empty.error = error;
        empty
    }

    /// Assemble with all three layers attempted; degrades rather than
    /// erroring unless every layer fails (caller falls back to cache).
    async fn try_assemble(
        &self,
        user_id: &UserId,
        session_id: Option<&SessionId>,
        max_tokens: u32,
    ) -> Result<AssembledContext> {
        let mut source_counts = HashMap::new();
        let mut degraded = false;
        let mut layers_failed = 0u8;
        let mut layers_attempted = 0u8;

        // ── Layer 1: session (highest priority, never truncated) ──
        let mut remaining = max_tokens;
        let session = if let Some(session_id) = session_id {
            layers_attempted += 1;
            match self.fetch_session(session_id).await {
                Ok(Some(session)) => {
                    let cost = session.estimated_tokens();
                    remaining = max_tokens.saturating_sub(cost);
                    source_counts.insert("session".to_string(), 1);
                    Some(session)
                }
                Ok(None) => None,
                Err(e) => {
                    layers_failed += 1;
                    degraded = true;
                    TraceEvent::ContextLayerSkipped {
                        layer: "session".to_string(),
                        reason: e.to_string(),
                    }
                    .emit();
                    None
                }
            }
        } else {
            None
        };

        // ── Layer 2: working memory ──
        let mut recent_memories = Vec::new();
        if remaining >= WORKING_RESERVE_TOKENS {
            layers_attempted += 1;
            match self.fetch_working(user_id).await {
                Ok(candidates) => {
                    for entry in candidates {
                        if remaining < WORKING_RESERVE_TOKENS {
                            break;
                        }
                        let cost = entry.estimated_tokens();
                        if remaining.saturating_sub(cost) < WORKING_RESERVE_TOKENS {
                            break;
                        }
                        remaining -= cost;
                        recent_memories.push(entry);
                    }
                    source_counts.insert("working".to_string(), recent_memories.len());
                }
                Err(e) => {
                    layers_failed += 1;
                    degraded = true;
                    TraceEvent::ContextLayerSkipped {
                        layer: "working".to_string(),
                        reason: e.to_string(),
                    }
                    .emit();
                }
            }
        }

        // ── Layer 3: long-term memory ──
        let mut facts = Vec::new();
        if remaining >= 1 {
            layers_attempted += 1;
            match self.fetch_long_term(user_id).await {
                Ok(candidates) => {
                    for entry in candidates {
                        if remaining < 1 {
                            break;
                        }
                        let cost = entry.estimated_tokens();
                        if cost > remaining {
                            continue;
                        }
                        remaining -= cost;
                        let long_term = self.long_term.clone();
                        let id = entry.id.clone();
                        tokio::spawn(async move {
                            if let Err(e) = long_term.update_access(&id).await {
                                tracing::warn!(error = %e, "facility access-update failed; inclusion unaffected");
                            }
                        });
                        facts.push(entry);
                    }
                    source_counts.insert("long_term".to_string(), facts.len());
                }
                Err(e) => {
                    layers_failed += 1;
                    degraded = true;
                    TraceEvent::ContextLayerSkipped {
                        layer: "long_term".to_string(),
                        reason: e.to_string(),
                    }
                    .emit();
                }
            }
        }

        if layers_attempted > 0 && layers_failed == layers_attempted {
            return Err(Error::ServiceUnavailable {
                services: vec!["memory".to_string()],
                message: "all memory layers failed".to_string(),
                correlation_id: None,
            });
        }

        let total_tokens = max_tokens.saturating_sub(remaining);
        let status = if degraded { AssemblyStatus::Degraded } else { AssemblyStatus::Healthy };

        TraceEvent::ContextAssembled {
            user_id: user_id.to_string(),
            session_id: session_id.map(|s| s.to_string()),
            total_tokens,
            status: format!("{status:?}"),
            source_counts: source_counts.clone(),
        }
        .emit();

        Ok(AssembledContext {
            session,
            recent_memories,
            facts,
            total_tokens,
            source_counts,
            status,
            error: None,
        })
    }

    async fn fetch_session(&self, session_id: &SessionId) -> Result<Option<archon_domain::types::Session>> {
        let breaker = self.breakers.get_or_create(BREAKER_SESSION);
        if !breaker.is_request_allowed() {
            return Err(Error::ServiceUnavailable {
                services: vec![BREAKER_SESSION.to_string()],
                message: "breaker open".to_string(),
                correlation_id: None,
            });
        }
        match with_retry(|| self.sessions.get_session(session_id)).await {
            Ok(session) => {
                breaker.record_success();
                Ok(session)
            }
            Err(e) => {
                breaker.record_failure();
                Err(e)
            }
        }
    }

    async fn fetch_working(&self, user_id: &UserId) -> Result<Vec<archon_domain::types::WorkingEntry>> {
        let breaker = self.breakers.get_or_create(BREAKER_WORKING);
        if !breaker.is_request_allowed() {
            return Err(Error::ServiceUnavailable {
                services: vec![BREAKER_WORKING.to_string()],
                message: "breaker open".to_string(),
                correlation_id: None,
            });
        }
        match with_retry(|| self.working.get_recent(user_id, None, WORKING_MAX_CANDIDATES)).await {
            Ok(entries) => {
                breaker.record_success();
                Ok(entries)
            }
            Err(e) => {
                breaker.record_failure();
                Err(e)
            }
        }
    }

    async fn fetch_long_term(&self, user_id: &UserId) -> Result<Vec<archon_domain::types::LongTermEntry>> {
        let breaker = self.breakers.get_or_create(BREAKER_LONGTERM);
        if !breaker.is_request_allowed() {
            return Err(Error::ServiceUnavailable {
                services: vec![BREAKER_LONGTERM.to_string()],
                message: "breaker open".to_string(),
                correlation_id: None,
            });
        }
        match with_retry(|| {
            self.long_term
                .get_important(user_id, LONGTERM_IMPORTANCE_THRESHOLD, LONGTERM_MAX_CANDIDATES)
        })
        .await
        {
            Ok(entries) => {
                breaker.record_success();
                Ok(entries)
            }
            Err(e) => {
                breaker.record_failure();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archon_domain::config::{CacheConfig, RecordStoreConfig};
    use archon_domain::types::{Role, WorkingMemoryType};
    use archon_store::{InMemoryCache, InMemoryRecordStore, KeyedCache, RecordStore};

    fn assembler() -> (ContextAssembler, Arc<SessionStore>, Arc<WorkingStore>, Arc<LongTermStore>) {
        let record_store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::default());
        let cache: Arc<dyn KeyedCache> = Arc::new(InMemoryCache::default());
        let dlq = Arc::new(archon_events::DeadLetterQueue::new(record_store.clone(), Default::default()));
        let events = Arc::new(archon_events::EventBus::new(record_store.clone(), "archon_events", dlq));

        let sessions = Arc::new(SessionStore::new(cache, events.clone(), &CacheConfig::default()));
        let working = Arc::new(WorkingStore::new(record_store.clone(), events.clone(), RecordStoreConfig::default()));
        let long_term = Arc::new(LongTermStore::new(record_store, events, RecordStoreConfig::default()));
        let breakers = Arc::new(CircuitBreakerRegistry::default());

        let assembler = ContextAssembler::new(sessions.clone(), working.clone(), long_term.clone(), breakers);
        (assembler, sessions, working, long_term)
    }

    #[tokio::test]
    async fn empty_user_yields_healthy_empty_context() {
        let (assembler, _, _, _) = assembler();
        let context = assembler.assemble_context(&UserId::new(), None, 4000).await;
        assert_eq!(context.status, AssemblyStatus::Healthy);
        assert!(context.session.is_none());
        assert!(context.recent_memories.is_empty());
    }

    #[tokio::test]
    async fn session_included_in_full_even_when_it_exceeds_budget() {
        let (assembler, sessions, _, _) = assembler();
        let user = UserId::new();
        let session = sessions.create_session(user.clone(), None).await.unwrap();
        for i in 0..50 {
            sessions
                .add_message(&session.session_id, archon_domain::types::Message::new(Role::User, format!("message {i}")))
                .await
                .unwrap();
        }

        let context = assembler.assemble_context(&user, Some(&session.session_id), 10).await;
        assert!(context.session.is_some());
        assert_eq!(context.session.unwrap().messages.len(), 50);
    }

    #[tokio::test]
    async fn working_memory_included_up_to_reserve() {
        let (assembler, _, working, _) = assembler();
        let user = UserId::new();
        for _ in 0..3 {
            working
                .create(user.clone(), WorkingMemoryType::Observation, HashMap::new(), None, None, None)
                .await
                .unwrap();
        }

        let context = assembler.assemble_context(&user, None, 4000).await;
        assert_eq!(context.recent_memories.len(), 3);
        assert_eq!(context.source_counts.get("working"), Some(&3));
    }

    #[tokio::test]
    async fn long_term_facts_below_threshold_are_excluded() {
        let (assembler, _, _, long_term) = assembler();
        let user = UserId::new();
        long_term
            .create(user.clone(), archon_domain::types::LongTermMemoryType::Fact, HashMap::new(), None, 0.3)
            .await
            .unwrap();
        long_term
            .create(user.clone(), archon_domain::types::LongTermMemoryType::Fact, HashMap::new(), None, 0.9)
            .await
            .unwrap();

        let context = assembler.assemble_context(&user, None, 4000).await;
        assert_eq!(context.facts.len(), 1);
        assert!(context.facts[0].importance_score >= 0.7);
    }

    #[tokio::test]
    async fn cached_fallback_used_after_all_layers_fail() {
        let (assembler, sessions, _, _) = assembler();
        let user = UserId::new();
        let session = sessions.create_session(user.clone(), None).await.unwrap();

        // Warm the cache with a healthy assembly.
        let first = assembler.assemble_context(&user, Some(&session.session_id), 4000).await;
        assert_eq!(first.status, AssemblyStatus::Healthy);

        // Trip the session breaker so the only attempted layer fails.
        let breaker = assembler.breakers.get_or_create(BREAKER_SESSION);
        for _ in 0..10 {
            breaker.record_failure();
        }

        let second = assembler.assemble_context(&user, Some(&session.session_id), 4000).await;
        assert_eq!(second.status, AssemblyStatus::Cached);
    }
}
