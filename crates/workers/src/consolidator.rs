//! Memory Consolidator (C10) — promotes high-relevance `WorkingEntry` rows
//! to `LongTermEntry`, real rather than the original's stub (spec.md §4.2,
//! §4.8 supplements; `original_source/python/src/workers/
//! memory_consolidator.py` never promotes anything — "LLM analysis not yet
//! implemented"). Idempotent via content fingerprint dedup per spec.md §9
//! "Consolidation correctness".

use std::sync::Arc;
use std::time::Duration;

use archon_domain::config::ConsolidatorConfig;
use archon_domain::error::Result;
use archon_domain::trace::TraceEvent;
use archon_domain::types::LongTermMemoryType;
use archon_memory::{LongTermStore, WorkingStore};
use async_trait::async_trait;

use crate::supervisor::Worker;

pub struct MemoryConsolidator {
    working: Arc<WorkingStore>,
    long_term: Arc<LongTermStore>,
    config: ConsolidatorConfig,
}

impl MemoryConsolidator {
    pub fn new(working: Arc<WorkingStore>, long_term: Arc<LongTermStore>, config: ConsolidatorConfig) -> Self {
        Self { working, long_term, config }
    }
}

#[async_trait]
impl Worker for MemoryConsolidator {
    fn name(&self) -> &str {
        "memory_consolidator"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    async fn run(&self) -> Result<()> {
        let candidates = self.working.scan_above_relevance(self.config.relevance_threshold).await?;
        let mut promoted = 0usize;

        for entry in candidates {
            let fingerprint = entry.content_fingerprint();
            if self.long_term.exists_with_fingerprint(&entry.user_id, &fingerprint).await? {
                continue;
            }

            let long_term_entry = self
                .long_term
                .create(
                    entry.user_id.clone(),
                    LongTermMemoryType::Fact,
                    entry.content.clone(),
                    entry.metadata.clone(),
                    self.config.promoted_importance,
                )
                .await?;

            self.working.mark_promoted(&entry.id, &long_term_entry.id).await?;

            TraceEvent::ConsolidationPromoted {
                user_id: entry.user_id.to_string(),
                working_entry_id: entry.id.to_string(),
                long_term_entry_id: long_term_entry.id.to_string(),
            }
            .emit();
            promoted += 1;
        }

        tracing::info!(promoted, "memory consolidation pass completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archon_domain::ids::UserId;
    use archon_domain::types::WorkingMemoryType;
    use archon_events::{DeadLetterQueue, EventBus};
    use archon_store::{InMemoryRecordStore, RecordStore};
    use std::collections::HashMap;

    fn consolidator(config: ConsolidatorConfig) -> (MemoryConsolidator, Arc<WorkingStore>, Arc<LongTermStore>) {
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::default());
        let dlq = Arc::new(DeadLetterQueue::new(store.clone(), Default::default()));
        let events = Arc::new(EventBus::new(store.clone(), "archon_events", dlq));
        let working = Arc::new(WorkingStore::new(store.clone(), events.clone(), Default::default()));
        let long_term = Arc::new(LongTermStore::new(store, events, Default::default()));
        (MemoryConsolidator::new(working.clone(), long_term.clone(), config), working, long_term)
    }

    #[tokio::test]
    async fn promotes_high_relevance_entry_exactly_once() {
        let (consolidator, working, long_term) = consolidator(ConsolidatorConfig {
            interval_secs: 3600,
            relevance_threshold: 0.5,
            promoted_importance: 0.6,
        });
        let user = UserId::new();
        let mut content = HashMap::new();
        content.insert("summary".to_string(), serde_json::json!("prefers dark mode"));
        let entry = working
            .create(user.clone(), WorkingMemoryType::Preference, content, None, None, None)
            .await
            .unwrap();

        consolidator.run().await.unwrap();
        let promoted = long_term.get_by_type(&user, LongTermMemoryType::Fact, 10).await.unwrap();
        assert_eq!(promoted.len(), 1);

        // Re-running must not double-promote: the working entry is marked
        // promoted, so it falls out of the scan on the next pass.
        consolidator.run().await.unwrap();
        let promoted_again = long_term.get_by_type(&user, LongTermMemoryType::Fact, 10).await.unwrap();
        assert_eq!(promoted_again.len(), 1);

        let refreshed = working.get_recent(&user, None, 10).await.unwrap();
        assert_eq!(refreshed[0].id, entry.id);
        assert!(refreshed[0].promoted_to.is_some());
    }

    #[tokio::test]
    async fn leaves_low_relevance_entries_unpromoted() {
        let (consolidator, working, long_term) = consolidator(ConsolidatorConfig {
            interval_secs: 3600,
            relevance_threshold: 2.0,
            promoted_importance: 0.6,
        });
        let user = UserId::new();
        working
            .create(user.clone(), WorkingMemoryType::Observation, HashMap::new(), None, None, None)
            .await
            .unwrap();

        consolidator.run().await.unwrap();
        let promoted = long_term.get_by_type(&user, LongTermMemoryType::Fact, 10).await.unwrap();
        assert!(promoted.is_empty());
    }
}
