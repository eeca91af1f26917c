//! [`build`] wires every subsystem into a [`System`] — the single entry
//! point other crates (and `main.rs`) use to boot the substrate, the same
//! shared-boot-path shape as `gateway::bootstrap::build_app_state`.

use std::sync::Arc;
use std::time::Duration;

use archon_aal::{ProviderRegistry, Router};
use archon_breaker::CircuitBreakerRegistry;
use archon_domain::config::{Config, EnvResolver, CACHE_URL_ENV, RECORD_STORE_URL_ENV};
use archon_events::{DeadLetterQueue, EventBus};
use archon_memory::{ContextAssembler, LongTermStore, SessionStore, WorkingStore};
use archon_store::{InMemoryCache, InMemoryRecordStore, KeyedCache, RecordStore};
use archon_workers::{EventRetryWorker, MemoryConsolidator, StoreCleaner, WorkerSupervisor};

use crate::system::System;

/// Validate config and wire every subsystem, returning a fully-built
/// [`System`]. Does not start the worker supervisor — call
/// `system.supervisor.start()` once the caller is ready to run.
pub async fn build(config: Config) -> anyhow::Result<System> {
    let config = Arc::new(config);
    tracing::info!("archon substrate booting");

    // ── Backing stores ───────────────────────────────────────────────
    // Ships with in-process implementations only; `CACHE_URL`/
    // `RECORD_STORE_URL` are read for parity with a deployment that points
    // at an external cache/database, but no external-store driver is
    // wired here (spec.md §6 "no external infra required" default).
    let cache: Arc<dyn KeyedCache> = Arc::new(InMemoryCache::new(Duration::from_secs(
        config.cache.session_ttl_secs,
    )));
    let record_store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::default());
    if let Some(url) = EnvResolver::lookup(CACHE_URL_ENV) {
        tracing::info!(cache_url = %url, "external cache URL configured but unused by the in-process backend");
    }
    if let Some(url) = EnvResolver::lookup(RECORD_STORE_URL_ENV) {
        tracing::info!(record_store_url = %url, "external record store URL configured but unused by the in-process backend");
    }
    tracing::info!("backing stores ready");

    // ── Event Bus (C4) + Dead-Letter Queue (C5) ─────────────────────
    let dlq = Arc::new(DeadLetterQueue::new(record_store.clone(), config.events.clone()));
    let events = Arc::new(EventBus::new(
        record_store.clone(),
        config.events.channel_name.clone(),
        dlq.clone(),
    ));
    events.start_listening().await;
    tracing::info!(channel = %config.events.channel_name, "event bus listening");

    // ── Circuit Breaker Registry (C6) ────────────────────────────────
    let breakers = Arc::new(CircuitBreakerRegistry::new(config.breaker));
    tracing::info!(
        failure_threshold = config.breaker.failure_threshold,
        timeout_secs = config.breaker.timeout_secs,
        "circuit breaker registry ready"
    );

    // ── Memory System (C1/C2/C3) ─────────────────────────────────────
    let sessions = Arc::new(SessionStore::new(cache.clone(), events.clone(), &config.cache));
    let working = Arc::new(WorkingStore::new(
        record_store.clone(),
        events.clone(),
        config.record_store.clone(),
    ));
    let long_term = Arc::new(LongTermStore::new(
        record_store.clone(),
        events.clone(),
        config.record_store.clone(),
    ));
    tracing::info!("session/working/long-term stores ready");

    // ── Context Assembler (C7) ───────────────────────────────────────
    let assembler = Arc::new(ContextAssembler::new(
        sessions.clone(),
        working.clone(),
        long_term.clone(),
        breakers.clone(),
    ));
    tracing::info!("context assembler ready");

    // ── Agent Abstraction Layer (C8) ─────────────────────────────────
    let registry = ProviderRegistry::from_config(&config.aal);
    if registry.is_empty() {
        tracing::info!("no AAL providers initialized — configure provider credentials to enable routing");
    } else {
        tracing::info!(providers = registry.len(), "AAL provider registry ready");
    }
    let router = Arc::new(Router::new(registry, Some(assembler.clone()), breakers.clone()));

    // ── Worker Supervisor (C9) + periodic workers (C10) ──────────────
    let mut supervisor = WorkerSupervisor::new(config.workers.max_backoff_secs);
    supervisor.add_worker(Arc::new(MemoryConsolidator::new(
        working.clone(),
        long_term.clone(),
        config.workers.consolidator,
    )));
    supervisor.add_worker(Arc::new(StoreCleaner::new(
        working.clone(),
        long_term.clone(),
        events.clone(),
        config.workers.cleaner,
    )));
    supervisor.add_worker(Arc::new(EventRetryWorker::new(
        dlq.clone(),
        events.clone(),
        config.workers.event_retry,
    )));
    let supervisor = Arc::new(supervisor);
    tracing::info!("worker supervisor ready with 3 registered workers");

    Ok(System {
        config,
        cache,
        record_store,
        events,
        dlq,
        breakers,
        sessions,
        working,
        long_term,
        assembler,
        router,
        supervisor,
    })
}
