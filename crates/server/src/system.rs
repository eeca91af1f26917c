//! The fully-wired substrate: one [`System`] per process, grouped by
//! concern the way the teacher's `AppState` groups its own subsystems.

use std::sync::Arc;

use archon_aal::Router;
use archon_breaker::CircuitBreakerRegistry;
use archon_domain::config::Config;
use archon_events::{DeadLetterQueue, EventBus};
use archon_memory::{ContextAssembler, LongTermStore, SessionStore, WorkingStore};
use archon_store::{KeyedCache, RecordStore};
use archon_workers::WorkerSupervisor;

/// A fully-wired instance of the substrate. Cloning is cheap — every field
/// is an `Arc`.
#[derive(Clone)]
pub struct System {
    pub config: Arc<Config>,

    // Backing stores (C1/C2/C3's storage interfaces).
    pub cache: Arc<dyn KeyedCache>,
    pub record_store: Arc<dyn RecordStore>,

    // Event Bus (C4) + Dead-Letter Queue (C5).
    pub events: Arc<EventBus>,
    pub dlq: Arc<DeadLetterQueue>,

    // Circuit Breaker Registry (C6), shared by the assembler and the router.
    pub breakers: Arc<CircuitBreakerRegistry>,

    // Memory System (C1/C2/C3/C7).
    pub sessions: Arc<SessionStore>,
    pub working: Arc<WorkingStore>,
    pub long_term: Arc<LongTermStore>,
    pub assembler: Arc<ContextAssembler>,

    // Agent Abstraction Layer (C8). `router.registry()` exposes the
    // wired provider set for health reporting.
    pub router: Arc<Router>,

    // Worker Supervisor (C9) + the three canonical periodic workers (C10).
    pub supervisor: Arc<WorkerSupervisor>,
}
