use serde::Serialize;

/// Structured internal diagnostic events, distinct from the domain `Event`s
/// published on the Event Bus (C4). This is an observability concern: a
/// `TraceEvent` never crosses the wire to a subscriber, it only ever lands
/// in the log stream via [`TraceEvent::emit`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ContextAssembled {
        user_id: String,
        session_id: Option<String>,
        total_tokens: u32,
        status: String,
        source_counts: std::collections::HashMap<String, usize>,
    },
    ContextLayerSkipped {
        layer: String,
        reason: String,
    },
    CircuitStateChanged {
        provider: String,
        from_state: String,
        to_state: String,
    },
    ProviderAttempt {
        provider: String,
        model: String,
        quality_tier: String,
        status: String,
        duration_ms: u64,
        cost_usd: f64,
    },
    EventPublished {
        event_type: String,
        event_id: String,
    },
    EventHandlerFailed {
        event_type: String,
        event_id: String,
        handler: String,
        error: String,
    },
    DlqRecorded {
        failure_id: String,
        event_type: String,
        retry_count: u32,
    },
    DlqRetryAttempt {
        failure_id: String,
        success: bool,
        retry_count: u32,
    },
    WorkerCrashed {
        worker: String,
        crash_count: u32,
        backoff_secs: u64,
    },
    WorkerRestarted {
        worker: String,
    },
    ConsolidationPromoted {
        user_id: String,
        working_entry_id: String,
        long_term_entry_id: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "archon_trace");
    }
}
