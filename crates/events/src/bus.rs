//! Event Bus (C4) — at-least-once publish/subscribe over the record
//! store's `notify`/`listen` primitive, with per-handler isolated dispatch
//! so one failing handler never blocks or is blocked by its siblings.
//!
//! Grounded on `gateway/src/runtime/deliveries.rs`'s fan-out idiom
//! (`broadcast::Sender` plus a background listener task) and on the
//! python original's `event_bus.py` dispatch-per-handler isolation.

use crate::dlq::DeadLetterQueue;
use archon_domain::error::Result;
use archon_domain::ids::UserId;
use archon_domain::trace::TraceEvent;
use archon_domain::types::Event;
use archon_store::RecordStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Unique label used in DLQ records and trace events on failure.
    fn name(&self) -> &str;
    async fn handle(&self, event: &Event) -> Result<()>;
}

/// Publish/subscribe event bus. Handlers are registered per event-type
/// namespace; `start_listening` spawns the background consumer task that
/// dispatches to every matching handler in its own isolated task.
pub struct EventBus {
    store: Arc<dyn RecordStore>,
    channel_name: String,
    dlq: Arc<DeadLetterQueue>,
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    cancel: CancellationToken,
    listen_task: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    pub fn new(store: Arc<dyn RecordStore>, channel_name: impl Into<String>, dlq: Arc<DeadLetterQueue>) -> Self {
        Self {
            store,
            channel_name: channel_name.into(),
            dlq,
            handlers: RwLock::new(HashMap::new()),
            cancel: CancellationToken::new(),
            listen_task: Mutex::new(None),
        }
    }

    /// Register a handler for an event-type namespace. Subscriptions made
    /// after `start_listening` still take effect for events published
    /// thereafter: the handler map is consulted fresh on every dispatch.
    pub fn subscribe(&self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .entry(event_type.into())
            .or_default()
            .push(handler);
    }

    /// Publish an event. A `notify` failure is recorded to the DLQ and
    /// surfaced to the caller — publish failures are not swallowed, since
    /// the caller may need to know the event never left this process.
    pub async fn publish(
        &self,
        event_type: impl Into<String>,
        payload: HashMap<String, serde_json::Value>,
        user_id: Option<UserId>,
    ) -> Result<Event> {
        let event = Event::new(event_type, payload, user_id);
        let envelope = serde_json::to_value(&event)?;
        if let Err(e) = self.store.notify(&self.channel_name, envelope).await {
            self.dlq
                .record_failure(
                    event.event_id.clone(),
                    event.event_type.clone(),
                    event.payload.clone(),
                    e.to_string(),
                    event.user_id.clone(),
                )
                .await;
            return Err(e);
        }
        TraceEvent::EventPublished {
            event_id: event.event_id.to_string(),
            event_type: event.event_type.clone(),
        }
        .emit();
        Ok(event)
    }

    /// Start the background consumer. Idempotent: calling twice while
    /// already listening is a no-op.
    pub async fn start_listening(self: &Arc<Self>) {
        let mut task_guard = self.listen_task.lock().await;
        if task_guard.is_some() {
            return;
        }
        let mut receiver = self.store.listen(&self.channel_name);
        let bus = self.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                let envelope = tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = receiver.recv() => msg,
                };
                let payload = match envelope {
                    Ok(payload) => payload,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event bus receiver lagged; messages dropped");
                        continue;
                    }
                };
                let event: Event = match serde_json::from_value(payload) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping malformed event envelope");
                        continue;
                    }
                };
                bus.dispatch(event).await;
            }
        });
        *task_guard = Some(handle);
    }

    pub async fn stop_listening(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.listen_task.lock().await.take() {
            let _ = handle.await;
        }
    }

    /// Dispatch one event to every handler registered for its type, each
    /// in its own isolated task: a handler that panics or hangs cannot
    /// block, delay, or be starved by any other handler.
    async fn dispatch(self: &Arc<Self>, event: Event) {
        let handlers = {
            let registered = self.handlers.read();
            registered.get(&event.event_type).cloned().unwrap_or_default()
        };
        if handlers.is_empty() {
            return;
        }

        let mut tasks = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let bus = self.clone();
            let event = event.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = handler.handle(&event).await {
                    TraceEvent::EventHandlerFailed {
                        event_id: event.event_id.to_string(),
                        event_type: event.event_type.clone(),
                        handler: handler.name().to_string(),
                        error: e.to_string(),
                    }
                    .emit();
                    bus.dlq
                        .record_failure(
                            event.event_id.clone(),
                            event.event_type.clone(),
                            event.payload.clone(),
                            format!("handler '{}' failed: {e}", handler.name()),
                            event.user_id.clone(),
                        )
                        .await;
                }
            }));
        }

        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "event handler task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archon_domain::config::EventsConfig;
    use archon_domain::types::event_type;
    use archon_store::InMemoryRecordStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct CountingHandler {
        label: &'static str,
        count: Arc<AtomicUsize>,
        fail: bool,
        notify: Arc<Notify>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        fn name(&self) -> &str {
            self.label
        }

        async fn handle(&self, _event: &Event) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            self.notify.notify_one();
            if self.fail {
                return Err(archon_domain::error::Error::Internal("boom".into()));
            }
            Ok(())
        }
    }

    fn new_bus() -> Arc<EventBus> {
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::default());
        let dlq = Arc::new(DeadLetterQueue::new(store.clone(), EventsConfig::default()));
        Arc::new(EventBus::new(store, "archon_events", dlq))
    }

    #[tokio::test]
    async fn publish_without_listener_succeeds() {
        let bus = new_bus();
        let event = bus
            .publish(event_type::WORKING_CREATED, HashMap::new(), None)
            .await
            .unwrap();
        assert_eq!(event.event_type, event_type::WORKING_CREATED);
    }

    #[tokio::test]
    async fn one_failing_handler_does_not_block_the_other() {
        let bus = new_bus();
        let h1_count = Arc::new(AtomicUsize::new(0));
        let h2_count = Arc::new(AtomicUsize::new(0));
        let h1_done = Arc::new(Notify::new());
        let h2_done = Arc::new(Notify::new());

        bus.subscribe(
            event_type::WORKING_CREATED,
            Arc::new(CountingHandler {
                label: "h1-fails",
                count: h1_count.clone(),
                fail: true,
                notify: h1_done.clone(),
            }),
        );
        bus.subscribe(
            event_type::WORKING_CREATED,
            Arc::new(CountingHandler {
                label: "h2-succeeds",
                count: h2_count.clone(),
                fail: false,
                notify: h2_done.clone(),
            }),
        );

        bus.start_listening().await;
        bus.publish(event_type::WORKING_CREATED, HashMap::new(), None)
            .await
            .unwrap();

        h1_done.notified().await;
        h2_done.notified().await;
        bus.stop_listening().await;

        assert_eq!(h1_count.load(Ordering::SeqCst), 1);
        assert_eq!(h2_count.load(Ordering::SeqCst), 1);

        let failed = bus.dlq.get_failed_events(None, 10).await.unwrap();
        // Not yet promoted to terminal `failed` after a single attempt.
        assert!(failed.is_empty());
        let pending_after_delay_window = bus.store.query(
            "event_failures",
            &archon_store::RecordFilter::new().eq("status", serde_json::json!("pending")),
        )
        .await
        .unwrap();
        assert_eq!(pending_after_delay_window.len(), 1);
    }

    #[tokio::test]
    async fn unsubscribed_event_types_are_dropped_silently() {
        let bus = new_bus();
        bus.start_listening().await;
        bus.publish("no.such.type", HashMap::new(), None).await.unwrap();
        bus.stop_listening().await;
    }
}
