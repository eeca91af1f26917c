//! Worker Supervisor (C9) — runs each periodic task as an isolated
//! supervised loop with bounded exponential restart backoff and per-worker
//! health tracking.
//!
//! Grounded on `original_source/python/src/workers/{base,supervisor}.py`:
//! same "invoke `run()`, sleep `interval_seconds`, repeat; on crash sleep a
//! doubling backoff capped at `max_backoff_secs`, reset on any crash-free
//! interval" loop shape, cross-checked against
//! `gateway/src/runtime/schedule_runner.rs` for the Rust supervised-task
//! idiom (per-task spawn, structured `tracing` at each transition,
//! cooperative cancellation via a token).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use archon_domain::error::Result;
use archon_domain::trace::TraceEvent;
use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait Worker: Send + Sync {
    fn name(&self) -> &str;
    fn interval(&self) -> Duration;
    async fn run(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    NotStarted,
    Running,
    Stopped,
    Crashed,
}

#[derive(Debug, Clone)]
pub struct WorkerHealth {
    pub status: WorkerStatus,
    pub crashes: u32,
    pub last_crash: Option<chrono::DateTime<chrono::Utc>>,
    pub last_success: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for WorkerHealth {
    fn default() -> Self {
        Self {
            status: WorkerStatus::NotStarted,
            crashes: 0,
            last_crash: None,
            last_success: None,
        }
    }
}

/// Supervises a fixed set of [`Worker`]s, each in its own task, with
/// independent crash-loop backoff.
pub struct WorkerSupervisor {
    workers: Vec<Arc<dyn Worker>>,
    max_backoff_secs: u64,
    health: Arc<RwLock<HashMap<String, WorkerHealth>>>,
    cancel: CancellationToken,
    tasks: RwLock<Vec<JoinHandle<()>>>,
}

impl WorkerSupervisor {
    pub fn new(max_backoff_secs: u64) -> Self {
        Self {
            workers: Vec::new(),
            max_backoff_secs,
            health: Arc::new(RwLock::new(HashMap::new())),
            cancel: CancellationToken::new(),
            tasks: RwLock::new(Vec::new()),
        }
    }

    pub fn add_worker(&mut self, worker: Arc<dyn Worker>) {
        self.health.write().insert(worker.name().to_string(), WorkerHealth::default());
        self.workers.push(worker);
    }

    /// Spawn a supervisor task per registered worker. Returns immediately;
    /// each worker's crash-loop runs in the background until [`Self::stop`]
    /// is called.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.write();
        for worker in &self.workers {
            let worker = worker.clone();
            let supervisor = self.clone();
            let cancel = self.cancel.clone();
            tasks.push(tokio::spawn(async move {
                supervisor.supervise(worker, cancel).await;
            }));
        }
    }

    pub async fn stop(&self) {
        self.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.write());
        for handle in handles {
            let _ = handle.await;
        }
    }

    pub fn health_status(&self) -> HashMap<String, WorkerHealth> {
        self.health.read().clone()
    }

    pub fn is_healthy(&self) -> bool {
        self.health
            .read()
            .values()
            .all(|h| matches!(h.status, WorkerStatus::Running | WorkerStatus::NotStarted))
    }

    async fn supervise(&self, worker: Arc<dyn Worker>, cancel: CancellationToken) {
        let name = worker.name().to_string();
        let mut backoff = Duration::from_secs(1);

        self.set_status(&name, WorkerStatus::Running);
        tracing::info!(worker = %name, "worker started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match worker.run().await {
                Ok(()) => {
                    self.record_success(&name);
                    backoff = Duration::from_secs(1);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(worker.interval()) => {}
                    }
                }
                Err(e) => {
                    let crash_count = self.record_crash(&name);
                    TraceEvent::WorkerCrashed {
                        worker: name.clone(),
                        crash_count,
                        backoff_secs: backoff.as_secs(),
                    }
                    .emit();
                    tracing::error!(worker = %name, error = %e, backoff_secs = backoff.as_secs(), "worker crashed, restarting after backoff");

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = Duration::from_secs((backoff.as_secs() * 2).min(self.max_backoff_secs));
                    TraceEvent::WorkerRestarted { worker: name.clone() }.emit();
                }
            }
        }

        self.set_status(&name, WorkerStatus::Stopped);
        tracing::info!(worker = %name, "worker stopped");
    }

    fn set_status(&self, name: &str, status: WorkerStatus) {
        self.health.write().entry(name.to_string()).or_default().status = status;
    }

    fn record_success(&self, name: &str) {
        let mut health = self.health.write();
        let entry = health.entry(name.to_string()).or_default();
        entry.status = WorkerStatus::Running;
        entry.last_success = Some(chrono::Utc::now());
    }

    fn record_crash(&self, name: &str) -> u32 {
        let mut health = self.health.write();
        let entry = health.entry(name.to_string()).or_default();
        entry.status = WorkerStatus::Crashed;
        entry.crashes += 1;
        entry.last_crash = Some(chrono::Utc::now());
        entry.crashes
    }
}
