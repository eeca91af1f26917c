pub mod cleaner;
pub mod consolidator;
pub mod event_retry;
pub mod supervisor;

pub use cleaner::StoreCleaner;
pub use consolidator::MemoryConsolidator;
pub use event_retry::EventRetryWorker;
pub use supervisor::{Worker, WorkerHealth, WorkerStatus, WorkerSupervisor};
