//! Event Bus (C4) and Dead-Letter Queue (C5).

mod bus;
mod dlq;

pub use bus::{EventBus, EventHandler};
pub use dlq::DeadLetterQueue;
