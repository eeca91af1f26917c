//! The three-layer Memory System: Session Store (C1), Working Store (C2),
//! Long-Term Store (C3), unified by the token-budgeted Context Assembler
//! (C7).

pub mod assembler;
pub mod longterm;
pub mod session;
pub mod working;

pub use assembler::ContextAssembler;
pub use longterm::LongTermStore;
pub use session::{ContextPatch, SessionStore};
pub use working::WorkingStore;
