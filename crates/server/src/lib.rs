//! Wiring and health-reporting library surface for the substrate binary.
//! No HTTP or CLI surface lives here — callers embed [`bootstrap::build`]
//! and [`health::check_all`] directly, the same way the `gateway` crate
//! exposes `build_app_state` for its own `serve`/`run`/`chat` commands to
//! share.

pub mod bootstrap;
pub mod health;
pub mod system;

pub use system::System;
