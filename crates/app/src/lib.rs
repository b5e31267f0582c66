//! # picolink-app
//!
//! Application layer: the runtime that interprets button events, plus the
//! **port definitions** (traits) adapters implement.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `ActionExecutor`: perform one expanded service call
//!   - `StateReader`: read the current state of an entity
//!   - `EventPublisher`: publish button events
//! - Classify presses per device (tap, hold, immediate, stop) in `classifier`
//! - Run ramp sessions, one per `(device, button)`, in `ramp_scheduler`
//! - Route events to device workers and manage lifecycle in `controller`
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `picolink-domain` only (plus `tokio` for tasks, channels and
//! timers). Never imports adapter crates. Adapters depend on *this* crate,
//! not the reverse.

pub mod classifier;
pub mod controller;
pub mod dispatch;
pub mod event_bus;
pub mod ports;
pub mod ramp_scheduler;

#[cfg(test)]
mod testing;
