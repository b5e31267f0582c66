//! # picolink-domain
//!
//! Pure domain model for the picolink remote-control bridge.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Devices** (a configured remote: hardware type, controlled domain, timing)
//! - Define **Button events** (press / release of one physical button)
//! - Define **Action specs** (ordered service calls handed to an executor)
//! - The pure decision rules:
//!   - action resolution and the per-domain default table
//!   - the STOP precedence chain
//!   - placeholder expansion of domain-group tokens
//!   - ramp step arithmetic and clamping
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or an async runtime.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod action;
pub mod button;
pub mod device;
pub mod placeholder;
pub mod ramp;
pub mod resolver;
pub mod status;
pub mod stop_policy;
