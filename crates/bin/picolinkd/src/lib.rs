//! # picolinkd
//!
//! Composition root. Loads the TOML configuration, builds the devices, and
//! wires the controller to the virtual home. Button events arrive as JSON
//! lines on stdin; every call the home applied is written to stdout as a
//! JSON line on exit.

pub mod config;
pub mod input;
