//! Application-level orchestration.
//!
//! This module owns session lifecycle control (connect, disconnect,
//! failure reporting) and the mapping from chat-input text to engine
//! commands. UI/CLI layers call into this module to keep
//! responsibilities separated.

mod controller;

pub(crate) use controller::{run_controller, UiCommand};
