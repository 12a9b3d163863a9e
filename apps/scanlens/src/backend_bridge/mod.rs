//! Bridge between the UI thread and the analyzer worker runtime.

pub mod commands;
pub mod runtime;
