//! CLI command handlers

pub mod commands;

pub use commands::{add_return, compare, export, import, profile, ReturnOptions};
