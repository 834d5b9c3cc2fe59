//! Operator CLI for pw-agent: browser installation and configuration checks.

pub mod cli;
pub mod commands;
pub mod logging;
