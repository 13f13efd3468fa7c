//! Subcommand implementations.

pub mod account;
pub mod completion;
pub mod config;
pub mod session;
