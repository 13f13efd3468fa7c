//! # Configuration
//!
//! Client-side configuration for the session core and the CLI.

pub mod client;

pub use client::{ClientConfig, ConfigError, LogFormat, LoggingConfig};
