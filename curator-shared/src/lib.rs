//! Wire models and client configuration shared by the Curator session core
//! and its command-line front end.

pub mod config;
pub mod models;
