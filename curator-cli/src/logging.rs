//! Tracing subscriber setup.

use shared::config::{ClientConfig, LogFormat};
use std::io;
use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Output goes to stderr so command output on stdout stays clean.
pub fn initialize_tracing(config: &ClientConfig) {
    let fmt_builder = fmt::fmt()
        .with_env_filter(build_env_filter(config))
        .with_writer(io::stderr)
        .with_target(false)
        .with_level(true);

    let installed = if matches!(config.logging.format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).try_init()
    } else {
        fmt_builder.with_ansi(false).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

fn build_env_filter(config: &ClientConfig) -> EnvFilter {
    build_env_filter_from(config, |name| std::env::var(name).ok())
}

/// Filter from `RUST_LOG` as seen through `lookup`, else the configured level.
///
/// An unset or invalid `RUST_LOG` falls through to the configured level, and
/// an unparseable configured level falls back to `info`.
fn build_env_filter_from<F>(config: &ClientConfig, lookup: F) -> EnvFilter
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(directives) = lookup(EnvFilter::DEFAULT_ENV) {
        match EnvFilter::try_new(&directives) {
            Ok(filter) => return filter,
            Err(err) => eprintln!("ignoring invalid {}: {err}", EnvFilter::DEFAULT_ENV),
        }
    }

    let default_level = config
        .logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .parse_lossy("")
}
