//! Default configuration file generation.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result, bail};
use shared::config::ClientConfig;

/// Generates a configuration file holding the default settings.
///
/// # Arguments
/// * `format` - "yaml", "json" or "toml".
/// * `output` - Destination; defaults to `curator.<format>` in the current directory.
///
/// # Errors
/// Returns an error if the format is unsupported or if writing the file fails.
pub fn generate_config(format: &str, output: Option<PathBuf>) -> Result<PathBuf> {
    let config = ClientConfig::with_defaults();
    let serialized = match format {
        "yaml" => serde_yml::to_string(&config)?,
        "json" => serde_json::to_string_pretty(&config)?,
        "toml" => toml::to_string_pretty(&config)?,
        other => bail!("unsupported format '{other}'; use 'yaml', 'json' or 'toml'"),
    };

    let path = output.unwrap_or_else(|| PathBuf::from(format!("curator.{format}")));
    fs::write(&path, serialized)
        .with_context(|| format!("failed to write configuration to {}", path.display()))?;

    println!("Configuration file '{}' generated successfully.", path.display());
    Ok(path)
}
