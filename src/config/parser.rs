use super::Config;
use crate::utils::expand_tilde;
use anyhow::{Context, Result};
use std::path::Path;

/// Read, parse and validate a config file.
pub fn parse_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config_str(&content)
}

/// Parse and validate TOML config text.
///
/// `~/` prefixes in configured directories are expanded against the home
/// directory.
pub fn parse_config_str(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse TOML config")?;

    config.core.db_path = expand_tilde(&config.core.db_path.to_string_lossy())?;
    config.core.archive_dir = expand_tilde(&config.core.archive_dir.to_string_lossy())?;

    // Validate and return validation errors directly without wrapping
    validate_config(&config)?;
    Ok(config)
}

/// Reject values the monitor cannot work with.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.core.interval_secs == 0 {
        anyhow::bail!("Check interval must be at least 1 second");
    }

    if let Some(level) = config.archive.compression_level {
        match config.archive.compression.level_range() {
            None => anyhow::bail!(
                "Compression method '{}' does not take a compression level",
                config.archive.compression
            ),
            Some((min, max)) if !(min..=max).contains(&level) => anyhow::bail!(
                "Compression level for '{}' must be between {min} and {max}",
                config.archive.compression
            ),
            Some(_) => {}
        }
    }

    if config.performance.parallel_threads == 0 {
        anyhow::bail!("Parallel threads must be at least 1");
    }

    Ok(())
}
