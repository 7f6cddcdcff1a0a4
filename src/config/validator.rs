use anyhow::Result;
use colored::Colorize;
use std::collections::HashSet;
use std::path::Path;

/// Sections whose keys are checked against [`ConfigValidator::known_fields`].
const SECTIONS: [&str; 4] = ["core", "archive", "hashing", "performance"];

/// Flags configuration keys that backupd does not understand
pub struct ConfigValidator {
    /// Fully-qualified keys recognized by backupd (e.g. `core.db_path`)
    known_fields: HashSet<&'static str>,
}

impl ConfigValidator {
    /// Create a new validator with known configuration fields
    #[must_use]
    pub fn new() -> Self {
        let known_fields = HashSet::from([
            "core.db_path",
            "core.archive_dir",
            "core.interval_secs",
            "archive.format",
            "archive.compression",
            "archive.compression_level",
            "hashing.follow_symlinks",
            "performance.parallel_checks",
            "performance.parallel_threads",
        ]);

        Self { known_fields }
    }

    /// Collect the unknown keys of a config document.
    ///
    /// # Errors
    ///
    /// Returns an error if `content` is not valid TOML
    pub fn unknown_fields(&self, content: &str) -> Result<Vec<String>> {
        let parsed: toml::Table = toml::from_str(content)?;
        let mut unknown = Vec::new();

        for (section, value) in &parsed {
            if !SECTIONS.contains(&section.as_str()) {
                unknown.push(section.clone());
                continue;
            }
            let toml::Value::Table(table) = value else {
                unknown.push(section.clone());
                continue;
            };
            for key in table.keys() {
                let full_key = format!("{section}.{key}");
                if !self.known_fields.contains(full_key.as_str()) {
                    unknown.push(full_key);
                }
            }
        }

        unknown.sort();
        Ok(unknown)
    }

    /// Validate a config file and warn about unknown keys
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub fn validate_config_file(&self, config_path: &Path) -> Result<()> {
        if !config_path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(config_path)?;
        let unknown = self.unknown_fields(&content)?;

        if !unknown.is_empty() {
            eprintln!("{}", "Configuration warnings:".yellow().bold());
            for field in &unknown {
                eprintln!("  Unknown configuration field: {}", field.yellow());
            }
            eprintln!();
        }

        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
