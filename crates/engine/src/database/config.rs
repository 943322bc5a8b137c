//! Database configuration via `chronicle.toml`
//!
//! A session is constructed from a [`DatabaseConfig`]. It can be built in
//! code or read from a `chronicle.toml` file; a commented default file is
//! written on first use of a configuration directory.

use serde::{Deserialize, Serialize};
use std::path::Path;

use chronicle_core::{DottedNamingPolicy, Error, NamingPolicy, Result};

/// Config file name placed in the configuration directory.
pub const CONFIG_FILE_NAME: &str = "chronicle.toml";

/// Database configuration loaded from `chronicle.toml`.
///
/// # Example
///
/// ```toml
/// name = "prices"
/// top_chronicle = "bt"
/// strict_name_space = false
/// max_lookup_depth = 64
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database name, unique among the open sessions of the process.
    #[serde(default = "default_name")]
    pub name: String,
    /// Simple name of the top chronicle.
    #[serde(default = "default_top_chronicle")]
    pub top_chronicle: String,
    /// Require full chronicle names to start with the top chronicle.
    #[serde(default)]
    pub strict_name_space: bool,
    /// Longest chronicle list accepted by attribute lookups.
    #[serde(default = "default_max_lookup_depth")]
    pub max_lookup_depth: usize,
}

fn default_name() -> String {
    "chronicle".to_string()
}

fn default_top_chronicle() -> String {
    "bt".to_string()
}

fn default_max_lookup_depth() -> usize {
    64
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            top_chronicle: default_top_chronicle(),
            strict_name_space: false,
            max_lookup_depth: default_max_lookup_depth(),
        }
    }
}

impl DatabaseConfig {
    /// Default configuration under another database name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Check the values a session cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an empty name, an invalid top chronicle
    /// name or a zero lookup depth.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Configuration("database name is empty".to_string()));
        }
        self.naming_policy()
            .check_simple_name(&self.top_chronicle)
            .map_err(|e| {
                Error::Configuration(format!(
                    "invalid top chronicle '{}': {}",
                    self.top_chronicle, e
                ))
            })?;
        if self.max_lookup_depth == 0 {
            return Err(Error::Configuration(
                "max_lookup_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Naming policy described by this configuration.
    pub fn naming_policy(&self) -> DottedNamingPolicy {
        DottedNamingPolicy::new(self.top_chronicle.clone(), self.strict_name_space)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Chronicle store configuration
#
# Database name. Two sessions with the same name cannot be open at once.
name = "chronicle"

# Simple name of the (virtual) top chronicle.
top_chronicle = "bt"

# When true, full chronicle names must start with the top chronicle name
# ("bt.fx.usd"). When false, "fx.usd" is accepted as well.
strict_name_space = false

# Longest chronicle list accepted by attribute specificity lookups.
max_lookup_depth = 64
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: DatabaseConfig = toml::from_str(&content).map_err(|e| {
            Error::Configuration(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Configuration(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Configuration(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        let config = DatabaseConfig::default();
        assert_eq!(config.top_chronicle, "bt");
        assert_eq!(config.max_lookup_depth, 64);
        assert!(!config.strict_name_space);
        config.validate().unwrap();
    }

    #[test]
    fn default_toml_parses_correctly() {
        let config: DatabaseConfig = toml::from_str(DatabaseConfig::default_toml()).unwrap();
        assert_eq!(config, DatabaseConfig::default());
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        DatabaseConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        let config = DatabaseConfig::from_file(&path).unwrap();
        assert_eq!(config.name, "chronicle");
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "name = \"prices\"\nstrict_name_space = true\n").unwrap();

        DatabaseConfig::write_default_if_missing(&path).unwrap();

        let config = DatabaseConfig::from_file(&path).unwrap();
        assert_eq!(config.name, "prices");
        assert!(config.strict_name_space);
        assert_eq!(config.top_chronicle, "bt");
    }

    #[test]
    fn invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        std::fs::write(&path, "top_chronicle = \"a.b\"\n").unwrap();
        assert!(matches!(
            DatabaseConfig::from_file(&path),
            Err(Error::Configuration(_))
        ));

        std::fs::write(&path, "max_lookup_depth = 0\n").unwrap();
        assert!(DatabaseConfig::from_file(&path).is_err());

        std::fs::write(&path, "max_lookup_depth = \"deep\"\n").unwrap();
        assert!(DatabaseConfig::from_file(&path).is_err());
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = DatabaseConfig {
            name: "rates".to_string(),
            top_chronicle: "root".to_string(),
            strict_name_space: true,
            max_lookup_depth: 8,
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(DatabaseConfig::from_file(&path).unwrap(), config);
    }
}
