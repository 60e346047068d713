//! CLI configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via MARSHAL_CONFIG or --config)
//! 3. Environment variables

use marshal_buffer::DEFAULT_MAX_MANAGED_LENGTH;
use marshal_protocol::DEFAULT_PACKAGE_EXTENSION;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Codec limits.
    pub codec: CodecConfig,
    /// Package directory.
    pub packages: PackagesConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from `path` (or MARSHAL_CONFIG), then applies
    /// environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match std::env::var("MARSHAL_CONFIG") {
                Ok(path) => Self::from_file(&path)?,
                Err(_) => Self::default(),
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`, keyed by environment variable name.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.codec.apply_overrides(&lookup);
        self.packages.apply_overrides(&lookup);
        self.logging.apply_overrides(&lookup);
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.codec.max_managed_length == 0 {
            return Err(ConfigError::ValidationError(
                "codec.max_managed_length must be greater than zero".to_string(),
            ));
        }
        if self.packages.extension.is_empty() || self.packages.extension.contains('.') {
            return Err(ConfigError::ValidationError(format!(
                "invalid package extension '{}'",
                self.packages.extension
            )));
        }
        Ok(())
    }
}

/// Codec configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Largest managed length (and managed body) accepted, in bytes.
    pub max_managed_length: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_managed_length: DEFAULT_MAX_MANAGED_LENGTH,
        }
    }
}

impl CodecConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(max) = lookup("MARSHAL_MAX_MANAGED_LENGTH") {
            if let Ok(n) = max.parse() {
                self.max_managed_length = n;
            }
        }
    }
}

/// Package directory configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagesConfig {
    /// Directory holding package files.
    pub directory: PathBuf,
    /// Package file extension, without the dot.
    pub extension: String,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./packages"),
            extension: DEFAULT_PACKAGE_EXTENSION.to_string(),
        }
    }
}

impl PackagesConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("MARSHAL_PACKAGE_DIR") {
            self.directory = PathBuf::from(dir);
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, used when RUST_LOG is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(filter) = lookup("MARSHAL_LOG") {
            if !filter.is_empty() {
                self.filter = filter;
            }
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.codec.max_managed_length, 16 * 1024 * 1024);
        assert_eq!(config.packages.directory, PathBuf::from("./packages"));
        assert_eq!(config.packages.extension, "pack");
        assert_eq!(config.logging.filter, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("marshal.yaml");

        let mut config = Config::default();
        config.packages.directory = PathBuf::from("/srv/packages");
        config.codec.max_managed_length = 4096;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("marshal.yaml");
        std::fs::write(&path, "packages:\n  extension: pkg\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.packages.extension, "pkg");
        assert_eq!(config.packages.directory, PathBuf::from("./packages"));
        assert_eq!(config.codec, CodecConfig::default());
    }

    #[test]
    fn test_file_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            Config::from_file(&missing),
            Err(ConfigError::IoError(..))
        ));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "codec: [unclosed").unwrap();
        let err = Config::from_file(&bad).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MARSHAL_PACKAGE_DIR", "/tmp/packs"),
            ("MARSHAL_MAX_MANAGED_LENGTH", "1024"),
            ("MARSHAL_LOG", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.packages.directory, PathBuf::from("/tmp/packs"));
        assert_eq!(config.codec.max_managed_length, 1024);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_invalid_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "MARSHAL_MAX_MANAGED_LENGTH" => Some("lots".to_string()),
            _ => None,
        });
        assert_eq!(config.codec, CodecConfig::default());
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.codec.max_managed_length = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = Config::default();
        config.packages.extension = "tar.gz".to_string();
        assert!(config.validate().is_err());
    }
}
