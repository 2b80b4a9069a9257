//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{AppConfig, CommandConfig};

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./isorun.yaml",
    "./isorun.yml",
    "./isorun.json",
    "./.isorun.yaml",
    "~/.config/isorun/config.yaml",
];

const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

const MAX_CONTEXT_LINES: usize = 50;

/// Full configuration file structure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Runner settings
    #[serde(default)]
    pub runner: AppConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            runner: AppConfig::default(),
        }
    }
}

impl ConfigFile {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self> {
        if let Some(path) = Self::find() {
            tracing::debug!("Using config file {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from file.
    ///
    /// Values are checked by [`ConfigFile::validate`] once overrides have
    /// been applied, not here.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        // Create parent directory if needed
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        let runner = &self.runner;
        if runner.timeout_ms == 0 {
            anyhow::bail!("timeout_ms must be greater than 0");
        }
        if runner.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        if runner.max_context_lines > MAX_CONTEXT_LINES {
            anyhow::bail!(
                "max_context_lines {} exceeds the limit of {}",
                runner.max_context_lines,
                MAX_CONTEXT_LINES
            );
        }
        if runner.command.program.trim().is_empty() {
            anyhow::bail!("command.program must not be empty");
        }

        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        let mut context = BTreeMap::new();
        context.insert("NODE_ENV".to_string(), serde_json::json!("test"));
        context.insert("ISORUN_SEED".to_string(), serde_json::json!(42));

        Self {
            version: "1.0".to_string(),
            runner: AppConfig {
                timeout_ms: 10_000,
                concurrency: 4,
                command: CommandConfig {
                    program: "node".to_string(),
                    args: vec!["--enable-source-maps".to_string()],
                },
                context,
                ..AppConfig::default()
            },
        }
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_default() {
        let config = ConfigFile::default();
        assert_eq!(config.version, "1.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_save_load_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("isorun.yaml");

        let config = ConfigFile::example();
        config.save(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_file_save_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("isorun.json");

        let config = ConfigFile::example();
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.trim_start().starts_with('{'));
        assert_eq!(ConfigFile::load(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_config() {
        let mut config = ConfigFile::default();
        config.runner.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = ConfigFile::default();
        config.runner.max_context_lines = 51;
        assert!(config.validate().is_err());

        let mut config = ConfigFile::default();
        config.runner.command.program = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = ConfigFile::default();
        config.version = "2.0".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_defers_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("isorun.yaml");
        std::fs::write(&path, "version: \"1.0\"\nrunner:\n  timeout_ms: 0\n").unwrap();

        let config = ConfigFile::load(&path).unwrap();
        assert_eq!(config.runner.timeout_ms, 0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_ms"));
    }

    #[test]
    fn test_expand_path() {
        let path = expand_path("./test.yaml");
        assert_eq!(path, PathBuf::from("./test.yaml"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/x.yaml"), home.join("x.yaml"));
        }
    }
}
