//! Configuration module
//!
//! Handles loading and managing configuration.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::ConfigFile;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::output::OutputFormat;
use crate::pool::StrategyKind;

/// Runner configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Per-unit time budget in milliseconds
    pub timeout_ms: u64,

    /// Maximum units in flight
    pub concurrency: usize,

    /// Scheduling strategy
    pub strategy: StrategyKind,

    /// Program that executes a unit
    pub command: CommandConfig,

    /// Static context handed to every unit
    pub context: BTreeMap<String, serde_json::Value>,

    /// Source lines shown on each side of a failing line
    pub max_context_lines: usize,

    /// Report format
    pub format: OutputFormat,

    /// Colorize console output
    pub color: bool,

    /// Start the context from the current process environment
    pub inherit_env: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            concurrency: 4,
            strategy: StrategyKind::Batch,
            command: CommandConfig::default(),
            context: BTreeMap::new(),
            max_context_lines: 3,
            format: OutputFormat::Console,
            color: true,
            inherit_env: true,
        }
    }
}

impl AppConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Unit interpreter invocation: `program args... <unit file>`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: "node".to_string(),
            args: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.strategy, StrategyKind::Batch);
        assert_eq!(config.command.program, "node");
        assert!(config.inherit_env);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: AppConfig = serde_yaml::from_str(
            "concurrency: 2\nstrategy: continuous\ncommand:\n  program: deno\n  args: [run]\n",
        )
        .unwrap();

        assert_eq!(config.concurrency, 2);
        assert_eq!(config.strategy, StrategyKind::Continuous);
        assert_eq!(config.command.args, vec!["run".to_string()]);
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.format, OutputFormat::Console);
    }
}
