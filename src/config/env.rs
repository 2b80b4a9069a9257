//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;
use tracing::warn;

use super::AppConfig;
use crate::output::OutputFormat;
use crate::pool::StrategyKind;

/// Environment variable prefix
const ENV_PREFIX: &str = "ISORUN";

/// Overrides read from `ISORUN_*` environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Timeout from ISORUN_TIMEOUT (milliseconds)
    pub timeout: Option<u64>,
    /// Concurrency from ISORUN_CONCURRENCY
    pub concurrency: Option<usize>,
    /// Strategy from ISORUN_STRATEGY
    pub strategy: Option<String>,
    /// Config file from ISORUN_CONFIG
    pub config_file: Option<String>,
    /// Output format from ISORUN_FORMAT
    pub format: Option<String>,
    /// Disable colors from ISORUN_NO_COLOR
    pub no_color: Option<bool>,
    /// Log level from ISORUN_LOG
    pub log: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            timeout: get_env_parse("TIMEOUT"),
            concurrency: get_env_parse("CONCURRENCY"),
            strategy: get_env("STRATEGY"),
            config_file: get_env("CONFIG"),
            format: get_env("FORMAT"),
            no_color: get_env_bool("NO_COLOR"),
            log: get_env("LOG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.timeout.is_some()
            || self.concurrency.is_some()
            || self.strategy.is_some()
            || self.config_file.is_some()
            || self.format.is_some()
            || self.no_color.is_some()
            || self.log.is_some()
    }

    /// Apply the overrides on top of a loaded configuration.
    ///
    /// Unrecognized strategy or format names are logged and ignored.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(timeout) = self.timeout {
            config.timeout_ms = timeout;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(name) = &self.strategy {
            match StrategyKind::from_str(name) {
                Some(strategy) => config.strategy = strategy,
                None => warn!("Ignoring unknown {}_STRATEGY: {}", ENV_PREFIX, name),
            }
        }
        if let Some(name) = &self.format {
            match OutputFormat::from_str(name) {
                Some(format) => config.format = format,
                None => warn!("Ignoring unknown {}_FORMAT: {}", ENV_PREFIX, name),
            }
        }
        if self.no_color == Some(true) {
            config.color = false;
        }
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_TIMEOUT:      {:?}", ENV_PREFIX, self.timeout);
        println!("  {}_CONCURRENCY:  {:?}", ENV_PREFIX, self.concurrency);
        println!("  {}_STRATEGY:     {:?}", ENV_PREFIX, self.strategy);
        println!("  {}_CONFIG:       {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_FORMAT:       {:?}", ENV_PREFIX, self.format);
        println!("  {}_NO_COLOR:     {:?}", ENV_PREFIX, self.no_color);
        println!("  {}_LOG:          {:?}", ENV_PREFIX, self.log);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables (useful for testing)
#[cfg(test)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

#[cfg(test)]
impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    /// Set any `ISORUN_` variable by its suffix
    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all ISORUN environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_TIMEOUT       Per-unit time budget in milliseconds");
    println!("  {ENV_PREFIX}_CONCURRENCY   Maximum units in flight");
    println!("  {ENV_PREFIX}_STRATEGY      Scheduling strategy (batch, continuous)");
    println!("  {ENV_PREFIX}_CONFIG        Path to configuration file");
    println!("  {ENV_PREFIX}_FORMAT        Report format (console, json)");
    println!("  {ENV_PREFIX}_NO_COLOR      Disable colored output (true/false)");
    println!("  {ENV_PREFIX}_LOG           Log level (trace, debug, info, warn, error)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_CONCURRENCY=8");
    println!("  isorun run tests/*.js");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(!config.has_any());

        let mut app = AppConfig::default();
        config.apply_to(&mut app);
        assert_eq!(app, AppConfig::default());
    }

    #[test]
    fn test_env_builder() {
        let _guard = EnvBuilder::new()
            .var("TIMEOUT", "750")
            .var("CONCURRENCY", "9")
            .apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.timeout, Some(750));
        assert_eq!(config.concurrency, Some(9));
        assert!(config.has_any());
    }

    #[test]
    fn test_apply_overrides() {
        let env = EnvConfig {
            strategy: Some("continuous".to_string()),
            format: Some("json".to_string()),
            no_color: Some(true),
            timeout: Some(100),
            ..Default::default()
        };

        let mut app = AppConfig::default();
        env.apply_to(&mut app);
        assert_eq!(app.strategy, StrategyKind::Continuous);
        assert_eq!(app.format, OutputFormat::Json);
        assert!(!app.color);
        assert_eq!(app.timeout_ms, 100);
    }

    #[test]
    fn test_unknown_names_are_ignored() {
        let env = EnvConfig {
            strategy: Some("random".to_string()),
            format: Some("xml".to_string()),
            ..Default::default()
        };

        let mut app = AppConfig::default();
        env.apply_to(&mut app);
        assert_eq!(app.strategy, StrategyKind::Batch);
        assert_eq!(app.format, OutputFormat::Console);
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = EnvBuilder::new().var("NO_COLOR", "yes").apply_scoped();
        assert_eq!(get_env_bool("NO_COLOR"), Some(true));
    }
}
