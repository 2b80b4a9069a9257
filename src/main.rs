//! isorun - isolated script test runner
//!
//! Runs script test units in fresh interpreter processes with a bounded
//! number in flight, maps failures back to original sources through
//! source maps and reports a single run verdict.
//!
//! ## Usage
//!
//! ```bash
//! # Run units with the default batch strategy
//! isorun run tests/*.test.js
//!
//! # Keep eight units in flight and emit JSON
//! isorun run tests/*.test.js -j 8 --strategy continuous --format json
//!
//! # Write an example configuration file
//! isorun config init
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info};

mod cli;
mod config;
mod diagnostics;
mod executor;
mod models;
mod output;
mod pool;
mod results;
mod utils;

use cli::Args;
use config::{AppConfig, ConfigFile, EnvConfig};
use executor::{
    merge_contexts, ContextProvider, FileTransform, ProcessEnvContext, ProcessExecutor,
    StaticContext,
};
use models::Unit;
use output::{OutputFormat, ResultFormatter, StatusPrinter};
use pool::{Pool, StatusBoard, StrategyKind};
use results::RunSummary;
use utils::{init_logger, LogLevel};

/// Exit code for configuration and setup errors
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let env = EnvConfig::load();

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        env.log
            .as_deref()
            .and_then(LogLevel::from_str)
            .unwrap_or(LogLevel::Info)
    };
    init_logger(level);

    let outcome = match args.command {
        cli::Command::Run(run_args) => run_units(run_args, &env).await,
        cli::Command::Config(config_args) => {
            manage_config(config_args, &env).map(|_| ExitCode::SUCCESS)
        }
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

async fn run_units(args: cli::RunArgs, env: &EnvConfig) -> Result<ExitCode> {
    let config = resolve_config(&args, env)?;
    let units = discover_units(&args.files)?;

    info!(
        "Executing {} unit(s) with {}",
        units.len(),
        config.command.program
    );

    let mut providers: Vec<Box<dyn ContextProvider>> = Vec::new();
    if config.inherit_env {
        providers.push(Box::new(ProcessEnvContext));
    }
    providers.push(Box::new(StaticContext::new(config.context.clone())));
    let context = merge_contexts(&providers);

    let (board, events) = StatusBoard::channel();
    let board = Arc::new(board);
    let printer = StatusPrinter::new(board.clone());
    let printer = if config.color { printer } else { printer.no_color() };
    let watcher = tokio::spawn(printer.follow(events));

    let executor = ProcessExecutor::new(&config.command.program)
        .with_args(config.command.args.clone());
    let pool = Pool::new(Arc::new(FileTransform), Arc::new(executor))
        .with_concurrency(config.concurrency)
        .with_timeout(config.timeout())
        .with_strategy(config.strategy.build())
        .with_status_board(board)
        .with_context(context);

    let started_at = chrono::Utc::now();
    let store = pool.run(units).await;
    let finished_at = chrono::Utc::now();

    if let Ok(done) = watcher.await {
        debug!("Status printer saw {} completed unit(s)", done);
    }

    let summary = RunSummary::new(&store, started_at, finished_at);
    let formatter = ResultFormatter::new(config.format).max_lines(config.max_context_lines);
    let formatter = if config.color { formatter } else { formatter.no_color() };
    formatter.print_run(&summary)?;

    Ok(ExitCode::from(store.exit_code() as u8))
}

/// Defaults, then the config file, then `ISORUN_*` variables, then flags
fn resolve_config(args: &cli::RunArgs, env: &EnvConfig) -> Result<AppConfig> {
    let config_path = args
        .config
        .clone()
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));

    let mut file = match config_path {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };

    let config = &mut file.runner;
    env.apply_to(config);

    if let Some(timeout) = args.timeout {
        config.timeout_ms = timeout;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(name) = &args.strategy {
        config.strategy = StrategyKind::from_str(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown strategy: {name}"))?;
    }
    if let Some(name) = &args.format {
        config.format = OutputFormat::from_str(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown output format: {name}"))?;
    }
    if let Some(max_lines) = args.max_lines {
        config.max_context_lines = max_lines;
    }
    if args.no_color {
        config.color = false;
    }
    if let Some(program) = &args.program {
        config.command.program = program.clone();
    }
    if !args.args.is_empty() {
        config.command.args = args.args.clone();
    }

    file.validate()?;
    Ok(file.runner)
}

/// Canonical unit paths in command-line order, without repeats
fn discover_units(files: &[PathBuf]) -> Result<Vec<Unit>> {
    let mut seen = HashSet::new();
    let mut units = Vec::with_capacity(files.len());

    for file in files {
        let path = canonical(file)?;
        if seen.insert(path.clone()) {
            units.push(Unit::new(path.to_string_lossy()));
        } else {
            debug!("Skipping repeated unit {}", path.display());
        }
    }

    if units.is_empty() {
        anyhow::bail!("No units to run");
    }
    Ok(units)
}

fn canonical(file: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(file).with_context(|| format!("Unit not found: {}", file.display()))
}

fn manage_config(args: cli::ConfigArgs, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            ConfigFile::example().save(path)?;
            println!("✓ Configuration file created: {output}");
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { format } => {
            let mut config = match &env.config_file {
                Some(path) => ConfigFile::load(path)?,
                None => ConfigFile::load_default()?,
            };
            env.apply_to(&mut config.runner);
            config.validate()?;

            let output = if format == "json" {
                serde_json::to_string_pretty(&config)?
            } else {
                serde_yaml::to_string(&config)?
            };
            println!("{output}");
        }

        cli::ConfigAction::Env => {
            config::print_env_help();
            println!();
            env.print_summary();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn run_args(extra: &[&str]) -> cli::RunArgs {
        let mut argv = vec!["isorun", "run", "unit.js"];
        argv.extend_from_slice(extra);
        match Args::parse_from(argv).command {
            cli::Command::Run(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_discover_units_dedups_in_order() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.js");
        let b = dir.path().join("b.js");
        std::fs::write(&a, "").unwrap();
        std::fs::write(&b, "").unwrap();

        let repeated = dir.path().join(".").join("a.js");
        let units = discover_units(&[b.clone(), a.clone(), repeated]).unwrap();

        assert_eq!(units.len(), 2);
        assert!(units[0].as_str().ends_with("b.js"));
        assert!(units[1].as_str().ends_with("a.js"));
        assert!(Path::new(units[0].as_str()).is_absolute());
    }

    #[test]
    fn test_discover_units_missing_file() {
        let err = discover_units(&[PathBuf::from("/definitely/not/here.js")]).unwrap_err();
        assert!(err.to_string().contains("Unit not found"));
    }

    #[test]
    fn test_flags_override_file_and_env() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("isorun.yaml");
        std::fs::write(
            &path,
            "version: \"1.0\"\nrunner:\n  timeout_ms: 900\n  concurrency: 2\n",
        )
        .unwrap();

        let env = EnvConfig {
            concurrency: Some(6),
            ..Default::default()
        };
        let path = path.to_string_lossy().to_string();
        let args = run_args(&["--config", &path, "--strategy", "continuous", "--no-color"]);

        let config = resolve_config(&args, &env).unwrap();
        assert_eq!(config.timeout_ms, 900);
        assert_eq!(config.concurrency, 6);
        assert_eq!(config.strategy, StrategyKind::Continuous);
        assert!(!config.color);

        let args = run_args(&["--config", &path, "-j", "3"]);
        assert_eq!(resolve_config(&args, &env).unwrap().concurrency, 3);
    }

    #[test]
    fn test_flags_repair_invalid_file_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("isorun.yaml");
        std::fs::write(&path, "version: \"1.0\"\nrunner:\n  concurrency: 0\n").unwrap();
        let path = path.to_string_lossy().to_string();
        let env = EnvConfig::default();

        let config = resolve_config(&run_args(&["--config", &path, "-j", "3"]), &env).unwrap();
        assert_eq!(config.concurrency, 3);

        assert!(resolve_config(&run_args(&["--config", &path]), &env).is_err());
    }

    #[test]
    fn test_invalid_overrides_are_rejected() {
        let env = EnvConfig::default();
        let dir = tempdir().unwrap();
        let path = dir.path().join("isorun.json");
        ConfigFile::default().save(&path).unwrap();
        let path = path.to_string_lossy().to_string();

        assert!(resolve_config(&run_args(&["--config", &path, "--format", "xml"]), &env).is_err());
        assert!(resolve_config(&run_args(&["--config", &path, "-j", "0"]), &env).is_err());
    }
}
