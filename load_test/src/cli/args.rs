use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use moleculer_engine::runtime::process::DEFAULT_READY_PATTERN;
use moleculer_engine::runtime::ProcessRunnerOptions;

/// Moleculer Load Testing Tool
#[derive(Parser, Debug)]
#[command(name = "moleculer-load")]
#[command(about = "Load testing tool for Moleculer broker startup and shutdown")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Mode {
    /// Run a load-test script (runs until all phases finish or Ctrl+C)
    Run(RunArgs),

    /// Parse a script and print the compiled steps of every scenario
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the YAML script
    pub script: PathBuf,

    #[command(flatten)]
    pub runner: RuntimeArgs,

    /// Metrics reporting interval in seconds
    #[arg(long, default_value = "5")]
    pub report_interval: u64,

    /// Disable the live console report (final report is still printed)
    #[arg(long)]
    pub no_live_report: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RuntimeArgs {
    /// Program that launches a broker
    #[arg(
        long,
        default_value = "npx",
        env = "MOLECULER_RUNNER_PROGRAM"
    )]
    pub runner_program: String,

    /// Arguments passed to the program before the step options (repeatable)
    #[arg(
        long = "runner-arg",
        default_value = "moleculer-runner",
        allow_hyphen_values = true
    )]
    pub runner_args: Vec<String>,

    /// Broker stdout line marking it as ready
    #[arg(long, default_value = DEFAULT_READY_PATTERN)]
    pub ready_pattern: String,

    /// Seconds to wait for a broker to become ready
    #[arg(long, default_value = "30")]
    pub ready_timeout: u64,
}

impl RuntimeArgs {
    pub fn to_options(&self) -> ProcessRunnerOptions {
        ProcessRunnerOptions {
            program: self.runner_program.clone(),
            base_args: self.runner_args.clone(),
            ready_pattern: self.ready_pattern.clone(),
            ready_timeout: Duration::from_secs(self.ready_timeout),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Path to the YAML script
    pub script: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["moleculer-load", "run", "bench.yml"]).expect("parse");
        let Mode::Run(args) = cli.mode else {
            panic!("expected run mode");
        };
        assert_eq!(args.script, PathBuf::from("bench.yml"));
        assert_eq!(args.report_interval, 5);

        let options = args.runner.to_options();
        assert_eq!(options.base_args, vec!["moleculer-runner".to_string()]);
        assert_eq!(options.ready_pattern, DEFAULT_READY_PATTERN);
        assert_eq!(options.ready_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_runner_overrides() {
        let cli = Cli::try_parse_from([
            "moleculer-load",
            "run",
            "bench.yml",
            "--runner-program",
            "node",
            "--runner-arg",
            "node_modules/.bin/moleculer-runner",
            "--runner-arg",
            "--silent",
            "--ready-timeout",
            "5",
        ])
        .expect("parse");
        let Mode::Run(args) = cli.mode else {
            panic!("expected run mode");
        };
        let options = args.runner.to_options();
        assert_eq!(options.program, "node");
        assert_eq!(
            options.base_args,
            vec!["node_modules/.bin/moleculer-runner", "--silent"]
        );
        assert_eq!(options.ready_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_mode() {
        let cli = Cli::try_parse_from(["moleculer-load", "validate", "bench.yml", "-v"])
            .expect("parse");
        assert!(matches!(cli.mode, Mode::Validate(ValidateArgs { verbose: true, .. })));
    }
}
