use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::LintConfig;
use crate::utils::reporting::ReportFormat;

#[derive(Parser)]
#[command(name = "audio-lint")]
#[command(version)]
#[command(about = "Report quality and integrity problems in audio files without touching them", long_about = None)]
pub struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Lint audio files and directories
    Check {
        /// Files or directories to lint
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// TOML configuration file
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Number of files linted in parallel
        #[arg(short = 'j', long)]
        jobs: Option<usize>,

        /// Per-file time limit in seconds
        #[arg(long)]
        timeout: Option<f64>,

        /// Enable a rule (repeatable)
        #[arg(long = "enable", value_name = "RULE")]
        enable: Vec<String>,

        /// Disable a rule (repeatable)
        #[arg(long = "disable", value_name = "RULE")]
        disable: Vec<String>,

        /// Report format
        #[arg(short = 'f', long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,

        /// Write the report here instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// List the available rules
    Rules {
        #[arg(short = 'f', long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },
}

/// Applies command-line overrides on top of the file configuration.
pub fn apply_overrides(
    config: &mut LintConfig,
    jobs: Option<usize>,
    timeout: Option<f64>,
    enable: &[String],
    disable: &[String],
) {
    if jobs.is_some() {
        config.jobs = jobs;
    }
    if timeout.is_some() {
        config.timeout_secs = timeout;
    }
    for rule in enable {
        config.rules.enable(rule);
    }
    for rule in disable {
        config.rules.disable(rule);
    }
}
