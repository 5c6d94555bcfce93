use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use audio_lint::cli::commands::{apply_overrides, Cli, Commands};
use audio_lint::cli::interrupt::cancel_on_interrupt;
use audio_lint::utils::file_ops::discover_audio_files;
use audio_lint::utils::reporting::Reporter;
use audio_lint::{AudioLintError, CancelToken, LintConfig, Linter, RuleRegistry, SymphoniaSource};
use clap::Parser;
use log::{info, warn};

const EXIT_CLEAN: i32 = 0;
const EXIT_ERRORS: i32 = 1;
const EXIT_FAILURE: i32 = 2;

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let code = match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_FAILURE
        }
    };
    process::exit(code);
}

fn run(command: Commands) -> audio_lint::Result<i32> {
    match command {
        Commands::Check {
            paths,
            config,
            jobs,
            timeout,
            enable,
            disable,
            format,
            output,
        } => {
            let mut lint_config = match config {
                Some(path) => {
                    info!("Loading configuration from {}", path.display());
                    LintConfig::from_path(path)?
                }
                None => LintConfig::default(),
            };
            apply_overrides(&mut lint_config, jobs, timeout, &enable, &disable);

            let linter = Linter::from_config(SymphoniaSource::new(), &lint_config)?;
            info!("Active rules: {}", linter.rules().names().join(", "));
            let options = linter.options();
            match options.timeout {
                Some(limit) => info!("{} worker(s), {:?} per file", options.jobs, limit),
                None => info!("{} worker(s), no per-file limit", options.jobs),
            }

            let files = discover_audio_files(&paths);
            if files.is_empty() {
                warn!("No audio files found to lint");
            }
            info!("Found {} audio file(s)", files.len());

            let cancel = CancelToken::new();
            if let Err(e) = cancel_on_interrupt(cancel.clone()) {
                warn!("Ctrl-C will not stop the run cleanly: {}", e);
            }
            let report = linter.lint_until(&files, &cancel);
            write_report(&Reporter::new(format), &report, output)?;

            Ok(if report.has_errors() {
                EXIT_ERRORS
            } else {
                EXIT_CLEAN
            })
        }

        Commands::Rules { format } => {
            let catalog = RuleRegistry::builtin().catalog();
            Reporter::new(format).write_rules(&catalog, io::stdout().lock())?;
            Ok(EXIT_CLEAN)
        }
    }
}

fn write_report(
    reporter: &Reporter,
    report: &audio_lint::LintReport,
    output: Option<PathBuf>,
) -> Result<(), AudioLintError> {
    match output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(&path)?);
            reporter.write(report, &mut writer)?;
            writer.flush()?;
            info!("Report saved to: {}", path.display());
        }
        None => reporter.write(report, io::stdout().lock())?,
    }
    Ok(())
}
