//! Runs lint sessions over a bounded worker pool and merges the results.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::audio::stream::StreamSource;
use crate::config::LintConfig;
use crate::engine::session::lint_file;
use crate::report::{FileReport, LintReport};
use crate::rules::registry::{RuleRegistry, RuleSet};
use crate::utils::parallel::{Progress, WorkerPool};
use crate::{ConfigError, Result};

/// Shared flag that stops a run from starting new files.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LintOptions {
    /// Files linted concurrently.
    pub jobs: usize,
    /// Per-file budget; exceeding it leaves that file incomplete.
    pub timeout: Option<Duration>,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self {
            jobs: num_cpus::get(),
            timeout: None,
        }
    }
}

impl LintOptions {
    pub fn from_config(config: &LintConfig) -> std::result::Result<Self, ConfigError> {
        let jobs = match config.jobs {
            Some(0) => return Err(ConfigError::NoWorkers),
            Some(jobs) => jobs,
            None => num_cpus::get(),
        };
        Ok(Self {
            jobs,
            timeout: config.timeout()?,
        })
    }
}

pub struct Linter<S> {
    source: S,
    rules: RuleSet,
    options: LintOptions,
    pool: WorkerPool,
}

impl<S: StreamSource> Linter<S> {
    pub fn new(source: S, rules: RuleSet, options: LintOptions) -> Result<Self> {
        if options.jobs == 0 {
            return Err(ConfigError::NoWorkers.into());
        }
        let pool = WorkerPool::new(options.jobs)?;
        Ok(Self {
            source,
            rules,
            options,
            pool,
        })
    }

    /// Validates `config` against the built-in registry and sets up the pool.
    pub fn from_config(source: S, config: &LintConfig) -> Result<Self> {
        let rules = RuleRegistry::builtin().resolve(&config.rules)?;
        let options = LintOptions::from_config(config)?;
        Self::new(source, rules, options)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn options(&self) -> &LintOptions {
        &self.options
    }

    pub fn lint<P: AsRef<Path>>(&self, paths: &[P]) -> LintReport {
        self.lint_until(paths, &CancelToken::new())
    }

    /// Lints every distinct path. Once `cancel` fires no new file is
    /// started; files already running finish and are reported.
    pub fn lint_until<P: AsRef<Path>>(&self, paths: &[P], cancel: &CancelToken) -> LintReport {
        let paths: Vec<PathBuf> = paths
            .iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if paths.is_empty() {
            return LintReport::from_sorted(Vec::new(), false);
        }

        info!(
            "Linting {} file(s) with {} rule(s) on {} worker(s)",
            paths.len(),
            self.rules.len(),
            self.pool.threads()
        );
        let progress = Progress::new(paths.len());

        let mut collected: BTreeMap<PathBuf, FileReport> = BTreeMap::new();
        self.pool.process_unordered(
            &paths,
            |path| {
                if cancel.is_cancelled() {
                    return None;
                }
                let report = lint_file(&self.source, path, &self.rules, self.options.timeout);
                progress.tick();
                Some(report)
            },
            |report| {
                collected.insert(report.path.clone(), report);
            },
        );

        let cancelled = collected.len() < paths.len();
        if cancelled {
            warn!(
                "Cancelled: {} of {} file(s) linted",
                progress.done(),
                paths.len()
            );
        }
        LintReport::from_sorted(collected.into_values().collect(), cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::memory::{MemoryFile, MemorySource};
    use crate::audio::metadata::AudioStreamMetadata;
    use crate::audio::stream::DecodedStream;
    use crate::report::{Outcome, Severity};
    use crate::DecodeError;

    fn source() -> MemorySource {
        let meta = AudioStreamMetadata::new(44_100, 1)
            .with_tag("ARTIST", "A")
            .with_tag("TITLE", "T");
        MemorySource::new()
            .with_file("a.wav", MemoryFile::generate(meta.clone(), 50, |_, _| 0.3))
            .with_file("b.wav", MemoryFile::unreadable("truncated header"))
            .with_file("c.wav", MemoryFile::generate(meta, 50, |i, _| if i == 9 { 1.0 } else { 0.3 }))
    }

    fn linter(jobs: usize) -> Linter<MemorySource> {
        let options = LintOptions { jobs, timeout: None };
        Linter::new(source(), RuleSet::defaults().unwrap(), options).unwrap()
    }

    #[test]
    fn reports_are_sorted_and_deduplicated() {
        let report = linter(2).lint(&["c.wav", "a.wav", "b.wav", "a.wav"]);
        let paths: Vec<&Path> = report.files.iter().map(|f| f.path.as_path()).collect();
        assert_eq!(
            paths,
            vec![Path::new("a.wav"), Path::new("b.wav"), Path::new("c.wav")]
        );
        assert!(!report.cancelled);
    }

    #[test]
    fn one_bad_file_does_not_affect_others() {
        let report = linter(3).lint(&["a.wav", "b.wav", "c.wav"]);
        assert_eq!(report.files[0].outcome, Outcome::Complete);
        assert_eq!(report.files[1].outcome, Outcome::Failed);
        assert_eq!(report.files[2].outcome, Outcome::Complete);
        assert_eq!(report.files[2].findings[0].rule, "clipping");
        assert_eq!(report.status, Some(Severity::Error));
        assert_eq!(report.summary.failed, 1);
    }

    #[test]
    fn empty_input_passes() {
        let report = linter(1).lint::<&str>(&[]);
        assert!(report.files.is_empty());
        assert_eq!(report.status, None);
    }

    #[test]
    fn cancelled_run_starts_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let report = linter(2).lint_until(&["a.wav", "c.wav"], &cancel);
        assert!(report.files.is_empty());
        assert!(report.cancelled);
    }

    /// Cancels the run as soon as the first file is opened.
    struct CancelOnOpen {
        inner: MemorySource,
        cancel: CancelToken,
    }

    impl StreamSource for CancelOnOpen {
        fn open(&self, path: &Path) -> std::result::Result<DecodedStream, DecodeError> {
            self.cancel.cancel();
            self.inner.open(path)
        }
    }

    #[test]
    fn cancel_during_run_keeps_finished_files() {
        let meta = AudioStreamMetadata::new(44_100, 1)
            .with_tag("ARTIST", "A")
            .with_tag("TITLE", "T");
        let paths: Vec<String> = (0..5).map(|i| format!("f{}.wav", i)).collect();
        let mut inner = MemorySource::new();
        for path in &paths {
            inner.insert(path.as_str(), MemoryFile::generate(meta.clone(), 20, |_, _| 0.3));
        }
        let cancel = CancelToken::new();
        let source = CancelOnOpen {
            inner,
            cancel: cancel.clone(),
        };
        let options = LintOptions { jobs: 1, timeout: None };
        let linter = Linter::new(source, RuleSet::defaults().unwrap(), options).unwrap();

        let report = linter.lint_until(&paths, &cancel);
        assert!(report.cancelled);
        assert!(!report.files.is_empty());
        assert!(report.files.len() < paths.len());
        assert!(report.files.windows(2).all(|w| w[0].path < w[1].path));
        for file in &report.files {
            assert_eq!(file.outcome, Outcome::Complete);
            assert!(paths.iter().any(|p| file.path == Path::new(p)));
        }
        assert_eq!(report.summary.files, report.files.len());
    }

    #[test]
    fn huge_timeout_does_not_abort_the_run() {
        let config = LintConfig {
            jobs: Some(2),
            timeout_secs: Some(1.5e19),
            ..LintConfig::default()
        };
        let linter = Linter::from_config(source(), &config).unwrap();
        let report = linter.lint(&["a.wav", "c.wav"]);
        assert_eq!(report.files.len(), 2);
        assert!(report.files.iter().all(|f| f.outcome == Outcome::Complete));
    }

    #[test]
    fn zero_jobs_is_a_config_error() {
        let options = LintOptions { jobs: 0, timeout: None };
        let result = Linter::new(source(), RuleSet::defaults().unwrap(), options);
        assert!(matches!(
            result,
            Err(crate::AudioLintError::Config(ConfigError::NoWorkers))
        ));
    }

    #[test]
    fn options_come_from_config() {
        let config = LintConfig {
            jobs: Some(3),
            timeout_secs: Some(2.0),
            ..LintConfig::default()
        };
        let options = LintOptions::from_config(&config).unwrap();
        assert_eq!(options.jobs, 3);
        assert_eq!(options.timeout, Some(Duration::from_secs(2)));
    }
}
