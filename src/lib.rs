//! Streaming quality and integrity checks for audio files.
//!
//! Files are decoded once, frame by frame, and every active rule sees the
//! stream in a single pass. Results are merged into a [`LintReport`] ordered
//! by path, so reports are stable regardless of how many workers ran.

use std::path::PathBuf;
use std::time::Duration;

pub mod audio;
pub mod cli;
pub mod config;
pub mod engine;
pub mod report;
pub mod rules;
pub mod utils;

/// Fatal problems with the run's configuration. Raised before any file is read.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("unknown rule: {0}")]
    UnknownRule(String),
    #[error("invalid parameters for rule {rule}: {message}")]
    InvalidParams { rule: String, message: String },
    #[error("parameter {param} of rule {rule} out of range: {message}")]
    OutOfRange {
        rule: String,
        param: &'static str,
        message: String,
    },
    #[error("worker count must be at least 1")]
    NoWorkers,
    #[error("timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(f64),
}

/// A file that could not be (fully) decoded. Recorded in that file's report.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("stream has no default audio track")]
    MissingTrack,
    #[error("unsupported codec")]
    UnsupportedCodec,
    #[error("stream does not advertise a sample rate")]
    MissingSampleRate,
    #[error("stream does not advertise a channel layout")]
    MissingChannels,
    #[error("corrupt stream: {0}")]
    Corrupt(String),
    #[error("malformed block of {samples} samples for {channels} channels")]
    MalformedBlock { samples: usize, channels: u16 },
    #[error("gave up after {0:?}")]
    Timeout(Duration),
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        DecodeError::Io(err.to_string())
    }
}

/// A rule that cannot continue on the data it was given.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuleInternalError {
    #[error("non-finite sample on channel {channel} at frame {frame}")]
    NonFiniteSample { frame: u64, channel: usize },
    #[error("frame {frame} has {actual} channels, expected {expected}")]
    ChannelMismatch {
        frame: u64,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum AudioLintError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, AudioLintError>;

// Re-exports for convenience
pub use audio::memory::{MemoryFile, MemorySource};
pub use audio::metadata::AudioStreamMetadata;
pub use audio::stream::{DecodedStream, FrameStream, SampleFrame, StreamSource, SymphoniaSource};
pub use config::{LintConfig, RuleConfig, RuleSettings};
pub use engine::orchestrator::{CancelToken, LintOptions, Linter};
pub use engine::session::lint_file;
pub use report::{FileReport, Finding, LintReport, Location, Outcome, Severity, Summary};
pub use rules::registry::{RuleInfo, RuleRegistry, RuleSet};
pub use rules::{Hooks, Rule};
