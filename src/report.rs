//! Findings and the per-file and run-wide reports built from them.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::audio::metadata::AudioStreamMetadata;

/// Ordered severity; also used for status roll-up (max wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in the stream a finding applies, in zero-based frame indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Location {
    Frame { offset: u64 },
    /// Inclusive on both ends.
    Span { start: u64, end: u64 },
}

impl Location {
    pub fn start(&self) -> u64 {
        match *self {
            Location::Frame { offset } => offset,
            Location::Span { start, .. } => start,
        }
    }

    pub fn end(&self) -> u64 {
        match *self {
            Location::Frame { offset } => offset,
            Location::Span { end, .. } => end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Finding {
    pub fn new(rule: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, offset: u64) -> Self {
        self.location = Some(Location::Frame { offset });
        self
    }

    pub fn spanning(mut self, start: u64, end: u64) -> Self {
        self.location = Some(Location::Span { start, end });
        self
    }
}

/// How far a file got through its lint session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Every frame was decoded and every rule finalized.
    Complete,
    /// Decoding stopped early; findings cover the decoded prefix.
    Incomplete,
    /// The file could not be opened; there are no findings.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: Outcome,
    pub status: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AudioStreamMetadata>,
    pub frames: u64,
    pub findings: Vec<Finding>,
}

impl FileReport {
    pub fn new(
        path: PathBuf,
        outcome: Outcome,
        error: Option<String>,
        metadata: Option<AudioStreamMetadata>,
        frames: u64,
        findings: Vec<Finding>,
    ) -> Self {
        let mut report = Self {
            path,
            outcome,
            status: None,
            error,
            metadata,
            frames,
            findings,
        };
        report.status = report.compute_status();
        report
    }

    /// A file that never produced any metadata.
    pub fn failed(path: PathBuf, error: String) -> Self {
        Self::new(path, Outcome::Failed, Some(error), None, 0, Vec::new())
    }

    fn compute_status(&self) -> Option<Severity> {
        let worst = self.findings.iter().map(|f| f.severity).max();
        if self.outcome == Outcome::Complete {
            worst
        } else {
            Some(Severity::Error)
        }
    }

    pub fn is_clean(&self) -> bool {
        self.status.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub files: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LintReport {
    pub status: Option<Severity>,
    pub cancelled: bool,
    pub summary: Summary,
    pub files: Vec<FileReport>,
}

impl LintReport {
    /// Builds the report; `files` must already be in path order.
    pub fn from_sorted(files: Vec<FileReport>, cancelled: bool) -> Self {
        let mut summary = Summary {
            files: files.len(),
            ..Summary::default()
        };
        for file in &files {
            if file.outcome != Outcome::Complete {
                summary.failed += 1;
            }
            for finding in &file.findings {
                match finding.severity {
                    Severity::Error => summary.errors += 1,
                    Severity::Warning => summary.warnings += 1,
                    Severity::Info => summary.infos += 1,
                }
            }
        }
        let status = files.iter().filter_map(|f| f.status).max();
        Self {
            status,
            cancelled,
            summary,
            files,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.status == Some(Severity::Error)
    }

    pub fn total_findings(&self) -> usize {
        self.summary.errors + self.summary.warnings + self.summary.infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert_eq!(
            [Severity::Warning, Severity::Info].iter().max(),
            Some(&Severity::Warning)
        );
    }

    #[test]
    fn status_is_worst_finding() {
        let report = FileReport::new(
            PathBuf::from("a.wav"),
            Outcome::Complete,
            None,
            None,
            10,
            vec![
                Finding::new("clipping", Severity::Warning, "clipped").at(3),
                Finding::new("metadata-completeness", Severity::Info, "low rate"),
            ],
        );
        assert_eq!(report.status, Some(Severity::Warning));
        assert!(!report.is_clean());
    }

    #[test]
    fn failed_file_counts_as_error() {
        let report = FileReport::failed(PathBuf::from("b.wav"), "unreadable".into());
        assert_eq!(report.status, Some(Severity::Error));
        assert!(report.findings.is_empty());
        assert!(report.metadata.is_none());
    }

    #[test]
    fn summary_counts_findings_and_failures() {
        let files = vec![
            FileReport::new(
                PathBuf::from("a.wav"),
                Outcome::Complete,
                None,
                None,
                1,
                vec![Finding::new("silence", Severity::Warning, "quiet").spanning(0, 1)],
            ),
            FileReport::failed(PathBuf::from("b.wav"), "bad".into()),
            FileReport::new(PathBuf::from("c.wav"), Outcome::Complete, None, None, 1, vec![]),
        ];
        let report = LintReport::from_sorted(files, false);
        assert_eq!(
            report.summary,
            Summary {
                files: 3,
                failed: 1,
                errors: 0,
                warnings: 1,
                infos: 0,
            }
        );
        assert!(report.has_errors());
        assert_eq!(report.total_findings(), 1);
    }

    #[test]
    fn empty_report_passes() {
        let report = LintReport::from_sorted(Vec::new(), false);
        assert_eq!(report.status, None);
        assert!(!report.has_errors());
    }

    #[test]
    fn location_serializes_with_kind_tag() {
        let json = serde_json::to_string(&Location::Span { start: 20, end: 60 }).unwrap();
        assert_eq!(json, r#"{"kind":"span","start":20,"end":60}"#);
    }
}
