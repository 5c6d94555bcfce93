use std::io::Write;

use csv::Writer;

use crate::rules::registry::RuleInfo;
use crate::report::{FileReport, Finding, LintReport, Location, Outcome};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
}

pub struct Reporter {
    format: ReportFormat,
}

impl Reporter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    pub fn write(&self, report: &LintReport, out: impl Write) -> Result<()> {
        match self.format {
            ReportFormat::Text => self.write_text(report, out),
            ReportFormat::Json => self.write_json(report, out),
            ReportFormat::Csv => self.write_csv(report, out),
        }
    }

    pub fn write_json(&self, report: &LintReport, mut out: impl Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut out, report)?;
        writeln!(out)?;
        Ok(())
    }

    pub fn write_csv(&self, report: &LintReport, out: impl Write) -> Result<()> {
        let mut writer = Writer::from_writer(out);

        writer.write_record([
            "File", "Outcome", "Status", "Rule", "Severity", "Message", "Start", "End",
        ])?;

        for file in &report.files {
            let path = file.path.display().to_string();
            let outcome = outcome_str(file.outcome);
            let status = file.status.map_or("ok", |s| s.as_str());

            if file.findings.is_empty() {
                let message = file.error.clone().unwrap_or_default();
                writer.write_record([
                    path.as_str(),
                    outcome,
                    status,
                    "",
                    "",
                    message.as_str(),
                    "",
                    "",
                ])?;
                continue;
            }
            for finding in &file.findings {
                let (start, end) = finding
                    .location
                    .map(|l| (l.start().to_string(), l.end().to_string()))
                    .unwrap_or_default();
                writer.write_record([
                    path.as_str(),
                    outcome,
                    status,
                    finding.rule.as_str(),
                    finding.severity.as_str(),
                    finding.message.as_str(),
                    start.as_str(),
                    end.as_str(),
                ])?;
            }
        }

        writer.flush()?;
        Ok(())
    }

    pub fn write_text(&self, report: &LintReport, mut out: impl Write) -> Result<()> {
        for file in &report.files {
            write_file_text(file, &mut out)?;
        }

        let summary = &report.summary;
        writeln!(
            out,
            "{} file(s), {} failed, {} finding(s): {} error(s), {} warning(s), {} info",
            summary.files,
            summary.failed,
            report.total_findings(),
            summary.errors,
            summary.warnings,
            summary.infos
        )?;
        if report.cancelled {
            writeln!(out, "Run was cancelled before every file was linted")?;
        }
        Ok(())
    }

    pub fn write_rules(&self, rules: &[RuleInfo], mut out: impl Write) -> Result<()> {
        if self.format == ReportFormat::Json {
            serde_json::to_writer_pretty(&mut out, rules)?;
            writeln!(out)?;
            return Ok(());
        }
        let width = rules.iter().map(|r| r.name.len()).max().unwrap_or(0);
        for rule in rules {
            let state = if rule.default_enabled { "on " } else { "off" };
            writeln!(out, "{:<width$}  {}  {}", rule.name, state, rule.description)?;
        }
        Ok(())
    }
}

fn outcome_str(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Complete => "complete",
        Outcome::Incomplete => "incomplete",
        Outcome::Failed => "failed",
    }
}

fn write_file_text(file: &FileReport, out: &mut impl Write) -> Result<()> {
    let status = file.status.map_or("ok", |s| s.as_str());
    match file.outcome {
        Outcome::Failed => writeln!(
            out,
            "{}: failed: {}",
            file.path.display(),
            file.error.as_deref().unwrap_or("unknown error")
        )?,
        Outcome::Incomplete => writeln!(
            out,
            "{}: {} (incomplete after {} frames: {})",
            file.path.display(),
            status,
            file.frames,
            file.error.as_deref().unwrap_or("unknown error")
        )?,
        Outcome::Complete => writeln!(out, "{}: {}", file.path.display(), status)?,
    }

    let rate = file.metadata.as_ref().map(|m| m.sample_rate as f64);
    for finding in &file.findings {
        writeln!(out, "  {}", describe(finding, rate))?;
    }
    Ok(())
}

fn describe(finding: &Finding, rate: Option<f64>) -> String {
    let mut line = format!(
        "{:<7} [{}] {}",
        finding.severity.as_str(),
        finding.rule,
        finding.message
    );
    let secs = |frame: u64| rate.map(|r| format!(" ({:.3}s)", frame as f64 / r)).unwrap_or_default();
    match finding.location {
        Some(Location::Frame { offset }) => {
            line.push_str(&format!(" at frame {}{}", offset, secs(offset)));
        }
        Some(Location::Span { start, end }) => {
            line.push_str(&format!(
                " from frame {}{} to {}{}",
                start,
                secs(start),
                end,
                secs(end)
            ));
        }
        None => {}
    }
    line
}
