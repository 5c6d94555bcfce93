use serde::Deserialize;

use crate::audio::metadata::AudioStreamMetadata;
use crate::audio::stream::SampleFrame;
use crate::report::{Finding, Severity};
use crate::rules::{check_finite, Hooks, Rule, RuleBuilder};
use crate::{ConfigError, RuleInternalError};

pub const NAME: &str = "silence";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SilenceConfig {
    /// A frame is silent when every channel stays below this amplitude.
    pub floor: f32,
    pub min_duration_secs: f64,
    /// Spans reported individually; the rest are summarized.
    pub max_findings: usize,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            floor: 0.001,
            min_duration_secs: 2.0,
            max_findings: 50,
        }
    }
}

impl SilenceConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if !(self.floor > 0.0 && self.floor < 1.0) {
            return Err(ConfigError::OutOfRange {
                rule: NAME.into(),
                param: "floor",
                message: format!("{} is not in (0, 1)", self.floor),
            });
        }
        if !(self.min_duration_secs.is_finite() && self.min_duration_secs > 0.0) {
            return Err(ConfigError::OutOfRange {
                rule: NAME.into(),
                param: "min_duration_secs",
                message: format!("{} is not a positive duration", self.min_duration_secs),
            });
        }
        Ok(self)
    }
}

impl RuleBuilder for SilenceConfig {
    fn build(&self) -> Box<dyn Rule> {
        Box::new(SilenceRule::new(self.clone()))
    }
}

/// Reports contiguous runs of silent frames longer than the minimum.
pub struct SilenceRule {
    config: SilenceConfig,
    sample_rate: u32,
    min_frames: u64,
    span_start: Option<u64>,
    last_frame: Option<u64>,
    findings: Vec<Finding>,
    suppressed: u64,
}

impl SilenceRule {
    pub fn new(config: SilenceConfig) -> Self {
        Self {
            config,
            sample_rate: 0,
            min_frames: u64::MAX,
            span_start: None,
            last_frame: None,
            findings: Vec::new(),
            suppressed: 0,
        }
    }

    fn close_span(&mut self, end: u64) {
        let Some(start) = self.span_start.take() else {
            return;
        };
        let length = end - start + 1;
        if length < self.min_frames {
            return;
        }
        if self.findings.len() >= self.config.max_findings {
            self.suppressed += 1;
            return;
        }
        let secs = length as f64 / self.sample_rate as f64;
        self.findings.push(
            Finding::new(
                NAME,
                Severity::Warning,
                format!("{:.2}s of silence below {}", secs, self.config.floor),
            )
            .spanning(start, end),
        );
    }
}

impl Rule for SilenceRule {
    fn name(&self) -> &'static str {
        NAME
    }

    fn hooks(&self) -> Hooks {
        Hooks::BOTH
    }

    fn inspect_metadata(&mut self, metadata: &AudioStreamMetadata) {
        self.sample_rate = metadata.sample_rate;
        self.min_frames = metadata.secs_to_frames(self.config.min_duration_secs).max(1);
    }

    fn inspect_frame(&mut self, frame: &SampleFrame<'_>) -> Result<(), RuleInternalError> {
        check_finite(frame)?;
        if frame.peak() < self.config.floor {
            self.span_start.get_or_insert(frame.index);
        } else if frame.index > 0 {
            self.close_span(frame.index - 1);
        }
        self.last_frame = Some(frame.index);
        Ok(())
    }

    fn finalize(&mut self) -> Vec<Finding> {
        if let Some(last) = self.last_frame {
            self.close_span(last);
        }
        let mut findings = std::mem::take(&mut self.findings);
        if self.suppressed > 0 {
            findings.push(Finding::new(
                NAME,
                Severity::Info,
                format!("{} more silent span(s) not listed", self.suppressed),
            ));
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Location;
    use crate::rules::testing::{mono, run_rule};
    use pretty_assertions::assert_eq;

    fn gap_config() -> SilenceConfig {
        SilenceConfig {
            floor: 0.01,
            min_duration_secs: 3.0,
            max_findings: 50,
        }
    }

    #[test]
    fn reports_span_longer_than_minimum() {
        // 10 Hz, so 3 seconds is 30 frames.
        let metadata = AudioStreamMetadata::new(10, 1);
        let frames = mono((0..100).map(|i| if (20..=60).contains(&i) { 0.0 } else { 0.5 }));
        let mut rule = SilenceRule::new(gap_config());
        let findings = run_rule(&mut rule, &metadata, &frames);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[0].location, Some(Location::Span { start: 20, end: 60 }));
    }

    #[test]
    fn ignores_short_gaps() {
        let metadata = AudioStreamMetadata::new(10, 1);
        let frames = mono((0..100).map(|i| if (20..40).contains(&i) { 0.0 } else { 0.5 }));
        let mut rule = SilenceRule::new(gap_config());
        assert!(run_rule(&mut rule, &metadata, &frames).is_empty());
    }

    #[test]
    fn trailing_silence_is_closed_at_end_of_stream() {
        let metadata = AudioStreamMetadata::new(10, 1);
        let frames = mono((0..50).map(|i| if i >= 10 { 0.0 } else { 0.5 }));
        let mut rule = SilenceRule::new(gap_config());
        let findings = run_rule(&mut rule, &metadata, &frames);
        assert_eq!(findings[0].location, Some(Location::Span { start: 10, end: 49 }));
    }

    #[test]
    fn one_loud_channel_breaks_silence() {
        let metadata = AudioStreamMetadata::new(10, 2);
        let frames: Vec<Vec<f32>> = (0..60)
            .map(|i| if i == 30 { vec![0.0, 0.4] } else { vec![0.0, 0.0] })
            .collect();
        let mut rule = SilenceRule::new(gap_config());
        let findings = run_rule(&mut rule, &metadata, &frames);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].location, Some(Location::Span { start: 0, end: 29 }));
    }

    #[test]
    fn summarizes_spans_past_the_cap() {
        let metadata = AudioStreamMetadata::new(1, 1);
        // Silent runs of 5 frames separated by a single loud frame.
        let frames = mono((0..18).map(|i| if i % 6 == 5 { 0.5 } else { 0.0 }));
        let config = SilenceConfig {
            floor: 0.01,
            min_duration_secs: 2.0,
            max_findings: 1,
        };
        let mut rule = SilenceRule::new(config);
        let findings = run_rule(&mut rule, &metadata, &frames);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[1].severity, Severity::Info);
        assert!(findings[1].message.starts_with("2 more"));
    }

    #[test]
    fn empty_stream_has_no_findings() {
        let metadata = AudioStreamMetadata::new(10, 1);
        let mut rule = SilenceRule::new(gap_config());
        assert!(run_rule(&mut rule, &metadata, &[]).is_empty());
    }
}
