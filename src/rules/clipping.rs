use serde::Deserialize;

use crate::audio::stream::SampleFrame;
use crate::report::{Finding, Severity};
use crate::rules::{check_finite, Hooks, Rule, RuleBuilder};
use crate::{ConfigError, RuleInternalError};

pub const NAME: &str = "clipping";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClippingConfig {
    /// Absolute amplitude at or above which a sample counts as clipped.
    pub threshold: f32,
    /// Clipped frames needed before the rule reports.
    pub min_occurrences: u64,
}

impl Default for ClippingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.999,
            min_occurrences: 1,
        }
    }
}

impl ClippingConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError::OutOfRange {
                rule: NAME.into(),
                param: "threshold",
                message: format!("{} is not in (0, 1]", self.threshold),
            });
        }
        if self.min_occurrences == 0 {
            return Err(ConfigError::OutOfRange {
                rule: NAME.into(),
                param: "min_occurrences",
                message: "must be at least 1".into(),
            });
        }
        Ok(self)
    }
}

impl RuleBuilder for ClippingConfig {
    fn build(&self) -> Box<dyn Rule> {
        Box::new(ClippingRule::new(self.clone()))
    }
}

/// Counts frames with any channel at or above the clip threshold.
pub struct ClippingRule {
    config: ClippingConfig,
    clipped: u64,
    first: Option<u64>,
    peak: f32,
}

impl ClippingRule {
    pub fn new(config: ClippingConfig) -> Self {
        Self {
            config,
            clipped: 0,
            first: None,
            peak: 0.0,
        }
    }
}

impl Rule for ClippingRule {
    fn name(&self) -> &'static str {
        NAME
    }

    fn hooks(&self) -> Hooks {
        Hooks::FRAMES
    }

    fn inspect_frame(&mut self, frame: &SampleFrame<'_>) -> Result<(), RuleInternalError> {
        check_finite(frame)?;
        let peak = frame.peak();
        if peak >= self.config.threshold {
            self.clipped += 1;
            self.first.get_or_insert(frame.index);
            self.peak = self.peak.max(peak);
        }
        Ok(())
    }

    fn finalize(&mut self) -> Vec<Finding> {
        if self.clipped < self.config.min_occurrences {
            return Vec::new();
        }
        let Some(first) = self.first else {
            return Vec::new();
        };
        vec![Finding::new(
            NAME,
            Severity::Warning,
            format!(
                "{} clipped frame(s) at or above {:.3} (peak {:.3})",
                self.clipped, self.config.threshold, self.peak
            ),
        )
        .at(first)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::metadata::AudioStreamMetadata;
    use crate::report::Location;
    use crate::rules::testing::run_rule;
    use pretty_assertions::assert_eq;

    fn stereo_with_spike(frames: usize, spike: usize) -> Vec<Vec<f32>> {
        (0..frames)
            .map(|i| if i == spike { vec![1.0, 0.5] } else { vec![0.5, 0.5] })
            .collect()
    }

    #[test]
    fn single_clipped_frame_reports_first_offset() {
        let mut rule = ClippingRule::new(ClippingConfig::default());
        let metadata = AudioStreamMetadata::new(44_100, 2);
        let findings = run_rule(&mut rule, &metadata, &stereo_with_spike(10, 5));

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[0].location, Some(Location::Frame { offset: 5 }));
    }

    #[test]
    fn stays_quiet_below_min_occurrences() {
        let config = ClippingConfig {
            min_occurrences: 2,
            ..ClippingConfig::default()
        };
        let mut rule = ClippingRule::new(config);
        let metadata = AudioStreamMetadata::new(44_100, 2);
        assert!(run_rule(&mut rule, &metadata, &stereo_with_spike(10, 5)).is_empty());
    }

    #[test]
    fn negative_full_scale_counts() {
        let mut rule = ClippingRule::new(ClippingConfig::default());
        let metadata = AudioStreamMetadata::new(44_100, 1);
        let frames = vec![vec![0.1], vec![-1.0], vec![-1.0]];
        let findings = run_rule(&mut rule, &metadata, &frames);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.starts_with("2 clipped"));
        assert_eq!(findings[0].location, Some(Location::Frame { offset: 1 }));
    }

    #[test]
    fn nan_sample_halts_the_rule() {
        let mut rule = ClippingRule::new(ClippingConfig::default());
        let samples = [0.2, f32::NAN];
        let err = rule.inspect_frame(&SampleFrame::new(7, &samples)).unwrap_err();
        assert!(matches!(
            err,
            RuleInternalError::NonFiniteSample { frame: 7, channel: 1 }
        ));
    }

    #[test]
    fn rejects_threshold_above_full_scale() {
        let config = ClippingConfig {
            threshold: 1.5,
            ..ClippingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { param: "threshold", .. })
        ));
    }
}
