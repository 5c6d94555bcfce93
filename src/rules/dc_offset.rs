use serde::Deserialize;

use crate::audio::metadata::AudioStreamMetadata;
use crate::audio::stream::SampleFrame;
use crate::report::{Finding, Severity};
use crate::rules::{check_finite, check_width, Hooks, Rule, RuleBuilder};
use crate::{ConfigError, RuleInternalError};

pub const NAME: &str = "dc-offset";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DcOffsetConfig {
    pub max_offset: f64,
}

impl Default for DcOffsetConfig {
    fn default() -> Self {
        Self { max_offset: 0.01 }
    }
}

impl DcOffsetConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if !(self.max_offset > 0.0 && self.max_offset < 1.0) {
            return Err(ConfigError::OutOfRange {
                rule: NAME.into(),
                param: "max_offset",
                message: format!("{} is not in (0, 1)", self.max_offset),
            });
        }
        Ok(self)
    }
}

impl RuleBuilder for DcOffsetConfig {
    fn build(&self) -> Box<dyn Rule> {
        Box::new(DcOffsetRule {
            config: self.clone(),
            means: Vec::new(),
            count: 0,
        })
    }
}

/// Incremental per-channel mean; a steady bias shows up as DC offset.
pub struct DcOffsetRule {
    config: DcOffsetConfig,
    means: Vec<f64>,
    count: u64,
}

impl Rule for DcOffsetRule {
    fn name(&self) -> &'static str {
        NAME
    }

    fn hooks(&self) -> Hooks {
        Hooks::BOTH
    }

    fn inspect_metadata(&mut self, metadata: &AudioStreamMetadata) {
        self.means = vec![0.0; metadata.channels as usize];
    }

    fn inspect_frame(&mut self, frame: &SampleFrame<'_>) -> Result<(), RuleInternalError> {
        check_finite(frame)?;
        check_width(frame, self.means.len())?;
        self.count += 1;
        let n = self.count as f64;
        for (mean, sample) in self.means.iter_mut().zip(frame.samples) {
            *mean += (*sample as f64 - *mean) / n;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Vec<Finding> {
        if self.count == 0 {
            return Vec::new();
        }
        self.means
            .iter()
            .enumerate()
            .filter(|(_, mean)| mean.abs() > self.config.max_offset)
            .map(|(channel, mean)| {
                Finding::new(
                    NAME,
                    Severity::Warning,
                    format!("channel {} has a DC offset of {:+.4}", channel, mean),
                )
            })
            .collect()
    }
}
