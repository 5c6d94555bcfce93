use serde::Deserialize;

use crate::audio::metadata::AudioStreamMetadata;
use crate::audio::stream::SampleFrame;
use crate::report::{Finding, Severity};
use crate::rules::{Hooks, Rule, RuleBuilder};
use crate::{ConfigError, RuleInternalError};

pub const NAME: &str = "duration-mismatch";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DurationConfig {
    pub tolerance_secs: f64,
}

impl Default for DurationConfig {
    fn default() -> Self {
        Self {
            tolerance_secs: 0.1,
        }
    }
}

impl DurationConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if !(self.tolerance_secs.is_finite() && self.tolerance_secs >= 0.0) {
            return Err(ConfigError::OutOfRange {
                rule: NAME.into(),
                param: "tolerance_secs",
                message: format!("{} is not a non-negative duration", self.tolerance_secs),
            });
        }
        Ok(self)
    }
}

impl RuleBuilder for DurationConfig {
    fn build(&self) -> Box<dyn Rule> {
        Box::new(DurationRule {
            config: self.clone(),
            declared: None,
            sample_rate: 0,
            decoded: 0,
        })
    }
}

/// Compares the container's declared length with what actually decodes.
pub struct DurationRule {
    config: DurationConfig,
    declared: Option<u64>,
    sample_rate: u32,
    decoded: u64,
}

impl Rule for DurationRule {
    fn name(&self) -> &'static str {
        NAME
    }

    fn hooks(&self) -> Hooks {
        Hooks::BOTH
    }

    fn inspect_metadata(&mut self, metadata: &AudioStreamMetadata) {
        self.declared = metadata.frames;
        self.sample_rate = metadata.sample_rate;
    }

    fn inspect_frame(&mut self, _frame: &SampleFrame<'_>) -> Result<(), RuleInternalError> {
        self.decoded += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Vec<Finding> {
        let Some(declared) = self.declared else {
            return Vec::new();
        };
        let rate = self.sample_rate as f64;
        let diff_secs = declared.abs_diff(self.decoded) as f64 / rate;
        if diff_secs <= self.config.tolerance_secs {
            return Vec::new();
        }
        let finding = Finding::new(
            NAME,
            Severity::Warning,
            format!(
                "container declares {:.3}s but {:.3}s decoded",
                declared as f64 / rate,
                self.decoded as f64 / rate
            ),
        );
        // Nothing decoded means there is no frame to point at.
        if self.decoded == 0 {
            return vec![finding];
        }
        vec![finding.at(self.decoded.min(declared))]
    }
}
