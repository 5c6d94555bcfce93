use serde::Deserialize;

use crate::audio::stream::SampleFrame;
use crate::report::{Finding, Severity};
use crate::rules::{check_finite, Hooks, Rule, RuleBuilder};
use crate::{ConfigError, RuleInternalError};

pub const NAME: &str = "too-quiet";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoudnessConfig {
    /// Minimum RMS level in dBFS.
    pub min_rms_db: f64,
}

impl Default for LoudnessConfig {
    fn default() -> Self {
        Self { min_rms_db: -40.0 }
    }
}

impl LoudnessConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if !(self.min_rms_db.is_finite() && self.min_rms_db < 0.0) {
            return Err(ConfigError::OutOfRange {
                rule: NAME.into(),
                param: "min_rms_db",
                message: format!("{} dBFS is not below full scale", self.min_rms_db),
            });
        }
        Ok(self)
    }
}

impl RuleBuilder for LoudnessConfig {
    fn build(&self) -> Box<dyn Rule> {
        Box::new(LoudnessRule {
            config: self.clone(),
            sum_squares: 0.0,
            samples: 0,
        })
    }
}

/// Whole-file RMS from a running sum of squares.
pub struct LoudnessRule {
    config: LoudnessConfig,
    sum_squares: f64,
    samples: u64,
}

impl LoudnessRule {
    fn rms_db(&self) -> f64 {
        let rms = (self.sum_squares / self.samples as f64).sqrt();
        if rms > 0.0 {
            20.0 * rms.log10()
        } else {
            f64::NEG_INFINITY
        }
    }
}

impl Rule for LoudnessRule {
    fn name(&self) -> &'static str {
        NAME
    }

    fn hooks(&self) -> Hooks {
        Hooks::FRAMES
    }

    fn inspect_frame(&mut self, frame: &SampleFrame<'_>) -> Result<(), RuleInternalError> {
        check_finite(frame)?;
        for sample in frame.samples {
            self.sum_squares += (*sample as f64).powi(2);
        }
        self.samples += frame.samples.len() as u64;
        Ok(())
    }

    fn finalize(&mut self) -> Vec<Finding> {
        if self.samples == 0 {
            return Vec::new();
        }
        let level = self.rms_db();
        if level >= self.config.min_rms_db {
            return Vec::new();
        }
        vec![Finding::new(
            NAME,
            Severity::Warning,
            format!(
                "RMS level {:.1} dBFS is below {:.1} dBFS",
                level, self.config.min_rms_db
            ),
        )]
    }
}
