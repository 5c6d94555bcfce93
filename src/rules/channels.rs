use serde::Deserialize;

use crate::audio::metadata::AudioStreamMetadata;
use crate::report::{Finding, Severity};
use crate::rules::{Hooks, Rule, RuleBuilder};
use crate::ConfigError;

pub const NAME: &str = "channel-consistency";

/// Run-wide expectations. Unset fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelConfig {
    pub expected_channels: Option<u16>,
    pub expected_sample_rate: Option<u32>,
    pub expected_bit_depth: Option<u32>,
}

impl ChannelConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        let zero = [
            ("expected_channels", self.expected_channels.map(u32::from)),
            ("expected_sample_rate", self.expected_sample_rate),
            ("expected_bit_depth", self.expected_bit_depth),
        ]
        .into_iter()
        .find(|(_, value)| *value == Some(0));
        if let Some((param, _)) = zero {
            return Err(ConfigError::OutOfRange {
                rule: NAME.into(),
                param,
                message: "must be greater than zero".into(),
            });
        }
        Ok(self)
    }
}

impl RuleBuilder for ChannelConfig {
    fn build(&self) -> Box<dyn Rule> {
        Box::new(ChannelRule {
            config: self.clone(),
            findings: Vec::new(),
        })
    }
}

pub struct ChannelRule {
    config: ChannelConfig,
    findings: Vec<Finding>,
}

impl ChannelRule {
    fn deviation(&mut self, what: &str, actual: impl ToString, expected: impl ToString) {
        self.findings.push(Finding::new(
            NAME,
            Severity::Warning,
            format!(
                "{} is {}, expected {}",
                what,
                actual.to_string(),
                expected.to_string()
            ),
        ));
    }
}

impl Rule for ChannelRule {
    fn name(&self) -> &'static str {
        NAME
    }

    fn hooks(&self) -> Hooks {
        Hooks::METADATA
    }

    fn inspect_metadata(&mut self, metadata: &AudioStreamMetadata) {
        if let Some(expected) = self.config.expected_channels {
            if metadata.channels != expected {
                self.deviation("channel count", metadata.channels, expected);
            }
        }
        if let Some(expected) = self.config.expected_sample_rate {
            if metadata.sample_rate != expected {
                self.deviation(
                    "sample rate",
                    format!("{} Hz", metadata.sample_rate),
                    format!("{} Hz", expected),
                );
            }
        }
        if let Some(expected) = self.config.expected_bit_depth {
            match metadata.bits_per_sample {
                Some(bits) if bits == expected => {}
                Some(bits) => self.deviation("bit depth", bits, expected),
                None => self.deviation("bit depth", "unknown", expected),
            }
        }
    }

    fn finalize(&mut self) -> Vec<Finding> {
        std::mem::take(&mut self.findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::run_rule;
    use pretty_assertions::assert_eq;

    fn run(config: ChannelConfig, metadata: &AudioStreamMetadata) -> Vec<String> {
        let mut rule = config.build();
        run_rule(rule.as_mut(), metadata, &[])
            .into_iter()
            .map(|f| f.message)
            .collect()
    }

    #[test]
    fn silent_without_expectations() {
        let metadata = AudioStreamMetadata::new(8_000, 1);
        assert!(run(ChannelConfig::default(), &metadata).is_empty());
    }

    #[test]
    fn flags_each_deviation() {
        let config = ChannelConfig {
            expected_channels: Some(2),
            expected_sample_rate: Some(48_000),
            expected_bit_depth: Some(24),
        };
        let metadata = AudioStreamMetadata::new(44_100, 1).with_bits_per_sample(16);
        assert_eq!(
            run(config, &metadata),
            vec![
                "channel count is 1, expected 2",
                "sample rate is 44100 Hz, expected 48000 Hz",
                "bit depth is 16, expected 24",
            ]
        );
    }

    #[test]
    fn unknown_bit_depth_counts_as_deviation() {
        let config = ChannelConfig {
            expected_bit_depth: Some(16),
            ..ChannelConfig::default()
        };
        let metadata = AudioStreamMetadata::new(44_100, 2);
        assert_eq!(run(config, &metadata), vec!["bit depth is unknown, expected 16"]);
    }

    #[test]
    fn zero_expectation_is_rejected() {
        let config = ChannelConfig {
            expected_channels: Some(0),
            ..ChannelConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { param: "expected_channels", .. })
        ));
    }
}
