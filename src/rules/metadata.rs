use serde::Deserialize;

use crate::audio::metadata::AudioStreamMetadata;
use crate::report::{Finding, Severity};
use crate::rules::{Hooks, Rule, RuleBuilder};
use crate::ConfigError;

pub const NAME: &str = "metadata-completeness";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    pub required_tags: Vec<String>,
    pub min_sample_rate: u32,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            required_tags: vec!["ARTIST".into(), "TITLE".into()],
            min_sample_rate: 44_100,
        }
    }
}

impl MetadataConfig {
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        for tag in &mut self.required_tags {
            if tag.trim().is_empty() {
                return Err(ConfigError::OutOfRange {
                    rule: NAME.into(),
                    param: "required_tags",
                    message: "tag names must not be blank".into(),
                });
            }
            *tag = tag.trim().to_uppercase();
        }
        Ok(self)
    }
}

impl RuleBuilder for MetadataConfig {
    fn build(&self) -> Box<dyn Rule> {
        Box::new(MetadataRule::new(self.clone()))
    }
}

pub struct MetadataRule {
    config: MetadataConfig,
    findings: Vec<Finding>,
}

impl MetadataRule {
    pub fn new(config: MetadataConfig) -> Self {
        Self {
            config,
            findings: Vec::new(),
        }
    }
}

impl Rule for MetadataRule {
    fn name(&self) -> &'static str {
        NAME
    }

    fn hooks(&self) -> Hooks {
        Hooks::METADATA
    }

    fn inspect_metadata(&mut self, metadata: &AudioStreamMetadata) {
        let missing: Vec<&str> = self
            .config
            .required_tags
            .iter()
            .map(String::as_str)
            .filter(|tag| metadata.tag(tag).is_none())
            .collect();
        if !missing.is_empty() {
            self.findings.push(Finding::new(
                NAME,
                Severity::Error,
                format!("missing required tag(s): {}", missing.join(", ")),
            ));
        }

        if metadata.sample_rate < self.config.min_sample_rate {
            self.findings.push(Finding::new(
                NAME,
                Severity::Info,
                format!(
                    "sample rate {} Hz is below the recommended {} Hz",
                    metadata.sample_rate, self.config.min_sample_rate
                ),
            ));
        }
    }

    fn finalize(&mut self) -> Vec<Finding> {
        std::mem::take(&mut self.findings)
    }
}
