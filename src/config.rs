//! Run configuration loaded from TOML.
//!
//! ```toml
//! jobs = 4
//! timeout_secs = 30.0
//!
//! [rules.clipping]
//! threshold = 0.99
//! min_occurrences = 10
//!
//! [rules.tag-format]
//! enabled = true
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::ConfigError;

/// Settings for one rule: the enabled flag plus its own parameters.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RuleSettings {
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub params: toml::Table,
}

/// Per-rule settings keyed by rule name. Rules left out use their defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RuleConfig {
    pub rules: BTreeMap<String, RuleSettings>,
}

impl RuleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(&self, rule: &str) -> Option<&RuleSettings> {
        self.rules.get(rule)
    }

    pub fn enable(&mut self, rule: &str) -> &mut Self {
        self.rules.entry(rule.to_string()).or_default().enabled = Some(true);
        self
    }

    pub fn disable(&mut self, rule: &str) -> &mut Self {
        self.rules.entry(rule.to_string()).or_default().enabled = Some(false);
        self
    }

    pub fn set(&mut self, rule: &str, param: &str, value: impl Into<toml::Value>) -> &mut Self {
        self.rules
            .entry(rule.to_string())
            .or_default()
            .params
            .insert(param.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LintConfig {
    pub jobs: Option<usize>,
    pub timeout_secs: Option<f64>,
    #[serde(default)]
    pub rules: RuleConfig,
}

impl LintConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    pub fn timeout(&self) -> Result<Option<Duration>, ConfigError> {
        match self.timeout_secs {
            None => Ok(None),
            Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(|_| ConfigError::InvalidTimeout(secs)),
            Some(secs) => Err(ConfigError::InvalidTimeout(secs)),
        }
    }
}

/// Deserializes a rule's parameter table, rejecting unknown keys.
pub(crate) fn parse_params<P>(rule: &str, params: &toml::Table) -> Result<P, ConfigError>
where
    P: for<'de> Deserialize<'de> + Default,
{
    if params.is_empty() {
        return Ok(P::default());
    }
    toml::Value::Table(params.clone())
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::InvalidParams {
            rule: rule.to_string(),
            message: e.message().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_rule_tables() {
        let config = LintConfig::from_toml_str(
            r#"
            jobs = 2
            timeout_secs = 1.5

            [rules.clipping]
            threshold = 0.98

            [rules.tag-format]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.jobs, Some(2));
        assert_eq!(config.timeout().unwrap(), Some(Duration::from_millis(1500)));

        let clipping = config.rules.settings("clipping").unwrap();
        assert_eq!(clipping.enabled, None);
        assert_eq!(clipping.params.get("threshold"), Some(&toml::Value::Float(0.98)));

        let tags = config.rules.settings("tag-format").unwrap();
        assert_eq!(tags.enabled, Some(true));
        assert!(tags.params.is_empty());
    }

    #[test]
    fn rejects_unknown_top_level_keys() {
        let err = LintConfig::from_toml_str("workers = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn rejects_non_positive_timeout() {
        let config = LintConfig {
            timeout_secs: Some(0.0),
            ..LintConfig::default()
        };
        assert!(matches!(config.timeout(), Err(ConfigError::InvalidTimeout(_))));
    }

    #[test]
    fn rejects_timeouts_too_large_for_a_duration() {
        for secs in [1e30, f64::INFINITY, f64::NAN] {
            let config = LintConfig {
                timeout_secs: Some(secs),
                ..LintConfig::default()
            };
            assert!(matches!(config.timeout(), Err(ConfigError::InvalidTimeout(_))));
        }
    }

    #[test]
    fn builder_methods_fill_settings() {
        let mut rules = RuleConfig::new();
        rules.disable("silence").set("clipping", "min_occurrences", 3);
        assert_eq!(rules.settings("silence").unwrap().enabled, Some(false));
        assert_eq!(
            rules.settings("clipping").unwrap().params.get("min_occurrences"),
            Some(&toml::Value::Integer(3))
        );
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default, deny_unknown_fields)]
    struct Params {
        level: f64,
        count: u64,
    }

    #[test]
    fn parse_params_fills_defaults_and_rejects_unknown_keys() {
        let mut table = toml::Table::new();
        table.insert("count".into(), toml::Value::Integer(4));
        let params: Params = parse_params("demo", &table).unwrap();
        assert_eq!(params, Params { level: 0.0, count: 4 });

        table.insert("bogus".into(), toml::Value::Boolean(true));
        let err = parse_params::<Params>("demo", &table).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParams { .. }));
    }
}
