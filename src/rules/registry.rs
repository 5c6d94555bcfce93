//! The fixed rule catalog and resolution of a run's active rule set.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{parse_params, RuleConfig};
use crate::rules::{
    channels, clipping, dc_offset, duration, loudness, metadata, silence, tags, Rule, RuleBuilder,
};
use crate::ConfigError;

type Factory = fn(&toml::Table) -> Result<Arc<dyn RuleBuilder>, ConfigError>;

struct RuleEntry {
    name: &'static str,
    description: &'static str,
    default_enabled: bool,
    factory: Factory,
}

/// Catalog entry for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub default_enabled: bool,
}

/// Every built-in rule, in evaluation order.
pub struct RuleRegistry {
    entries: Vec<RuleEntry>,
}

fn configured<P>(
    name: &str,
    params: &toml::Table,
    validate: fn(P) -> Result<P, ConfigError>,
) -> Result<Arc<dyn RuleBuilder>, ConfigError>
where
    P: RuleBuilder + for<'de> Deserialize<'de> + Default + 'static,
{
    let params: P = parse_params(name, params)?;
    Ok(Arc::new(validate(params)?))
}

impl RuleRegistry {
    pub fn builtin() -> Self {
        let entries = vec![
            RuleEntry {
                name: metadata::NAME,
                description: "Required tags are present; sample rate meets the recommended floor",
                default_enabled: true,
                factory: |p| configured(metadata::NAME, p, metadata::MetadataConfig::validate),
            },
            RuleEntry {
                name: tags::NAME,
                description: "Track numbers, dates, title case, leftover comments and file names are tidy",
                default_enabled: false,
                factory: |p| {
                    let config: tags::TagFormatConfig = parse_params(tags::NAME, p)?;
                    Ok(Arc::new(config.compile()?))
                },
            },
            RuleEntry {
                name: channels::NAME,
                description: "Channel count, sample rate and bit depth match the expected values",
                default_enabled: true,
                factory: |p| configured(channels::NAME, p, channels::ChannelConfig::validate),
            },
            RuleEntry {
                name: clipping::NAME,
                description: "Samples reach the clipping threshold",
                default_enabled: true,
                factory: |p| configured(clipping::NAME, p, clipping::ClippingConfig::validate),
            },
            RuleEntry {
                name: silence::NAME,
                description: "Long stretches of silence",
                default_enabled: true,
                factory: |p| configured(silence::NAME, p, silence::SilenceConfig::validate),
            },
            RuleEntry {
                name: dc_offset::NAME,
                description: "A channel's average sits away from zero",
                default_enabled: true,
                factory: |p| configured(dc_offset::NAME, p, dc_offset::DcOffsetConfig::validate),
            },
            RuleEntry {
                name: loudness::NAME,
                description: "Overall RMS level is very low",
                default_enabled: true,
                factory: |p| configured(loudness::NAME, p, loudness::LoudnessConfig::validate),
            },
            RuleEntry {
                name: duration::NAME,
                description: "Decoded length differs from the length the container declares",
                default_enabled: true,
                factory: |p| configured(duration::NAME, p, duration::DurationConfig::validate),
            },
        ];
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn catalog(&self) -> Vec<RuleInfo> {
        self.entries
            .iter()
            .map(|e| RuleInfo {
                name: e.name,
                description: e.description,
                default_enabled: e.default_enabled,
            })
            .collect()
    }

    /// Validates `config` and returns the active rules in catalog order.
    ///
    /// Parameters are checked for every configured rule, enabled or not.
    pub fn resolve(&self, config: &RuleConfig) -> Result<RuleSet, ConfigError> {
        if let Some(unknown) = config.rules.keys().find(|name| !self.contains(name)) {
            return Err(ConfigError::UnknownRule(unknown.clone()));
        }

        let empty = toml::Table::new();
        let mut rules = Vec::new();
        for entry in &self.entries {
            let settings = config.settings(entry.name);
            let params = settings.map_or(&empty, |s| &s.params);
            let builder = (entry.factory)(params)?;

            let enabled = settings
                .and_then(|s| s.enabled)
                .unwrap_or(entry.default_enabled);
            if enabled {
                rules.push(ActiveRule {
                    name: entry.name,
                    builder,
                });
            }
        }

        log::debug!(
            "active rules: {}",
            rules.iter().map(|r| r.name).collect::<Vec<_>>().join(", ")
        );
        Ok(RuleSet { rules })
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Clone)]
struct ActiveRule {
    name: &'static str,
    builder: Arc<dyn RuleBuilder>,
}

/// The validated, ordered rules for one run. Cheap to share across workers.
#[derive(Clone)]
pub struct RuleSet {
    rules: Vec<ActiveRule>,
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet").field("rules", &self.names()).finish()
    }
}

impl RuleSet {
    /// The built-in rules with their defaults.
    pub fn defaults() -> Result<Self, ConfigError> {
        RuleRegistry::builtin().resolve(&RuleConfig::default())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Fresh rule instances for one session, in evaluation order.
    pub fn instantiate(&self) -> Vec<Box<dyn Rule>> {
        self.rules.iter().map(|r| r.builder.build()).collect()
    }
}
