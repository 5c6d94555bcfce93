use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use titlecase::titlecase;
use unic_normal::StrNormalForm;

use crate::audio::metadata::AudioStreamMetadata;
use crate::report::{Finding, Severity};
use crate::rules::{Hooks, Rule, RuleBuilder};
use crate::ConfigError;

pub const NAME: &str = "tag-format";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagFormatConfig {
    /// Pattern the DATE tag must match.
    pub date_pattern: String,
    /// Flag leftover COMMENT and LYRICS tags.
    pub check_junk_tags: bool,
    pub check_title_case: bool,
    /// Expect files named `NN - Title.ext` after their tags.
    pub check_file_name: bool,
}

impl Default for TagFormatConfig {
    fn default() -> Self {
        Self {
            date_pattern: r"^\d{4}".into(),
            check_junk_tags: true,
            check_title_case: true,
            check_file_name: false,
        }
    }
}

impl TagFormatConfig {
    pub fn compile(self) -> Result<TagFormatBuilder, ConfigError> {
        let date = Regex::new(&self.date_pattern).map_err(|e| ConfigError::OutOfRange {
            rule: NAME.into(),
            param: "date_pattern",
            message: e.to_string(),
        })?;
        Ok(TagFormatBuilder {
            date: Arc::new(date),
            check_junk_tags: self.check_junk_tags,
            check_title_case: self.check_title_case,
            check_file_name: self.check_file_name,
        })
    }
}

pub struct TagFormatBuilder {
    date: Arc<Regex>,
    check_junk_tags: bool,
    check_title_case: bool,
    check_file_name: bool,
}

impl RuleBuilder for TagFormatBuilder {
    fn build(&self) -> Box<dyn Rule> {
        Box::new(TagFormatRule {
            date: Arc::clone(&self.date),
            check_junk_tags: self.check_junk_tags,
            check_title_case: self.check_title_case,
            check_file_name: self.check_file_name,
            findings: Vec::new(),
        })
    }
}

/// The file name a track should carry: `NN - Title.ext`, with characters
/// that are awkward in paths replaced by spaces.
pub fn expected_file_name(track: &str, title: &str, extension: &str) -> String {
    format!(
        "{:0>2} - {}.{}",
        track,
        title.replace([':', '/'], " "),
        extension
    )
}

/// Tag hygiene: track numbers, release dates, title case, leftover
/// comments and file naming.
pub struct TagFormatRule {
    date: Arc<Regex>,
    check_junk_tags: bool,
    check_title_case: bool,
    check_file_name: bool,
    findings: Vec<Finding>,
}

impl TagFormatRule {
    fn check_track_number(&mut self, value: &str) {
        let value = value.split('/').next().unwrap_or(value).trim();
        match value.parse::<u32>() {
            Ok(number) if number.to_string() != value => {
                self.findings.push(Finding::new(
                    NAME,
                    Severity::Info,
                    format!("TRACKNUMBER '{}' is zero-padded", value),
                ));
            }
            Ok(_) => {}
            Err(_) => {
                self.findings.push(Finding::new(
                    NAME,
                    Severity::Warning,
                    format!("TRACKNUMBER '{}' is not a number", value),
                ));
            }
        }
    }
}

impl TagFormatRule {
    fn check_title(&mut self, title: &str) {
        let expected = titlecase(title);
        if !title.nfd().eq(expected.nfd()) {
            self.findings.push(Finding::new(
                NAME,
                Severity::Info,
                format!("TITLE '{}' is not title case, expected '{}'", title, expected),
            ));
        }
    }

    fn check_naming(&mut self, metadata: &AudioStreamMetadata) {
        let (Some(name), Some(track), Some(title)) = (
            metadata.file_name.as_deref(),
            metadata.tag("TRACKNUMBER"),
            metadata.tag("TITLE"),
        ) else {
            return;
        };
        let Some(extension) = Path::new(name).extension().and_then(|e| e.to_str()) else {
            return;
        };
        let track = track.split('/').next().unwrap_or(track).trim();
        let expected = expected_file_name(track, title, extension);
        if !name.nfd().eq(expected.nfd()) {
            self.findings.push(Finding::new(
                NAME,
                Severity::Warning,
                format!(
                    "file name '{}' does not match its tags, expected '{}'",
                    name, expected
                ),
            ));
        }
    }
}

impl Rule for TagFormatRule {
    fn name(&self) -> &'static str {
        NAME
    }

    fn hooks(&self) -> Hooks {
        Hooks::METADATA
    }

    fn inspect_metadata(&mut self, metadata: &AudioStreamMetadata) {
        if let Some(track) = metadata.tag("TRACKNUMBER") {
            self.check_track_number(track);
        }

        if let Some(date) = metadata.tag("DATE") {
            if !self.date.is_match(date) {
                self.findings.push(Finding::new(
                    NAME,
                    Severity::Warning,
                    format!("DATE '{}' does not start with a four-digit year", date),
                ));
            }
        }

        if self.check_title_case {
            if let Some(title) = metadata.tag("TITLE") {
                self.check_title(title);
            }
        }

        if self.check_junk_tags {
            for key in ["COMMENT", "LYRICS"] {
                if metadata.tag(key).is_some() {
                    self.findings.push(Finding::new(
                        NAME,
                        Severity::Info,
                        format!("{} tag is not empty", key),
                    ));
                }
            }
        }

        if self.check_file_name {
            self.check_naming(metadata);
        }
    }

    fn finalize(&mut self) -> Vec<Finding> {
        std::mem::take(&mut self.findings)
    }
}
