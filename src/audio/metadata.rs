use std::collections::BTreeMap;

use serde::Serialize;
use symphonia::core::codecs::CodecParameters;
use symphonia::core::meta::{MetadataRevision, StandardTagKey};

use crate::DecodeError;

/// Static description of one decoded stream. Built once per file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioStreamMetadata {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: Option<u32>,
    /// Frame count declared by the container, if any.
    pub frames: Option<u64>,
    pub duration_secs: Option<f64>,
    pub codec: Option<String>,
    pub tags: BTreeMap<String, String>,
    /// Name of the file the stream came from, set by the session.
    #[serde(skip)]
    pub file_name: Option<String>,
}

impl AudioStreamMetadata {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: None,
            frames: None,
            duration_secs: None,
            codec: None,
            tags: BTreeMap::new(),
            file_name: None,
        }
    }

    pub fn with_bits_per_sample(mut self, bits: u32) -> Self {
        self.bits_per_sample = Some(bits);
        self
    }

    /// Declares the frame count and derives the duration from it.
    pub fn with_frames(mut self, frames: u64) -> Self {
        self.frames = Some(frames);
        self.duration_secs = Some(frames as f64 / self.sample_rate as f64);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into().to_uppercase(), value.into());
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Value of a tag, treating blank values as absent.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Converts a frame count into seconds at this stream's rate.
    pub fn frames_to_secs(&self, frames: u64) -> f64 {
        frames as f64 / self.sample_rate as f64
    }

    /// Converts seconds into a whole number of frames, rounding up.
    pub fn secs_to_frames(&self, secs: f64) -> u64 {
        (secs * self.sample_rate as f64).ceil().max(0.0) as u64
    }

    /// Reads the stream parameters symphonia exposes for the default track.
    pub fn from_codec_params(params: &CodecParameters) -> Result<Self, DecodeError> {
        let sample_rate = params
            .sample_rate
            .filter(|rate| *rate > 0)
            .ok_or(DecodeError::MissingSampleRate)?;
        let channels = params
            .channels
            .map(|c| c.count() as u16)
            .filter(|count| *count > 0)
            .ok_or(DecodeError::MissingChannels)?;

        let mut metadata = Self::new(sample_rate, channels);
        metadata.bits_per_sample = params.bits_per_sample.or(params.bits_per_coded_sample);

        if let Some(n_frames) = params.n_frames {
            metadata.frames = Some(n_frames);
            metadata.duration_secs = Some(match params.time_base {
                Some(time_base) => {
                    let time = time_base.calc_time(n_frames);
                    time.seconds as f64 + time.frac
                }
                None => n_frames as f64 / sample_rate as f64,
            });
        }

        metadata.codec = symphonia::default::get_codecs()
            .get_codec(params.codec)
            .map(|descriptor| descriptor.short_name.to_string());

        Ok(metadata)
    }

    /// Merges the tags of one metadata revision. Later revisions win.
    pub fn merge_tags(&mut self, revision: &MetadataRevision) {
        for tag in revision.tags() {
            let key = match tag.std_key.as_ref() {
                Some(std_key) => canonical_key(std_key)
                    .map(str::to_string)
                    .unwrap_or_else(|| tag.key.to_uppercase()),
                None => tag.key.to_uppercase(),
            };
            self.tags.insert(key, tag.value.to_string());
        }
    }
}

/// Vorbis-comment style names for the standard keys the rules look at.
fn canonical_key(key: &StandardTagKey) -> Option<&'static str> {
    let name = match key {
        StandardTagKey::Artist => "ARTIST",
        StandardTagKey::AlbumArtist => "ALBUMARTIST",
        StandardTagKey::Album => "ALBUM",
        StandardTagKey::TrackTitle => "TITLE",
        StandardTagKey::TrackNumber => "TRACKNUMBER",
        StandardTagKey::Date => "DATE",
        StandardTagKey::Genre => "GENRE",
        StandardTagKey::Comment => "COMMENT",
        StandardTagKey::Lyrics => "LYRICS",
        _ => return None,
    };
    Some(name)
}
