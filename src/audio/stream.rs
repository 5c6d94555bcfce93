use std::fs::File;
use std::io;
use std::path::Path;

use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::metadata::AudioStreamMetadata;
use crate::DecodeError;

/// One synchronized sample per channel, borrowed from the current block.
#[derive(Debug, Clone, Copy)]
pub struct SampleFrame<'a> {
    /// Zero-based position of the frame in the stream.
    pub index: u64,
    pub samples: &'a [f32],
}

impl<'a> SampleFrame<'a> {
    pub fn new(index: u64, samples: &'a [f32]) -> Self {
        Self { index, samples }
    }

    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Largest absolute amplitude across channels.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}

/// Lazy, finite, non-restartable sequence of interleaved sample blocks.
///
/// Each block holds a whole number of frames. `Ok(None)` marks the end of
/// the stream; after an error the stream must not be polled again.
pub trait FrameStream {
    fn next_block(&mut self) -> Result<Option<&[f32]>, DecodeError>;
}

/// An opened file: its static metadata plus the frames still to be decoded.
pub struct DecodedStream {
    pub metadata: AudioStreamMetadata,
    pub frames: Box<dyn FrameStream>,
}

/// Anything that can turn a path into a [`DecodedStream`].
pub trait StreamSource: Sync {
    fn open(&self, path: &Path) -> Result<DecodedStream, DecodeError>;
}

/// Decodes files from disk with symphonia.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaSource;

impl SymphoniaSource {
    pub fn new() -> Self {
        Self
    }
}

impl StreamSource for SymphoniaSource {
    fn open(&self, path: &Path) -> Result<DecodedStream, DecodeError> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }

        let mut probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

        let mut format = probed.format;
        let track = format.default_track().ok_or(DecodeError::MissingTrack)?;
        if track.codec_params.codec == CODEC_TYPE_NULL {
            return Err(DecodeError::UnsupportedCodec);
        }
        let track_id = track.id;
        let mut metadata = AudioStreamMetadata::from_codec_params(&track.codec_params)?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|_| DecodeError::UnsupportedCodec)?;

        // Tags found ahead of the container (e.g. ID3v2) come first so
        // container-level tags override them.
        if let Some(probe_meta) = probed.metadata.get() {
            if let Some(revision) = probe_meta.current() {
                metadata.merge_tags(revision);
            }
        }
        if let Some(revision) = format.metadata().current() {
            metadata.merge_tags(revision);
        }

        let frames = SymphoniaFrames {
            format,
            decoder,
            track_id,
            channels: metadata.channels as usize,
            sample_buf: None,
            buf_frames: 0,
        };

        Ok(DecodedStream {
            metadata,
            frames: Box::new(frames),
        })
    }
}

struct SymphoniaFrames {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: usize,
    sample_buf: Option<SampleBuffer<f32>>,
    buf_frames: u64,
}

impl FrameStream for SymphoniaFrames {
    fn next_block(&mut self) -> Result<Option<&[f32]>, DecodeError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                // A new track list; this stream is over.
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => return Err(DecodeError::Corrupt(e.to_string())),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(DecodeError::Corrupt(e.to_string())),
            };
            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            if spec.channels.count() != self.channels {
                return Err(DecodeError::Corrupt(format!(
                    "channel count changed from {} to {}",
                    self.channels,
                    spec.channels.count()
                )));
            }

            let capacity = decoded.capacity() as u64;
            if self.sample_buf.is_none() || self.buf_frames < capacity {
                self.sample_buf = Some(SampleBuffer::<f32>::new(
                    capacity,
                    SignalSpec::new(spec.rate, spec.channels),
                ));
                self.buf_frames = capacity;
            }
            if let Some(buf) = self.sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
            }
            break;
        }

        Ok(self.sample_buf.as_ref().map(|buf| buf.samples()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_peak_uses_absolute_values() {
        let samples = [0.25, -0.75];
        let frame = SampleFrame::new(3, &samples);
        assert_eq!(frame.channels(), 2);
        assert_eq!(frame.peak(), 0.75);
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = SymphoniaSource::new().open(&dir.path().join("absent.wav"));
        assert!(matches!(result, Err(DecodeError::Io(_))));
    }

    #[test]
    fn garbage_file_is_rejected_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();
        let result = SymphoniaSource::new().open(&path);
        assert!(matches!(result, Err(DecodeError::UnsupportedFormat(_))));
    }
}
