//! In-memory stream source for synthetic audio.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::audio::metadata::AudioStreamMetadata;
use crate::audio::stream::{DecodedStream, FrameStream, StreamSource};
use crate::DecodeError;

/// Interleaved samples plus the failure modes a real decoder can show.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    pub metadata: AudioStreamMetadata,
    pub samples: Vec<f32>,
    /// Frames handed out per block.
    pub block_frames: usize,
    /// Fail opening the file with this message.
    pub open_error: Option<String>,
    /// Report corruption once this many frames were delivered.
    pub fail_after_frames: Option<u64>,
}

impl MemoryFile {
    pub fn new(metadata: AudioStreamMetadata, samples: Vec<f32>) -> Self {
        Self {
            metadata,
            samples,
            block_frames: 1024,
            open_error: None,
            fail_after_frames: None,
        }
    }

    /// A file whose frames come from `frame(index, channel)`.
    pub fn generate(
        metadata: AudioStreamMetadata,
        frames: u64,
        frame: impl Fn(u64, usize) -> f32,
    ) -> Self {
        let channels = metadata.channels as usize;
        let mut samples = Vec::with_capacity(frames as usize * channels);
        for index in 0..frames {
            for channel in 0..channels {
                samples.push(frame(index, channel));
            }
        }
        Self::new(metadata, samples)
    }

    /// A file that cannot be opened at all.
    pub fn unreadable(message: impl Into<String>) -> Self {
        let mut file = Self::new(AudioStreamMetadata::new(44_100, 2), Vec::new());
        file.open_error = Some(message.into());
        file
    }

    pub fn with_block_frames(mut self, frames: usize) -> Self {
        self.block_frames = frames.max(1);
        self
    }

    pub fn failing_after(mut self, frames: u64) -> Self {
        self.fail_after_frames = Some(frames);
        self
    }
}

/// Maps paths to [`MemoryFile`]s. Unknown paths fail like a missing file.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    files: HashMap<PathBuf, MemoryFile>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, file: MemoryFile) {
        self.files.insert(path.into(), file);
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, file: MemoryFile) -> Self {
        self.insert(path, file);
        self
    }
}

impl StreamSource for MemorySource {
    fn open(&self, path: &Path) -> Result<DecodedStream, DecodeError> {
        let file = self
            .files
            .get(path)
            .ok_or_else(|| DecodeError::Io(format!("{}: no such file", path.display())))?;
        if let Some(message) = &file.open_error {
            return Err(DecodeError::UnsupportedFormat(message.clone()));
        }

        let channels = (file.metadata.channels as usize).max(1);
        let frames = MemoryFrames {
            samples: file.samples.clone(),
            block_len: file.block_frames * channels,
            position: 0,
            channels,
            fail_at: file.fail_after_frames.map(|f| f as usize * channels),
        };
        Ok(DecodedStream {
            metadata: file.metadata.clone(),
            frames: Box::new(frames),
        })
    }
}

struct MemoryFrames {
    samples: Vec<f32>,
    block_len: usize,
    position: usize,
    channels: usize,
    fail_at: Option<usize>,
}

impl FrameStream for MemoryFrames {
    fn next_block(&mut self) -> Result<Option<&[f32]>, DecodeError> {
        let mut end = (self.position + self.block_len).min(self.samples.len());
        if let Some(fail_at) = self.fail_at {
            if self.position >= fail_at {
                return Err(DecodeError::Corrupt(format!(
                    "packet error after frame {}",
                    fail_at / self.channels
                )));
            }
            end = end.min(fail_at);
        }
        if self.position >= end {
            return Ok(None);
        }
        let start = self.position;
        self.position = end;
        Ok(Some(&self.samples[start..end]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(stream: &mut dyn FrameStream) -> (Vec<usize>, Option<DecodeError>) {
        let mut sizes = Vec::new();
        loop {
            match stream.next_block() {
                Ok(Some(block)) => sizes.push(block.len()),
                Ok(None) => return (sizes, None),
                Err(e) => return (sizes, Some(e)),
            }
        }
    }

    #[test]
    fn blocks_hold_whole_frames() {
        let file = MemoryFile::generate(AudioStreamMetadata::new(8, 2), 5, |_, _| 0.1)
            .with_block_frames(2);
        let source = MemorySource::new().with_file("a.wav", file);
        let mut opened = source.open(Path::new("a.wav")).unwrap();
        let (sizes, err) = drain(opened.frames.as_mut());
        assert_eq!(sizes, vec![4, 4, 2]);
        assert!(err.is_none());
    }

    #[test]
    fn corruption_after_given_frame() {
        let file = MemoryFile::generate(AudioStreamMetadata::new(8, 1), 10, |_, _| 0.0)
            .with_block_frames(4)
            .failing_after(6);
        let source = MemorySource::new().with_file("a.wav", file);
        let mut opened = source.open(Path::new("a.wav")).unwrap();
        let (sizes, err) = drain(opened.frames.as_mut());
        assert_eq!(sizes, vec![4, 2]);
        assert!(matches!(err, Some(DecodeError::Corrupt(_))));
    }

    #[test]
    fn unknown_path_fails_to_open() {
        let source = MemorySource::new();
        assert!(matches!(
            source.open(Path::new("missing.flac")),
            Err(DecodeError::Io(_))
        ));
    }
}
