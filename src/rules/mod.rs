//! Rule trait and the built-in rule catalog.

use crate::audio::metadata::AudioStreamMetadata;
use crate::audio::stream::SampleFrame;
use crate::report::Finding;
use crate::RuleInternalError;

pub mod channels;
pub mod clipping;
pub mod dc_offset;
pub mod duration;
pub mod loudness;
pub mod metadata;
pub mod registry;
pub mod silence;
pub mod tags;

/// Which inputs a rule wants. The session skips dispatch for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hooks {
    pub metadata: bool,
    pub frames: bool,
}

impl Hooks {
    pub const METADATA: Hooks = Hooks {
        metadata: true,
        frames: false,
    };
    pub const FRAMES: Hooks = Hooks {
        metadata: false,
        frames: true,
    };
    pub const BOTH: Hooks = Hooks {
        metadata: true,
        frames: true,
    };
}

/// One check, instantiated fresh for every file.
///
/// Calls arrive in order: `inspect_metadata` once, `inspect_frame` once per
/// frame in stream order, then `finalize` once. State must stay bounded
/// regardless of stream length. An `Err` from `inspect_frame` halts the rule;
/// the session reports it and makes no further calls.
pub trait Rule: Send {
    fn name(&self) -> &'static str;

    fn hooks(&self) -> Hooks;

    fn inspect_metadata(&mut self, _metadata: &AudioStreamMetadata) {}

    fn inspect_frame(&mut self, _frame: &SampleFrame<'_>) -> Result<(), RuleInternalError> {
        Ok(())
    }

    fn finalize(&mut self) -> Vec<Finding>;
}

/// Validated rule parameters that can stamp out fresh rule instances.
pub trait RuleBuilder: Send + Sync {
    fn build(&self) -> Box<dyn Rule>;
}

/// Rejects NaN and infinite samples before any arithmetic sees them.
pub(crate) fn check_finite(frame: &SampleFrame<'_>) -> Result<(), RuleInternalError> {
    match frame.samples.iter().position(|s| !s.is_finite()) {
        Some(channel) => Err(RuleInternalError::NonFiniteSample {
            frame: frame.index,
            channel,
        }),
        None => Ok(()),
    }
}

/// Frame width must match the stream's declared channel count.
pub(crate) fn check_width(frame: &SampleFrame<'_>, expected: usize) -> Result<(), RuleInternalError> {
    if frame.channels() != expected {
        return Err(RuleInternalError::ChannelMismatch {
            frame: frame.index,
            expected,
            actual: frame.channels(),
        });
    }
    Ok(())
}
