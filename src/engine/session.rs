//! One file through the active rules in a single streaming pass.

use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::audio::metadata::AudioStreamMetadata;
use crate::audio::stream::{FrameStream, SampleFrame, StreamSource};
use crate::report::{FileReport, Finding, Outcome, Severity};
use crate::rules::registry::RuleSet;
use crate::rules::Rule;
use crate::{DecodeError, RuleInternalError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    MetadataReceived,
    Streaming,
    Finalized,
    DecodeFailed,
}

struct Slot {
    rule: Box<dyn Rule>,
    /// Set once the rule gave up; it gets no further calls.
    halted: Option<Finding>,
}

struct Session<'a> {
    path: &'a Path,
    phase: Phase,
    slots: Vec<Slot>,
    /// Indices into `slots` of rules that still want frames.
    frame_rules: Vec<usize>,
    frames: u64,
    deadline: Option<(Instant, Duration)>,
}

impl<'a> Session<'a> {
    fn new(path: &'a Path, rules: Vec<Box<dyn Rule>>, timeout: Option<Duration>) -> Self {
        let slots: Vec<Slot> = rules
            .into_iter()
            .map(|rule| Slot { rule, halted: None })
            .collect();
        let frame_rules = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.rule.hooks().frames)
            .map(|(i, _)| i)
            .collect();
        Self {
            path,
            phase: Phase::Start,
            slots,
            frame_rules,
            frames: 0,
            // A limit too far out to represent means no deadline.
            deadline: timeout.and_then(|t| Instant::now().checked_add(t).map(|at| (at, t))),
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!("{}: {:?} -> {:?}", self.path.display(), self.phase, phase);
        self.phase = phase;
    }

    fn dispatch_metadata(&mut self, metadata: &AudioStreamMetadata) {
        self.enter(Phase::MetadataReceived);
        for slot in &mut self.slots {
            if slot.rule.hooks().metadata {
                slot.rule.inspect_metadata(metadata);
            }
        }
    }

    fn stream(&mut self, frames: &mut dyn FrameStream, channels: usize) -> Result<(), DecodeError> {
        self.enter(Phase::Streaming);
        loop {
            if let Some((deadline, limit)) = self.deadline {
                if Instant::now() >= deadline {
                    return Err(DecodeError::Timeout(limit));
                }
            }
            let Some(block) = frames.next_block()? else {
                return Ok(());
            };
            if block.len() % channels != 0 {
                return Err(DecodeError::MalformedBlock {
                    samples: block.len(),
                    channels: channels as u16,
                });
            }
            for samples in block.chunks_exact(channels) {
                let frame = SampleFrame::new(self.frames, samples);
                self.dispatch_frame(&frame);
                self.frames += 1;
            }
        }
    }

    fn dispatch_frame(&mut self, frame: &SampleFrame<'_>) {
        let mut halted_any = false;
        for &index in &self.frame_rules {
            let slot = &mut self.slots[index];
            if let Err(err) = slot.rule.inspect_frame(frame) {
                slot.halted = Some(halted(slot.rule.name(), &err));
                halted_any = true;
            }
        }
        if halted_any {
            let slots = &self.slots;
            self.frame_rules.retain(|&i| slots[i].halted.is_none());
        }
    }

    fn finalize(&mut self) -> Vec<Finding> {
        let mut findings = Vec::new();
        for slot in &mut self.slots {
            match slot.halted.take() {
                Some(finding) => findings.push(finding),
                None => findings.extend(slot.rule.finalize()),
            }
        }
        findings
    }
}

fn halted(rule: &str, err: &RuleInternalError) -> Finding {
    let finding = Finding::new(rule, Severity::Error, format!("rule stopped: {}", err));
    match *err {
        RuleInternalError::NonFiniteSample { frame, .. }
        | RuleInternalError::ChannelMismatch { frame, .. } => finding.at(frame),
    }
}

/// Lints one file. Never fails: decode problems end up in the report.
pub fn lint_file<S>(source: &S, path: &Path, rules: &RuleSet, timeout: Option<Duration>) -> FileReport
where
    S: StreamSource + ?Sized,
{
    run_session(source, path, rules.instantiate(), timeout)
}

fn run_session<S>(
    source: &S,
    path: &Path,
    rules: Vec<Box<dyn Rule>>,
    timeout: Option<Duration>,
) -> FileReport
where
    S: StreamSource + ?Sized,
{
    let mut session = Session::new(path, rules, timeout);

    let opened = match source.open(path) {
        Ok(opened) => opened,
        Err(err) => {
            session.enter(Phase::DecodeFailed);
            warn!("{}: {}", path.display(), err);
            return FileReport::failed(path.to_path_buf(), err.to_string());
        }
    };
    let mut metadata = opened.metadata;
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        metadata.file_name = Some(name.to_string());
    }
    let mut frames = opened.frames;

    session.dispatch_metadata(&metadata);
    let streamed = session.stream(frames.as_mut(), metadata.channels.max(1) as usize);
    drop(frames);

    let (outcome, error) = match streamed {
        Ok(()) => {
            session.enter(Phase::Finalized);
            (Outcome::Complete, None)
        }
        Err(err) => {
            session.enter(Phase::DecodeFailed);
            warn!(
                "{}: stopped after {} frames: {}",
                path.display(),
                session.frames,
                err
            );
            (Outcome::Incomplete, Some(err.to_string()))
        }
    };

    let findings = session.finalize();
    FileReport::new(
        path.to_path_buf(),
        outcome,
        error,
        Some(metadata),
        session.frames,
        findings,
    )
}
