//! APDU trace replay against the emulation engine
//!
//! A trace is a text file with one command frame per line in hex. Anything
//! after `#` is a comment and a line holding only `--` stands for the
//! terminal leaving the field.

use nfcclone_apdu_core::Bytes;
use nfcclone_emulator::{DeactivationReason, EmulationEngine};
use nfcclone_profile::hex_to_bytes;
use tracing::warn;

/// One line of a trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TraceStep {
    /// Frame sent by the terminal
    Command(Vec<u8>),
    /// The link went down
    Deactivate,
}

/// What happened for one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Exchange {
    /// A command and the engine's answer
    Frame { command: Vec<u8>, response: Bytes },
    /// The engine was told the link went down
    Deactivated { active: bool },
}

/// Parse a trace, skipping blank and comment-only lines
pub(crate) fn parse_trace(input: &str) -> Vec<TraceStep> {
    input
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                return None;
            }
            if line == "--" {
                return Some(TraceStep::Deactivate);
            }
            let frame = hex_to_bytes(line);
            if frame.is_empty() {
                warn!(line = index + 1, "Skipping trace line without hex digits");
                return None;
            }
            Some(TraceStep::Command(frame))
        })
        .collect()
}

/// Feed every step to the engine in order
///
/// With `pinned` set the engine goes back to that card after every
/// deactivation instead of following the activation record.
pub(crate) fn replay(
    engine: &EmulationEngine,
    steps: &[TraceStep],
    pinned: Option<&str>,
) -> Vec<Exchange> {
    steps
        .iter()
        .map(|step| match step {
            TraceStep::Command(command) => Exchange::Frame {
                command: command.clone(),
                response: engine.on_command(command),
            },
            TraceStep::Deactivate => {
                engine.on_link_deactivated(DeactivationReason::LinkLoss);
                if let Some(uid) = pinned {
                    engine.start(uid);
                }
                Exchange::Deactivated {
                    active: engine.is_active(),
                }
            }
        })
        .collect()
}
