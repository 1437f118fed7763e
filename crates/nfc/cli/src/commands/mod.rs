//! Subcommand implementations

mod capture;
mod emulate;
mod profiles;
mod reader;

pub(crate) use capture::capture_command;
pub(crate) use emulate::{
    emulate_start_command, emulate_status_command, emulate_stop_command, replay_command,
};
pub(crate) use profiles::{label_command, list_command, set_response_command, show_command};
pub(crate) use reader::{connect, list_readers};

use chrono::{DateTime, Utc};
use nfcclone_profile::Technology;

/// Capture time as a UTC date, or the raw seconds if out of range
pub(crate) fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map_or_else(
            || secs.to_string(),
            |time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
}

/// Comma separated technology names
pub(crate) fn format_technologies(technologies: &[Technology]) -> String {
    technologies
        .iter()
        .map(Technology::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
