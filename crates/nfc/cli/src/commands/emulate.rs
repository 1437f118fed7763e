//! Activation control and trace replay

use std::path::Path;

use colored::Colorize;
use nfcclone_apdu_core::Response;
use nfcclone_emulator::EmulationEngine;
use nfcclone_profile::{ActivationRecord, ProfileStore, bytes_to_hex, canonical_hex};

use crate::replay::{Exchange, parse_trace, replay};

/// Request emulation of a stored card
pub(crate) fn emulate_start_command(store: &ProfileStore, uid: &str) -> eyre::Result<()> {
    if store.load_profile(uid)?.is_none() {
        eyre::bail!("no stored profile for card {uid}");
    }
    let path = store.save_activation(&ActivationRecord::activate(uid))?;
    println!(
        "{} {} ({})",
        "Emulating".green().bold(),
        canonical_hex(uid).bold(),
        path.display()
    );
    Ok(())
}

/// Request that emulation stops
pub(crate) fn emulate_stop_command(store: &ProfileStore) -> eyre::Result<()> {
    store.save_activation(&ActivationRecord::deactivate())?;
    println!("{}", "Emulation stopped".yellow());
    Ok(())
}

/// Show the current activation record
pub(crate) fn emulate_status_command(store: &ProfileStore) -> eyre::Result<()> {
    match store.load_activation() {
        Some(record) if record.is_active() => {
            println!("{} {}", "Emulating".green().bold(), record.card_uid.bold());
        }
        Some(_) | None => println!("Emulation inactive"),
    }
    Ok(())
}

/// Replay a trace file against the engine
///
/// Without a UID the engine follows the activation record, as it would on
/// the device. With one it stays on that card across deactivations.
pub(crate) fn replay_command(
    store: &ProfileStore,
    trace: &Path,
    uid: Option<&str>,
) -> eyre::Result<()> {
    let steps = parse_trace(&std::fs::read_to_string(trace)?);

    let engine = EmulationEngine::new(store.clone());
    let active = match uid {
        Some(uid) => engine.start(uid),
        None => engine.reload(),
    };
    if !active {
        println!("{}", "No card is emulated, every command is answered 6A82".yellow());
    }

    for exchange in replay(&engine, &steps, uid) {
        match exchange {
            Exchange::Frame { command, response } => {
                println!(">> {}", bytes_to_hex(&command));
                print_response(&response);
            }
            Exchange::Deactivated { active } => {
                let state = if active { "active" } else { "inactive" };
                println!("-- link deactivated, engine {state}");
            }
        }
    }

    Ok(())
}

fn print_response(frame: &[u8]) {
    match Response::from_bytes(frame) {
        Ok(response) => {
            let status = response.status();
            let status = if status.is_success() {
                status.to_string().green()
            } else {
                status.to_string().red()
            };
            println!("<< {} {status}", bytes_to_hex(response.payload()));
        }
        Err(_) => println!("<< {}", bytes_to_hex(frame)),
    }
}
