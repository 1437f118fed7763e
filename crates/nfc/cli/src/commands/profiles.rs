//! Stored profile listing and editing

use colored::Colorize;
use eyre::OptionExt;
use nfcclone_profile::{
    CardProfile, ProfileStore, ResponseResult, SectorResult, bytes_to_hex, to_json_pretty,
};

use super::{format_technologies, format_timestamp};

fn load(store: &ProfileStore, uid: &str) -> eyre::Result<CardProfile> {
    store
        .load_profile(uid)?
        .ok_or_eyre(format!("no stored profile for card {uid}"))
}

/// List stored profiles
pub(crate) fn list_command(store: &ProfileStore) -> eyre::Result<()> {
    let profiles = store.list_profiles()?;

    if profiles.is_empty() {
        println!("No stored cards");
        return Ok(());
    }

    for summary in profiles {
        let label = if summary.label.is_empty() {
            String::new()
        } else {
            format!(" \"{}\"", summary.label)
        };
        println!(
            "{}{}  {}  [{}]",
            summary.uid.bold(),
            label.cyan(),
            format_timestamp(summary.captured_at).dimmed(),
            format_technologies(&summary.technologies)
        );
    }

    Ok(())
}

/// Print a stored profile
pub(crate) fn show_command(store: &ProfileStore, uid: &str, json: bool) -> eyre::Result<()> {
    let profile = load(store, uid)?;

    if json {
        println!("{}", to_json_pretty(&profile)?);
        return Ok(());
    }

    println!("Card {}", profile.uid_hex().bold());
    if !profile.label.is_empty() {
        println!("  Label: {}", profile.label.cyan());
    }
    println!("  Captured: {}", format_timestamp(profile.captured_at));
    println!("  Technologies: {}", format_technologies(&profile.technologies));
    print_sections(&profile);
    println!("  Fallback response: {}", bytes_to_hex(&profile.custom_response));
    if let Some(path) = &profile.saved_location {
        println!("  File: {}", path.display());
    }

    Ok(())
}

/// Print what each captured section holds, then the failed probes
pub(crate) fn print_sections(profile: &CardProfile) {
    if let Some(nfc_a) = &profile.nfc_a {
        println!(
            "  NFC-A: ATQA {} SAK {:02X}",
            bytes_to_hex(&nfc_a.atqa),
            nfc_a.sak
        );
    }

    if let Some(ndef) = &profile.ndef {
        let message = ndef.message.as_ref().map_or_else(
            || "no message".to_string(),
            |message| format!("{} byte message", message.len()),
        );
        println!(
            "  NDEF: {} ({} bytes max, {}), {message}",
            ndef.ndef_type,
            ndef.max_size,
            if ndef.writable { "writable" } else { "read-only" }
        );
    }

    if let Some(mifare) = &profile.mifare {
        let auth_failed = mifare
            .sectors
            .values()
            .filter(|s| matches!(s, SectorResult::AuthFailed))
            .count();
        let errors = mifare
            .sectors
            .values()
            .filter(|s| matches!(s, SectorResult::Error(_)))
            .count();
        println!(
            "  MIFARE: {} of {} sectors read, {} locked, {} failed",
            mifare.readable_sectors().to_string().green(),
            mifare.sector_count,
            auth_failed,
            errors
        );
    }

    if let Some(iso_dep) = &profile.iso_dep {
        println!("  ISO-DEP: {} AIDs probed", iso_dep.aid_responses.len());
        for (aid, result) in &iso_dep.aid_responses {
            match result {
                ResponseResult::Ok(response) => println!("    {aid} -> {}", bytes_to_hex(response)),
                ResponseResult::Error(error) => println!("    {aid} -> {}", error.red()),
            }
        }
    }

    for (section, note) in &profile.notes {
        println!("  {} {note}", format!("{section} failed:").yellow());
    }
}

/// Set the label of a stored profile
pub(crate) fn label_command(store: &ProfileStore, uid: &str, label: &str) -> eyre::Result<()> {
    let mut profile = load(store, uid)?;
    profile.set_label(label);
    let path = store.save_profile(&mut profile)?;
    println!("Label of {} set, saved to {}", profile.uid_hex().bold(), path.display());
    Ok(())
}

/// Set the fallback response of a stored profile
pub(crate) fn set_response_command(
    store: &ProfileStore,
    uid: &str,
    response: &str,
) -> eyre::Result<()> {
    let mut profile = load(store, uid)?;
    profile.set_custom_response(response);
    if profile.custom_response.len() < 2 {
        eyre::bail!("a response needs at least a status word, got {response:?}");
    }
    store.save_profile(&mut profile)?;
    println!(
        "Fallback response of {} set to {}",
        profile.uid_hex().bold(),
        bytes_to_hex(&profile.custom_response)
    );
    Ok(())
}
