//! Capture of the card in a reader

use colored::Colorize;
use nfcclone_apdu_pcsc::PcscTransport;
use nfcclone_capture::CapturePipeline;
use nfcclone_profile::ProfileStore;

use crate::{config::CliConfig, pcsc_tag::PcscTag};

use super::{format_technologies, profiles::print_sections};

/// Capture the card and save its profile
pub(crate) fn capture_command(
    transport: PcscTransport,
    config: &CliConfig,
    label: Option<&str>,
) -> eyre::Result<()> {
    let store = ProfileStore::new(config.storage_config());
    let mut tag = PcscTag::open(transport)?;

    let mut profile = CapturePipeline::new(store.clone())
        .with_custom_response(config.custom_response())
        .capture(&mut tag)?;
    if let Some(label) = label {
        profile.set_label(label);
        store.save_profile(&mut profile)?;
    }

    println!("{} {}", "Captured card".green().bold(), profile.uid_hex().bold());
    println!("  Technologies: {}", format_technologies(&profile.technologies));
    print_sections(&profile);
    if let Some(path) = &profile.saved_location {
        println!("  Saved to {}", path.display());
    }

    Ok(())
}
