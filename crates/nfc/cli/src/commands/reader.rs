//! Reader selection and listing

use colored::Colorize;
use nfcclone_apdu_pcsc::{ConnectStrategy, PcscConfig, PcscDeviceManager, PcscTransport};
use tracing::info;

/// Connect to the named reader, or to the first one holding a card
pub(crate) fn connect(
    manager: &PcscDeviceManager,
    reader: Option<&str>,
) -> eyre::Result<PcscTransport> {
    let strategy = reader.map_or(ConnectStrategy::AnyCard, |name| {
        ConnectStrategy::Reader(name.to_string())
    });
    let transport = manager.connect(&strategy, PcscConfig::capture())?;
    info!("Using reader: {}", transport.reader_name());
    Ok(transport)
}

/// List all available readers
pub(crate) fn list_readers(manager: &PcscDeviceManager) -> eyre::Result<()> {
    let readers = manager.list_readers()?;

    if readers.is_empty() {
        println!("No readers found!");
        return Ok(());
    }

    println!("Available readers:");
    for (i, reader) in readers.iter().enumerate() {
        let status = match reader.card() {
            Some(card) => format!("{card:?}").green(),
            None => "no card".dimmed(),
        };
        println!("{}. {} ({})", i + 1, reader.name(), status);
    }

    Ok(())
}
