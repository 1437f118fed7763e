//! `nfcclone`: capture contactless cards from a PC/SC reader, manage the
//! stored profiles and replay APDU traces against the emulation engine.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nfcclone_apdu_pcsc::PcscDeviceManager;
use nfcclone_profile::ProfileStore;

mod commands;
mod config;
mod pcsc_tag;
mod replay;

use commands::*;
use config::{Overrides, load_config};

#[derive(Parser)]
#[command(version, about = "Capture contactless cards and replay them as emulated cards")]
struct Cli {
    /// Optional reader name to use (will auto-detect if not specified)
    #[arg(short, long)]
    reader: Option<String>,

    /// Storage location for profiles and the activation record
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Debug level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available readers
    Readers,

    /// Capture the card in the reader and save its profile
    Capture {
        /// Label stored with the profile
        #[arg(short, long)]
        label: Option<String>,
    },

    /// List stored cards
    List,

    /// Show a stored card
    Show {
        /// Card UID in hex
        uid: String,

        /// Print the profile file instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Set the label of a stored card
    Label {
        /// Card UID in hex
        uid: String,

        /// New label
        label: String,
    },

    /// Set the response used for commands the card has no answer for
    SetResponse {
        /// Card UID in hex
        uid: String,

        /// Response frame in hex, status word included (e.g. 6A82)
        response: String,
    },

    /// Control which card is emulated
    #[command(subcommand)]
    Emulate(EmulateCommand),

    /// Replay an APDU trace against the emulation engine
    Replay {
        /// Trace file, one hex command per line
        trace: PathBuf,

        /// Emulate this card instead of following the activation record
        #[arg(long)]
        uid: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum EmulateCommand {
    /// Emulate a stored card
    Start {
        /// Card UID in hex
        uid: String,
    },

    /// Stop emulating
    Stop,

    /// Show which card is emulated
    Status,
}

fn main() -> eyre::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    let config = load_config(&Overrides {
        data_dir: cli.data_dir,
        reader: cli.reader,
    })?;
    let store = ProfileStore::new(config.storage_config());

    match &cli.command {
        Commands::Readers => list_readers(&PcscDeviceManager::new()?)?,
        Commands::Capture { label } => {
            let manager = PcscDeviceManager::new()?;
            let transport = connect(&manager, config.reader.as_deref())?;
            capture_command(transport, &config, label.as_deref())?
        }
        Commands::List => list_command(&store)?,
        Commands::Show { uid, json } => show_command(&store, uid, *json)?,
        Commands::Label { uid, label } => label_command(&store, uid, label)?,
        Commands::SetResponse { uid, response } => set_response_command(&store, uid, response)?,
        Commands::Emulate(EmulateCommand::Start { uid }) => emulate_start_command(&store, uid)?,
        Commands::Emulate(EmulateCommand::Stop) => emulate_stop_command(&store)?,
        Commands::Emulate(EmulateCommand::Status) => emulate_status_command(&store)?,
        Commands::Replay { trace, uid } => replay_command(&store, trace, uid.as_deref())?,
        Commands::Config => print!("{}", toml::to_string_pretty(&config)?),
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(true)
        .init();
}
