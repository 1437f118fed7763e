//! Card profiles: the captured behaviour of one contactless card
//!
//! This crate holds the model shared by capture and emulation:
//!
//! - [`codec`] converts between bytes and the hex strings used in profile files
//! - [`CardProfile`] and its technology sections
//! - [`ProfileStore`] persists profiles and the [`ActivationRecord`] across
//!   an ordered list of storage locations
//!
//! # Example
//!
//! ```no_run
//! use nfcclone_profile::{ActivationRecord, ProfileStore, StorageConfig};
//!
//! let store = ProfileStore::new(StorageConfig::single("/var/lib/nfcclone"));
//! store.save_activation(&ActivationRecord::activate("04A22B725C6380"))?;
//!
//! if let Some(profile) = store.load_profile("04A22B725C6380")? {
//!     println!("{} technologies", profile.technologies.len());
//! }
//! # Ok::<(), nfcclone_profile::StoreError>(())
//! ```

pub mod codec;
mod error;
mod format;
mod model;
mod store;

pub use codec::{bytes_to_hex, canonical_hex, hex_to_bytes};
pub use error::{ProfileError, StoreError};
pub use format::{from_json, to_json_pretty};
pub use model::{
    CardProfile, DEFAULT_CUSTOM_RESPONSE, IsoDepSection, MifareSection, MifareType, NdefSection,
    NfcASection, ResponseResult, Section, SectorResult, Technology,
};
pub use store::{
    ACTIVATION_FILE, ActivationRecord, CARDS_DIR, ProfileStore, ProfileSummary, StorageConfig,
};
