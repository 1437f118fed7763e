//! Capture of contactless cards into card profiles
//!
//! The hardware layer implements [`Tag`] and the per-technology traits in
//! [`tag`]; [`CapturePipeline`] probes each technology in isolation, builds a
//! [`CardProfile`](nfcclone_profile::CardProfile) and saves it.
//!
//! MIFARE Classic sectors are opened with the [`DEFAULT_KEYS`] only, and
//! ISO-DEP cards are probed with a SELECT for each of the [`PROBE_AIDS`].
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

mod defaults;
mod error;
mod pipeline;
pub mod tag;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use defaults::{DEFAULT_KEYS, PROBE_AIDS};
pub use error::{CaptureError, TagError};
pub use pipeline::{CapturePipeline, probe_tag};
pub use tag::{
    IsoDepTech, KeyType, MifareClassicTech, MifareKey, NdefTech, NfcATech, Tag, TagTechnology,
};
