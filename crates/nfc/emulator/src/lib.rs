//! APDU emulation of captured contactless cards
//!
//! [`EmulationEngine`] is driven by the platform's card emulation callbacks:
//! [`on_command`](EmulationEngine::on_command) for every inbound frame and
//! [`on_link_deactivated`](EmulationEngine::on_link_deactivated) when the
//! terminal goes away. Sessions are started and stopped by the controlling
//! shell, either directly or through the activation record read on reload.
//!
//! # Dispatch
//!
//! While inactive every frame is answered with `6A 82`. While active:
//!
//! 1. frames shorter than a header get `67 00`
//! 2. SELECT (`00 A4`) succeeds for any AID, replaying a captured answer when
//!    the profile has one
//! 3. GET UID (`FF CA 00 00`) returns the emulated UID
//! 4. READ BINARY (`00 B0`) at offset 0 returns up to `Le` bytes of the UID
//! 5. anything else goes to the MIFARE, ISO-DEP and NDEF handlers in that order
//! 6. unanswered commands get the profile's custom response
//!
//! Application selection and MIFARE authentication are never refused, so a
//! terminal that checks keys sees a more permissive card than the real one.
//!
//! # Example
//!
//! ```no_run
//! use nfcclone_emulator::EmulationEngine;
//! use nfcclone_profile::{ProfileStore, StorageConfig};
//!
//! let engine = EmulationEngine::new(ProfileStore::new(StorageConfig::single("/var/lib/nfcclone")));
//! engine.reload();
//!
//! let response = engine.on_command(&[0xFF, 0xCA, 0x00, 0x00]);
//! assert!(response.len() >= 2);
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

mod engine;
mod handler;
mod session;

pub use engine::EmulationEngine;
pub use session::{DeactivationReason, SessionState};
