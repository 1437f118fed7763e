//! APDU emulation engine
//!
//! The engine answers every inbound command frame from the session loaded
//! at the last reload. Dispatch never touches storage and never fails: every
//! frame gets a response ending in a status word.

use std::sync::Arc;

use nfcclone_apdu_core::{
    Bytes, CommandView, Response,
    command::{CLA_ISO, CLA_PCSC, INS_GET_DATA, INS_READ_BINARY, INS_SELECT},
    prelude::sw,
};
use nfcclone_profile::{CardProfile, ProfileStore};
use parking_lot::RwLock;
use tracing::{Level, debug, info, trace, warn};

use crate::{
    handler::HandlerChain,
    session::{DeactivationReason, SessionState},
};

/// Replays a card profile to a terminal
#[derive(Debug)]
pub struct EmulationEngine {
    store: ProfileStore,
    session: RwLock<Arc<SessionState>>,
    handlers: HandlerChain,
}

impl EmulationEngine {
    /// Create an inactive engine reading from the given store
    pub fn new(store: ProfileStore) -> Self {
        Self {
            store,
            session: RwLock::new(Arc::new(SessionState::Inactive)),
            handlers: HandlerChain::standard(),
        }
    }

    /// Current session
    pub fn session(&self) -> Arc<SessionState> {
        Arc::clone(&self.session.read())
    }

    /// Whether a profile is being emulated
    pub fn is_active(&self) -> bool {
        self.session.read().is_active()
    }

    /// Start emulating the stored profile of a card
    ///
    /// Returns whether the engine is active afterwards.
    pub fn start(&self, card_uid: &str) -> bool {
        let next = self.load_session(card_uid);
        self.replace(next)
    }

    /// Stop emulating
    pub fn stop(&self) {
        self.replace(SessionState::Inactive);
    }

    /// Rebuild the session from the activation record and stored profile
    ///
    /// Returns whether the engine is active afterwards.
    pub fn reload(&self) -> bool {
        let next = match self.store.load_activation() {
            Some(record) if record.is_active() => self.load_session(&record.card_uid),
            Some(_) | None => SessionState::Inactive,
        };
        self.replace(next)
    }

    /// The link to the terminal went down
    pub fn on_link_deactivated(&self, reason: DeactivationReason) {
        debug!(?reason, "Link deactivated");
        self.reload();
    }

    /// Answer one command frame
    pub fn on_command(&self, frame: &[u8]) -> Bytes {
        // One snapshot per frame; a concurrent reload swaps the Arc, not its contents
        let session = self.session();
        trace!(command = %hex_frame(frame), "Inbound command");

        let response = match session.as_ref() {
            SessionState::Inactive => {
                debug!("No active profile");
                Response::status_only(sw::FILE_NOT_FOUND)
            }
            SessionState::Active {
                profile,
                emulated_uid,
            } => {
                let response = self.dispatch(profile, emulated_uid, frame);
                log_response(frame, &response);
                response
            }
        };

        let bytes = response.to_bytes();
        trace!(response = %hex_frame(&bytes), "Outbound response");
        bytes
    }

    fn dispatch(&self, profile: &CardProfile, emulated_uid: &Bytes, frame: &[u8]) -> Response {
        let Some(command) = CommandView::new(frame) else {
            return Response::status_only(sw::WRONG_LENGTH);
        };

        match (command.cla(), command.ins()) {
            (CLA_ISO, INS_SELECT) => self.select(profile, &command),
            (CLA_PCSC, INS_GET_DATA) => get_uid(emulated_uid, &command),
            (CLA_ISO, INS_READ_BINARY) => read_binary(emulated_uid, &command),
            _ => self
                .handlers
                .handle(profile, &command)
                .unwrap_or_else(|| fallback(profile)),
        }
    }

    /// SELECT never fails once the frame is well formed
    fn select(&self, profile: &CardProfile, command: &CommandView<'_>) -> Response {
        let Ok(aid) = command.data() else {
            return Response::status_only(sw::WRONG_LENGTH);
        };
        // Header, Lc and data, optionally followed by Le
        let expected = 5 + aid.len();
        if command.frame_len() != expected && command.frame_len() != expected + 1 {
            return Response::status_only(sw::WRONG_LENGTH);
        }

        self.handlers
            .handle(profile, command)
            .unwrap_or_else(|| Response::status_only(sw::SUCCESS))
    }

    fn load_session(&self, card_uid: &str) -> SessionState {
        match self.store.load_profile(card_uid) {
            Ok(Some(profile)) => SessionState::active(profile),
            Ok(None) => {
                warn!(card_uid, "No stored profile for card");
                SessionState::Inactive
            }
            Err(error) => {
                warn!(card_uid, %error, "Failed to load profile");
                SessionState::Inactive
            }
        }
    }

    fn replace(&self, next: SessionState) -> bool {
        let active = next.is_active();
        match next.profile() {
            Some(profile) => info!(uid = %profile.uid_hex(), label = %profile.label, "Emulation active"),
            None => info!("Emulation inactive"),
        }
        *self.session.write() = Arc::new(next);
        active
    }
}

/// `FF CA 00 00`: the emulated UID
fn get_uid(emulated_uid: &Bytes, command: &CommandView<'_>) -> Response {
    if command.p1() == 0x00 && command.p2() == 0x00 {
        Response::success(emulated_uid.clone())
    } else {
        Response::status_only(sw::FILE_NOT_FOUND)
    }
}

/// `00 B0`: the emulated UID is the only readable content, at offset 0
fn read_binary(emulated_uid: &Bytes, command: &CommandView<'_>) -> Response {
    if command.offset() != 0 {
        return Response::status_only(sw::FILE_NOT_FOUND);
    }
    let length = command.short_le().min(emulated_uid.len());
    Response::success(emulated_uid.slice(..length))
}

/// Custom response of the profile, or plain success
fn fallback(profile: &CardProfile) -> Response {
    Response::from_bytes(&profile.custom_response)
        .unwrap_or_else(|_| Response::status_only(sw::SUCCESS))
}

fn hex_frame(frame: &[u8]) -> String {
    nfcclone_profile::bytes_to_hex(frame)
}

fn log_response(frame: &[u8], response: &Response) {
    let status = response.status();
    let level = status.tracing_level();
    let command = hex_frame(frame);
    if level == Level::DEBUG {
        debug!(%command, sw = %status, "Answered");
    } else if level == Level::INFO {
        info!(%command, sw = %status, description = status.description(), "Answered");
    } else {
        warn!(%command, sw = %status, description = status.description(), "Answered");
    }
}
