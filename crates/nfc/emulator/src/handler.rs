//! Technology specific command handlers
//!
//! Handlers run in a fixed order (MIFARE, ISO-DEP, NDEF) and the first one
//! that answers wins. A handler that fails is treated as declining.

use std::fmt;

use nfcclone_apdu_core::{
    CommandView, Response,
    command::{INS_MIFARE_AUTH_A, INS_MIFARE_AUTH_B},
    prelude::sw,
};
use nfcclone_profile::{CardProfile, ResponseResult, bytes_to_hex};
use tracing::{debug, warn};

/// Failure while interpreting the profile for a command
#[derive(Debug, thiserror::Error)]
pub(crate) enum HandlerError {
    /// The command frame does not carry the data the handler needs
    #[error("Unreadable command data: {0}")]
    Frame(#[from] nfcclone_apdu_core::Error),

    /// A stored response is not a valid response frame
    #[error("Stored response for AID {aid} is malformed: {source}")]
    MalformedResponse {
        aid: String,
        #[source]
        source: nfcclone_apdu_core::Error,
    },
}

/// One technology's view of inbound commands
pub(crate) trait TechHandler: Send + Sync + fmt::Debug {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Whether the profile carries the section this handler replays
    fn applies(&self, profile: &CardProfile) -> bool;

    /// Answer the command, or `Ok(None)` to let the next handler try
    fn try_handle(
        &self,
        profile: &CardProfile,
        command: &CommandView<'_>,
    ) -> Result<Option<Response>, HandlerError>;
}

/// MIFARE Classic: every authentication succeeds
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MifareHandler;

impl TechHandler for MifareHandler {
    fn name(&self) -> &'static str {
        "mifare"
    }

    fn applies(&self, profile: &CardProfile) -> bool {
        profile.mifare.is_some()
    }

    fn try_handle(
        &self,
        _profile: &CardProfile,
        command: &CommandView<'_>,
    ) -> Result<Option<Response>, HandlerError> {
        let is_auth = matches!(command.ins(), INS_MIFARE_AUTH_A | INS_MIFARE_AUTH_B);
        Ok(is_auth.then(|| Response::status_only(sw::SUCCESS)))
    }
}

/// ISO-DEP: replay the captured answer to a SELECT
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct IsoDepHandler;

impl TechHandler for IsoDepHandler {
    fn name(&self) -> &'static str {
        "iso-dep"
    }

    fn applies(&self, profile: &CardProfile) -> bool {
        profile.iso_dep.is_some()
    }

    fn try_handle(
        &self,
        profile: &CardProfile,
        command: &CommandView<'_>,
    ) -> Result<Option<Response>, HandlerError> {
        let Some(section) = profile.iso_dep.as_ref() else {
            return Ok(None);
        };
        if !command.is_select() {
            return Ok(None);
        }

        let aid = command.data()?;
        match section.response_for(aid) {
            Some(ResponseResult::Ok(stored)) => Response::from_bytes(stored)
                .map(Some)
                .map_err(|source| HandlerError::MalformedResponse {
                    aid: bytes_to_hex(aid),
                    source,
                }),
            Some(ResponseResult::Error(_)) | None => Ok(None),
        }
    }
}

/// NDEF: accept every application selection
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct NdefHandler;

impl TechHandler for NdefHandler {
    fn name(&self) -> &'static str {
        "ndef"
    }

    fn applies(&self, profile: &CardProfile) -> bool {
        profile.ndef.is_some()
    }

    fn try_handle(
        &self,
        _profile: &CardProfile,
        command: &CommandView<'_>,
    ) -> Result<Option<Response>, HandlerError> {
        Ok(command
            .is_select()
            .then(|| Response::status_only(sw::SUCCESS)))
    }
}

/// Ordered list of handlers
#[derive(Debug)]
pub(crate) struct HandlerChain {
    handlers: Vec<Box<dyn TechHandler>>,
}

impl HandlerChain {
    /// MIFARE, then ISO-DEP, then NDEF
    pub(crate) fn standard() -> Self {
        Self {
            handlers: vec![
                Box::new(MifareHandler),
                Box::new(IsoDepHandler),
                Box::new(NdefHandler),
            ],
        }
    }

    /// First answer from a handler whose section is present
    pub(crate) fn handle(
        &self,
        profile: &CardProfile,
        command: &CommandView<'_>,
    ) -> Option<Response> {
        for handler in self.handlers.iter().filter(|h| h.applies(profile)) {
            match handler.try_handle(profile, command) {
                Ok(Some(response)) => {
                    debug!(handler = handler.name(), %command, "Handler answered");
                    return Some(response);
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(handler = handler.name(), %command, %error, "Handler failed, declining");
                }
            }
        }
        None
    }
}
