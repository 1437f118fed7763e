//! Card connection through a PC/SC reader

use std::{ffi::CString, fmt};

use nfcclone_apdu_core::prelude::*;
use pcsc::{Card, Context, Disposition};
use tracing::{debug, info};

use crate::{
    atr::{ContactlessCard, classify_atr},
    config::PcscConfig,
    error::PcscError,
};

/// Connection to the card in one reader
pub struct PcscTransport {
    context: Context,
    reader: CString,
    reader_name: String,
    config: PcscConfig,
    /// `None` once the card was reset or removed
    card: Option<Card>,
}

impl fmt::Debug for PcscTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTransport")
            .field("reader", &self.reader_name)
            .field("connected", &self.card.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl PcscTransport {
    /// Connect to the card in the named reader
    pub(crate) fn open(
        context: Context,
        reader_name: &str,
        config: PcscConfig,
    ) -> Result<Self, PcscError> {
        let reader = CString::new(reader_name)
            .map_err(|_| PcscError::ReaderNotFound(reader_name.to_string()))?;
        let mut transport = Self {
            context,
            reader,
            reader_name: reader_name.to_string(),
            config,
            card: None,
        };
        transport.card = Some(transport.connect()?);
        info!(reader = reader_name, exclusive = config.exclusive, "Connected to card");
        Ok(transport)
    }

    fn connect(&self) -> Result<Card, PcscError> {
        self.context
            .connect(&self.reader, self.config.share_mode(), self.config.protocols())
            .map_err(|e| match e {
                pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard => {
                    PcscError::NoCard(self.reader_name.clone())
                }
                other => other.into(),
            })
    }

    /// Answer To Reset synthesised by the reader
    pub fn atr(&self) -> Result<Vec<u8>, PcscError> {
        let card = self
            .card
            .as_ref()
            .ok_or_else(|| PcscError::NoCard(self.reader_name.clone()))?;
        Ok(card.get_attribute_owned(pcsc::Attribute::AtrString)?)
    }

    /// Kind of contactless card currently connected
    pub fn card_kind(&self) -> Result<ContactlessCard, PcscError> {
        self.atr().map(|atr| classify_atr(&atr))
    }

    /// Name of the reader
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    fn transmit_once(&mut self, command: &[u8]) -> Result<Bytes, pcsc::Error> {
        let card = self.card.as_ref().ok_or(pcsc::Error::RemovedCard)?;
        let mut buffer = [0u8; pcsc::MAX_BUFFER_SIZE];
        card.transmit(command, &mut buffer)
            .map(Bytes::copy_from_slice)
    }

    fn transmit(&mut self, command: &[u8]) -> Result<Bytes, PcscError> {
        if self.card.is_none() {
            return Err(PcscError::NoCard(self.reader_name.clone()));
        }

        match self.transmit_once(command) {
            Ok(response) => Ok(response),
            Err(pcsc::Error::ResetCard) if self.config.reconnect_on_reset => {
                debug!(reader = %self.reader_name, "Card was reset, reconnecting");
                self.card = None;
                self.card = Some(self.connect()?);
                Ok(self.transmit_once(command)?)
            }
            Err(e @ (pcsc::Error::ResetCard | pcsc::Error::RemovedCard)) => {
                self.card = None;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl CardTransport for PcscTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Error> {
        self.transmit(command).map_err(Error::from)
    }

    fn is_connected(&self) -> bool {
        self.card.is_some()
    }

    fn reset(&mut self) -> Result<(), Error> {
        if let Some(card) = self.card.take() {
            let _ = card.disconnect(Disposition::ResetCard);
        }
        self.card = Some(self.connect()?);
        Ok(())
    }
}

impl Drop for PcscTransport {
    fn drop(&mut self) {
        if let Some(card) = self.card.take() {
            let _ = card.disconnect(Disposition::LeaveCard);
        }
    }
}
