//! Tag access over a PC/SC contactless reader
//!
//! Storage cards are driven with the PC/SC Part 3 pseudo-APDUs (`FF CA` GET
//! DATA, `FF 82` LOAD KEYS, `FF 86` GENERAL AUTHENTICATE, `FF B0` READ
//! BINARY). Processor cards get raw ISO 7816-4 frames, and NDEF is read with
//! the Type 4 tag procedure.

use std::sync::Arc;

use nfcclone_apdu_core::{
    Command, Response,
    command::{CLA_ISO, CLA_PCSC, INS_GET_DATA, INS_READ_BINARY, INS_SELECT},
    prelude::CardTransport,
};
use nfcclone_apdu_pcsc::{ContactlessCard, PcscTransport};
use nfcclone_capture::{
    IsoDepTech, KeyType, MifareClassicTech, MifareKey, NdefTech, NfcATech, Tag, TagError,
    TagTechnology,
};
use nfcclone_profile::{MifareType, Technology};
use parking_lot::Mutex;
use tracing::debug;

type SharedTransport = Arc<Mutex<PcscTransport>>;

const INS_LOAD_KEYS: u8 = 0x82;
const INS_GENERAL_AUTHENTICATE: u8 = 0x86;

/// Key slot of the reader used for every authentication
const KEY_SLOT: u8 = 0x00;

const NDEF_APPLICATION: [u8; 7] = [0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01];
const CAPABILITY_CONTAINER: [u8; 2] = [0xE1, 0x03];
const NDEF_TYPE_4: &str = "org.nfcforum.ndef.type4";

/// Largest frame a short APDU exchange can carry
const SHORT_APDU_MAX: u32 = 261;
/// Largest frame of an ISO 14443-3A storage card exchange
const NFC_A_MAX: u32 = 253;

/// Connection state shared by every technology handle
#[derive(Debug)]
struct Link {
    transport: SharedTransport,
    connected: bool,
}

impl Link {
    const fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            connected: false,
        }
    }

    fn connect(&mut self) -> Result<(), TagError> {
        if !self.transport.lock().is_connected() {
            return Err(TagError::Lost);
        }
        self.connected = true;
        Ok(())
    }

    const fn close(&mut self) {
        self.connected = false;
    }

    fn transceive(&self, frame: &[u8]) -> Result<Vec<u8>, TagError> {
        if !self.connected {
            return Err(TagError::NotConnected);
        }
        Ok(self.transport.lock().transmit_raw(frame)?.to_vec())
    }

    fn exchange(&self, command: &Command) -> Result<Response, TagError> {
        let response = self.transceive(&command.to_bytes()?)?;
        Ok(Response::from_bytes(&response)?)
    }

    /// Exchange a command that must succeed
    fn expect_success(&self, command: &Command, what: &str) -> Result<Response, TagError> {
        let response = self.exchange(command)?;
        if !response.is_success() {
            return Err(TagError::Io(format!("{what} failed: {}", response.status())));
        }
        Ok(response)
    }
}

macro_rules! impl_tag_technology {
    ($($handle:ty),*) => {$(
        impl TagTechnology for $handle {
            fn connect(&mut self) -> Result<(), TagError> {
                self.link.connect()
            }

            fn close(&mut self) -> Result<(), TagError> {
                self.link.close();
                Ok(())
            }

            fn is_connected(&self) -> bool {
                self.link.connected
            }
        }
    )*};
}

impl_tag_technology!(PcscNfcA, PcscMifare, PcscIsoDep);

/// NFC-A parameters of a storage card
///
/// PC/SC readers do not expose ATQA and SAK, so the nominal values of the
/// card family are reported.
#[derive(Debug)]
pub(crate) struct PcscNfcA {
    link: Link,
    atqa: [u8; 2],
    sak: u8,
}

impl NfcATech for PcscNfcA {
    fn atqa(&self) -> Vec<u8> {
        self.atqa.to_vec()
    }

    fn sak(&self) -> u8 {
        self.sak
    }

    fn max_transceive_length(&self) -> u32 {
        NFC_A_MAX
    }
}

/// MIFARE Classic through the reader's key store
#[derive(Debug)]
pub(crate) struct PcscMifare {
    link: Link,
    kind: ContactlessCard,
}

impl PcscMifare {
    fn block_address(block: u32) -> Result<[u8; 2], TagError> {
        u16::try_from(block)
            .map(u16::to_be_bytes)
            .map_err(|_| TagError::Unsupported("block address above 65535"))
    }
}

impl MifareClassicTech for PcscMifare {
    fn card_type(&self) -> MifareType {
        MifareType::Classic
    }

    fn sector_count(&self) -> u32 {
        match self.kind {
            ContactlessCard::MifareClassic4K => 40,
            ContactlessCard::MifareMini => 5,
            _ => 16,
        }
    }

    fn block_count(&self) -> u32 {
        match self.kind {
            ContactlessCard::MifareClassic4K => 256,
            ContactlessCard::MifareMini => 20,
            _ => 64,
        }
    }

    fn size(&self) -> u32 {
        self.block_count() * 16
    }

    fn authenticate(
        &mut self,
        sector: u32,
        key_type: KeyType,
        key: &MifareKey,
    ) -> Result<bool, TagError> {
        let load = Command::new_with_data(CLA_PCSC, INS_LOAD_KEYS, 0x00, KEY_SLOT, key.to_vec());
        self.link.expect_success(&load, "LOAD KEYS")?;

        let [msb, lsb] = Self::block_address(self.sector_to_block(sector))?;
        let authenticate = Command::new_with_data(
            CLA_PCSC,
            INS_GENERAL_AUTHENTICATE,
            0x00,
            0x00,
            vec![0x01, msb, lsb, key_type.command_code(), KEY_SLOT],
        );
        let response = self.link.exchange(&authenticate)?;
        debug!(sector, ?key_type, status = %response.status(), "General authenticate");
        Ok(response.is_success())
    }

    fn read_block(&mut self, block: u32) -> Result<Vec<u8>, TagError> {
        let [msb, lsb] = Self::block_address(block)?;
        let read = Command::new_with_le(CLA_PCSC, INS_READ_BINARY, msb, lsb, 16);
        let response = self.link.expect_success(&read, "READ BINARY")?;
        match response.payload() {
            data if data.len() == 16 => Ok(data.to_vec()),
            data => Err(TagError::Io(format!(
                "block read returned {} bytes",
                data.len()
            ))),
        }
    }
}

/// ISO 14443-4 through raw frames
#[derive(Debug)]
pub(crate) struct PcscIsoDep {
    link: Link,
}

impl IsoDepTech for PcscIsoDep {
    fn max_transceive_length(&self) -> u32 {
        SHORT_APDU_MAX
    }

    fn is_extended_length_apdu_supported(&self) -> bool {
        false
    }

    fn transceive(&mut self, frame: &[u8]) -> Result<Vec<u8>, TagError> {
        self.link.transceive(frame)
    }
}

/// Type 4 tag NDEF file
#[derive(Debug)]
pub(crate) struct PcscNdef {
    link: Link,
    capabilities: Option<Capabilities>,
}

/// Fields of the capability container used for reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Capabilities {
    max_read: u8,
    file_id: [u8; 2],
    max_size: u16,
    writable: bool,
}

impl Capabilities {
    /// Parse a capability container holding an NDEF file control TLV
    fn parse(cc: &[u8]) -> Result<Self, TagError> {
        if cc.len() < 15 || cc[7] != 0x04 {
            return Err(TagError::Io("malformed capability container".to_string()));
        }
        let max_read = u16::from_be_bytes([cc[3], cc[4]]);
        Ok(Self {
            max_read: u8::try_from(max_read).unwrap_or(u8::MAX).max(1),
            file_id: [cc[9], cc[10]],
            max_size: u16::from_be_bytes([cc[11], cc[12]]),
            writable: cc[14] == 0x00,
        })
    }
}

impl PcscNdef {
    fn select_file(&self, file_id: [u8; 2], what: &str) -> Result<(), TagError> {
        let select = Command::new_with_data(CLA_ISO, INS_SELECT, 0x00, 0x0C, file_id.to_vec());
        self.link.expect_success(&select, what)?;
        Ok(())
    }

    fn read(&self, offset: u16, len: u8) -> Result<Vec<u8>, TagError> {
        let [p1, p2] = offset.to_be_bytes();
        let read = Command::new_with_le(CLA_ISO, INS_READ_BINARY, p1, p2, len);
        Ok(self
            .link
            .expect_success(&read, "READ BINARY")?
            .payload()
            .to_vec())
    }
}

impl TagTechnology for PcscNdef {
    fn connect(&mut self) -> Result<(), TagError> {
        self.link.connect()?;
        let select = Command::select_aid(NDEF_APPLICATION.to_vec()).with_le(0);
        self.link.expect_success(&select, "SELECT NDEF application")?;
        self.select_file(CAPABILITY_CONTAINER, "SELECT capability container")?;
        self.capabilities = Some(Capabilities::parse(&self.read(0, 15)?)?);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TagError> {
        self.link.close();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.link.connected
    }
}

impl NdefTech for PcscNdef {
    fn ndef_type(&self) -> String {
        NDEF_TYPE_4.to_string()
    }

    fn max_size(&self) -> u32 {
        self.capabilities.map_or(0, |cc| u32::from(cc.max_size))
    }

    fn is_writable(&self) -> bool {
        self.capabilities.is_some_and(|cc| cc.writable)
    }

    fn read_message(&mut self) -> Result<Option<Vec<u8>>, TagError> {
        let cc = self.capabilities.ok_or(TagError::NotConnected)?;
        self.select_file(cc.file_id, "SELECT NDEF file")?;

        let nlen = match self.read(0, 2)?.as_slice() {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            other => {
                return Err(TagError::Io(format!(
                    "NDEF length field has {} bytes",
                    other.len()
                )));
            }
        };
        if nlen == 0 {
            return Ok(None);
        }

        let mut message = Vec::with_capacity(usize::from(nlen));
        while message.len() < usize::from(nlen) {
            let remaining = usize::from(nlen) - message.len();
            let len = u8::try_from(remaining).unwrap_or(u8::MAX).min(cc.max_read);
            let offset = u16::try_from(2 + message.len())
                .map_err(|_| TagError::Unsupported("NDEF file above 64 KiB"))?;
            let chunk = self.read(offset, len)?;
            if chunk.is_empty() {
                return Err(TagError::Io("NDEF file ended early".to_string()));
            }
            message.extend_from_slice(&chunk);
        }
        message.truncate(usize::from(nlen));
        Ok(Some(message))
    }
}

/// Card in a PC/SC reader seen as a tag
#[derive(Debug)]
pub(crate) struct PcscTag {
    transport: SharedTransport,
    technologies: Vec<Technology>,
    nfc_a: Option<PcscNfcA>,
    mifare: Option<PcscMifare>,
    iso_dep: Option<PcscIsoDep>,
    ndef: Option<PcscNdef>,
}

impl PcscTag {
    /// Inspect the card in the reader and build its technology handles
    pub(crate) fn open(transport: PcscTransport) -> Result<Self, TagError> {
        let kind = transport
            .card_kind()
            .map_err(|e| TagError::Transport(e.into()))?;
        let transport = Arc::new(Mutex::new(transport));
        let link = || Link::new(Arc::clone(&transport));

        let mut tag = Self {
            transport: Arc::clone(&transport),
            technologies: Vec::new(),
            nfc_a: None,
            mifare: None,
            iso_dep: None,
            ndef: None,
        };

        match kind {
            ContactlessCard::IsoDep => {
                tag.technologies.push(Technology::IsoDep);
                tag.iso_dep = Some(PcscIsoDep { link: link() });
                if Self::has_ndef_application(&transport) {
                    tag.technologies.push(Technology::Ndef);
                    tag.ndef = Some(PcscNdef {
                        link: link(),
                        capabilities: None,
                    });
                }
            }
            storage => {
                let (atqa, sak) = nominal_nfc_a(storage);
                tag.technologies.push(Technology::NfcA);
                tag.nfc_a = Some(PcscNfcA {
                    link: link(),
                    atqa,
                    sak,
                });
                if storage.is_mifare_classic() {
                    tag.technologies.push(Technology::MifareClassic);
                    tag.mifare = Some(PcscMifare {
                        link: link(),
                        kind: storage,
                    });
                } else if storage == ContactlessCard::MifareUltralight {
                    tag.technologies.push(Technology::MifareUltralight);
                }
            }
        }

        debug!(?kind, technologies = ?tag.technologies, "Opened PC/SC tag");
        Ok(tag)
    }

    fn has_ndef_application(transport: &SharedTransport) -> bool {
        let Ok(select) = Command::select_aid(NDEF_APPLICATION.to_vec())
            .with_le(0)
            .to_bytes()
        else {
            return false;
        };
        transport
            .lock()
            .transmit_raw(&select)
            .ok()
            .and_then(|response| Response::from_bytes(&response).ok())
            .is_some_and(|response| response.is_success())
    }
}

/// ATQA and SAK of a storage card family
const fn nominal_nfc_a(kind: ContactlessCard) -> ([u8; 2], u8) {
    match kind {
        ContactlessCard::MifareClassic4K => ([0x02, 0x00], 0x18),
        ContactlessCard::MifareMini => ([0x04, 0x00], 0x09),
        ContactlessCard::MifareUltralight => ([0x44, 0x00], 0x00),
        _ => ([0x04, 0x00], 0x08),
    }
}

impl Tag for PcscTag {
    fn id(&mut self) -> Result<Vec<u8>, TagError> {
        let get_uid = Command::new_with_le(CLA_PCSC, INS_GET_DATA, 0x00, 0x00, 0x00).to_bytes()?;
        let response = self.transport.lock().transmit_raw(&get_uid)?;
        let response = Response::from_bytes(&response)?;
        if !response.is_success() {
            return Err(TagError::Io(format!("GET UID failed: {}", response.status())));
        }
        Ok(response.payload().to_vec())
    }

    fn technologies(&self) -> Vec<Technology> {
        self.technologies.clone()
    }

    fn ndef(&mut self) -> Option<&mut dyn NdefTech> {
        self.ndef.as_mut().map(|t| t as &mut dyn NdefTech)
    }

    fn mifare_classic(&mut self) -> Option<&mut dyn MifareClassicTech> {
        self.mifare.as_mut().map(|t| t as &mut dyn MifareClassicTech)
    }

    fn iso_dep(&mut self) -> Option<&mut dyn IsoDepTech> {
        self.iso_dep.as_mut().map(|t| t as &mut dyn IsoDepTech)
    }

    fn nfc_a(&mut self) -> Option<&mut dyn NfcATech> {
        self.nfc_a.as_mut().map(|t| t as &mut dyn NfcATech)
    }
}
