//! Scripted in-memory tag

use std::collections::BTreeMap;

use nfcclone_apdu_core::CommandView;
use nfcclone_profile::{MifareType, Technology};

use crate::{
    error::TagError,
    tag::{IsoDepTech, KeyType, MifareClassicTech, MifareKey, NdefTech, NfcATech, Tag, TagTechnology},
};

const FACTORY_KEY: MifareKey = [0xFF; 6];

/// In-memory tag with optional per-technology handles
#[derive(Debug, Default)]
pub struct MockTag {
    /// UID returned by `id`
    pub uid: Vec<u8>,
    /// Make `id` fail
    pub uid_error: bool,
    /// NDEF handle
    pub ndef: Option<MockNdef>,
    /// MIFARE Classic handle
    pub mifare: Option<MockMifare>,
    /// ISO-DEP handle
    pub iso_dep: Option<MockIsoDep>,
    /// NFC-A handle
    pub nfc_a: Option<MockNfcA>,
}

impl MockTag {
    /// Tag with only a UID
    pub fn new(uid: Vec<u8>) -> Self {
        Self {
            uid,
            ..Default::default()
        }
    }

    /// Make reading the UID fail
    pub const fn with_uid_error(mut self) -> Self {
        self.uid_error = true;
        self
    }

    /// Add an NDEF handle
    pub fn with_ndef(mut self, ndef: MockNdef) -> Self {
        self.ndef = Some(ndef);
        self
    }

    /// Add a MIFARE Classic handle
    pub fn with_mifare(mut self, mifare: MockMifare) -> Self {
        self.mifare = Some(mifare);
        self
    }

    /// Add an ISO-DEP handle
    pub fn with_iso_dep(mut self, iso_dep: MockIsoDep) -> Self {
        self.iso_dep = Some(iso_dep);
        self
    }

    /// Add an NFC-A handle
    pub fn with_nfc_a(mut self, nfc_a: MockNfcA) -> Self {
        self.nfc_a = Some(nfc_a);
        self
    }
}

impl Tag for MockTag {
    fn id(&mut self) -> Result<Vec<u8>, TagError> {
        if self.uid_error {
            return Err(TagError::Lost);
        }
        Ok(self.uid.clone())
    }

    fn technologies(&self) -> Vec<Technology> {
        let mut technologies = Vec::new();
        if self.nfc_a.is_some() {
            technologies.push(Technology::NfcA);
        }
        if self.mifare.is_some() {
            technologies.push(Technology::MifareClassic);
        }
        if self.iso_dep.is_some() {
            technologies.push(Technology::IsoDep);
        }
        if self.ndef.is_some() {
            technologies.push(Technology::Ndef);
        }
        technologies
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

/// Connection state shared by the mock handles
#[derive(Debug, Default)]
struct Link {
    connected: bool,
    connect_error: Option<String>,
}

impl Link {
    fn connect(&mut self) -> Result<(), TagError> {
        if let Some(message) = &self.connect_error {
            return Err(TagError::Io(message.clone()));
        }
        self.connected = true;
        Ok(())
    }

    const fn ensure(&self) -> Result<(), TagError> {
        if self.connected {
            Ok(())
        } else {
            Err(TagError::NotConnected)
        }
    }
}

macro_rules! impl_link {
    ($ty:ty) => {
        impl TagTechnology for $ty {
            fn connect(&mut self) -> Result<(), TagError> {
                self.link.connect()
            }

            fn close(&mut self) -> Result<(), TagError> {
                self.link.connected = false;
                Ok(())
            }

            fn is_connected(&self) -> bool {
                self.link.connected
            }
        }
    };
}

/// NDEF handle
#[derive(Debug, Default)]
pub struct MockNdef {
    link: Link,
    /// Stored message
    pub message: Option<Vec<u8>>,
}

impl MockNdef {
    /// Handle holding the given message
    pub fn new(message: Option<Vec<u8>>) -> Self {
        Self {
            link: Link::default(),
            message,
        }
    }

    /// Handle whose `connect` fails
    pub fn failing(message: &str) -> Self {
        Self {
            link: Link {
                connected: false,
                connect_error: Some(message.to_string()),
            },
            message: None,
        }
    }
}

impl_link!(MockNdef);

impl NdefTech for MockNdef {
    fn ndef_type(&self) -> String {
        "org.nfcforum.ndef.type2".to_string()
    }

    fn max_size(&self) -> u32 {
        137
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn read_message(&mut self) -> Result<Option<Vec<u8>>, TagError> {
        self.link.ensure()?;
        Ok(self.message.clone())
    }
}

#[derive(Debug, Clone)]
struct MockSector {
    key_a: Option<MifareKey>,
    key_b: Option<MifareKey>,
    attempts: usize,
}

/// MIFARE Classic handle
#[derive(Debug)]
pub struct MockMifare {
    link: Link,
    sectors: Vec<MockSector>,
    failing_block: Option<u32>,
    authenticated: Option<u32>,
}

impl MockMifare {
    /// 16 sector card where every sector opens with the factory key
    pub fn classic_1k() -> Self {
        let sector = MockSector {
            key_a: Some(FACTORY_KEY),
            key_b: Some(FACTORY_KEY),
            attempts: 0,
        };
        Self {
            link: Link::default(),
            sectors: vec![sector; 16],
            failing_block: None,
            authenticated: None,
        }
    }

    /// Sector opens only with key A set to `key`
    pub fn with_key_a(mut self, sector: u32, key: MifareKey) -> Self {
        if let Some(s) = self.sectors.get_mut(sector as usize) {
            s.key_a = Some(key);
            s.key_b = None;
        }
        self
    }

    /// Sector opens only with key B set to `key`
    pub fn with_key_b(mut self, sector: u32, key: MifareKey) -> Self {
        if let Some(s) = self.sectors.get_mut(sector as usize) {
            s.key_a = None;
            s.key_b = Some(key);
        }
        self
    }

    /// No key opens any sector
    pub fn locked(mut self) -> Self {
        for sector in &mut self.sectors {
            sector.key_a = None;
            sector.key_b = None;
        }
        self
    }

    /// Reading this block fails
    pub const fn with_failing_block(mut self, block: u32) -> Self {
        self.failing_block = Some(block);
        self
    }

    /// Number of authentication attempts made on a sector
    pub fn attempts_for(&self, sector: u32) -> usize {
        self.sectors
            .get(sector as usize)
            .map_or(0, |s| s.attempts)
    }

    /// Block content derived from its number
    pub fn block_data(block: u32) -> Vec<u8> {
        let mut data = vec![0u8; 16];
        data[0] = block as u8;
        data[15] = 0xAA;
        data
    }
}

impl_link!(MockMifare);

impl MifareClassicTech for MockMifare {
    fn card_type(&self) -> MifareType {
        MifareType::Classic
    }

    fn sector_count(&self) -> u32 {
        self.sectors.len() as u32
    }

    fn block_count(&self) -> u32 {
        self.sectors.len() as u32 * 4
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
        self.link.ensure()?;
        let s = self
            .sectors
            .get_mut(sector as usize)
            .ok_or(TagError::Unsupported("sector out of range"))?;
        s.attempts += 1;

        let expected = match key_type {
            KeyType::A => s.key_a,
            KeyType::B => s.key_b,
        };
        let accepted = expected.as_ref() == Some(key);
        self.authenticated = accepted.then_some(sector);
        Ok(accepted)
    }

    fn read_block(&mut self, block: u32) -> Result<Vec<u8>, TagError> {
        self.link.ensure()?;
        if self.failing_block == Some(block) {
            return Err(TagError::Io("Transceive failed".to_string()));
        }
        if self.authenticated.map(|s| self.sector_to_block(s)) != Some(block - block % 4) {
            return Err(TagError::Io("Sector not authenticated".to_string()));
        }
        Ok(Self::block_data(block))
    }
}

/// ISO-DEP handle answering SELECT by AID
#[derive(Debug, Default)]
pub struct MockIsoDep {
    link: Link,
    responses: BTreeMap<Vec<u8>, Result<Vec<u8>, String>>,
    /// Every frame passed to `transceive`
    pub sent: Vec<Vec<u8>>,
}

impl MockIsoDep {
    /// Handle answering `6A 82` to every SELECT
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer a SELECT of `aid` with `response`
    pub fn with_response(mut self, aid: &[u8], response: Vec<u8>) -> Self {
        self.responses.insert(aid.to_vec(), Ok(response));
        self
    }

    /// Fail the transceive for a SELECT of `aid`
    pub fn with_failure(mut self, aid: &[u8], message: &str) -> Self {
        self.responses.insert(aid.to_vec(), Err(message.to_string()));
        self
    }
}

impl_link!(MockIsoDep);

impl IsoDepTech for MockIsoDep {
    fn max_transceive_length(&self) -> u32 {
        261
    }

    fn is_extended_length_apdu_supported(&self) -> bool {
        false
    }

    fn transceive(&mut self, frame: &[u8]) -> Result<Vec<u8>, TagError> {
        self.link.ensure()?;
        self.sent.push(frame.to_vec());

        let aid = CommandView::new(frame)
            .filter(CommandView::is_select)
            .and_then(|view| view.data().ok())
            .unwrap_or_default();

        match self.responses.get(aid) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(message)) => Err(TagError::Io(message.clone())),
            None => Ok(vec![0x6A, 0x82]),
        }
    }
}

/// NFC-A handle
#[derive(Debug, Default)]
pub struct MockNfcA {
    link: Link,
    atqa: [u8; 2],
    sak: u8,
}

impl MockNfcA {
    /// Handle with the given ATQA and SAK
    pub fn new(atqa: [u8; 2], sak: u8) -> Self {
        Self {
            link: Link::default(),
            atqa,
            sak,
        }
    }
}

impl_link!(MockNfcA);

impl NfcATech for MockNfcA {
    fn atqa(&self) -> Vec<u8> {
        self.atqa.to_vec()
    }

    fn sak(&self) -> u8 {
        self.sak
    }

    fn max_transceive_length(&self) -> u32 {
        253
    }
}
