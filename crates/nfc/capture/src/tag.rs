//! Tag access capability supplied by the hardware layer
//!
//! A [`Tag`] is a card currently in the field. It hands out one handle per
//! technology it supports; each handle is connected, used and closed
//! independently. Every call is fallible and a failure of one technology
//! does not affect the others.

use nfcclone_apdu_core::command::{INS_MIFARE_AUTH_A, INS_MIFARE_AUTH_B};
use nfcclone_profile::{MifareType, Technology};

use crate::error::TagError;

/// MIFARE Classic sector key
pub type MifareKey = [u8; 6];

/// Which of the two sector keys to authenticate with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Key A
    A,
    /// Key B
    B,
}

impl KeyType {
    /// MIFARE authenticate command code for this key
    pub const fn command_code(&self) -> u8 {
        match self {
            Self::A => INS_MIFARE_AUTH_A,
            Self::B => INS_MIFARE_AUTH_B,
        }
    }
}

/// Lifecycle shared by every technology handle
pub trait TagTechnology {
    /// Open the technology
    fn connect(&mut self) -> Result<(), TagError>;

    /// Close the technology
    fn close(&mut self) -> Result<(), TagError>;

    /// Whether `connect` succeeded and `close` was not called since
    fn is_connected(&self) -> bool;
}

/// NDEF access
pub trait NdefTech: TagTechnology {
    /// Platform type of the NDEF tag
    fn ndef_type(&self) -> String;

    /// Maximum NDEF message size in bytes
    fn max_size(&self) -> u32;

    /// Whether the tag accepts NDEF writes
    fn is_writable(&self) -> bool;

    /// Read the stored NDEF message, `None` if the tag holds none
    fn read_message(&mut self) -> Result<Option<Vec<u8>>, TagError>;
}

/// MIFARE Classic access
pub trait MifareClassicTech: TagTechnology {
    /// Card family
    fn card_type(&self) -> MifareType;

    /// Number of sectors
    fn sector_count(&self) -> u32;

    /// Number of blocks
    fn block_count(&self) -> u32;

    /// Memory size in bytes
    fn size(&self) -> u32;

    /// Authenticate a sector, `Ok(false)` if the key was rejected
    fn authenticate(
        &mut self,
        sector: u32,
        key_type: KeyType,
        key: &MifareKey,
    ) -> Result<bool, TagError>;

    /// Read one 16-byte block
    fn read_block(&mut self, block: u32) -> Result<Vec<u8>, TagError>;

    /// First block of a sector
    ///
    /// Sectors below 32 hold 4 blocks, the rest 16.
    fn sector_to_block(&self, sector: u32) -> u32 {
        if sector < 32 {
            sector * 4
        } else {
            128 + (sector - 32) * 16
        }
    }

    /// Number of blocks in a sector
    fn block_count_in_sector(&self, sector: u32) -> u32 {
        if sector < 32 { 4 } else { 16 }
    }
}

/// ISO 14443-4 access
pub trait IsoDepTech: TagTechnology {
    /// Maximum frame size accepted by `transceive`
    fn max_transceive_length(&self) -> u32;

    /// Whether extended length APDUs are supported
    fn is_extended_length_apdu_supported(&self) -> bool;

    /// Send a command frame and return the raw response frame
    fn transceive(&mut self, frame: &[u8]) -> Result<Vec<u8>, TagError>;
}

/// ISO 14443-3A access
pub trait NfcATech: TagTechnology {
    /// ATQA bytes
    fn atqa(&self) -> Vec<u8>;

    /// SAK byte
    fn sak(&self) -> u8;

    /// Maximum frame size of the link
    fn max_transceive_length(&self) -> u32;
}

/// A tag in the field
pub trait Tag {
    /// Raw identifier (UID)
    fn id(&mut self) -> Result<Vec<u8>, TagError>;

    /// Technologies the tag reports
    fn technologies(&self) -> Vec<Technology>;

    /// NDEF handle, if supported
    fn ndef(&mut self) -> Option<&mut dyn NdefTech> {
        None
    }

    /// MIFARE Classic handle, if supported
    fn mifare_classic(&mut self) -> Option<&mut dyn MifareClassicTech> {
        None
    }

    /// ISO-DEP handle, if supported
    fn iso_dep(&mut self) -> Option<&mut dyn IsoDepTech> {
        None
    }

    /// NFC-A handle, if supported
    fn nfc_a(&mut self) -> Option<&mut dyn NfcATech> {
        None
    }
}
