//! In-memory card profile model

use std::{collections::BTreeMap, fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    codec::{bytes_to_hex, canonical_hex},
    error::ProfileError,
};

/// Status word sent when nothing more specific applies
pub const DEFAULT_CUSTOM_RESPONSE: [u8; 2] = [0x90, 0x00];

/// Tag technology detected on a card
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Technology {
    /// ISO 14443-3A
    NfcA,
    /// ISO 14443-3B
    NfcB,
    /// JIS 6319-4 (FeliCa)
    NfcF,
    /// ISO 15693
    NfcV,
    /// ISO 14443-4
    IsoDep,
    /// MIFARE Classic sectors
    MifareClassic,
    /// MIFARE Ultralight pages
    MifareUltralight,
    /// NDEF formatted
    Ndef,
    /// Can be formatted to NDEF
    NdefFormatable,
    /// Anything else reported by the reader
    Other(String),
}

impl Technology {
    /// Short identifier used in profile files
    pub fn as_str(&self) -> &str {
        match self {
            Self::NfcA => "NfcA",
            Self::NfcB => "NfcB",
            Self::NfcF => "NfcF",
            Self::NfcV => "NfcV",
            Self::IsoDep => "IsoDep",
            Self::MifareClassic => "MifareClassic",
            Self::MifareUltralight => "MifareUltralight",
            Self::Ndef => "Ndef",
            Self::NdefFormatable => "NdefFormatable",
            Self::Other(name) => name,
        }
    }
}

impl FromStr for Technology {
    type Err = std::convert::Infallible;

    /// Accepts short names as well as fully qualified class names such as
    /// `android.nfc.tech.IsoDep`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let short = s.rsplit('.').next().unwrap_or(s);
        Ok(match short {
            "NfcA" => Self::NfcA,
            "NfcB" => Self::NfcB,
            "NfcF" => Self::NfcF,
            "NfcV" => Self::NfcV,
            "IsoDep" => Self::IsoDep,
            "MifareClassic" => Self::MifareClassic,
            "MifareUltralight" => Self::MifareUltralight,
            "Ndef" => Self::Ndef,
            "NdefFormatable" => Self::NdefFormatable,
            _ => Self::Other(s.to_string()),
        })
    }
}

impl From<String> for Technology {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(tech) => tech,
            Err(never) => match never {},
        }
    }
}

impl From<Technology> for String {
    fn from(value: Technology) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Technology-specific section of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    /// `NDEF`
    Ndef,
    /// `MIFARE`
    Mifare,
    /// `ISO_DEP`
    IsoDep,
    /// `NFC_A`
    NfcA,
}

impl Section {
    /// All sections in capture order
    pub const ALL: [Self; 4] = [Self::Ndef, Self::Mifare, Self::IsoDep, Self::NfcA];

    /// Key of the section in profile files
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Ndef => "NDEF",
            Self::Mifare => "MIFARE",
            Self::IsoDep => "ISO_DEP",
            Self::NfcA => "NFC_A",
        }
    }

    /// Technology the section is captured from
    pub const fn technology(&self) -> Technology {
        match self {
            Self::Ndef => Technology::Ndef,
            Self::Mifare => Technology::MifareClassic,
            Self::IsoDep => Technology::IsoDep,
            Self::NfcA => Technology::NfcA,
        }
    }

    /// Parse a section key
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// NDEF capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefSection {
    /// Platform NDEF type, e.g. `org.nfcforum.ndef.type2`
    pub ndef_type: String,
    /// Maximum NDEF message size in bytes
    pub max_size: u32,
    /// Whether the tag accepts NDEF writes
    pub writable: bool,
    /// Raw NDEF message, if one was stored
    pub message: Option<Vec<u8>>,
}

/// MIFARE card family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MifareType {
    /// Unknown family
    #[default]
    Unknown,
    /// MIFARE Classic
    Classic,
    /// MIFARE Plus
    Plus,
    /// MIFARE Pro
    Pro,
}

impl From<i32> for MifareType {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::Classic,
            1 => Self::Plus,
            2 => Self::Pro,
            _ => Self::Unknown,
        }
    }
}

impl From<MifareType> for i32 {
    fn from(value: MifareType) -> Self {
        match value {
            MifareType::Unknown => -1,
            MifareType::Classic => 0,
            MifareType::Plus => 1,
            MifareType::Pro => 2,
        }
    }
}

/// Outcome of reading one MIFARE sector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectorResult {
    /// Every block of the sector, in order
    Blocks(Vec<Vec<u8>>),
    /// No default key opened the sector
    AuthFailed,
    /// The reader failed while reading the sector
    Error(String),
}

/// MIFARE Classic capture
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MifareSection {
    /// Card family
    pub card_type: MifareType,
    /// Number of sectors
    pub sector_count: u32,
    /// Number of blocks
    pub block_count: u32,
    /// Memory size in bytes
    pub size_bytes: u32,
    /// One entry per sector index in `0..sector_count`
    pub sectors: BTreeMap<u32, SectorResult>,
}

impl MifareSection {
    /// Number of sectors that were read in full
    pub fn readable_sectors(&self) -> usize {
        self.sectors
            .values()
            .filter(|s| matches!(s, SectorResult::Blocks(_)))
            .count()
    }
}

/// Response recorded for one AID
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseResult {
    /// Raw response frame, status word included
    Ok(Vec<u8>),
    /// The exchange failed
    Error(String),
}

/// ISO-DEP capture
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IsoDepSection {
    /// Maximum transceive length of the link
    pub max_transceive_length: u32,
    /// Whether extended length APDUs are supported
    pub extended_length_apdu_supported: bool,
    /// Responses to SELECT, keyed by canonical uppercase AID hex
    pub aid_responses: BTreeMap<String, ResponseResult>,
}

impl IsoDepSection {
    /// Recorded response for the given AID
    pub fn response_for(&self, aid: &[u8]) -> Option<&ResponseResult> {
        self.aid_responses.get(&bytes_to_hex(aid))
    }
}

/// NFC-A capture
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NfcASection {
    /// ATQA bytes
    pub atqa: Vec<u8>,
    /// SAK byte
    pub sak: u8,
    /// Maximum transceive length of the link
    pub max_transceive_length: u32,
}

/// Captured behaviour of one physical card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardProfile {
    /// Unique identifier of the card
    pub uid: Vec<u8>,
    /// Capture time in seconds since the Unix epoch
    pub captured_at: u64,
    /// Technologies detected on the tag, without duplicates
    pub technologies: Vec<Technology>,
    /// NDEF section
    pub ndef: Option<NdefSection>,
    /// MIFARE Classic section
    pub mifare: Option<MifareSection>,
    /// ISO-DEP section
    pub iso_dep: Option<IsoDepSection>,
    /// NFC-A section
    pub nfc_a: Option<NfcASection>,
    /// Reply used when no structural rule applies
    pub custom_response: Vec<u8>,
    /// Free text annotation
    pub label: String,
    /// Probe failures, one per section that could not be captured
    pub notes: BTreeMap<Section, String>,
    /// Where the profile was last written
    pub saved_location: Option<PathBuf>,
}

impl CardProfile {
    /// Create a profile with only the identity fields set
    pub fn new(uid: impl Into<Vec<u8>>, captured_at: u64, technologies: Vec<Technology>) -> Self {
        let mut profile = Self {
            uid: uid.into(),
            captured_at,
            technologies: Vec::with_capacity(technologies.len()),
            ndef: None,
            mifare: None,
            iso_dep: None,
            nfc_a: None,
            custom_response: DEFAULT_CUSTOM_RESPONSE.to_vec(),
            label: String::new(),
            notes: BTreeMap::new(),
            saved_location: None,
        };
        for tech in technologies {
            profile.add_technology(tech);
        }
        profile
    }

    /// UID as canonical hex, which also names the profile on disk
    pub fn uid_hex(&self) -> String {
        bytes_to_hex(&self.uid)
    }

    /// Add a technology unless already present
    pub fn add_technology(&mut self, tech: Technology) {
        if !self.technologies.contains(&tech) {
            self.technologies.push(tech);
        }
    }

    /// Whether the technology was detected
    pub fn has_technology(&self, tech: &Technology) -> bool {
        self.technologies.contains(tech)
    }

    /// Whether the given section is populated
    pub const fn has_section(&self, section: Section) -> bool {
        match section {
            Section::Ndef => self.ndef.is_some(),
            Section::Mifare => self.mifare.is_some(),
            Section::IsoDep => self.iso_dep.is_some(),
            Section::NfcA => self.nfc_a.is_some(),
        }
    }

    /// Record a probe failure for a section
    pub fn note_failure(&mut self, section: Section, message: impl Into<String>) {
        self.notes.insert(section, message.into());
    }

    /// Set the free text label
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Set the fallback reply from (leniently decoded) hex
    pub fn set_custom_response(&mut self, hex: &str) {
        self.custom_response = crate::codec::hex_to_bytes(hex);
    }

    /// Check the structural invariants of a captured profile
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.uid.is_empty() {
            return Err(ProfileError::EmptyUid);
        }

        for section in Section::ALL {
            if self.has_section(section) && !self.has_technology(&section.technology()) {
                return Err(ProfileError::SectionWithoutTechnology(section));
            }
        }

        if let Some(mifare) = &self.mifare {
            let contiguous = mifare.sectors.len() == mifare.sector_count as usize
                && mifare.sectors.keys().copied().eq(0..mifare.sector_count);
            if !contiguous {
                return Err(ProfileError::SectorRange {
                    sector_count: mifare.sector_count,
                    found: mifare.sectors.len(),
                });
            }
        }

        if let Some(iso_dep) = &self.iso_dep {
            if let Some(aid) = iso_dep
                .aid_responses
                .keys()
                .find(|aid| aid.is_empty() || canonical_hex(aid) != **aid)
            {
                return Err(ProfileError::NonCanonicalAid(aid.clone()));
            }
        }

        Ok(())
    }
}
