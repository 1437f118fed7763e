//! JSON file format of a card profile
//!
//! Byte payloads are hex strings. Sections that fail to parse are dropped
//! with a warning rather than failing the whole document, and unknown fields
//! are ignored.

use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::warn;

use crate::{
    codec::{bytes_to_hex, canonical_hex, hex_to_bytes},
    error::ProfileError,
    model::{
        CardProfile, IsoDepSection, MifareSection, NdefSection, NfcASection, ResponseResult,
        Section, SectorResult, Technology,
    },
};

const AUTH_FAILED: &str = "Authentication failed";
const ERROR_PREFIX: &str = "Error:";
const READ_ERROR_PREFIX: &str = "Read error:";
const NOTE_SUFFIX: &str = "_Error";
const SECTOR_PREFIX: &str = "sector_";

#[derive(Debug, Serialize, Deserialize)]
struct ProfileDocument {
    #[serde(rename = "UID")]
    uid: String,
    #[serde(rename = "Timestamp", default)]
    timestamp: u64,
    #[serde(rename = "Technologies", default)]
    technologies: Vec<Technology>,
    #[serde(rename = "NDEF", default, skip_serializing_if = "Option::is_none")]
    ndef: Option<Value>,
    #[serde(rename = "MIFARE", default, skip_serializing_if = "Option::is_none")]
    mifare: Option<Value>,
    #[serde(rename = "ISO_DEP", default, skip_serializing_if = "Option::is_none")]
    iso_dep: Option<Value>,
    #[serde(rename = "NFC_A", default, skip_serializing_if = "Option::is_none")]
    nfc_a: Option<Value>,
    #[serde(default = "default_custom_response")]
    custom_response: String,
    #[serde(default)]
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_location: Option<PathBuf>,
    /// Capture notes (`<SECTION>_Error`) and any unknown fields
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

fn default_custom_response() -> String {
    bytes_to_hex(&crate::model::DEFAULT_CUSTOM_RESPONSE)
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct NdefDocument {
    #[serde(rename = "Type")]
    ndef_type: String,
    #[serde(rename = "MaxSize")]
    max_size: u32,
    #[serde(rename = "IsWritable")]
    writable: bool,
    #[serde(rename = "Message", skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct MifareDocument {
    #[serde(rename = "Type")]
    card_type: i32,
    #[serde(rename = "SectorCount")]
    sector_count: u32,
    #[serde(rename = "BlockCount")]
    block_count: u32,
    #[serde(rename = "Size")]
    size: u32,
    #[serde(rename = "Sectors")]
    sectors: BTreeMap<String, SectorValue>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum SectorValue {
    Blocks(Vec<String>),
    Text(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct IsoDepDocument {
    #[serde(rename = "MaxTransceiveLength")]
    max_transceive_length: u32,
    #[serde(rename = "IsExtendedLengthApduSupported")]
    extended_length_apdu_supported: bool,
    #[serde(rename = "AID_Responses")]
    aid_responses: BTreeMap<String, String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct NfcADocument {
    #[serde(rename = "ATQA")]
    atqa: String,
    #[serde(rename = "SAK")]
    sak: u8,
    #[serde(rename = "MaxTransceiveLength")]
    max_transceive_length: u32,
}

fn error_text(message: &str) -> String {
    format!("{ERROR_PREFIX} {message}")
}

/// Decode the blocks of a sector; a block holding a read failure turns the
/// whole sector into an error
fn parse_blocks(sector: u32, blocks: &[String]) -> SectorResult {
    let first = if sector < 32 { sector * 4 } else { 128 + (sector - 32) * 16 };
    let mut decoded = Vec::with_capacity(blocks.len());
    for (offset, block) in (0u32..).zip(blocks) {
        if let Some(message) = block_error(block) {
            let number = first.saturating_add(offset);
            return SectorResult::Error(format!("block {number}: {message}"));
        }
        decoded.push(hex_to_bytes(block));
    }
    SectorResult::Blocks(decoded)
}

/// Message of a block entry that is not hex data
fn block_error(block: &str) -> Option<&str> {
    if let Some(message) = block.strip_prefix(READ_ERROR_PREFIX) {
        return Some(message.trim_start());
    }
    block
        .chars()
        .any(|c| c.is_alphanumeric() && !c.is_ascii_hexdigit())
        .then_some(block.trim())
}

/// Message of an `Error: ...` marker, if the value is one
fn strip_error(value: &str) -> Option<String> {
    value
        .strip_prefix(ERROR_PREFIX)
        .map(|message| message.trim_start().to_string())
}

impl From<&NdefSection> for NdefDocument {
    fn from(section: &NdefSection) -> Self {
        Self {
            ndef_type: section.ndef_type.clone(),
            max_size: section.max_size,
            writable: section.writable,
            message: section.message.as_deref().map(bytes_to_hex),
        }
    }
}

impl From<NdefDocument> for NdefSection {
    fn from(doc: NdefDocument) -> Self {
        Self {
            ndef_type: doc.ndef_type,
            max_size: doc.max_size,
            writable: doc.writable,
            message: doc.message.as_deref().map(hex_to_bytes),
        }
    }
}

impl From<&MifareSection> for MifareDocument {
    fn from(section: &MifareSection) -> Self {
        let sectors = section
            .sectors
            .iter()
            .map(|(index, result)| {
                let value = match result {
                    SectorResult::Blocks(blocks) => {
                        SectorValue::Blocks(blocks.iter().map(|b| bytes_to_hex(b)).collect())
                    }
                    SectorResult::AuthFailed => SectorValue::Text(AUTH_FAILED.to_string()),
                    SectorResult::Error(message) => SectorValue::Text(error_text(message)),
                };
                (format!("{SECTOR_PREFIX}{index}"), value)
            })
            .collect();

        Self {
            card_type: section.card_type.into(),
            sector_count: section.sector_count,
            block_count: section.block_count,
            size: section.size_bytes,
            sectors,
        }
    }
}

impl TryFrom<MifareDocument> for MifareSection {
    type Error = ProfileError;

    fn try_from(doc: MifareDocument) -> Result<Self, Self::Error> {
        let mut sectors = BTreeMap::new();
        for (key, value) in doc.sectors {
            let index = key
                .strip_prefix(SECTOR_PREFIX)
                .and_then(|n| n.parse::<u32>().ok())
                .ok_or_else(|| ProfileError::SectorKey(key.clone()))?;

            let result = match value {
                SectorValue::Blocks(blocks) => parse_blocks(index, &blocks),
                SectorValue::Text(text) if text == AUTH_FAILED => SectorResult::AuthFailed,
                SectorValue::Text(text) => SectorResult::Error(strip_error(&text).unwrap_or(text)),
            };
            sectors.insert(index, result);
        }

        Ok(Self {
            card_type: doc.card_type.into(),
            sector_count: doc.sector_count,
            block_count: doc.block_count,
            size_bytes: doc.size,
            sectors,
        })
    }
}

impl From<&IsoDepSection> for IsoDepDocument {
    fn from(section: &IsoDepSection) -> Self {
        let aid_responses = section
            .aid_responses
            .iter()
            .map(|(aid, result)| {
                let value = match result {
                    ResponseResult::Ok(bytes) => bytes_to_hex(bytes),
                    ResponseResult::Error(message) => error_text(message),
                };
                (aid.clone(), value)
            })
            .collect();

        Self {
            max_transceive_length: section.max_transceive_length,
            extended_length_apdu_supported: section.extended_length_apdu_supported,
            aid_responses,
        }
    }
}

impl From<IsoDepDocument> for IsoDepSection {
    fn from(doc: IsoDepDocument) -> Self {
        let aid_responses = doc
            .aid_responses
            .into_iter()
            .map(|(aid, value)| {
                let result = strip_error(&value)
                    .map_or_else(|| ResponseResult::Ok(hex_to_bytes(&value)), ResponseResult::Error);
                (canonical_hex(&aid), result)
            })
            .collect();

        Self {
            max_transceive_length: doc.max_transceive_length,
            extended_length_apdu_supported: doc.extended_length_apdu_supported,
            aid_responses,
        }
    }
}

impl From<&NfcASection> for NfcADocument {
    fn from(section: &NfcASection) -> Self {
        Self {
            atqa: bytes_to_hex(&section.atqa),
            sak: section.sak,
            max_transceive_length: section.max_transceive_length,
        }
    }
}

impl From<NfcADocument> for NfcASection {
    fn from(doc: NfcADocument) -> Self {
        Self {
            atqa: hex_to_bytes(&doc.atqa),
            sak: doc.sak,
            max_transceive_length: doc.max_transceive_length,
        }
    }
}

/// Parse one section, dropping it with a warning if it is malformed
fn parse_section<D, S>(section: Section, value: Option<Value>) -> Option<S>
where
    D: DeserializeOwned,
    S: TryFrom<D>,
    S::Error: std::fmt::Display,
{
    let value = value?;
    let parsed = serde_json::from_value::<D>(value)
        .map_err(|e| e.to_string())
        .and_then(|doc| S::try_from(doc).map_err(|e| e.to_string()));

    match parsed {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!(section = %section, %error, "Dropping malformed profile section");
            None
        }
    }
}

fn section_value<D: Serialize>(doc: D) -> Result<Value, ProfileError> {
    serde_json::to_value(doc).map_err(ProfileError::from)
}

/// Parse a profile document
///
/// The result is not validated; see [`CardProfile::validate`].
pub fn from_json(input: &str) -> Result<CardProfile, ProfileError> {
    let doc: ProfileDocument = serde_json::from_str(input)?;

    let notes = doc
        .extra
        .iter()
        .filter_map(|(key, value)| {
            let section = Section::from_key(key.strip_suffix(NOTE_SUFFIX)?)?;
            Some((section, value.as_str()?.to_string()))
        })
        .collect();

    let mut profile = CardProfile {
        uid: hex_to_bytes(&doc.uid),
        captured_at: doc.timestamp,
        technologies: Vec::with_capacity(doc.technologies.len()),
        ndef: parse_section::<NdefDocument, _>(Section::Ndef, doc.ndef),
        mifare: parse_section::<MifareDocument, _>(Section::Mifare, doc.mifare),
        iso_dep: parse_section::<IsoDepDocument, _>(Section::IsoDep, doc.iso_dep),
        nfc_a: parse_section::<NfcADocument, _>(Section::NfcA, doc.nfc_a),
        custom_response: hex_to_bytes(&doc.custom_response),
        label: doc.label,
        notes,
        saved_location: doc.saved_location,
    };
    for tech in doc.technologies {
        profile.add_technology(tech);
    }

    Ok(profile)
}

/// Render a profile as pretty-printed JSON
pub fn to_json_pretty(profile: &CardProfile) -> Result<String, ProfileError> {
    let extra = profile
        .notes
        .iter()
        .map(|(section, message)| {
            (
                format!("{}{NOTE_SUFFIX}", section.key()),
                Value::String(message.clone()),
            )
        })
        .collect();

    let doc = ProfileDocument {
        uid: profile.uid_hex(),
        timestamp: profile.captured_at,
        technologies: profile.technologies.clone(),
        ndef: profile.ndef.as_ref().map(NdefDocument::from).map(section_value).transpose()?,
        mifare: profile
            .mifare
            .as_ref()
            .map(MifareDocument::from)
            .map(section_value)
            .transpose()?,
        iso_dep: profile
            .iso_dep
            .as_ref()
            .map(IsoDepDocument::from)
            .map(section_value)
            .transpose()?,
        nfc_a: profile.nfc_a.as_ref().map(NfcADocument::from).map(section_value).transpose()?,
        custom_response: bytes_to_hex(&profile.custom_response),
        label: profile.label.clone(),
        saved_location: profile.saved_location.clone(),
        extra,
    };

    Ok(serde_json::to_string_pretty(&doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MifareType;

    const CAPTURED: &str = r#"{
        "UID": "04a22b725c6380",
        "Timestamp": 1700000000,
        "Technologies": ["android.nfc.tech.NfcA", "android.nfc.tech.MifareClassic", "android.nfc.tech.IsoDep"],
        "AndroidVersion": 33,
        "DeviceModel": "Pixel",
        "MIFARE": {
            "Type": 0,
            "SectorCount": 3,
            "BlockCount": 12,
            "Size": 192,
            "Sectors": {
                "sector_0": ["04A22B725C6380", "00000000000000000000000000000000"],
                "sector_1": "Authentication failed",
                "sector_2": "Error: Tag was lost."
            }
        },
        "ISO_DEP": {
            "MaxTransceiveLength": 261,
            "IsExtendedLengthApduSupported": false,
            "AID_Responses": {
                "a0000001510000": "6F108407A0000001510000A5049F6501FF9000",
                "F001020304050607": "Error: Transceive failed"
            }
        },
        "NFC_A": {"ATQA": "4400", "SAK": 8, "MaxTransceiveLength": 253},
        "NDEF_Error": "Tag is not NDEF formatted",
        "custom_response": "9000",
        "label": "office badge"
    }"#;

    #[test]
    fn test_parse_captured_document() {
        let profile = from_json(CAPTURED).unwrap();

        assert_eq!(profile.uid_hex(), "04A22B725C6380");
        assert_eq!(profile.captured_at, 1_700_000_000);
        assert_eq!(
            profile.technologies,
            vec![Technology::NfcA, Technology::MifareClassic, Technology::IsoDep]
        );
        assert_eq!(profile.label, "office badge");
        assert_eq!(
            profile.notes.get(&Section::Ndef).map(String::as_str),
            Some("Tag is not NDEF formatted")
        );

        let mifare = profile.mifare.as_ref().unwrap();
        assert_eq!(mifare.card_type, MifareType::Classic);
        assert_eq!(mifare.sectors[&1], SectorResult::AuthFailed);
        assert_eq!(mifare.sectors[&2], SectorResult::Error("Tag was lost.".into()));
        assert!(matches!(&mifare.sectors[&0], SectorResult::Blocks(b) if b.len() == 2));

        let iso_dep = profile.iso_dep.as_ref().unwrap();
        assert!(matches!(
            iso_dep.aid_responses.get("A0000001510000"),
            Some(ResponseResult::Ok(bytes)) if bytes.ends_with(&[0x90, 0x00])
        ));
        assert_eq!(
            iso_dep.aid_responses.get("F001020304050607"),
            Some(&ResponseResult::Error("Transceive failed".into()))
        );
        assert_eq!(profile.nfc_a.as_ref().unwrap().atqa, vec![0x44, 0x00]);

        profile.validate().unwrap();
    }

    #[test]
    fn test_block_read_failure_marks_sector() {
        let profile = from_json(
            r#"{
                "UID": "01020304",
                "Technologies": ["android.nfc.tech.MifareClassic"],
                "MIFARE": {
                    "Type": 0,
                    "SectorCount": 2,
                    "BlockCount": 8,
                    "Size": 128,
                    "Sectors": {
                        "sector_0": ["01020304050607080910111213141516", "00000000000000000000000000000000",
                                     "00000000000000000000000000000000", "FFFFFFFFFFFFFF078069FFFFFFFFFFFF"],
                        "sector_1": ["00000000000000000000000000000000", "Read error: Tag was lost.", "00", "00"]
                    }
                }
            }"#,
        )
        .unwrap();

        let mifare = profile.mifare.as_ref().unwrap();
        assert!(matches!(&mifare.sectors[&0], SectorResult::Blocks(b) if b.len() == 4));
        assert_eq!(mifare.sectors[&1], SectorResult::Error("block 5: Tag was lost.".into()));
        assert_eq!(mifare.readable_sectors(), 1);
    }

    #[test]
    fn test_write_then_read_preserves_profile() {
        let mut profile = from_json(CAPTURED).unwrap();
        profile.saved_location = Some(PathBuf::from("/tmp/cards/card_04A22B725C6380.json"));

        let json = to_json_pretty(&profile).unwrap();
        assert!(json.contains("\"NDEF_Error\""));
        assert!(json.contains("\"sector_1\": \"Authentication failed\""));
        assert!(!json.contains("AndroidVersion"));

        assert_eq!(from_json(&json).unwrap(), profile);
    }

    #[test]
    fn test_missing_optional_fields() {
        let profile = from_json(r#"{"UID": "DEADBEEF"}"#).unwrap();
        assert_eq!(profile.uid, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(profile.custom_response, vec![0x90, 0x00]);
        assert!(profile.technologies.is_empty());
        assert!(profile.mifare.is_none());
        assert!(profile.label.is_empty());
    }

    #[test]
    fn test_malformed_section_is_dropped() {
        let profile = from_json(
            r#"{
                "UID": "01020304",
                "Technologies": ["MifareClassic"],
                "MIFARE": {"SectorCount": 1, "Sectors": {"first": "Authentication failed"}},
                "NFC_A": "not an object"
            }"#,
        )
        .unwrap();
        assert!(profile.mifare.is_none());
        assert!(profile.nfc_a.is_none());
    }

    #[test]
    fn test_missing_uid_is_an_error() {
        assert!(matches!(
            from_json(r#"{"Timestamp": 1}"#),
            Err(ProfileError::Json(_))
        ));
    }
}
