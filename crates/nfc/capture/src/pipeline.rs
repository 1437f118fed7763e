//! Capture pipeline
//!
//! Probes every technology of a tag independently and merges the results
//! into a [`CardProfile`]. Only a missing UID fails a capture; any other
//! probe failure is recorded as a note on the profile.

use std::collections::BTreeMap;

use chrono::Utc;
use nfcclone_apdu_core::Command;
use nfcclone_profile::{
    CardProfile, IsoDepSection, MifareSection, NdefSection, NfcASection, ProfileStore,
    ResponseResult, Section, SectorResult, bytes_to_hex,
};
use tracing::{debug, info, warn};

use crate::{
    defaults::{DEFAULT_KEYS, PROBE_AIDS},
    error::{CaptureError, TagError},
    tag::{IsoDepTech, KeyType, MifareClassicTech, NdefTech, NfcATech, Tag, TagTechnology},
};

/// Largest sector of any MIFARE Classic layout
const MAX_BLOCKS_PER_SECTOR: u32 = 16;

/// Captures tags and persists the resulting profiles
#[derive(Debug, Clone)]
pub struct CapturePipeline {
    store: ProfileStore,
    custom_response: Option<Vec<u8>>,
}

impl CapturePipeline {
    /// Create a pipeline writing to the given store
    pub const fn new(store: ProfileStore) -> Self {
        Self {
            store,
            custom_response: None,
        }
    }

    /// Store this fallback reply in new profiles instead of `90 00`
    pub fn with_custom_response(mut self, response: impl Into<Vec<u8>>) -> Self {
        self.custom_response = Some(response.into());
        self
    }

    /// Capture the tag now and save its profile
    ///
    /// The returned profile has `saved_location` set.
    pub fn capture(&self, tag: &mut dyn Tag) -> Result<CardProfile, CaptureError> {
        let captured_at = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let mut profile = probe_tag(tag, captured_at)?;
        if let Some(response) = &self.custom_response {
            profile.custom_response = response.clone();
        }
        self.store.save_profile(&mut profile)?;
        Ok(profile)
    }
}

/// Probe every technology of a tag without persisting anything
pub fn probe_tag(tag: &mut dyn Tag, captured_at: u64) -> Result<CardProfile, CaptureError> {
    let uid = match tag.id() {
        Ok(uid) if !uid.is_empty() => uid,
        Ok(_) => {
            return Err(CaptureError::UidUnavailable(TagError::Io(
                "tag reported an empty identifier".to_string(),
            )));
        }
        Err(e) => return Err(CaptureError::UidUnavailable(e)),
    };

    let mut profile = CardProfile::new(uid, captured_at, tag.technologies());
    let uid_hex = profile.uid_hex();
    info!(uid = %uid_hex, technologies = profile.technologies.len(), "Capturing tag");

    if let Some(ndef) = tag.ndef() {
        let result = with_connection(ndef, read_ndef);
        record(&mut profile, Section::Ndef, result, |p, s| p.ndef = Some(s));
    }

    if let Some(mifare) = tag.mifare_classic() {
        let result = with_connection(mifare, sweep_sectors);
        record(&mut profile, Section::Mifare, result, |p, s| p.mifare = Some(s));
    }

    if let Some(iso_dep) = tag.iso_dep() {
        let result = with_connection(iso_dep, probe_aids);
        record(&mut profile, Section::IsoDep, result, |p, s| p.iso_dep = Some(s));
    }

    if let Some(nfc_a) = tag.nfc_a() {
        let result = with_connection(nfc_a, read_nfc_a);
        record(&mut profile, Section::NfcA, result, |p, s| p.nfc_a = Some(s));
    }

    info!(
        uid = %uid_hex,
        sections = Section::ALL.iter().filter(|s| profile.has_section(**s)).count(),
        failures = profile.notes.len(),
        "Capture finished"
    );
    Ok(profile)
}

/// Store a section or the note explaining why it is missing
fn record<S>(
    profile: &mut CardProfile,
    section: Section,
    result: Result<S, TagError>,
    store: impl FnOnce(&mut CardProfile, S),
) {
    match result {
        Ok(captured) => {
            profile.add_technology(section.technology());
            store(profile, captured);
        }
        Err(error) => {
            warn!(section = %section, %error, "Technology probe failed");
            profile.note_failure(section, error.to_string());
        }
    }
}

/// Connect, run the probe and always close afterwards
fn with_connection<T, R>(
    tech: &mut T,
    probe: impl FnOnce(&mut T) -> Result<R, TagError>,
) -> Result<R, TagError>
where
    T: TagTechnology + ?Sized,
{
    tech.connect()?;
    let result = probe(tech);
    if let Err(error) = tech.close() {
        debug!(%error, "Closing technology failed");
    }
    result
}

fn read_ndef<T: NdefTech + ?Sized>(ndef: &mut T) -> Result<NdefSection, TagError> {
    let message = ndef.read_message()?;
    Ok(NdefSection {
        ndef_type: ndef.ndef_type(),
        max_size: ndef.max_size(),
        writable: ndef.is_writable(),
        message,
    })
}

fn sweep_sectors<T: MifareClassicTech + ?Sized>(mifare: &mut T) -> Result<MifareSection, TagError> {
    let sector_count = mifare.sector_count();
    let mut sectors = BTreeMap::new();

    for sector in 0..sector_count {
        let result = match authenticate_sector(mifare, sector) {
            Ok(true) => read_sector(mifare, sector),
            Ok(false) => {
                debug!(sector, "No default key accepted");
                SectorResult::AuthFailed
            }
            Err(error) => {
                warn!(sector, %error, "Sector authentication failed");
                SectorResult::Error(error.to_string())
            }
        };
        sectors.insert(sector, result);
    }

    Ok(MifareSection {
        card_type: mifare.card_type(),
        sector_count,
        block_count: mifare.block_count(),
        size_bytes: mifare.size(),
        sectors,
    })
}

/// Try every default key, key A before key B, stopping at the first success
fn authenticate_sector<T: MifareClassicTech + ?Sized>(
    mifare: &mut T,
    sector: u32,
) -> Result<bool, TagError> {
    for key in &DEFAULT_KEYS {
        for key_type in [KeyType::A, KeyType::B] {
            if mifare.authenticate(sector, key_type, key)? {
                debug!(sector, ?key_type, key = %bytes_to_hex(key), "Sector authenticated");
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn read_sector<T: MifareClassicTech + ?Sized>(mifare: &mut T, sector: u32) -> SectorResult {
    let first = mifare.sector_to_block(sector);
    let count = mifare.block_count_in_sector(sector);
    let Some(end) = first.checked_add(count) else {
        return SectorResult::Error(format!("sector {sector}: blocks {first}+{count} out of range"));
    };

    let mut blocks = Vec::with_capacity(count.min(MAX_BLOCKS_PER_SECTOR) as usize);
    for block in first..end {
        match mifare.read_block(block) {
            Ok(data) => blocks.push(data),
            Err(error) => return SectorResult::Error(format!("block {block}: {error}")),
        }
    }
    SectorResult::Blocks(blocks)
}

fn probe_aids<T: IsoDepTech + ?Sized>(iso_dep: &mut T) -> Result<IsoDepSection, TagError> {
    let mut aid_responses = BTreeMap::new();

    for aid in PROBE_AIDS {
        let aid_hex = bytes_to_hex(aid);
        let result = Command::select_aid(aid)
            .to_bytes()
            .map_err(TagError::from)
            .and_then(|frame| iso_dep.transceive(&frame));

        let recorded = match result {
            Ok(response) => {
                debug!(aid = %aid_hex, response = %bytes_to_hex(&response), "AID answered");
                ResponseResult::Ok(response)
            }
            Err(error) => {
                debug!(aid = %aid_hex, %error, "AID probe failed");
                ResponseResult::Error(error.to_string())
            }
        };
        aid_responses.insert(aid_hex, recorded);
    }

    Ok(IsoDepSection {
        max_transceive_length: iso_dep.max_transceive_length(),
        extended_length_apdu_supported: iso_dep.is_extended_length_apdu_supported(),
        aid_responses,
    })
}

fn read_nfc_a<T: NfcATech + ?Sized>(nfc_a: &mut T) -> Result<NfcASection, TagError> {
    Ok(NfcASection {
        atqa: nfc_a.atqa(),
        sak: nfc_a.sak(),
        max_transceive_length: nfc_a.max_transceive_length(),
    })
}

#[cfg(test)]
mod tests {
    use nfcclone_profile::Technology;

    use super::*;
    use crate::mock::{MockIsoDep, MockMifare, MockNdef, MockNfcA, MockTag};

    const UID: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

    #[test]
    fn test_uid_failure_aborts_capture() {
        let mut tag = MockTag::new(UID.to_vec()).with_uid_error();
        assert!(matches!(
            probe_tag(&mut tag, 0),
            Err(CaptureError::UidUnavailable(_))
        ));

        let mut tag = MockTag::new(Vec::new());
        assert!(matches!(
            probe_tag(&mut tag, 0),
            Err(CaptureError::UidUnavailable(_))
        ));
    }

    #[test]
    fn test_minimal_profile() {
        let mut tag = MockTag::new(UID.to_vec());
        let profile = probe_tag(&mut tag, 42).unwrap();
        assert_eq!(profile.uid, UID.to_vec());
        assert_eq!(profile.captured_at, 42);
        assert!(profile.notes.is_empty());
        profile.validate().unwrap();
    }

    #[test]
    fn test_sector_sweep_tries_keys_in_order() {
        let mifare = MockMifare::classic_1k()
            .with_key_b(1, [0x00; 6])
            .with_key_a(2, [0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5])
            .with_key_a(3, [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]);
        let mut tag = MockTag::new(UID.to_vec()).with_mifare(mifare);

        let profile = probe_tag(&mut tag, 0).unwrap();
        let section = profile.mifare.as_ref().unwrap();

        assert_eq!(section.sectors.len(), 16);
        assert!(matches!(&section.sectors[&0], SectorResult::Blocks(b) if b.len() == 4));
        assert!(matches!(&section.sectors[&1], SectorResult::Blocks(_)));
        assert!(matches!(&section.sectors[&2], SectorResult::Blocks(_)));
        assert_eq!(section.sectors[&3], SectorResult::AuthFailed);
        assert!(profile.has_technology(&Technology::MifareClassic));

        let mifare = tag.mifare.as_ref().unwrap();
        // Sector 0 opens with the first attempt, sector 1 needs key B of the fourth key
        assert_eq!(mifare.attempts_for(0), 1);
        assert_eq!(mifare.attempts_for(1), 8);
        assert_eq!(mifare.attempts_for(2), 9);
        assert_eq!(mifare.attempts_for(3), 10);
        assert!(!mifare.is_connected());
    }

    #[test]
    fn test_block_read_failure_marks_sector() {
        let mifare = MockMifare::classic_1k().with_failing_block(6);
        let mut tag = MockTag::new(UID.to_vec()).with_mifare(mifare);

        let profile = probe_tag(&mut tag, 0).unwrap();
        let section = profile.mifare.unwrap();
        match &section.sectors[&1] {
            SectorResult::Error(message) => assert!(message.starts_with("block 6:")),
            other => panic!("unexpected sector result {other:?}"),
        }
        assert!(matches!(&section.sectors[&2], SectorResult::Blocks(_)));
    }

    struct Garbled;

    impl TagTechnology for Garbled {
        fn connect(&mut self) -> Result<(), TagError> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), TagError> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    impl MifareClassicTech for Garbled {
        fn card_type(&self) -> nfcclone_profile::MifareType {
            nfcclone_profile::MifareType::Unknown
        }

        fn sector_count(&self) -> u32 {
            1
        }

        fn block_count(&self) -> u32 {
            u32::MAX
        }

        fn size(&self) -> u32 {
            0
        }

        fn authenticate(
            &mut self,
            _: u32,
            _: KeyType,
            _: &crate::tag::MifareKey,
        ) -> Result<bool, TagError> {
            Ok(true)
        }

        fn read_block(&mut self, _: u32) -> Result<Vec<u8>, TagError> {
            Ok(vec![0; 16])
        }

        fn sector_to_block(&self, _: u32) -> u32 {
            u32::MAX - 1
        }

        fn block_count_in_sector(&self, _: u32) -> u32 {
            u32::MAX
        }
    }

    #[test]
    fn test_out_of_range_geometry_marks_sector() {
        match read_sector(&mut Garbled, 0) {
            SectorResult::Error(message) => assert!(message.starts_with("sector 0:")),
            other => panic!("unexpected sector result {other:?}"),
        }
    }

    #[test]
    fn test_aid_probe_records_every_aid() {
        let iso_dep = MockIsoDep::new()
            .with_response(PROBE_AIDS[1], vec![0x6F, 0x04, 0x84, 0x02, 0xA0, 0x00, 0x90, 0x00])
            .with_failure(PROBE_AIDS[3], "Transceive failed");
        let mut tag = MockTag::new(UID.to_vec()).with_iso_dep(iso_dep);

        let profile = probe_tag(&mut tag, 0).unwrap();
        let section = profile.iso_dep.as_ref().unwrap();

        assert_eq!(section.aid_responses.len(), PROBE_AIDS.len());
        assert_eq!(
            section.aid_responses["A0000001510000"],
            ResponseResult::Ok(vec![0x6F, 0x04, 0x84, 0x02, 0xA0, 0x00, 0x90, 0x00])
        );
        assert_eq!(
            section.aid_responses["A000000172950001"],
            ResponseResult::Ok(vec![0x6A, 0x82])
        );
        assert!(matches!(
            &section.aid_responses["F001020304050607"],
            ResponseResult::Error(message) if message.contains("Transceive failed")
        ));

        // Each probe is a SELECT by name
        let sent = &tag.iso_dep.as_ref().unwrap().sent;
        assert_eq!(sent.len(), PROBE_AIDS.len());
        assert_eq!(&sent[1][..5], &[0x00, 0xA4, 0x04, 0x00, 0x07]);
        profile.validate().unwrap();
    }

    #[test]
    fn test_failed_connect_is_noted() {
        let mut tag = MockTag::new(UID.to_vec())
            .with_ndef(MockNdef::failing("Tag is not NDEF formatted"))
            .with_nfc_a(MockNfcA::new([0x44, 0x00], 0x08));

        let profile = probe_tag(&mut tag, 0).unwrap();
        assert!(profile.ndef.is_none());
        assert!(profile.notes[&Section::Ndef].contains("Tag is not NDEF formatted"));
        assert_eq!(profile.nfc_a.as_ref().unwrap().sak, 0x08);
        profile.validate().unwrap();
    }
}
