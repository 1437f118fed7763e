//! Capture a scripted tag end to end and read the saved profile back

use nfcclone_capture::{
    CapturePipeline,
    mock::{MockIsoDep, MockMifare, MockNdef, MockNfcA, MockTag},
};
use nfcclone_profile::{
    ProfileStore, ResponseResult, Section, SectorResult, StorageConfig, Technology,
};
use tempfile::TempDir;

const UID: [u8; 7] = [0x04, 0xA2, 0x2B, 0x72, 0x5C, 0x63, 0x80];
const NDEF_MESSAGE: [u8; 12] = [
    0xD1, 0x01, 0x08, 0x55, 0x04, 0x65, 0x78, 0x61, 0x6D, 0x70, 0x6C, 0x65,
];

#[test]
fn test_locked_mifare_does_not_hide_other_sections() {
    let dir = TempDir::new().unwrap();
    let store = ProfileStore::new(StorageConfig::single(dir.path()));
    let pipeline = CapturePipeline::new(store.clone());

    let mut tag = MockTag::new(UID.to_vec())
        .with_nfc_a(MockNfcA::new([0x44, 0x00], 0x28))
        .with_mifare(MockMifare::classic_1k().locked())
        .with_iso_dep(
            MockIsoDep::new().with_response(&[0xA0, 0x00, 0x00, 0x01, 0x51, 0x00, 0x00], vec![
                0x6F, 0x00, 0x90, 0x00,
            ]),
        )
        .with_ndef(MockNdef::new(Some(NDEF_MESSAGE.to_vec())));

    let profile = pipeline.capture(&mut tag).unwrap();
    let path = profile.saved_location.clone().unwrap();
    assert!(path.ends_with("cards/card_04A22B725C6380.json"));

    let loaded = store.load_profile("04A22B725C6380").unwrap().unwrap();
    assert_eq!(loaded, profile);

    assert_eq!(loaded.uid, UID.to_vec());
    for tech in [
        Technology::NfcA,
        Technology::MifareClassic,
        Technology::IsoDep,
        Technology::Ndef,
    ] {
        assert!(loaded.has_technology(&tech), "missing {tech}");
    }

    let mifare = loaded.mifare.as_ref().unwrap();
    assert_eq!(mifare.sector_count, 16);
    assert!(
        mifare
            .sectors
            .values()
            .all(|s| *s == SectorResult::AuthFailed)
    );

    let iso_dep = loaded.iso_dep.as_ref().unwrap();
    assert_eq!(
        iso_dep.aid_responses.get("A0000001510000"),
        Some(&ResponseResult::Ok(vec![0x6F, 0x00, 0x90, 0x00]))
    );
    assert_eq!(
        loaded.ndef.as_ref().unwrap().message.as_deref(),
        Some(&NDEF_MESSAGE[..])
    );
    assert!(loaded.nfc_a.is_some());
    assert!(loaded.notes.is_empty());
}

#[test]
fn test_failed_probe_is_persisted_as_note() {
    let dir = TempDir::new().unwrap();
    let store = ProfileStore::new(StorageConfig::single(dir.path()));
    let pipeline = CapturePipeline::new(store.clone());

    let mut tag = MockTag::new(UID.to_vec())
        .with_mifare(MockMifare::classic_1k())
        .with_ndef(MockNdef::failing("Tag is not NDEF formatted"));

    pipeline.capture(&mut tag).unwrap();

    let loaded = store.load_profile("04A22B725C6380").unwrap().unwrap();
    assert!(loaded.ndef.is_none());
    assert!(loaded.notes[&Section::Ndef].contains("not NDEF formatted"));
    assert_eq!(loaded.mifare.as_ref().unwrap().readable_sectors(), 16);

    let raw = std::fs::read_to_string(loaded.saved_location.unwrap()).unwrap();
    assert!(raw.contains("\"NDEF_Error\""));
}

#[test]
fn test_pipeline_custom_response_is_saved() {
    let dir = TempDir::new().unwrap();
    let store = ProfileStore::new(StorageConfig::single(dir.path()));
    let pipeline = CapturePipeline::new(store.clone()).with_custom_response(vec![0x6A, 0x82]);

    let mut tag = MockTag::new(UID.to_vec());
    pipeline.capture(&mut tag).unwrap();

    let loaded = store.load_profile("04a22b725c6380").unwrap().unwrap();
    assert_eq!(loaded.custom_response, vec![0x6A, 0x82]);
}
