//! Capture a card, activate it and replay it to a terminal

use nfcclone_capture::{
    CapturePipeline,
    mock::{MockIsoDep, MockMifare, MockNfcA, MockTag},
};
use nfcclone_emulator::{DeactivationReason, EmulationEngine};
use nfcclone_profile::{ActivationRecord, ProfileStore, StorageConfig};
use tempfile::TempDir;

const UID: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];
const PPSE_AID: [u8; 14] = [
    0x32, 0x50, 0x41, 0x59, 0x2E, 0x53, 0x59, 0x53, 0x2E, 0x44, 0x44, 0x46, 0x30, 0x31,
];
const GP_AID: [u8; 7] = [0xA0, 0x00, 0x00, 0x01, 0x51, 0x00, 0x00];

fn select(aid: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x00, 0xA4, 0x04, 0x00, aid.len() as u8];
    frame.extend_from_slice(aid);
    frame.push(0x00);
    frame
}

#[test]
fn test_captured_card_is_replayed() {
    let dir = TempDir::new().unwrap();
    let store = ProfileStore::new(StorageConfig::single(dir.path()));

    let gp_response = vec![0x6F, 0x04, 0x84, 0x02, 0xA0, 0x00, 0x90, 0x00];
    let mut tag = MockTag::new(UID.to_vec())
        .with_nfc_a(MockNfcA::new([0x04, 0x00], 0x28))
        .with_mifare(MockMifare::classic_1k().locked())
        .with_iso_dep(MockIsoDep::new().with_response(&GP_AID, gp_response.clone()));
    let profile = CapturePipeline::new(store.clone())
        .capture(&mut tag)
        .unwrap();

    let engine = EmulationEngine::new(store.clone());
    assert!(!engine.reload());
    assert_eq!(engine.on_command(&[0xFF, 0xCA, 0x00, 0x00]).as_ref(), &[0x6A, 0x82]);

    store
        .save_activation(&ActivationRecord::activate(&profile.uid_hex()))
        .unwrap();
    engine.on_link_deactivated(DeactivationReason::LinkLoss);
    assert!(engine.is_active());

    assert_eq!(
        engine.on_command(&[0xFF, 0xCA, 0x00, 0x00]).as_ref(),
        &[0xDE, 0xAD, 0xBE, 0xEF, 0x90, 0x00]
    );
    assert_eq!(engine.on_command(&select(&GP_AID)).as_ref(), &gp_response[..]);
    assert_eq!(engine.on_command(&select(&PPSE_AID)).as_ref(), &[0x90, 0x00]);
    // MIFARE authentication is accepted even though capture could not open a sector
    assert_eq!(
        engine.on_command(&[0xFF, 0x60, 0x00, 0x04]).as_ref(),
        &[0x90, 0x00]
    );

    store.save_activation(&ActivationRecord::deactivate()).unwrap();
    engine.on_link_deactivated(DeactivationReason::Deselected);
    assert!(!engine.is_active());
}

#[test]
fn test_hand_edited_profile_is_replayed() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("cards")).unwrap();
    std::fs::write(
        dir.path().join("cards").join("card_01020304.json"),
        r#"{
            "UID": "01 02 03 04",
            "Technologies": ["IsoDep"],
            "ISO_DEP": {"AID_Responses": {"a0000001510000": "6f00 9000"}},
            "custom_response": "6d00",
            "label": "edited"
        }"#,
    )
    .unwrap();

    let store = ProfileStore::new(StorageConfig::single(dir.path()));
    let engine = EmulationEngine::new(store);
    assert!(engine.start("01020304"));

    assert_eq!(
        engine.on_command(&select(&GP_AID)).as_ref(),
        &[0x6F, 0x00, 0x90, 0x00]
    );
    assert_eq!(engine.on_command(&[0x80, 0x50, 0x00, 0x00]).as_ref(), &[0x6D, 0x00]);
}
