//! Durable storage of card profiles and of the activation record

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    codec::canonical_hex,
    error::StoreError,
    format::{from_json, to_json_pretty},
    model::{CardProfile, Technology},
};

/// Directory holding profile files under each storage root
pub const CARDS_DIR: &str = "cards";
/// File name of the activation record under each storage root
pub const ACTIVATION_FILE: &str = "emulation_config.json";

/// Ordered storage locations
///
/// Reads try `primary`, then every `legacy` root, then `fallback`; the first
/// existing file wins. Writes go to `primary` and only fall back to
/// `fallback` when the primary root is not writable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Preferred root
    pub primary: PathBuf,
    /// Read-only roots from older installations
    pub legacy: Vec<PathBuf>,
    /// Last resort root
    pub fallback: Option<PathBuf>,
}

impl StorageConfig {
    /// A single storage root
    pub fn single(root: impl Into<PathBuf>) -> Self {
        Self {
            primary: root.into(),
            legacy: Vec::new(),
            fallback: None,
        }
    }

    /// Add a legacy root
    pub fn with_legacy(mut self, root: impl Into<PathBuf>) -> Self {
        self.legacy.push(root.into());
        self
    }

    /// Set the fallback root
    pub fn with_fallback(mut self, root: impl Into<PathBuf>) -> Self {
        self.fallback = Some(root.into());
        self
    }

    /// Roots in read order
    pub fn locations(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.primary.as_path())
            .chain(self.legacy.iter().map(PathBuf::as_path))
            .chain(self.fallback.as_deref())
    }

    fn write_targets(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.primary.as_path()).chain(self.fallback.as_deref())
    }
}

/// Which card, if any, should be emulated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
    /// Whether emulation is requested
    #[serde(default)]
    pub active: bool,
    /// UID (hex) of the profile to emulate
    #[serde(default)]
    pub card_uid: String,
}

impl ActivationRecord {
    /// Request emulation of the given card
    pub fn activate(card_uid: &str) -> Self {
        Self {
            active: true,
            card_uid: canonical_hex(card_uid),
        }
    }

    /// Request that emulation stops
    pub fn deactivate() -> Self {
        Self::default()
    }

    /// Whether the record names a card to emulate
    pub fn is_active(&self) -> bool {
        self.active && !self.card_uid.is_empty()
    }
}

/// Short description of a stored profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSummary {
    /// UID as canonical hex
    pub uid: String,
    /// User label
    pub label: String,
    /// Capture time in seconds since the Unix epoch
    pub captured_at: u64,
    /// Detected technologies
    pub technologies: Vec<Technology>,
    /// Location of the profile file
    pub path: PathBuf,
}

/// Profile store over a set of storage locations
#[derive(Debug, Clone)]
pub struct ProfileStore {
    config: StorageConfig,
}

impl ProfileStore {
    /// Create a store
    pub const fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Storage locations of this store
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn profile_file(uid_hex: &str) -> PathBuf {
        Path::new(CARDS_DIR).join(format!("card_{uid_hex}.json"))
    }

    /// Persist a profile, returning where it was written
    ///
    /// The profile's `saved_location` is updated to the written path.
    pub fn save_profile(&self, profile: &mut CardProfile) -> Result<PathBuf, StoreError> {
        profile.validate()?;

        let relative = Self::profile_file(&profile.uid_hex());
        let path = self.write_verified(&relative, |path| {
            let mut document = profile.clone();
            document.saved_location = Some(path.to_path_buf());
            Ok(to_json_pretty(&document)?)
        })?;

        info!(uid = %profile.uid_hex(), path = %path.display(), "Saved card profile");
        profile.saved_location = Some(path.clone());
        Ok(path)
    }

    /// Load the profile of a card, `None` if no location has it
    pub fn load_profile(&self, uid: &str) -> Result<Option<CardProfile>, StoreError> {
        let uid = canonical_hex(uid);
        if uid.is_empty() {
            return Ok(None);
        }

        let relative = Self::profile_file(&uid);
        let Some(path) = self.resolve(&relative) else {
            debug!(%uid, "No stored profile");
            return Ok(None);
        };

        let content = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
        let profile = from_json(&content)?;
        profile.validate()?;

        debug!(%uid, path = %path.display(), "Loaded card profile");
        Ok(Some(profile))
    }

    /// Load the activation record
    ///
    /// A missing or unreadable record is `None`, which means inactive.
    pub fn load_activation(&self) -> Option<ActivationRecord> {
        let path = self.resolve(Path::new(ACTIVATION_FILE))?;

        let record = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_json::from_str::<ActivationRecord>(&content).map_err(|e| e.to_string())
            });

        match record {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(path = %path.display(), %error, "Ignoring unreadable activation record");
                None
            }
        }
    }

    /// Write the activation record
    pub fn save_activation(&self, record: &ActivationRecord) -> Result<PathBuf, StoreError> {
        let path = self.write_verified(Path::new(ACTIVATION_FILE), |_| {
            serde_json::to_string_pretty(record).map_err(StoreError::Activation)
        })?;

        info!(
            active = record.active,
            card_uid = %record.card_uid,
            path = %path.display(),
            "Saved activation record"
        );
        Ok(path)
    }

    /// Summaries of every stored profile, sorted by UID
    ///
    /// When the same UID exists in several locations the first one wins.
    /// Files that cannot be parsed are skipped.
    pub fn list_profiles(&self) -> Result<Vec<ProfileSummary>, StoreError> {
        let mut found = BTreeMap::new();

        for root in self.config.locations() {
            let dir = root.join(CARDS_DIR);
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::io(&dir, e)),
            };

            for entry in entries {
                let path = entry.map_err(|e| StoreError::io(&dir, e))?.path();
                let is_profile = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("card_") && name.ends_with(".json"));
                if !is_profile {
                    continue;
                }

                let profile = match fs::read_to_string(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|content| from_json(&content).map_err(|e| e.to_string()))
                {
                    Ok(profile) => profile,
                    Err(error) => {
                        warn!(path = %path.display(), %error, "Skipping unreadable profile");
                        continue;
                    }
                };

                let uid = profile.uid_hex();
                found.entry(uid.clone()).or_insert_with(|| ProfileSummary {
                    uid,
                    label: profile.label,
                    captured_at: profile.captured_at,
                    technologies: profile.technologies,
                    path,
                });
            }
        }

        Ok(found.into_values().collect())
    }

    /// First existing file for the relative path
    fn resolve(&self, relative: &Path) -> Option<PathBuf> {
        self.config
            .locations()
            .map(|root| root.join(relative))
            .find(|path| path.is_file())
    }

    /// Write to the first writable target and check the result
    fn write_verified(
        &self,
        relative: &Path,
        render: impl Fn(&Path) -> Result<String, StoreError>,
    ) -> Result<PathBuf, StoreError> {
        for root in self.config.write_targets() {
            let path = root.join(relative);
            let content = render(&path)?;

            let written = path
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|()| fs::write(&path, content.as_bytes()));

            match written {
                Ok(()) => {
                    verify_artifact(&path)?;
                    return Ok(path);
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "Storage location not writable");
                }
            }
        }

        Err(StoreError::NoWritableLocation)
    }
}

/// A write only counts when the file exists and is not empty
fn verify_artifact(path: &Path) -> Result<(), StoreError> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(StoreError::EmptyArtifact(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(StoreError::MissingArtifact(path.to_path_buf()))
        }
        Err(e) => Err(StoreError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tempfile::TempDir;

    use super::*;
    use crate::model::{IsoDepSection, ResponseResult};

    fn sample_profile(uid: &[u8]) -> CardProfile {
        let mut profile = CardProfile::new(uid.to_vec(), 1_700_000_000, vec![Technology::IsoDep]);
        profile.iso_dep = Some(IsoDepSection {
            max_transceive_length: 261,
            extended_length_apdu_supported: false,
            aid_responses: BTreeMap::from([(
                "A0000001510000".to_string(),
                ResponseResult::Ok(vec![0x6F, 0x00, 0x90, 0x00]),
            )]),
        });
        profile
    }

    #[test]
    fn test_save_and_load_profile() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(StorageConfig::single(dir.path()));
        let mut profile = sample_profile(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let path = store.save_profile(&mut profile).unwrap();
        assert_eq!(path, dir.path().join("cards").join("card_DEADBEEF.json"));
        assert_eq!(profile.saved_location.as_deref(), Some(path.as_path()));

        let loaded = store.load_profile("de:ad:be:ef").unwrap().unwrap();
        assert_eq!(loaded, profile);
    }

    #[test]
    fn test_load_missing_profile_is_none() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(StorageConfig::single(dir.path()));
        assert!(store.load_profile("01020304").unwrap().is_none());
        assert!(store.load_profile("").unwrap().is_none());
    }

    #[test]
    fn test_invalid_profile_is_not_saved() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(StorageConfig::single(dir.path()));
        let mut profile = sample_profile(&[]);
        assert!(matches!(
            store.save_profile(&mut profile),
            Err(StoreError::Profile(_))
        ));
        assert!(!dir.path().join("cards").exists());
    }

    #[test]
    fn test_write_falls_back_when_primary_unwritable() {
        let dir = TempDir::new().unwrap();
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, b"not a directory").unwrap();
        let fallback = dir.path().join("fallback");

        let store = ProfileStore::new(StorageConfig::single(&blocked).with_fallback(&fallback));
        let mut profile = sample_profile(&[0x01, 0x02, 0x03, 0x04]);
        let path = store.save_profile(&mut profile).unwrap();

        assert!(path.starts_with(&fallback));
        assert!(store.load_profile("01020304").unwrap().is_some());
    }

    #[test]
    fn test_no_writable_location() {
        let dir = TempDir::new().unwrap();
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, b"x").unwrap();

        let store = ProfileStore::new(StorageConfig::single(&blocked));
        assert!(matches!(
            store.save_activation(&ActivationRecord::deactivate()),
            Err(StoreError::NoWritableLocation)
        ));
    }

    #[test]
    fn test_read_prefers_primary_then_legacy() {
        let primary = TempDir::new().unwrap();
        let legacy = TempDir::new().unwrap();

        let legacy_store = ProfileStore::new(StorageConfig::single(legacy.path()));
        let mut old = sample_profile(&[0xAA, 0xBB, 0xCC, 0xDD]);
        old.set_label("legacy");
        legacy_store.save_profile(&mut old).unwrap();

        let store =
            ProfileStore::new(StorageConfig::single(primary.path()).with_legacy(legacy.path()));
        let loaded = store.load_profile("AABBCCDD").unwrap().unwrap();
        assert_eq!(loaded.label, "legacy");

        let mut current = sample_profile(&[0xAA, 0xBB, 0xCC, 0xDD]);
        current.set_label("primary");
        store.save_profile(&mut current).unwrap();
        let loaded = store.load_profile("AABBCCDD").unwrap().unwrap();
        assert_eq!(loaded.label, "primary");

        let summaries = store.list_profiles().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].label, "primary");
        assert!(summaries[0].path.starts_with(primary.path()));
    }

    #[test]
    fn test_activation_record() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(StorageConfig::single(dir.path()));
        assert!(store.load_activation().is_none());

        store
            .save_activation(&ActivationRecord::activate("de ad be ef"))
            .unwrap();
        let record = store.load_activation().unwrap();
        assert!(record.is_active());
        assert_eq!(record.card_uid, "DEADBEEF");

        store.save_activation(&ActivationRecord::deactivate()).unwrap();
        assert!(!store.load_activation().unwrap().is_active());
    }

    #[test]
    fn test_unparsable_activation_is_absent() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(ACTIVATION_FILE), b"{ not json").unwrap();
        let store = ProfileStore::new(StorageConfig::single(dir.path()));
        assert!(store.load_activation().is_none());
    }

    #[test]
    fn test_activation_tolerates_missing_fields() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(ACTIVATION_FILE), br#"{"active": true}"#).unwrap();
        let store = ProfileStore::new(StorageConfig::single(dir.path()));
        let record = store.load_activation().unwrap();
        assert!(record.active);
        assert!(!record.is_active());
    }

    #[test]
    fn test_list_skips_unreadable_files() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(StorageConfig::single(dir.path()));
        store
            .save_profile(&mut sample_profile(&[0x01, 0x02, 0x03, 0x04]))
            .unwrap();
        fs::write(dir.path().join("cards").join("card_BROKEN.json"), b"[]").unwrap();
        fs::write(dir.path().join("cards").join("notes.txt"), b"hello").unwrap();

        let summaries = store.list_profiles().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].uid, "01020304");
        assert_eq!(summaries[0].technologies, vec![Technology::IsoDep]);
    }
}
