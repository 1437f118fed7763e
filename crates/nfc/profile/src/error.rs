//! Error types for card profiles and the profile store

use std::path::PathBuf;

use crate::model::Section;

/// A card profile breaks one of its structural invariants
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// The profile has no UID
    #[error("Profile has an empty UID")]
    EmptyUid,

    /// A section is present but its technology was not detected
    #[error("Section {0} present without its technology")]
    SectionWithoutTechnology(Section),

    /// MIFARE sector keys do not cover `0..sector_count`
    #[error("MIFARE sectors do not cover 0..{sector_count} (found {found} entries)")]
    SectorRange {
        /// Declared sector count
        sector_count: u32,
        /// Number of sector entries found
        found: usize,
    },

    /// An AID key is not canonical uppercase hex
    #[error("AID key is not canonical hex: {0:?}")]
    NonCanonicalAid(String),

    /// A sector key in a profile file is not `sector_<N>`
    #[error("Invalid sector key: {0:?}")]
    SectorKey(String),

    /// The profile document is not valid JSON
    #[error("Invalid profile document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Profile store failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// File system error
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Stored profile is invalid
    #[error(transparent)]
    Profile(#[from] ProfileError),

    /// Activation record could not be serialized
    #[error("Invalid activation record: {0}")]
    Activation(#[source] serde_json::Error),

    /// The artifact is missing after a write
    #[error("Saved file is missing: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// The artifact is empty after a write
    #[error("Saved file is empty: {}", .0.display())]
    EmptyArtifact(PathBuf),

    /// Neither the primary nor the fallback location accepted the write
    #[error("No writable storage location")]
    NoWritableLocation,
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
