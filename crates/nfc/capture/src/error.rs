//! Error types for tag access and capture

use nfcclone_profile::StoreError;

/// Failure of a single call on a tag technology
#[derive(Debug, Clone, thiserror::Error)]
pub enum TagError {
    /// The technology was used before `connect`
    #[error("Technology not connected")]
    NotConnected,

    /// The tag left the field
    #[error("Tag was lost")]
    Lost,

    /// The tag or reader does not support the operation
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The reader reported an I/O failure
    #[error("I/O error: {0}")]
    Io(String),

    /// APDU transport failure
    #[error(transparent)]
    Transport(#[from] nfcclone_apdu_core::Error),
}

/// Capture-level failure
///
/// Probe failures never surface here; they are recorded in the profile.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The UID of the tag could not be read
    #[error("Tag UID unavailable: {0}")]
    UidUnavailable(#[source] TagError),

    /// The captured profile could not be persisted
    #[error("Failed to save captured profile: {0}")]
    Store(#[from] StoreError),
}
