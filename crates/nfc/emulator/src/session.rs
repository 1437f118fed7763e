//! Engine session state

use nfcclone_apdu_core::Bytes;
use nfcclone_profile::CardProfile;

/// What the engine is emulating right now
///
/// A session is never mutated; reloading builds a new one and swaps it in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing is emulated
    #[default]
    Inactive,
    /// A profile is loaded
    Active {
        /// Loaded profile
        profile: CardProfile,
        /// UID reported to terminals
        emulated_uid: Bytes,
    },
}

impl SessionState {
    /// Session emulating the given profile
    pub fn active(profile: CardProfile) -> Self {
        let emulated_uid = Bytes::from(profile.uid.clone());
        Self::Active {
            profile,
            emulated_uid,
        }
    }

    /// Whether a profile is loaded
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Loaded profile
    pub const fn profile(&self) -> Option<&CardProfile> {
        match self {
            Self::Active { profile, .. } => Some(profile),
            Self::Inactive => None,
        }
    }

    /// UID reported to terminals
    pub const fn emulated_uid(&self) -> Option<&Bytes> {
        match self {
            Self::Active { emulated_uid, .. } => Some(emulated_uid),
            Self::Inactive => None,
        }
    }
}

/// Why the link to the terminal went down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeactivationReason {
    /// The RF link was lost
    LinkLoss,
    /// The terminal selected another application
    Deselected,
    /// Platform specific code
    Other(i32),
}

impl From<i32> for DeactivationReason {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::LinkLoss,
            1 => Self::Deselected,
            other => Self::Other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use nfcclone_profile::Technology;

    use super::*;

    #[test]
    fn test_active_session_uses_profile_uid() {
        let profile = CardProfile::new(vec![0xDE, 0xAD, 0xBE, 0xEF], 0, vec![Technology::NfcA]);
        let session = SessionState::active(profile);
        assert!(session.is_active());
        assert_eq!(
            session.emulated_uid().map(|uid| uid.as_ref()),
            Some(&[0xDE, 0xAD, 0xBE, 0xEF][..])
        );
        assert!(SessionState::Inactive.profile().is_none());
    }

    #[test]
    fn test_deactivation_codes() {
        assert_eq!(DeactivationReason::from(0), DeactivationReason::LinkLoss);
        assert_eq!(DeactivationReason::from(1), DeactivationReason::Deselected);
        assert_eq!(DeactivationReason::from(7), DeactivationReason::Other(7));
    }
}
