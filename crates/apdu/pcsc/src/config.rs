//! Connection options for contactless readers

use pcsc::{Protocols, ShareMode};

/// Which reader to connect to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectStrategy {
    /// The reader with this exact name
    Reader(String),

    /// The first reader holding a card
    AnyCard,
}

/// How a card connection is opened and kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcscConfig {
    /// Keep other applications away from the card while connected
    pub exclusive: bool,

    /// Reconnect once and retry when the reader reports a card reset
    pub reconnect_on_reset: bool,
}

impl Default for PcscConfig {
    fn default() -> Self {
        Self {
            exclusive: false,
            reconnect_on_reset: true,
        }
    }
}

impl PcscConfig {
    /// Options for probing a card
    ///
    /// The card is held exclusively for the whole sweep and a reset is
    /// reported instead of retried, since it drops any MIFARE authentication.
    pub const fn capture() -> Self {
        Self {
            exclusive: true,
            reconnect_on_reset: false,
        }
    }

    pub(crate) const fn share_mode(&self) -> ShareMode {
        if self.exclusive {
            ShareMode::Exclusive
        } else {
            ShareMode::Shared
        }
    }

    /// Contactless readers expose cards over T=1, some over T=0
    pub(crate) const fn protocols(&self) -> Protocols {
        Protocols::ANY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_holds_the_card() {
        let config = PcscConfig::capture();
        assert!(matches!(config.share_mode(), ShareMode::Exclusive));
        assert!(!config.reconnect_on_reset);
        assert!(matches!(
            PcscConfig::default().share_mode(),
            ShareMode::Shared
        ));
    }
}
