//! Status word definitions for APDU responses

use std::fmt;

use tracing::Level;

/// Status Word (SW1-SW2) terminating every APDU response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte (SW1)
    pub sw1: u8,
    /// Second status byte (SW2)
    pub sw2: u8,
}

impl StatusWord {
    /// Create a new status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// The two bytes as they appear at the end of a response frame
    pub const fn to_bytes(&self) -> [u8; 2] {
        [self.sw1, self.sw2]
    }

    /// Check if this status word indicates success (90 00)
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Check if this status word indicates a file not found (6A 82)
    pub const fn is_file_not_found(&self) -> bool {
        self.sw1 == 0x6A && self.sw2 == 0x82
    }

    /// Check if this status word indicates wrong length (67 00)
    pub const fn is_wrong_length(&self) -> bool {
        self.sw1 == 0x67 && self.sw2 == 0x00
    }

    /// Level at which an answer carrying this status word is logged
    ///
    /// Normal processing (`90 00`, `61 XX`) is DEBUG, warnings (`62 XX`,
    /// `63 XX`) are INFO and everything else is WARN.
    pub const fn tracing_level(&self) -> Level {
        match self.sw1 {
            0x90 if self.sw2 == 0x00 => Level::DEBUG,
            0x61 => Level::DEBUG,
            0x62 | 0x63 => Level::INFO,
            _ => Level::WARN,
        }
    }

    /// Short meaning of the status word for logs
    pub const fn description(&self) -> &'static str {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "Success",
            (0x61, _) => "Response bytes still available",
            (0x62, 0x82) => "End of file reached before Le bytes",
            (0x63, 0x00) => "Authentication failed",
            (0x67, 0x00) => "Wrong length",
            (0x69, 0x81) => "Command incompatible with file structure",
            (0x69, 0x82) => "Security status not satisfied",
            (0x6A, 0x81) => "Function not supported",
            (0x6A, 0x82) => "File or application not found",
            (0x6B, 0x00) => "Wrong parameters P1-P2",
            (0x6C, _) => "Wrong Le field",
            (0x6D, 0x00) => "Instruction not supported",
            (0x6E, 0x00) => "Class not supported",
            _ => "Unknown status word",
        }
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from(tuple: (u8, u8)) -> Self {
        Self::new(tuple.0, tuple.1)
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X}", self.sw1, self.sw2)
    }
}

/// Canonical status words answered by an emulated card
pub mod common {
    use super::StatusWord;

    /// Success (90 00)
    pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);

    /// Wrong length (67 00)
    pub const WRONG_LENGTH: StatusWord = StatusWord::new(0x67, 0x00);

    /// File not found (6A 82)
    pub const FILE_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x82);

    /// Instruction not supported (6D 00)
    pub const INS_NOT_SUPPORTED: StatusWord = StatusWord::new(0x6D, 0x00);

    /// Class not supported (6E 00)
    pub const CLASS_NOT_SUPPORTED: StatusWord = StatusWord::new(0x6E, 0x00);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_word_bytes() {
        let sw = StatusWord::from((0x6A, 0x82));
        assert_eq!(sw, common::FILE_NOT_FOUND);
        assert_eq!(sw.to_bytes(), [0x6A, 0x82]);
        assert_eq!(sw.to_string(), "6A 82");
    }

    #[test]
    fn test_status_word_checks() {
        assert!(common::SUCCESS.is_success());
        assert!(common::WRONG_LENGTH.is_wrong_length());
        assert!(common::FILE_NOT_FOUND.is_file_not_found());
        assert!(!StatusWord::new(0x90, 0x01).is_success());
        assert_eq!(common::INS_NOT_SUPPORTED.to_bytes(), [0x6D, 0x00]);
        assert_eq!(common::CLASS_NOT_SUPPORTED.to_bytes(), [0x6E, 0x00]);
        assert!(!common::INS_NOT_SUPPORTED.is_success());
    }

    #[test]
    fn test_description() {
        assert_eq!(common::SUCCESS.description(), "Success");
        assert_eq!(
            common::FILE_NOT_FOUND.description(),
            "File or application not found"
        );
        assert_eq!(StatusWord::new(0x6C, 0x10).description(), "Wrong Le field");
        assert_eq!(StatusWord::new(0x12, 0x34).description(), "Unknown status word");
    }

    #[test]
    fn test_tracing_level() {
        assert_eq!(common::SUCCESS.tracing_level(), Level::DEBUG);
        assert_eq!(StatusWord::new(0x61, 0x10).tracing_level(), Level::DEBUG);
        assert_eq!(StatusWord::new(0x63, 0x00).tracing_level(), Level::INFO);
        assert_eq!(StatusWord::new(0x90, 0x01).tracing_level(), Level::WARN);
        assert_eq!(common::FILE_NOT_FOUND.tracing_level(), Level::WARN);
    }
}
