//! Error type for APDU framing and transports

/// Result type alias using the crate [`Error`]
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Failure while building, parsing or exchanging a frame
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    //
    // Transport
    //
    /// No connection to a card
    #[error("Connection error: failed to connect to device")]
    Connection,

    /// The exchange with the card failed
    #[error("Transmission error: failed to transmit data")]
    Transmission,

    /// The card left the field or was removed from the reader
    #[error("Card removed")]
    CardRemoved,

    //
    // Frames
    //
    /// Response shorter than a status word
    #[error("Incomplete response: {0} bytes")]
    Incomplete(usize),

    /// Command frame whose length does not match its header
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),

    /// Command data does not fit a short APDU
    #[error("Command data too long: {0} bytes")]
    DataTooLong(usize),

    /// Any other failure, described
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Create a new error with a dynamic message
    pub fn message<S: Into<String>>(message: S) -> Self {
        Self::Message(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(Error::Incomplete(1).to_string(), "Incomplete response: 1 bytes");
        assert_eq!(Error::message("reader busy").to_string(), "reader busy");
    }
}
