//! Error types for PC/SC transport

use nfcclone_apdu_core::Error;

/// PC/SC-specific errors
#[derive(Debug, thiserror::Error)]
pub enum PcscError {
    /// PC/SC error
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// No readers available
    #[error("No readers available")]
    NoReadersAvailable,

    /// Reader not found
    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    /// No card present in reader
    #[error("No card present in reader: {0}")]
    NoCard(String),
}

impl From<PcscError> for Error {
    fn from(error: PcscError) -> Self {
        match error {
            PcscError::Pcsc(pcsc::Error::RemovedCard | pcsc::Error::NoSmartcard) => {
                Self::CardRemoved
            }
            PcscError::Pcsc(pcsc::Error::Timeout) => Self::Transmission,
            PcscError::NoCard(_) => Self::CardRemoved,
            PcscError::NoReadersAvailable | PcscError::ReaderNotFound(_) => Self::Connection,
            other => Self::message(other.to_string()),
        }
    }
}
