//! APDU response definitions
//!
//! This module provides the response frame type according to ISO/IEC 7816-4:
//! arbitrary payload bytes followed by a two byte status word.

pub mod status;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::Error;
use status::StatusWord;

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response payload data
    payload: Bytes,
    /// Status word
    status: StatusWord,
}

impl Response {
    /// Create a success response
    pub fn success(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            status: status::common::SUCCESS,
        }
    }

    /// Create a payload-less response carrying only a status word
    pub const fn status_only(status: StatusWord) -> Self {
        Self {
            payload: Bytes::new(),
            status,
        }
    }

    /// Parse response from raw bytes (including status word)
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        let (status, payload) = extract_status_and_payload(data)?;

        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            payload_len = payload.len(),
            "Parsed APDU response"
        );

        Ok(Self {
            payload: Bytes::copy_from_slice(payload),
            status,
        })
    }

    /// Get the response payload data
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Check if the response indicates success
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Serialize as `payload || SW1 || SW2`
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.payload.len() + 2);
        buffer.put_slice(&self.payload);
        buffer.put_u8(self.status.sw1);
        buffer.put_u8(self.status.sw2);
        buffer.freeze()
    }
}

/// Extract status word and payload from raw APDU response data
///
/// # Errors
/// Returns an error if the data is too short to contain a valid status word.
pub fn extract_status_and_payload(data: &[u8]) -> Result<(StatusWord, &[u8]), Error> {
    if data.len() < 2 {
        return Err(Error::Incomplete(data.len()));
    }

    let len = data.len();
    Ok((StatusWord::new(data[len - 2], data[len - 1]), &data[..len - 2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_status_and_payload() {
        let data = [0x01, 0x02, 0x03, 0x90, 0x00];
        let (status, payload) = extract_status_and_payload(&data).unwrap();
        assert_eq!(status, StatusWord::new(0x90, 0x00));
        assert_eq!(payload, &[0x01, 0x02, 0x03]);

        let (status, payload) = extract_status_and_payload(&[0x6A, 0x82]).unwrap();
        assert!(status.is_file_not_found());
        assert!(payload.is_empty());

        assert_eq!(
            extract_status_and_payload(&[0x90]),
            Err(Error::Incomplete(1))
        );
    }

    #[test]
    fn test_response_bytes_are_verbatim() {
        let raw = [0x6F, 0x10, 0x84, 0x07, 0x62, 0x83];
        let response = Response::from_bytes(&raw).unwrap();
        assert_eq!(response.status(), StatusWord::new(0x62, 0x83));
        assert_eq!(response.to_bytes().as_ref(), &raw);
    }
}
