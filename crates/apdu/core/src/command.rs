//! APDU command definitions
//!
//! This module provides an owned [`Command`] for building outbound short
//! APDUs, and a borrowed [`CommandView`] for reading inbound frames according
//! to ISO/IEC 7816-4.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::Error;

/// Class byte of interindustry commands
pub const CLA_ISO: u8 = 0x00;
/// Class byte of PC/SC pseudo-APDUs addressed to the reader
pub const CLA_PCSC: u8 = 0xFF;

/// SELECT instruction
pub const INS_SELECT: u8 = 0xA4;
/// READ BINARY instruction
pub const INS_READ_BINARY: u8 = 0xB0;
/// GET DATA instruction, used by PC/SC readers for GET UID
pub const INS_GET_DATA: u8 = 0xCA;
/// MIFARE Classic authenticate with key A
pub const INS_MIFARE_AUTH_A: u8 = 0x60;
/// MIFARE Classic authenticate with key B
pub const INS_MIFARE_AUTH_B: u8 = 0x61;

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected length (optional)
    pub le: Option<u8>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with expected response length (Le)
    pub const fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: Some(le),
        }
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Some(data.into()),
            le: None,
        }
    }

    /// SELECT by DF name (`00 A4 04 00 Lc <aid> 00`)
    pub fn select_aid<T: Into<Bytes>>(aid: T) -> Self {
        Self::new_with_data(CLA_ISO, INS_SELECT, 0x04, 0x00, aid).with_le(0x00)
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Calculate length of serialized command
    pub fn command_length(&self) -> usize {
        // Header (CLA, INS, P1, P2) is always 4 bytes
        let mut length = 4;
        if let Some(data) = &self.data {
            length += 1 + data.len();
        }
        if self.le.is_some() {
            length += 1;
        }
        length
    }

    /// Convert to raw APDU bytes
    ///
    /// Only short APDUs are produced, so the data field is limited to 255 bytes.
    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut buffer = BytesMut::with_capacity(self.command_length());

        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if let Some(data) = &self.data {
            let lc = u8::try_from(data.len()).map_err(|_| Error::DataTooLong(data.len()))?;
            buffer.put_u8(lc);
            buffer.put_slice(data);
        }

        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        Ok(buffer.freeze())
    }
}

/// Borrowed, lenient view over an inbound command frame
///
/// The header accessors are always valid. The body is interpreted on demand
/// and only as far as the caller needs, so frames with trailing garbage or a
/// missing `Le` can still be answered.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CommandView<'a> {
    frame: &'a [u8],
}

impl<'a> CommandView<'a> {
    /// Wrap a frame, returning `None` if it is shorter than the 4-byte header
    pub const fn new(frame: &'a [u8]) -> Option<Self> {
        if frame.len() < 4 {
            None
        } else {
            Some(Self { frame })
        }
    }

    /// Class byte
    pub const fn cla(&self) -> u8 {
        self.frame[0]
    }

    /// Instruction byte
    pub const fn ins(&self) -> u8 {
        self.frame[1]
    }

    /// Parameter 1
    pub const fn p1(&self) -> u8 {
        self.frame[2]
    }

    /// Parameter 2
    pub const fn p2(&self) -> u8 {
        self.frame[3]
    }

    /// Total frame length
    pub const fn frame_len(&self) -> usize {
        self.frame.len()
    }

    /// Raw frame bytes
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.frame
    }

    /// Whether this is an interindustry SELECT (`CLA=00, INS=A4`)
    pub const fn is_select(&self) -> bool {
        self.cla() == CLA_ISO && self.ins() == INS_SELECT
    }

    /// `P1 || P2` as a big-endian offset
    pub const fn offset(&self) -> u16 {
        ((self.p1() as u16) << 8) | self.p2() as u16
    }

    /// The data field announced by `Lc`
    ///
    /// Returns an error if the frame has no `Lc` or is shorter than `5 + Lc`.
    /// Bytes after the data field are ignored.
    pub fn data(&self) -> Result<&'a [u8], Error> {
        if self.frame.len() < 5 {
            return Err(Error::InvalidCommandLength(self.frame.len()));
        }
        let lc = self.frame[4] as usize;
        self.frame
            .get(5..5 + lc)
            .ok_or(Error::InvalidCommandLength(self.frame.len()))
    }

    /// Expected length for a case 2 frame (`header || Le`)
    ///
    /// A bare header means 256 bytes; any longer frame carries no usable `Le`
    /// and yields 0.
    pub const fn short_le(&self) -> usize {
        match self.frame.len() {
            4 => 256,
            5 => self.frame[4] as usize,
            _ => 0,
        }
    }
}

impl fmt::Debug for CommandView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandView")
            .field("cla", &format_args!("{:#04x}", self.cla()))
            .field("ins", &format_args!("{:#04x}", self.ins()))
            .field("p1", &format_args!("{:#04x}", self.p1()))
            .field("p2", &format_args!("{:#04x}", self.p2()))
            .field("len", &self.frame_len())
            .finish()
    }
}

impl fmt::Display for CommandView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_aid_serialization() {
        let aid = Bytes::from_static(&[0xA0, 0x00, 0x00, 0x01, 0x51, 0x00, 0x00]);
        let bytes = Command::select_aid(aid).to_bytes().unwrap();

        assert_eq!(
            bytes.as_ref(),
            &[0x00, 0xA4, 0x04, 0x00, 0x07, 0xA0, 0x00, 0x00, 0x01, 0x51, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_command_length() {
        let cmd1 = Command::new(0x00, 0xB0, 0x00, 0x00);
        assert_eq!(cmd1.command_length(), 4);

        let cmd2 = Command::new_with_le(0x00, 0xB0, 0x00, 0x00, 0xFF);
        assert_eq!(cmd2.command_length(), 5);

        let data = Bytes::from_static(&[0x01, 0x02, 0x03]);
        let cmd3 = Command::new_with_data(0x00, 0xD6, 0x00, 0x00, data.clone());
        assert_eq!(cmd3.command_length(), 8);

        let cmd4 = Command::new_with_data(0x00, 0xD6, 0x00, 0x00, data).with_le(0xFF);
        assert_eq!(cmd4.command_length(), 9);
    }

    #[test]
    fn test_oversized_data_rejected() {
        let cmd = Command::new_with_data(0x00, 0xD6, 0x00, 0x00, vec![0u8; 256]);
        assert_eq!(cmd.to_bytes(), Err(Error::DataTooLong(256)));
    }

    #[test]
    fn test_view_header_and_body() {
        let frame = [0x00, 0xA4, 0x04, 0x00, 0x02, 0xD2, 0x76, 0x00, 0xEE];
        let view = CommandView::new(&frame).unwrap();
        assert!(view.is_select());
        assert_eq!(view.p1(), 0x04);
        // trailing bytes beyond Le are tolerated
        assert_eq!(view.data().unwrap(), &[0xD2, 0x76]);

        let short = [0x00, 0xA4, 0x04, 0x00, 0x08, 0x01];
        let view = CommandView::new(&short).unwrap();
        assert_eq!(view.data(), Err(Error::InvalidCommandLength(6)));

        assert!(CommandView::new(&[0x00, 0xA4]).is_none());
    }

    #[test]
    fn test_view_short_le() {
        let header = [0x00, 0xB0, 0x01, 0x02];
        let view = CommandView::new(&header).unwrap();
        assert_eq!(view.short_le(), 256);
        assert_eq!(view.offset(), 0x0102);

        let case2 = [0x00, 0xB0, 0x00, 0x00, 0x04];
        assert_eq!(CommandView::new(&case2).unwrap().short_le(), 4);

        let case3 = [0x00, 0xB0, 0x00, 0x00, 0x01, 0x00];
        assert_eq!(CommandView::new(&case3).unwrap().short_le(), 0);
    }
}
