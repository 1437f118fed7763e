//! Core types for APDU (Application Protocol Data Unit) framing
//!
//! This crate provides the ISO/IEC 7816-4 building blocks used on both sides
//! of a contactless card exchange:
//!
//! - [`Command`] builds outbound command frames (for example the SELECT frames
//!   sent while probing a card)
//! - [`CommandView`] borrows an inbound frame and exposes its header and body
//!   leniently, the way an emulated card has to read whatever a terminal sends
//! - [`Response`] and [`StatusWord`] model response frames and status words
//! - [`CardTransport`] is the raw byte pipe to a physical card
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod response;
pub mod transport;

mod error;
pub use error::{Error, Result};

pub use command::{Command, CommandView};
pub use response::status::{self, StatusWord};
pub use response::Response;
pub use transport::CardTransport;

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, Command, CommandView, Error, Response, Result,
        response::status::{StatusWord, common as sw},
        transport::CardTransport,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let cmd = Command::new(0x00, 0xA4, 0x04, 0x00);
        assert_eq!(cmd.cla, 0x00);
        assert_eq!(cmd.ins, 0xA4);
        assert_eq!(cmd.p1, 0x04);
        assert_eq!(cmd.p2, 0x00);

        let resp = Response::success(Bytes::from_static(&[0x01, 0x02, 0x03]));
        assert!(resp.is_success());
        assert_eq!(resp.payload(), &[0x01, 0x02, 0x03][..]);
        assert_eq!(resp.status(), StatusWord::new(0x90, 0x00));
    }
}
