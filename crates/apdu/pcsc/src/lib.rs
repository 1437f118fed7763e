//! PC/SC transport implementation for APDU operations
//!
//! This crate provides an implementation of the `CardTransport` trait from
//! `nfcclone-apdu-core` using the PC/SC API, together with helpers to
//! recognise contactless cards from the ATR a PC/SC reader synthesises.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use nfcclone_apdu_core::prelude::*;
//! use nfcclone_apdu_pcsc::{ConnectStrategy, PcscConfig, PcscDeviceManager};
//!
//! let manager = PcscDeviceManager::new()?;
//! let mut transport = manager.connect(&ConnectStrategy::AnyCard, PcscConfig::default())?;
//!
//! // GET UID pseudo-APDU understood by contactless readers
//! let uid = transport.transmit_raw(&[0xFF, 0xCA, 0x00, 0x00, 0x00])?;
//! println!("UID response: {:02X?}", uid);
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod atr;
mod config;
mod error;
mod manager;
mod reader;
mod transport;

pub use atr::{ContactlessCard, classify_atr, match_atr};
pub use config::{ConnectStrategy, PcscConfig};
pub use error::PcscError;
pub use manager::PcscDeviceManager;
pub use reader::PcscReader;
pub use transport::PcscTransport;
