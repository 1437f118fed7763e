//! Well-known keys and application identifiers tried during capture

use crate::tag::MifareKey;

/// Default MIFARE Classic keys, in the order they are tried
pub const DEFAULT_KEYS: [MifareKey; 5] = [
    // Factory default
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    // MAD key A
    [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5],
    // NFC Forum
    [0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7],
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    [0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5],
];

/// Application identifiers selected while probing an ISO-DEP card
pub const PROBE_AIDS: [&[u8]; 4] = [
    &[0xA0, 0x00, 0x00, 0x01, 0x72, 0x95, 0x00, 0x01],
    // GlobalPlatform card manager
    &[0xA0, 0x00, 0x00, 0x01, 0x51, 0x00, 0x00],
    &[0xA0, 0x00, 0x00, 0x00, 0x25, 0x01, 0x08, 0x01],
    &[0xF0, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07],
];
