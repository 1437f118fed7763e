//! Hex codec used for every byte payload in a profile file
//!
//! Encoding is strict: two uppercase digits per byte, no separators. Decoding
//! is lenient because profile files may be edited by hand: every character
//! that is not a hex digit is dropped and an odd number of digits is
//! left-padded with a single `0`.

/// Encode bytes as uppercase hex without separators
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Decode hex leniently
///
/// `"a"` decodes as `"0a"` and `"1 2:3"` decodes as `"0123"`.
pub fn hex_to_bytes(input: &str) -> Vec<u8> {
    let mut digits: String = input.chars().filter(char::is_ascii_hexdigit).collect();
    if digits.len() % 2 != 0 {
        digits.insert(0, '0');
    }
    // Only hex digits remain and the length is even
    hex::decode(&digits).unwrap_or_default()
}

/// Canonical form of a hex identifier (UID or AID): decode leniently, encode strictly
pub fn canonical_hex(input: &str) -> String {
    bytes_to_hex(&hex_to_bytes(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_uppercase_without_separators() {
        assert_eq!(bytes_to_hex(&[]), "");
        assert_eq!(bytes_to_hex(&[0xde, 0xad, 0x0b, 0xef]), "DEAD0BEF");
    }

    #[test]
    fn test_round_trip() {
        let samples: [&[u8]; 4] = [&[], &[0x00], &[0x04, 0xA2, 0x2B, 0x72, 0x5C, 0x63, 0x80], &[0xFF; 16]];
        for bytes in samples {
            assert_eq!(hex_to_bytes(&bytes_to_hex(bytes)), bytes);
        }
    }

    #[test]
    fn test_decode_leniency() {
        assert_eq!(hex_to_bytes("a"), vec![0x0A]);
        assert_eq!(hex_to_bytes("1 2:3"), hex_to_bytes("0123"));
        assert_eq!(hex_to_bytes("1 2:3"), vec![0x01, 0x23]);
        assert_eq!(hex_to_bytes("de:ad:BE:ef"), vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(hex_to_bytes("zz"), Vec::<u8>::new());
        assert_eq!(hex_to_bytes(""), Vec::<u8>::new());
    }

    #[test]
    fn test_canonical_hex() {
        assert_eq!(canonical_hex("a0 00 00 01 51 00 00"), "A0000001510000");
        assert_eq!(canonical_hex("abc"), "0ABC");
    }
}
