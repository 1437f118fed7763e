//! ATR matching for contactless cards presented through a PC/SC reader

/// ATR prefix of a storage card as synthesised by PC/SC Part 3 readers,
/// up to and including the PC/SC workgroup RID
const STORAGE_CARD_PREFIX: [u8; 12] = [
    0x3B, 0x8F, 0x80, 0x01, 0x80, 0x4F, 0x0C, 0xA0, 0x00, 0x00, 0x03, 0x06,
];

/// Kind of contactless card behind a reader, derived from its ATR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactlessCard {
    /// MIFARE Classic 1K
    MifareClassic1K,
    /// MIFARE Classic 4K
    MifareClassic4K,
    /// MIFARE Mini
    MifareMini,
    /// MIFARE Ultralight family
    MifareUltralight,
    /// Another storage card, with its PC/SC card name
    OtherStorage(u16),
    /// Processor card speaking ISO 14443-4
    IsoDep,
}

impl ContactlessCard {
    /// Whether the card exposes MIFARE Classic sectors
    pub const fn is_mifare_classic(&self) -> bool {
        matches!(
            self,
            Self::MifareClassic1K | Self::MifareClassic4K | Self::MifareMini
        )
    }

    /// Whether the card is a storage card (ISO 14443-3 only)
    pub const fn is_storage(&self) -> bool {
        !matches!(self, Self::IsoDep)
    }
}

/// Match an ATR against a pattern with an optional mask
///
/// If a mask is provided, only the bits set in the mask are compared.
pub fn match_atr(atr: &[u8], pattern: &[u8], mask: Option<&[u8]>) -> bool {
    // If pattern is longer than ATR, it can't match
    if pattern.len() > atr.len() {
        return false;
    }

    match mask {
        Some(mask) => {
            // Mask must be at least as long as pattern
            mask.len() >= pattern.len()
                && pattern
                    .iter()
                    .zip(atr)
                    .zip(mask)
                    .all(|((p, a), m)| (a & m) == (p & m))
        }
        None => atr.starts_with(pattern),
    }
}

/// Classify the card from the ATR reported by the reader
pub fn classify_atr(atr: &[u8]) -> ContactlessCard {
    if !match_atr(atr, &STORAGE_CARD_PREFIX, None) || atr.len() < 15 {
        return ContactlessCard::IsoDep;
    }

    // SS at offset 12, card name at 13..15
    match u16::from_be_bytes([atr[13], atr[14]]) {
        0x0001 => ContactlessCard::MifareClassic1K,
        0x0002 => ContactlessCard::MifareClassic4K,
        0x0003 | 0x003A => ContactlessCard::MifareUltralight,
        0x0026 => ContactlessCard::MifareMini,
        other => ContactlessCard::OtherStorage(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atr(hex: &str) -> Vec<u8> {
        hex::decode(hex).unwrap()
    }

    #[test]
    fn test_match_atr_with_mask() {
        let atr = [0x3B, 0x8F, 0x80];
        assert!(match_atr(&atr, &[0x3B, 0x80], Some(&[0xFF, 0xF0])));
        assert!(!match_atr(&atr, &[0x3B, 0x80], None));
        assert!(!match_atr(&atr, &[0x3B, 0x8F, 0x80, 0x01], None));
        assert!(!match_atr(&atr, &[0x3B, 0x8F], Some(&[0xFF])));
    }

    #[test]
    fn test_classify_storage_cards() {
        let classic = atr("3B8F8001804F0CA000000306030001000000006A");
        assert_eq!(classify_atr(&classic), ContactlessCard::MifareClassic1K);
        assert!(classify_atr(&classic).is_mifare_classic());

        let ultralight = atr("3B8F8001804F0CA0000003060300030000000068");
        assert_eq!(classify_atr(&ultralight), ContactlessCard::MifareUltralight);
        assert!(!classify_atr(&ultralight).is_mifare_classic());
    }

    #[test]
    fn test_classify_processor_card() {
        let desfire = atr("3B8180018080");
        assert_eq!(classify_atr(&desfire), ContactlessCard::IsoDep);
        assert!(!ContactlessCard::IsoDep.is_storage());
    }
}
