//! CRC-16 packet integrity checking
//!
//! Implements CRC-16 (polynomial 0xA001, reflected, initial value 0) over a
//! byte range. Both ends use it: the receiver to validate data packets, the
//! sender to validate acknowledgments. The 256-entry lookup table is
//! computed once, lazily, on first use.

use std::sync::OnceLock;

/// CRC-16 generator polynomial (reflected form of 0x8005)
const CRC_POLY_16: u16 = 0xA001;

/// CRC-16 initial value
const CRC_START_16: u16 = 0x0000;

static CRC_TAB16: OnceLock<[u16; 256]> = OnceLock::new();

fn init_crc16_tab() -> [u16; 256] {
    let mut tab = [0u16; 256];
    for (i, entry) in tab.iter_mut().enumerate() {
        let mut crc: u16 = 0;
        let mut c = i as u16;
        for _ in 0..8 {
            if (crc ^ c) & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC_POLY_16;
            } else {
                crc >>= 1;
            }
            c >>= 1;
        }
        *entry = crc;
    }
    tab
}

/// Compute the CRC-16 of a byte slice in one pass
pub fn crc16(bytes: &[u8]) -> u16 {
    let tab = CRC_TAB16.get_or_init(init_crc16_tab);
    let mut crc = CRC_START_16;
    for &b in bytes {
        crc = (crc >> 8) ^ tab[usize::from((crc ^ u16::from(b)) & 0x00FF)];
    }
    crc
}

/// Check a byte slice against an expected CRC-16 value
#[inline]
pub fn verify(bytes: &[u8], expected: u16) -> bool {
    crc16(bytes) == expected
}
