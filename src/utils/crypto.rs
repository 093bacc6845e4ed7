//! Hashing and Encoding Helpers
//!
//! Small primitives shared by the address codec, the BOC codec and the vault.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE},
    Engine,
};
use sha2::{Digest, Sha256};

use crate::error::{HawalaError, HawalaResult};

/// SHA-256 digest
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// CRC16-CCITT (XModem) checksum, used in user-friendly TON addresses
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// CRC32C (Castagnoli) checksum, used as the bag-of-cells trailer
pub fn crc32c(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for byte in data {
        crc ^= *byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0x82F6_3B78 & mask);
        }
    }
    !crc
}

/// Base64 standard encode
pub fn base64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Base64 standard decode
pub fn base64_decode(s: &str) -> HawalaResult<Vec<u8>> {
    STANDARD
        .decode(s.trim())
        .map_err(|e| HawalaError::parse_error(format!("Invalid base64: {}", e)))
}

/// Base64 URL-safe encode (padded, as TON user-friendly addresses are 48 chars)
pub fn base64_url_encode(data: &[u8]) -> String {
    URL_SAFE.encode(data)
}

/// Decode either URL-safe or standard base64
pub fn base64_any_decode(s: &str) -> HawalaResult<Vec<u8>> {
    if s.contains('-') || s.contains('_') {
        URL_SAFE
            .decode(s)
            .map_err(|e| HawalaError::parse_error(format!("Invalid base64: {}", e)))
    } else {
        base64_decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(crc16_ccitt(b"123456789"), 0x31C3);
    }

    #[test]
    fn test_crc32c_check_value() {
        assert_eq!(crc32c(b"123456789"), 0xE306_9283);
        assert_eq!(crc32c(b""), 0);
    }

    #[test]
    fn test_base64_variants() {
        let data = [0xfbu8, 0xff, 0xfe, 0x00];
        let url = base64_url_encode(&data);
        assert!(url.contains('-') || url.contains('_'));
        assert_eq!(base64_any_decode(&url).unwrap(), data);
        assert_eq!(base64_any_decode(&base64_encode(&data)).unwrap(), data);
        assert!(base64_decode("not base64!").is_err());
    }
}
