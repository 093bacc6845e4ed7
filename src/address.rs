//! TON Addresses
//!
//! Raw form `workchain:hex` and the 48-character user-friendly form
//! (flags, workchain, hash, CRC16, URL-safe base64).
//! Based on TON address format: https://docs.ton.org/learn/overviews/addresses

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{HawalaError, HawalaResult};
use crate::utils::crypto::{base64_any_decode, base64_url_encode, crc16_ccitt};

/// TON workchain constants
pub const BASE_WORKCHAIN: i32 = 0;
pub const MASTER_WORKCHAIN: i32 = -1;

const FLAG_BOUNCEABLE: u8 = 0x11;
const FLAG_NON_BOUNCEABLE: u8 = 0x51;
const FLAG_TESTNET: u8 = 0x80;

/// TON Address representation
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TonAddress {
    /// Workchain ID (-1 for masterchain, 0 for basechain)
    pub workchain: i32,
    /// 32-byte hash of the account state init
    pub hash: [u8; 32],
    /// Whether the address is bounceable
    pub bounceable: bool,
    /// Whether this is a testnet address
    pub testnet: bool,
}

impl TonAddress {
    /// Create a new bounceable mainnet address
    pub fn new(workchain: i32, hash: [u8; 32]) -> Self {
        Self {
            workchain,
            hash,
            bounceable: true,
            testnet: false,
        }
    }

    /// Parse either the raw or the user-friendly form
    pub fn from_string(s: &str) -> HawalaResult<Self> {
        let s = s.trim();
        if s.contains(':') {
            return Self::from_raw_string(s);
        }

        if s.len() != 48 {
            return Err(HawalaError::invalid_address(format!(
                "Invalid TON address length: expected 48, got {}",
                s.len()
            )));
        }

        let bytes = base64_any_decode(s)
            .map_err(|e| HawalaError::invalid_address(e.message))?;
        if bytes.len() != 36 {
            return Err(HawalaError::invalid_address("Invalid decoded address length"));
        }

        let crc = u16::from_be_bytes([bytes[34], bytes[35]]);
        if crc != crc16_ccitt(&bytes[0..34]) {
            return Err(HawalaError::invalid_address("Invalid address checksum"));
        }

        let flags = bytes[0];
        let testnet = flags & FLAG_TESTNET != 0;
        let bounceable = match flags & !FLAG_TESTNET {
            FLAG_BOUNCEABLE => true,
            FLAG_NON_BOUNCEABLE => false,
            other => {
                return Err(HawalaError::invalid_address(format!(
                    "Unknown address flags 0x{:02x}",
                    other
                )))
            }
        };

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);

        Ok(Self {
            workchain: bytes[1] as i8 as i32,
            hash,
            bounceable,
            testnet,
        })
    }

    /// Parse from raw format: workchain:hex_hash
    fn from_raw_string(s: &str) -> HawalaResult<Self> {
        let (wc, hash_hex) = s
            .split_once(':')
            .ok_or_else(|| HawalaError::invalid_address("Invalid raw address format"))?;

        let workchain: i32 = wc
            .parse()
            .map_err(|_| HawalaError::invalid_address("Invalid workchain"))?;

        if hash_hex.len() != 64 {
            return Err(HawalaError::invalid_address("Invalid hash length"));
        }

        let hash_bytes = hex::decode(hash_hex)
            .map_err(|_| HawalaError::invalid_address("Invalid hex in hash"))?;

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&hash_bytes);

        Ok(Self::new(workchain, hash))
    }

    /// Convert to user-friendly format (base64 URL-safe)
    pub fn to_user_friendly(&self) -> String {
        let mut data = Vec::with_capacity(36);

        let flags = if self.bounceable { FLAG_BOUNCEABLE } else { FLAG_NON_BOUNCEABLE }
            | if self.testnet { FLAG_TESTNET } else { 0x00 };
        data.push(flags);
        data.push(self.workchain as i8 as u8);
        data.extend_from_slice(&self.hash);

        let crc = crc16_ccitt(&data);
        data.extend_from_slice(&crc.to_be_bytes());

        base64_url_encode(&data)
    }

    /// Convert to raw format: workchain:hex_hash
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    /// Set bounceable flag
    pub fn set_bounceable(mut self, bounceable: bool) -> Self {
        self.bounceable = bounceable;
        self
    }

    /// Set testnet flag
    pub fn set_testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    /// Same account, regardless of display flags
    pub fn same_account(&self, other: &TonAddress) -> bool {
        self.workchain == other.workchain && self.hash == other.hash
    }

    /// Only basechain and masterchain are valid wallet workchains
    pub fn is_valid(&self) -> bool {
        self.workchain == BASE_WORKCHAIN || self.workchain == MASTER_WORKCHAIN
    }
}

impl fmt::Display for TonAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_user_friendly())
    }
}

impl FromStr for TonAddress {
    type Err = HawalaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl Serialize for TonAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_user_friendly())
    }
}

impl<'de> Deserialize<'de> for TonAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_string(&s).map_err(serde::de::Error::custom)
    }
}

/// Validate a TON address string
pub fn validate_address(address: &str) -> bool {
    TonAddress::from_string(address)
        .map(|a| a.is_valid())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNCEABLE: &str = "EQDnpaSHtvVW_sZlg4D0Yw39xv5eGmIotOvMBu5XFEQaqnj6";
    const NON_BOUNCEABLE: &str = "UQDnpaSHtvVW_sZlg4D0Yw39xv5eGmIotOvMBu5XFEQaqiU_";
    const RAW: &str = "0:e7a5a487b6f556fec6658380f4630dfdc6fe5e1a6228b4ebcc06ee5714441aaa";

    #[test]
    fn test_parse_user_friendly() {
        let addr = TonAddress::from_string(BOUNCEABLE).unwrap();
        assert!(addr.bounceable);
        assert!(!addr.testnet);
        assert_eq!(addr.to_raw(), RAW);

        let addr = TonAddress::from_string(NON_BOUNCEABLE).unwrap();
        assert!(!addr.bounceable);
        assert_eq!(addr.to_user_friendly(), NON_BOUNCEABLE);
    }

    #[test]
    fn test_raw_roundtrip_to_friendly() {
        let addr = TonAddress::from_string(RAW).unwrap();
        assert_eq!(addr.to_user_friendly(), BOUNCEABLE);
        assert_eq!(addr.clone().set_bounceable(false).to_user_friendly(), NON_BOUNCEABLE);
    }

    #[test]
    fn test_masterchain_raw() {
        let raw = format!("-1:{}", "ab".repeat(32));
        let addr = TonAddress::from_string(&raw).unwrap();
        assert_eq!(addr.workchain, MASTER_WORKCHAIN);
        let friendly = addr.to_user_friendly();
        assert_eq!(TonAddress::from_string(&friendly).unwrap().workchain, -1);
    }

    #[test]
    fn test_testnet_flag() {
        let addr = TonAddress::from_string(RAW).unwrap().set_testnet(true);
        let parsed = TonAddress::from_string(&addr.to_user_friendly()).unwrap();
        assert!(parsed.testnet);
        assert!(parsed.same_account(&addr));
    }

    #[test]
    fn test_checksum_rejected() {
        let mut broken = BOUNCEABLE.to_string();
        broken.replace_range(10..11, "A");
        assert!(TonAddress::from_string(&broken).is_err());
        assert!(!validate_address("EQshort"));
        assert!(validate_address(BOUNCEABLE));
    }

    #[test]
    fn test_serde_as_string() {
        let addr = TonAddress::from_string(BOUNCEABLE).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", BOUNCEABLE));
        let back: TonAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
