//! Wallet contract versions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ErrorCode, HawalaError};

/// Default subwallet id used by the standard wallet contracts
pub const DEFAULT_SUBWALLET_ID: u32 = 698_983_191;
/// Default subwallet id of the highload v3 contract
pub const DEFAULT_HIGHLOAD_V3_SUBWALLET_ID: u32 = 0x10ad;
/// Default highload v3 replay window in seconds
pub const DEFAULT_HIGHLOAD_TIMEOUT: u32 = 3600;
/// Messages per counter-scheme wallet request (v1 to v4)
pub const MAX_LEGACY_MESSAGES: usize = 4;
/// Actions in one v5 out-list
pub const MAX_V5_ACTIONS: usize = 255;
/// Entries in a highload dictionary, and actions per internal-transfer hop
pub const MAX_HIGHLOAD_ACTIONS: usize = 254;

/// How a wallet version protects against replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// On-chain sequence number, fetched before each send
    Counter,
    /// Client-managed query id
    Query,
}

/// Supported wallet contract versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletVersion {
    #[serde(rename = "v1r1")]
    V1R1,
    #[serde(rename = "v1r2")]
    V1R2,
    #[serde(rename = "v1r3")]
    V1R3,
    #[serde(rename = "v2r1")]
    V2R1,
    #[serde(rename = "v2r2")]
    V2R2,
    #[serde(rename = "v3r1")]
    V3R1,
    #[serde(rename = "v3r2")]
    V3R2,
    #[serde(rename = "v4r2")]
    V4R2,
    #[serde(rename = "v5r1")]
    V5R1,
    #[serde(rename = "highload-v1")]
    HighloadV1,
    #[serde(rename = "highload-v2")]
    HighloadV2,
    #[serde(rename = "highload-v3")]
    HighloadV3,
}

impl WalletVersion {
    pub const ALL: [WalletVersion; 12] = [
        WalletVersion::V1R1,
        WalletVersion::V1R2,
        WalletVersion::V1R3,
        WalletVersion::V2R1,
        WalletVersion::V2R2,
        WalletVersion::V3R1,
        WalletVersion::V3R2,
        WalletVersion::V4R2,
        WalletVersion::V5R1,
        WalletVersion::HighloadV1,
        WalletVersion::HighloadV2,
        WalletVersion::HighloadV3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WalletVersion::V1R1 => "v1r1",
            WalletVersion::V1R2 => "v1r2",
            WalletVersion::V1R3 => "v1r3",
            WalletVersion::V2R1 => "v2r1",
            WalletVersion::V2R2 => "v2r2",
            WalletVersion::V3R1 => "v3r1",
            WalletVersion::V3R2 => "v3r2",
            WalletVersion::V4R2 => "v4r2",
            WalletVersion::V5R1 => "v5r1",
            WalletVersion::HighloadV1 => "highload-v1",
            WalletVersion::HighloadV2 => "highload-v2",
            WalletVersion::HighloadV3 => "highload-v3",
        }
    }

    /// How replays are prevented. Highload v1 is counter-based despite its name:
    /// its contract stores `seqno:32` first in its data and rejects any external
    /// message whose seqno differs, exactly like v3r2. Only highload v2 and v3
    /// use client-managed query ids.
    pub fn auth_scheme(&self) -> AuthScheme {
        match self {
            WalletVersion::HighloadV2 | WalletVersion::HighloadV3 => AuthScheme::Query,
            _ => AuthScheme::Counter,
        }
    }

    /// Most outgoing messages one signed request may carry.
    /// For highload v3 this is the per-hop limit; longer batches are chained.
    pub fn max_actions(&self) -> usize {
        match self {
            WalletVersion::V5R1 => MAX_V5_ACTIONS,
            WalletVersion::HighloadV1 | WalletVersion::HighloadV2 | WalletVersion::HighloadV3 => {
                MAX_HIGHLOAD_ACTIONS
            }
            _ => MAX_LEGACY_MESSAGES,
        }
    }

    pub fn supports_chaining(&self) -> bool {
        matches!(self, WalletVersion::HighloadV3)
    }

    pub fn is_highload(&self) -> bool {
        matches!(
            self,
            WalletVersion::HighloadV1 | WalletVersion::HighloadV2 | WalletVersion::HighloadV3
        )
    }

    /// v1 and v2 have no subwallet field in their data
    pub fn has_subwallet_id(&self) -> bool {
        !matches!(
            self,
            WalletVersion::V1R1
                | WalletVersion::V1R2
                | WalletVersion::V1R3
                | WalletVersion::V2R1
                | WalletVersion::V2R2
        )
    }

    /// v1 signing messages carry no expiry
    pub fn has_valid_until(&self) -> bool {
        !matches!(self, WalletVersion::V1R1 | WalletVersion::V1R2 | WalletVersion::V1R3)
    }

    /// Subwallet id used when the caller does not pick one.
    /// For v5r1 this is the 15-bit subwallet number inside the wallet id.
    pub fn default_subwallet_id(&self, workchain: i32) -> u32 {
        match self {
            WalletVersion::V3R1 | WalletVersion::V3R2 | WalletVersion::V4R2 => {
                DEFAULT_SUBWALLET_ID.wrapping_add(workchain as u32)
            }
            WalletVersion::V5R1 => 0,
            WalletVersion::HighloadV3 => DEFAULT_HIGHLOAD_V3_SUBWALLET_ID,
            _ => DEFAULT_SUBWALLET_ID,
        }
    }
}

impl fmt::Display for WalletVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletVersion {
    type Err = HawalaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        WalletVersion::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == normalized)
            .ok_or_else(|| {
                HawalaError::new(
                    ErrorCode::UnsupportedVersion,
                    format!("Unknown wallet version: {}", s),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for v in WalletVersion::ALL {
            assert_eq!(v.as_str().parse::<WalletVersion>().unwrap(), v);
            let json = serde_json::to_string(&v).unwrap();
            assert_eq!(json, format!("\"{}\"", v));
        }
        assert_eq!("HIGHLOAD_V3".parse::<WalletVersion>().unwrap(), WalletVersion::HighloadV3);
        assert!("v4r1".parse::<WalletVersion>().is_err());
    }

    #[test]
    fn test_schemes() {
        assert_eq!(WalletVersion::V4R2.auth_scheme(), AuthScheme::Counter);
        // Highload v1 checks an on-chain seqno, not a query id
        assert_eq!(WalletVersion::HighloadV1.auth_scheme(), AuthScheme::Counter);
        assert_eq!(WalletVersion::HighloadV2.auth_scheme(), AuthScheme::Query);
        assert_eq!(WalletVersion::HighloadV3.auth_scheme(), AuthScheme::Query);
    }

    #[test]
    fn test_limits_and_defaults() {
        assert_eq!(WalletVersion::V3R2.max_actions(), 4);
        assert_eq!(WalletVersion::V5R1.max_actions(), 255);
        assert_eq!(WalletVersion::HighloadV3.max_actions(), 254);
        assert_eq!(WalletVersion::V4R2.default_subwallet_id(0), 698_983_191);
        assert_eq!(WalletVersion::V4R2.default_subwallet_id(-1), 698_983_190);
        assert_eq!(WalletVersion::HighloadV3.default_subwallet_id(0), 0x10ad);
    }
}
