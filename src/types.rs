//! Shared types for Hawala TON Core
//!
//! Data structures that cross module boundaries are defined here.

use serde::{Deserialize, Serialize};

use crate::address::TonAddress;
use crate::error::{HawalaError, HawalaResult};

// =============================================================================
// Network
// =============================================================================

/// TON network the wallet operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Global network id, mixed into the v5 wallet id
    pub fn global_id(&self) -> i32 {
        match self {
            Network::Mainnet => -239,
            Network::Testnet => -3,
        }
    }

    pub fn is_testnet(&self) -> bool {
        matches!(self, Network::Testnet)
    }
}

// =============================================================================
// Amounts
// =============================================================================

/// Nanotons in one TON
pub const NANOTON_PER_TON: u128 = 1_000_000_000;

/// Parse a decimal TON amount ("1.25") into nanotons
pub fn to_nano(amount: &str) -> HawalaResult<u128> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(HawalaError::invalid_input("Amount is empty"));
    }

    let (whole, frac) = amount.split_once('.').unwrap_or((amount, ""));
    if frac.len() > 9 {
        return Err(HawalaError::invalid_input("Amount has more than 9 decimal places"));
    }
    if whole.is_empty() && frac.is_empty() {
        return Err(HawalaError::invalid_input("Amount has no digits"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(HawalaError::invalid_input(format!("Invalid amount: {}", amount)));
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| HawalaError::invalid_input("Amount too large"))?
    };
    let frac: u128 = format!("{:0<9}", frac)
        .parse()
        .map_err(|_| HawalaError::invalid_input("Invalid fractional amount"))?;

    whole
        .checked_mul(NANOTON_PER_TON)
        .and_then(|n| n.checked_add(frac))
        .ok_or_else(|| HawalaError::invalid_input("Amount too large"))
}

/// Format nanotons as a decimal TON amount without trailing zeros
pub fn from_nano(nanotons: u128) -> String {
    let whole = nanotons / NANOTON_PER_TON;
    let frac = nanotons % NANOTON_PER_TON;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:09}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

// =============================================================================
// Send Modes
// =============================================================================

/// Outbound message send-mode flags
pub mod send_mode {
    pub const ORDINARY: u8 = 0;
    pub const PAY_GAS_SEPARATELY: u8 = 1;
    pub const IGNORE_ERRORS: u8 = 2;
    pub const DESTROY_IF_ZERO: u8 = 32;
    pub const CARRY_REMAINING_VALUE: u8 = 64;
    pub const CARRY_ALL_BALANCE: u8 = 128;

    /// Default for plain transfers
    pub const DEFAULT: u8 = PAY_GAS_SEPARATELY | IGNORE_ERRORS;
}

// =============================================================================
// Transfer Intents
// =============================================================================

/// A single native TON transfer requested by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferIntent {
    pub destination: TonAddress,
    /// Amount in nanotons
    pub amount: u128,
    pub comment: Option<String>,
    pub bounce: bool,
    #[serde(default = "default_send_mode")]
    pub send_mode: u8,
}

fn default_send_mode() -> u8 {
    send_mode::DEFAULT
}

impl TransferIntent {
    /// Transfer that bounces according to the destination's address flag
    pub fn new(destination: TonAddress, amount: u128) -> Self {
        let bounce = destination.bounceable;
        Self {
            destination,
            amount,
            comment: None,
            bounce,
            send_mode: send_mode::DEFAULT,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_bounce(mut self, bounce: bool) -> Self {
        self.bounce = bounce;
        self
    }

    pub fn with_send_mode(mut self, mode: u8) -> Self {
        self.send_mode = mode;
        self
    }
}

/// A jetton (token) transfer, sent to the owner's jetton wallet contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JettonTransferIntent {
    /// The sender's jetton wallet (receives the internal message)
    pub jetton_wallet: TonAddress,
    /// Owner of the receiving jetton wallet
    pub destination: TonAddress,
    /// Where excess TON is returned; the sender's wallet when `None`
    pub response_destination: Option<TonAddress>,
    /// Jetton amount in the token's base units
    pub jetton_amount: u128,
    /// TON forwarded to the destination with the transfer notification
    pub forward_ton_amount: u128,
    /// TON attached to the internal message to pay for processing
    pub attached_ton: u128,
    pub comment: Option<String>,
    pub query_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_nano() {
        assert_eq!(to_nano("1").unwrap(), 1_000_000_000);
        assert_eq!(to_nano("1.5").unwrap(), 1_500_000_000);
        assert_eq!(to_nano("0.000000001").unwrap(), 1);
        assert_eq!(to_nano(".25").unwrap(), 250_000_000);
        assert!(to_nano("1.0000000001").is_err());
        assert!(to_nano("-1").is_err());
        assert!(to_nano("1e9").is_err());
        assert!(to_nano("").is_err());
        assert!(to_nano(".").is_err());
    }

    #[test]
    fn test_from_nano() {
        assert_eq!(from_nano(0), "0");
        assert_eq!(from_nano(1_500_000_000), "1.5");
        assert_eq!(from_nano(1), "0.000000001");
        assert_eq!(from_nano(42 * NANOTON_PER_TON), "42");
    }

    #[test]
    fn test_network_ids() {
        assert_eq!(Network::Mainnet.global_id(), -239);
        assert_eq!(Network::Testnet.global_id(), -3);
        assert_eq!(serde_json::to_string(&Network::Testnet).unwrap(), "\"testnet\"");
    }
}
