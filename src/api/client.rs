//! Chain access contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::TonAddress;
use crate::error::HawalaResult;

/// On-chain state of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Uninitialized,
    Frozen,
    /// Never seen on chain
    Nonexist,
}

impl AccountStatus {
    /// Parse the state names used by toncenter and liteservers
    pub fn from_api(state: &str) -> Self {
        match state.trim().to_lowercase().as_str() {
            "active" => AccountStatus::Active,
            "frozen" => AccountStatus::Frozen,
            "uninit" | "uninitialized" => AccountStatus::Uninitialized,
            _ => AccountStatus::Nonexist,
        }
    }

    pub fn is_deployed(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }
}

/// Read and submit operations the wallet core needs from a TON provider
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Provider name used in logs
    fn name(&self) -> &str;

    /// Current seqno; 0 for an undeployed wallet
    async fn get_seqno(&self, address: &TonAddress) -> HawalaResult<u32>;

    /// Balance in nanotons
    async fn get_balance(&self, address: &TonAddress) -> HawalaResult<u128>;

    async fn get_account_status(&self, address: &TonAddress) -> HawalaResult<AccountStatus>;

    /// Submit a serialized external message
    async fn send_boc(&self, boc: &[u8]) -> HawalaResult<()>;
}
