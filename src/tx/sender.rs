//! Wallet Sender
//!
//! Drives one send end to end: fetch the authorization token, sign with the
//! session key, submit through the chain client.
//!
//! Counter wallets read the on-chain seqno and deploy on seqno 0. Query
//! wallets take the next query id from the engine, which is persisted before
//! anything leaves the process. Highload v3 retries the same query id with
//! progressively older `created_at` values while the contract rejects it.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::address::TonAddress;
use crate::api::ChainClient;
use crate::config::{CoreConfig, DEFAULT_CLOCK_SKEW_OFFSETS};
use crate::error::{ErrorCode, HawalaError, HawalaResult};
use crate::highload::{BatchAction, QueryId, QueryIdEngine};
use crate::store::KeyValueStore;
use crate::types::{JettonTransferIntent, TransferIntent};
use crate::vault::WalletSession;
use crate::wallet::{WalletVersion, DEFAULT_MESSAGE_TTL};

use super::builder::{jetton_action, transfer_action, MessageBuilder};
use super::envelope::{Authorization, SignedExternalMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderConfig {
    /// Seconds a counter or highload v2 message stays valid
    pub message_ttl: u32,
    /// Past offsets tried for highload v3 `created_at`, in order
    pub clock_skew_offsets: Vec<u32>,
    /// Nanotons attached to a packed highload v3 batch
    pub batch_value: u128,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            message_ttl: DEFAULT_MESSAGE_TTL,
            clock_skew_offsets: DEFAULT_CLOCK_SKEW_OFFSETS.to_vec(),
            batch_value: 0,
        }
    }
}

impl From<&CoreConfig> for SenderConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            message_ttl: config.message_ttl_secs,
            clock_skew_offsets: config.clock_skew_offsets.clone(),
            batch_value: u128::from(config.batch_value),
        }
    }
}

/// Token a submitted message was authorized with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendToken {
    Seqno(u32),
    QueryId { query_id: QueryId, timestamp: u32 },
}

#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub address: TonAddress,
    pub message_hash: String,
    pub boc: Vec<u8>,
    pub token: SendToken,
    /// Submissions made, counting clock-skew retries
    pub attempts: u32,
    /// The message carried the wallet's `StateInit`
    pub deployed: bool,
}

pub struct WalletSender<C: ChainClient + ?Sized, S: KeyValueStore> {
    client: Arc<C>,
    query_ids: Arc<QueryIdEngine<S>>,
    config: SenderConfig,
    clock: fn() -> SystemTime,
}

impl<C: ChainClient + ?Sized, S: KeyValueStore> WalletSender<C, S> {
    pub fn new(client: Arc<C>, query_ids: Arc<QueryIdEngine<S>>, config: SenderConfig) -> Self {
        Self {
            client,
            query_ids,
            config,
            clock: SystemTime::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> SystemTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    fn now(&self) -> HawalaResult<u32> {
        let secs = (self.clock)()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| HawalaError::internal("System clock is before the unix epoch"))?
            .as_secs();
        u32::try_from(secs).map_err(|_| HawalaError::internal("System clock is past 2106"))
    }

    /// Send native TON transfers in one request
    pub async fn send_transfers(
        &self,
        session: &WalletSession,
        intents: &[TransferIntent],
    ) -> HawalaResult<SendReceipt> {
        let actions = intents
            .iter()
            .map(transfer_action)
            .collect::<HawalaResult<Vec<_>>>()?;
        self.send_batch(session, &actions).await
    }

    pub async fn send_jetton(
        &self,
        session: &WalletSession,
        intent: &JettonTransferIntent,
    ) -> HawalaResult<SendReceipt> {
        let action = jetton_action(intent, session.address())?;
        self.send_batch(session, std::slice::from_ref(&action)).await
    }

    pub async fn send_batch(&self, session: &WalletSession, actions: &[BatchAction]) -> HawalaResult<SendReceipt> {
        if actions.is_empty() {
            return Err(HawalaError::new(ErrorCode::EmptyBatch, "Nothing to send"));
        }
        match session.descriptor().authorization() {
            Authorization::Counter(_) => self.send_counter(session, actions).await,
            Authorization::Query(_) => self.send_query(session, actions).await,
        }
    }

    async fn send_counter(&self, session: &WalletSession, actions: &[BatchAction]) -> HawalaResult<SendReceipt> {
        let descriptor = session.descriptor();
        let address = descriptor.address();
        let seqno = self.client.get_seqno(address).await?;
        let now = self.now()?;

        let message = session.with_keypair(|kp| {
            MessageBuilder::new(descriptor, kp).counter_message(seqno, now, self.config.message_ttl, actions)
        })?;

        crate::log_info!(
            "sender",
            "Submitting counter-authorized message",
            wallet = address,
            seqno = seqno,
            actions = actions.len(),
        );
        self.client.send_boc(&message.to_boc()).await?;
        Ok(receipt(address, &message, SendToken::Seqno(seqno), 1, seqno == 0))
    }

    async fn send_query(&self, session: &WalletSession, actions: &[BatchAction]) -> HawalaResult<SendReceipt> {
        let descriptor = session.descriptor();
        let address = descriptor.address();
        let deploy = !self.client.get_account_status(address).await?.is_deployed();

        // Persisted before signing; a failed send burns the id rather than risking reuse
        let query_id = self.query_ids.next(address)?;
        let now = self.now()?;

        let messages = session.with_keypair(|kp| {
            MessageBuilder::new(descriptor, kp).query_payload(actions, query_id, self.config.batch_value)
        })?;

        if descriptor.version() != WalletVersion::HighloadV3 {
            let valid_until = now.saturating_add(self.config.message_ttl);
            let message = session.with_keypair(|kp| {
                MessageBuilder::new(descriptor, kp).query_message(query_id, valid_until, &messages, deploy)
            })?;
            crate::log_info!(
                "sender",
                "Submitting query-authorized message",
                wallet = address,
                query_id = query_id,
                actions = actions.len(),
            );
            self.client.send_boc(&message.to_boc()).await?;
            let token = SendToken::QueryId { query_id, timestamp: valid_until };
            return Ok(receipt(address, &message, token, 1, deploy));
        }

        let offsets = if self.config.clock_skew_offsets.is_empty() {
            &[0][..]
        } else {
            &self.config.clock_skew_offsets[..]
        };

        let mut attempts = 0;
        for (i, offset) in offsets.iter().enumerate() {
            let created_at = now.saturating_sub(*offset);
            let message = session.with_keypair(|kp| {
                MessageBuilder::new(descriptor, kp).query_message(query_id, created_at, &messages, deploy)
            })?;
            attempts += 1;

            crate::log_info!(
                "sender",
                "Submitting highload v3 message",
                wallet = address,
                query_id = query_id,
                offset_secs = offset,
                actions = actions.len(),
            );
            match self.client.send_boc(&message.to_boc()).await {
                Ok(()) => {
                    let token = SendToken::QueryId { query_id, timestamp: created_at };
                    return Ok(receipt(address, &message, token, attempts, deploy));
                }
                Err(e) if e.code == ErrorCode::MessageRejected && i + 1 < offsets.len() => {
                    crate::log_warn!(
                        "sender",
                        "Rejected at this created_at, trying an older one",
                        wallet = address,
                        offset_secs = offset,
                        error = e.message,
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(HawalaError::message_rejected("No clock-skew offset was accepted"))
    }
}

fn receipt(
    address: &TonAddress,
    message: &SignedExternalMessage,
    token: SendToken,
    attempts: u32,
    deployed: bool,
) -> SendReceipt {
    SendReceipt {
        address: address.clone(),
        message_hash: message.hash_hex(),
        boc: message.to_boc(),
        token,
        attempts,
        deployed,
    }
}
