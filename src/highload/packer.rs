//! Highload v3 Action Packer
//!
//! One highload v3 request carries a single message. Batches travel as an
//! `internal_transfer` the wallet sends to itself, whose body holds an
//! out-action list. A list holds at most 254 actions; longer batches keep
//! 253 user actions per hop and use the last slot to send the next hop.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::query_id::QueryId;
use crate::address::TonAddress;
use crate::cell::{ArcCell, Cell, CellBuilder};
use crate::error::{ErrorCode, HawalaError, HawalaResult};
use crate::tx::{out_list, parse_out_list, InternalMessage, OutAction};
use crate::types::send_mode;
use crate::wallet::MAX_HIGHLOAD_ACTIONS;

/// `internal_transfer` op code understood by highload v3
pub const INTERNAL_TRANSFER_OP: u32 = 0xae42_e5a4;
/// Upper bound on chained hops
pub const MAX_CHAIN_HOPS: usize = 64;
/// User actions per hop when another hop follows
pub const ACTIONS_PER_CHAINED_HOP: usize = MAX_HIGHLOAD_ACTIONS - 1;

/// One outgoing transfer inside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAction {
    pub destination: TonAddress,
    /// Nanotons
    pub amount: u128,
    #[serde(skip)]
    pub body: Option<ArcCell>,
    pub bounce: bool,
    pub send_mode: u8,
}

impl BatchAction {
    pub fn new(destination: TonAddress, amount: u128) -> Self {
        let bounce = destination.bounceable;
        Self {
            destination,
            amount,
            body: None,
            bounce,
            send_mode: send_mode::DEFAULT,
        }
    }

    pub fn with_body(mut self, body: ArcCell) -> Self {
        self.body = Some(body);
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

    pub fn to_out_action(&self) -> HawalaResult<OutAction> {
        let mut msg = InternalMessage::new(self.destination.clone(), self.amount).with_bounce(self.bounce);
        if let Some(body) = &self.body {
            msg = msg.with_body(body.clone());
        }
        Ok(OutAction::new(self.send_mode, msg.to_cell()?))
    }
}

/// The single message a highload v3 request sends
#[derive(Debug, Clone)]
pub struct PackedBatch {
    pub message: ArcCell,
    pub mode: u8,
    pub hops: usize,
}

/// Hops needed for `count` actions
pub fn hops_needed(count: usize) -> usize {
    if count <= MAX_HIGHLOAD_ACTIONS {
        1
    } else {
        1 + (count - MAX_HIGHLOAD_ACTIONS).div_ceil(ACTIONS_PER_CHAINED_HOP)
    }
}

/// Packs batches for one wallet
#[derive(Debug, Clone)]
pub struct ActionPacker {
    wallet: TonAddress,
    value: u128,
}

impl ActionPacker {
    /// `value` is attached to every self-addressed hop. With no value the hop
    /// carries the wallet's whole balance (mode 128) and pays from it.
    pub fn new(wallet: TonAddress, value: u128) -> Self {
        Self { wallet, value }
    }

    pub fn hop_mode(&self) -> u8 {
        if self.value > 0 {
            send_mode::PAY_GAS_SEPARATELY
        } else {
            send_mode::CARRY_ALL_BALANCE
        }
    }

    pub fn pack(&self, actions: &[BatchAction], query_id: QueryId) -> HawalaResult<PackedBatch> {
        if actions.is_empty() {
            return Err(HawalaError::new(ErrorCode::EmptyBatch, "Batch has no actions"));
        }
        let hops = hops_needed(actions.len());
        if hops > MAX_CHAIN_HOPS {
            return Err(HawalaError::batch_too_large(format!(
                "{} actions need {} hops, limit is {}",
                actions.len(),
                hops,
                MAX_CHAIN_HOPS
            )));
        }

        let out: Vec<OutAction> = actions
            .iter()
            .map(BatchAction::to_out_action)
            .collect::<HawalaResult<_>>()?;
        let message = self.pack_from(&out, 0, query_id)?;
        crate::log_debug!(
            "packer",
            "Packed batch",
            actions = actions.len(),
            hops = hops,
            query_id = query_id
        );
        Ok(PackedBatch {
            message,
            mode: self.hop_mode(),
            hops,
        })
    }

    fn pack_from(&self, actions: &[OutAction], start: usize, query_id: QueryId) -> HawalaResult<ArcCell> {
        let rest = &actions[start..];
        let list = if rest.len() <= MAX_HIGHLOAD_ACTIONS {
            out_list(rest)?
        } else {
            let split = start + ACTIONS_PER_CHAINED_HOP;
            let next_hop = self.pack_from(actions, split, query_id)?;
            let mut hop: Vec<OutAction> = actions[start..split].to_vec();
            hop.push(OutAction::new(self.hop_mode(), next_hop));
            out_list(&hop)?
        };
        self.self_message(list, query_id)
    }

    fn self_message(&self, list: ArcCell, query_id: QueryId) -> HawalaResult<ArcCell> {
        let mut body = CellBuilder::new();
        body.store_uint(INTERNAL_TRANSFER_OP as u128, 32)?
            .store_uint(query_id.combined() as u128, 64)?
            .store_ref(list)?;
        InternalMessage::new(self.wallet.clone(), self.value)
            .with_bounce(false)
            .with_body(body.build()?)
            .to_cell()
    }

    /// User actions of a packed message, one entry per hop
    pub fn unpack(&self, message: &Cell) -> HawalaResult<Vec<Vec<OutAction>>> {
        let mut hops = Vec::new();
        let mut current: ArcCell = Arc::new(message.clone());
        loop {
            let msg = InternalMessage::parse(&current)?;
            if !msg.destination.same_account(&self.wallet) {
                return Err(HawalaError::parse_error("Hop is not addressed to the wallet"));
            }
            let body = msg
                .body
                .ok_or_else(|| HawalaError::parse_error("Hop has no body"))?;
            let mut s = body.parse();
            if s.load_u32(32)? != INTERNAL_TRANSFER_OP {
                return Err(HawalaError::parse_error("Hop is not an internal_transfer"));
            }
            s.load_u64(64)?;
            let mut actions = parse_out_list(s.load_ref()?)?;

            let chained = actions.len() == MAX_HIGHLOAD_ACTIONS
                && actions
                    .last()
                    .map(|a| self.is_hop(&a.message))
                    .unwrap_or(false);
            if chained && hops.len() + 1 < MAX_CHAIN_HOPS {
                let next = actions.pop().map(|a| a.message);
                hops.push(actions);
                match next {
                    Some(next) => current = next,
                    None => break,
                }
            } else {
                hops.push(actions);
                break;
            }
        }
        Ok(hops)
    }

    /// Action counts per hop
    pub fn flatten(&self, message: &Cell) -> HawalaResult<Vec<usize>> {
        Ok(self.unpack(message)?.iter().map(Vec::len).collect())
    }

    fn is_hop(&self, message: &Cell) -> bool {
        let Ok(msg) = InternalMessage::parse(message) else {
            return false;
        };
        if !msg.destination.same_account(&self.wallet) {
            return false;
        }
        msg.body
            .map(|b| {
                let mut s = b.parse();
                s.remaining_bits() >= 32 && matches!(s.load_u32(32), Ok(op) if op == INTERNAL_TRANSFER_OP)
            })
            .unwrap_or(false)
    }
}
