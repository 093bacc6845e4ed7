//! Message Cells
//!
//! Internal messages (wallet → destination), external inbound messages
//! (outside world → wallet) and the v5/highload out-action list.

use std::sync::Arc;

use crate::address::TonAddress;
use crate::cell::{ArcCell, Cell, CellBuilder, CellSlice};
use crate::error::{HawalaError, HawalaResult};

/// `action_send_msg` tag in an out-action list
pub const ACTION_SEND_MSG_TAG: u32 = 0x0ec3_c86d;
/// Most actions one out-action list may hold
pub const MAX_OUT_ACTIONS: usize = 255;

/// An internal message ready to be placed in a wallet request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalMessage {
    pub destination: TonAddress,
    /// Value in nanotons
    pub amount: u128,
    pub bounce: bool,
    pub state_init: Option<ArcCell>,
    pub body: Option<ArcCell>,
}

impl InternalMessage {
    /// Bounce follows the destination's address flag
    pub fn new(destination: TonAddress, amount: u128) -> Self {
        let bounce = destination.bounceable;
        Self {
            destination,
            amount,
            bounce,
            state_init: None,
            body: None,
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

    pub fn with_state_init(mut self, state_init: ArcCell) -> Self {
        self.state_init = Some(state_init);
        self
    }

    /// `int_msg_info$0` with zeroed fees, lt and timestamp; the validator fills them in
    pub fn to_cell(&self) -> HawalaResult<ArcCell> {
        let mut b = CellBuilder::new();
        b.store_bit(false)? // int_msg_info$0
            .store_bit(true)? // ihr_disabled
            .store_bit(self.bounce)?
            .store_bit(false)? // bounced
            .store_address_none()? // src, set by the wallet
            .store_address(&self.destination)?
            .store_coins(self.amount)?
            .store_bit(false)? // no extra currencies
            .store_coins(0)? // ihr_fee
            .store_coins(0)? // fwd_fee
            .store_uint(0, 64)? // created_lt
            .store_uint(0, 32)?; // created_at
        store_init_and_body(&mut b, self.state_init.clone(), self.body.clone())?;
        Ok(b.build()?)
    }

    /// Read back a message built by [`InternalMessage::to_cell`]
    pub fn parse(cell: &Cell) -> HawalaResult<Self> {
        let mut s = cell.parse();
        if s.load_bit()? {
            return Err(HawalaError::parse_error("Not an internal message"));
        }
        s.load_bit()?; // ihr_disabled
        let bounce = s.load_bit()?;
        s.load_bit()?; // bounced
        s.load_address()?; // src
        let destination = s
            .load_address()?
            .ok_or_else(|| HawalaError::parse_error("Internal message has no destination"))?
            .set_bounceable(bounce);
        let amount = s.load_coins()?;
        if s.load_bit()? {
            return Err(HawalaError::parse_error("Extra currencies are not supported"));
        }
        s.load_coins()?;
        s.load_coins()?;
        s.load_u64(64)?;
        s.load_u32(32)?;
        let (state_init, body) = load_init_and_body(&mut s)?;
        Ok(Self {
            destination,
            amount,
            bounce,
            state_init,
            body,
        })
    }
}

/// `ext_in_msg_info$10` addressed to `wallet`
pub fn external_message(
    wallet: &TonAddress,
    state_init: Option<ArcCell>,
    body: ArcCell,
) -> HawalaResult<ArcCell> {
    let mut b = CellBuilder::new();
    b.store_uint(0b10, 2)?
        .store_address_none()?
        .store_address(wallet)?
        .store_coins(0)?; // import_fee
    store_init_and_body(&mut b, state_init, Some(body))?;
    Ok(b.build()?)
}

/// Parsed `ext_in_msg_info` envelope
#[derive(Debug, Clone)]
pub struct ExternalMessage {
    pub destination: TonAddress,
    pub state_init: Option<ArcCell>,
    pub body: ArcCell,
}

pub fn parse_external_message(cell: &Cell) -> HawalaResult<ExternalMessage> {
    let mut s = cell.parse();
    if s.load_uint(2)? != 0b10 {
        return Err(HawalaError::parse_error("Not an external inbound message"));
    }
    s.load_address()?;
    let destination = s
        .load_address()?
        .ok_or_else(|| HawalaError::parse_error("External message has no destination"))?;
    s.load_coins()?;
    let (state_init, body) = load_init_and_body(&mut s)?;
    Ok(ExternalMessage {
        destination,
        state_init,
        body: body.unwrap_or_else(Cell::empty),
    })
}

/// `init:(Maybe (Either StateInit ^StateInit)) body:(Either X ^X)`.
/// Both are always stored as references; an absent body is an empty inline body.
fn store_init_and_body(
    b: &mut CellBuilder,
    state_init: Option<ArcCell>,
    body: Option<ArcCell>,
) -> HawalaResult<()> {
    match state_init {
        Some(init) => {
            b.store_bit(true)?.store_bit(true)?.store_ref(init)?;
        }
        None => {
            b.store_bit(false)?;
        }
    }
    match body {
        Some(body) => {
            b.store_bit(true)?.store_ref(body)?;
        }
        None => {
            b.store_bit(false)?;
        }
    }
    Ok(())
}

fn load_init_and_body(s: &mut CellSlice<'_>) -> HawalaResult<(Option<ArcCell>, Option<ArcCell>)> {
    let state_init = if s.load_bit()? {
        if !s.load_bit()? {
            return Err(HawalaError::parse_error("Inline StateInit is not supported"));
        }
        Some(Arc::clone(s.load_ref()?))
    } else {
        None
    };
    let body = if s.load_bit()? {
        Some(Arc::clone(s.load_ref()?))
    } else if s.remaining_bits() > 0 || s.remaining_refs() > 0 {
        Some(s.remainder()?)
    } else {
        None
    };
    Ok((state_init, body))
}

/// One `action_send_msg`: send mode and the internal message cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutAction {
    pub mode: u8,
    pub message: ArcCell,
}

impl OutAction {
    pub fn new(mode: u8, message: ArcCell) -> Self {
        Self { mode, message }
    }
}

/// `OutList n`: a linked list where each node references the previous one
/// and the empty cell terminates the list.
pub fn out_list(actions: &[OutAction]) -> HawalaResult<ArcCell> {
    if actions.len() > MAX_OUT_ACTIONS {
        return Err(HawalaError::batch_too_large(format!(
            "{} actions exceed the out-list limit of {}",
            actions.len(),
            MAX_OUT_ACTIONS
        )));
    }
    let mut list = Cell::empty();
    for action in actions {
        let mut b = CellBuilder::new();
        b.store_ref(list)?
            .store_uint(ACTION_SEND_MSG_TAG as u128, 32)?
            .store_uint(action.mode as u128, 8)?
            .store_ref(action.message.clone())?;
        list = b.build()?;
    }
    Ok(list)
}

/// Actions of an out-list in the order they were added
pub fn parse_out_list(list: &Cell) -> HawalaResult<Vec<OutAction>> {
    let mut actions = Vec::new();
    let mut node = list;
    while !node.is_empty() {
        if actions.len() >= MAX_OUT_ACTIONS {
            return Err(HawalaError::parse_error("Out-list is longer than allowed"));
        }
        let mut s = node.parse();
        let prev = s.load_ref()?;
        let tag = s.load_u32(32)?;
        if tag != ACTION_SEND_MSG_TAG {
            return Err(HawalaError::parse_error(format!("Unsupported out action tag {:#010x}", tag)));
        }
        let mode = s.load_uint(8)? as u8;
        let message = Arc::clone(s.load_ref()?);
        actions.push(OutAction { mode, message });
        node = prev.as_ref();
    }
    actions.reverse();
    Ok(actions)
}
