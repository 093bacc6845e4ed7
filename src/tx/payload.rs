//! Message Bodies
//!
//! Text comments and jetton transfer requests.

use crate::address::TonAddress;
use crate::cell::{ArcCell, Cell, CellBuilder};
use crate::error::{HawalaError, HawalaResult};
use crate::types::JettonTransferIntent;

/// Op code of a plain text comment
pub const COMMENT_OP: u32 = 0;
/// Op code of a jetton `transfer`
pub const JETTON_TRANSFER_OP: u32 = 0x0f8a_7ea5;

/// `op:0` followed by the UTF-8 text in snake format
pub fn comment_body(text: &str) -> HawalaResult<ArcCell> {
    let mut b = CellBuilder::new();
    b.store_uint(COMMENT_OP as u128, 32)?.store_string_tail(text)?;
    Ok(b.build()?)
}

/// Text of a comment body, `None` when the body is not a comment
pub fn parse_comment(body: &Cell) -> HawalaResult<Option<String>> {
    let mut s = body.parse();
    if s.remaining_bits() < 32 || s.load_u32(32)? != COMMENT_OP {
        return Ok(None);
    }
    Ok(Some(s.load_string_tail()?))
}

/// Jetton `transfer` body sent to the owner's jetton wallet.
///
/// The comment, if any, travels as the forward payload in a child cell so the
/// body never overflows regardless of its length.
pub fn jetton_transfer_body(intent: &JettonTransferIntent, owner: &TonAddress) -> HawalaResult<ArcCell> {
    if intent.jetton_amount == 0 {
        return Err(HawalaError::invalid_input("Jetton amount must be positive"));
    }
    let response = intent.response_destination.as_ref().unwrap_or(owner);

    let mut b = CellBuilder::new();
    b.store_uint(JETTON_TRANSFER_OP as u128, 32)?
        .store_uint(intent.query_id as u128, 64)?
        .store_coins(intent.jetton_amount)?
        .store_address(&intent.destination)?
        .store_address(response)?
        .store_bit(false)? // no custom payload
        .store_coins(intent.forward_ton_amount)?;
    match &intent.comment {
        Some(text) => {
            b.store_bit(true)?.store_ref(comment_body(text)?)?;
        }
        None => {
            b.store_bit(false)?;
        }
    }
    Ok(b.build()?)
}
