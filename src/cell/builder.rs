//! Bit-level cell construction

use std::sync::Arc;

use super::{ArcCell, Cell, CellError, MAX_CELL_BITS, MAX_CELL_REFS};
use crate::address::TonAddress;

/// Accumulates bits and references for one cell.
///
/// Every `store_*` call checks capacity and returns `&mut Self` so calls
/// chain with `?`.
#[derive(Debug, Clone, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<ArcCell>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn remaining_bits(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    pub fn remaining_refs(&self) -> usize {
        MAX_CELL_REFS - self.refs.len()
    }

    fn ensure_bits(&self, bits: usize) -> Result<(), CellError> {
        if bits > self.remaining_bits() {
            return Err(CellError::BitOverflow {
                requested: bits,
                available: self.remaining_bits(),
            });
        }
        Ok(())
    }

    fn push_bit(&mut self, bit: bool) {
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            let idx = self.bit_len / 8;
            self.data[idx] |= 1 << (7 - self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self, CellError> {
        self.ensure_bits(1)?;
        self.push_bit(bit);
        Ok(self)
    }

    /// Append the first `bit_len` bits of `data` (left-aligned)
    pub fn store_bits(&mut self, data: &[u8], bit_len: usize) -> Result<&mut Self, CellError> {
        if data.len() * 8 < bit_len {
            return Err(CellError::Underflow(format!(
                "{} bits requested from {} bytes",
                bit_len,
                data.len()
            )));
        }
        self.ensure_bits(bit_len)?;
        for i in 0..bit_len {
            self.push_bit((data[i / 8] >> (7 - i % 8)) & 1 == 1);
        }
        Ok(self)
    }

    /// Append whole bytes
    pub fn store_bytes(&mut self, data: &[u8]) -> Result<&mut Self, CellError> {
        self.store_bits(data, data.len() * 8)
    }

    /// Append an unsigned integer of `bits` width (at most 128)
    pub fn store_uint(&mut self, value: u128, bits: usize) -> Result<&mut Self, CellError> {
        if bits > 128 || (bits < 128 && value >> bits != 0) {
            return Err(CellError::ValueTooLarge {
                value: value.to_string(),
                bits,
            });
        }
        self.ensure_bits(bits)?;
        for i in (0..bits).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
        Ok(self)
    }

    /// Append a two's-complement signed integer of `bits` width (1..=64)
    pub fn store_int(&mut self, value: i64, bits: usize) -> Result<&mut Self, CellError> {
        if bits == 0 || bits > 64 {
            return Err(CellError::ValueTooLarge {
                value: value.to_string(),
                bits,
            });
        }
        let min = -(1i128 << (bits - 1));
        let max = (1i128 << (bits - 1)) - 1;
        if (value as i128) < min || (value as i128) > max {
            return Err(CellError::ValueTooLarge {
                value: value.to_string(),
                bits,
            });
        }
        let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        self.store_uint((value as u64 & mask) as u128, bits)
    }

    /// Append a `VarUInteger 16` coin amount: 4-bit byte length, then the bytes
    pub fn store_coins(&mut self, amount: u128) -> Result<&mut Self, CellError> {
        let byte_len = (128 - amount.leading_zeros() as usize).div_ceil(8);
        if byte_len > 15 {
            return Err(CellError::ValueTooLarge {
                value: amount.to_string(),
                bits: 120,
            });
        }
        self.ensure_bits(4 + byte_len * 8)?;
        self.store_uint(byte_len as u128, 4)?;
        self.store_uint(amount, byte_len * 8)
    }

    /// Append `addr_std$10 anycast:0 workchain_id:int8 address:bits256`
    pub fn store_address(&mut self, address: &TonAddress) -> Result<&mut Self, CellError> {
        if address.workchain < i8::MIN as i32 || address.workchain > i8::MAX as i32 {
            return Err(CellError::InvalidAddress(format!(
                "workchain {} does not fit addr_std",
                address.workchain
            )));
        }
        self.ensure_bits(267)?;
        self.store_uint(0b100, 3)?;
        self.store_int(address.workchain as i64, 8)?;
        self.store_bytes(&address.hash)
    }

    /// Append `addr_none$00`
    pub fn store_address_none(&mut self) -> Result<&mut Self, CellError> {
        self.store_uint(0, 2)
    }

    pub fn store_ref(&mut self, cell: ArcCell) -> Result<&mut Self, CellError> {
        if self.refs.len() >= MAX_CELL_REFS {
            return Err(CellError::RefOverflow);
        }
        self.refs.push(cell);
        Ok(self)
    }

    /// `Maybe ^Cell`: a presence bit, then the reference when present
    pub fn store_maybe_ref(&mut self, cell: Option<ArcCell>) -> Result<&mut Self, CellError> {
        match cell {
            Some(cell) => {
                if self.refs.len() >= MAX_CELL_REFS {
                    return Err(CellError::RefOverflow);
                }
                self.store_bit(true)?;
                self.store_ref(cell)
            }
            None => self.store_bit(false),
        }
    }

    /// Inline another cell's bits and references into this one
    pub fn store_cell_contents(&mut self, cell: &Cell) -> Result<&mut Self, CellError> {
        if cell.refs().len() > self.remaining_refs() {
            return Err(CellError::RefOverflow);
        }
        self.store_bits(cell.data(), cell.bit_len())?;
        for child in cell.refs() {
            self.store_ref(child.clone())?;
        }
        Ok(self)
    }

    /// Append a UTF-8 string in snake format, spilling into a chain of
    /// single-reference child cells when it does not fit.
    pub fn store_string_tail(&mut self, text: &str) -> Result<&mut Self, CellError> {
        self.store_snake_bytes(text.as_bytes())
    }

    fn store_snake_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, CellError> {
        let fit = self.remaining_bits() / 8;
        if bytes.len() <= fit {
            return self.store_bytes(bytes);
        }
        if self.remaining_refs() == 0 {
            return Err(CellError::RefOverflow);
        }
        self.store_bytes(&bytes[..fit])?;
        let mut tail = CellBuilder::new();
        tail.store_snake_bytes(&bytes[fit..])?;
        let tail = tail.build()?;
        self.store_ref(tail)
    }

    /// Finish the cell
    pub fn build(&self) -> Result<ArcCell, CellError> {
        Ok(Arc::new(Cell::new(
            self.data.clone(),
            self.bit_len,
            self.refs.clone(),
        )?))
    }
}
