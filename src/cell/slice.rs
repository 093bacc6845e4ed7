//! Sequential reader over a cell's bits and references

use super::{ArcCell, Cell, CellError};
use crate::address::TonAddress;

/// Cursor over one cell
#[derive(Debug, Clone)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_pos: usize,
    ref_pos: usize,
}

impl<'a> CellSlice<'a> {
    pub fn new(cell: &'a Cell) -> Self {
        Self {
            cell,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    pub fn remaining_bits(&self) -> usize {
        self.cell.bit_len() - self.bit_pos
    }

    pub fn remaining_refs(&self) -> usize {
        self.cell.refs().len() - self.ref_pos
    }

    fn ensure_bits(&self, bits: usize) -> Result<(), CellError> {
        if bits > self.remaining_bits() {
            return Err(CellError::Underflow(format!(
                "{} bits requested, {} left",
                bits,
                self.remaining_bits()
            )));
        }
        Ok(())
    }

    pub fn load_bit(&mut self) -> Result<bool, CellError> {
        self.ensure_bits(1)?;
        let bit = self.cell.bit(self.bit_pos);
        self.bit_pos += 1;
        Ok(bit)
    }

    pub fn load_uint(&mut self, bits: usize) -> Result<u128, CellError> {
        if bits > 128 {
            return Err(CellError::ValueTooLarge {
                value: "uint".into(),
                bits,
            });
        }
        self.ensure_bits(bits)?;
        let mut value = 0u128;
        for _ in 0..bits {
            value = (value << 1) | self.cell.bit(self.bit_pos) as u128;
            self.bit_pos += 1;
        }
        Ok(value)
    }

    pub fn load_u32(&mut self, bits: usize) -> Result<u32, CellError> {
        if bits > 32 {
            return Err(CellError::ValueTooLarge {
                value: "u32".into(),
                bits,
            });
        }
        Ok(self.load_uint(bits)? as u32)
    }

    pub fn load_u64(&mut self, bits: usize) -> Result<u64, CellError> {
        if bits > 64 {
            return Err(CellError::ValueTooLarge {
                value: "u64".into(),
                bits,
            });
        }
        Ok(self.load_uint(bits)? as u64)
    }

    /// Two's-complement signed integer of `bits` width (1..=64)
    pub fn load_int(&mut self, bits: usize) -> Result<i64, CellError> {
        if bits == 0 || bits > 64 {
            return Err(CellError::ValueTooLarge {
                value: "int".into(),
                bits,
            });
        }
        let raw = self.load_uint(bits)? as u64;
        let shift = 64 - bits as u32;
        Ok(((raw << shift) as i64) >> shift)
    }

    pub fn load_bytes(&mut self, len: usize) -> Result<Vec<u8>, CellError> {
        self.ensure_bits(len * 8)?;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.load_uint(8)? as u8);
        }
        Ok(out)
    }

    pub fn load_coins(&mut self) -> Result<u128, CellError> {
        let len = self.load_uint(4)? as usize;
        self.load_uint(len * 8)
    }

    /// `MsgAddressInt` or `addr_none`; `None` for `addr_none`
    pub fn load_address(&mut self) -> Result<Option<TonAddress>, CellError> {
        match self.load_uint(2)? {
            0b00 => Ok(None),
            0b10 => {
                if self.load_bit()? {
                    return Err(CellError::InvalidAddress("anycast is not supported".into()));
                }
                let workchain = self.load_int(8)? as i32;
                let hash_bytes = self.load_bytes(32)?;
                let mut hash = [0u8; 32];
                hash.copy_from_slice(&hash_bytes);
                Ok(Some(TonAddress::new(workchain, hash)))
            }
            tag => Err(CellError::InvalidAddress(format!("unsupported address tag {:02b}", tag))),
        }
    }

    pub fn load_ref(&mut self) -> Result<&'a ArcCell, CellError> {
        let refs = self.cell.refs();
        let cell = refs
            .get(self.ref_pos)
            .ok_or_else(|| CellError::Underflow("no references left".into()))?;
        self.ref_pos += 1;
        Ok(cell)
    }

    pub fn load_maybe_ref(&mut self) -> Result<Option<&'a ArcCell>, CellError> {
        if self.load_bit()? {
            Ok(Some(self.load_ref()?))
        } else {
            Ok(None)
        }
    }

    /// Read the remaining bytes of this cell and then follow the first
    /// reference of each tail cell (snake format).
    pub fn load_string_tail(&mut self) -> Result<String, CellError> {
        let mut bytes = Vec::new();
        let len = self.remaining_bits() / 8;
        bytes.extend(self.load_bytes(len)?);

        let mut next = if self.remaining_refs() > 0 {
            Some(self.load_ref()?)
        } else {
            None
        };
        while let Some(cell) = next {
            let mut slice = cell.parse();
            let len = slice.remaining_bits() / 8;
            bytes.extend(slice.load_bytes(len)?);
            next = cell.refs().first();
        }

        String::from_utf8(bytes).map_err(|_| CellError::InvalidUtf8)
    }

    /// Copy the unread bits and references into a new cell
    pub fn remainder(&self) -> Result<ArcCell, CellError> {
        let mut builder = super::CellBuilder::new();
        for i in self.bit_pos..self.cell.bit_len() {
            builder.store_bit(self.cell.bit(i))?;
        }
        for child in &self.cell.refs()[self.ref_pos..] {
            builder.store_ref(child.clone())?;
        }
        builder.build()
    }

    /// Fail unless every bit and reference has been consumed
    pub fn end_parse(&self) -> Result<(), CellError> {
        if self.remaining_bits() != 0 || self.remaining_refs() != 0 {
            return Err(CellError::Underflow(format!(
                "{} bits and {} references left unread",
                self.remaining_bits(),
                self.remaining_refs()
            )));
        }
        Ok(())
    }
}
