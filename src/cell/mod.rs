//! TVM Cell Primitive
//!
//! Ordinary cells only: up to 1023 data bits and 4 child references.
//! Provides:
//! - `CellBuilder` for bit-level construction
//! - `CellSlice` for reading a cell back
//! - Representation hash and depth, computed once at construction
//! - Bag-of-cells (BOC) serialization and parsing
//! - `HashmapE` dictionary serialization

mod boc;
mod builder;
mod dict;
mod slice;

pub use boc::*;
pub use builder::*;
pub use dict::*;
pub use slice::*;

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::{ErrorCode, HawalaError};

/// Maximum data bits in one cell
pub const MAX_CELL_BITS: usize = 1023;
/// Maximum child references in one cell
pub const MAX_CELL_REFS: usize = 4;

/// Shared, immutable cell handle
pub type ArcCell = Arc<Cell>;

/// Low-level cell failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    #[error("cell bit overflow: {requested} bits requested, {available} available")]
    BitOverflow { requested: usize, available: usize },
    #[error("cell reference overflow: at most 4 references")]
    RefOverflow,
    #[error("cell underflow: {0}")]
    Underflow(String),
    #[error("value {value} does not fit in {bits} bits")]
    ValueTooLarge { value: String, bits: usize },
    #[error("invalid bag of cells: {0}")]
    InvalidBoc(String),
    #[error("invalid address in cell: {0}")]
    InvalidAddress(String),
    #[error("invalid UTF-8 in cell string")]
    InvalidUtf8,
}

impl From<CellError> for HawalaError {
    fn from(e: CellError) -> Self {
        let code = match e {
            CellError::BitOverflow { .. } | CellError::RefOverflow | CellError::ValueTooLarge { .. } => {
                ErrorCode::CellOverflow
            }
            CellError::Underflow(_) | CellError::InvalidUtf8 => ErrorCode::CellUnderflow,
            CellError::InvalidBoc(_) => ErrorCode::InvalidBoc,
            CellError::InvalidAddress(_) => ErrorCode::InvalidAddress,
        };
        HawalaError::new(code, e.to_string())
    }
}

/// Representation hash and depth of a cell
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellDigest {
    pub hash: [u8; 32],
    pub depth: u16,
}

impl CellDigest {
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl fmt::Debug for CellDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellDigest({}, depth={})", self.hash_hex(), self.depth)
    }
}

/// An ordinary cell. Data bits are stored left-aligned with zeroed padding.
#[derive(Clone, PartialEq, Eq)]
pub struct Cell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<ArcCell>,
    digest: CellDigest,
}

impl Cell {
    /// Build a cell from raw left-aligned bits and children
    pub fn new(mut data: Vec<u8>, bit_len: usize, refs: Vec<ArcCell>) -> Result<Self, CellError> {
        if bit_len > MAX_CELL_BITS {
            return Err(CellError::BitOverflow {
                requested: bit_len,
                available: MAX_CELL_BITS,
            });
        }
        if refs.len() > MAX_CELL_REFS {
            return Err(CellError::RefOverflow);
        }
        let byte_len = bit_len.div_ceil(8);
        if data.len() < byte_len {
            return Err(CellError::Underflow(format!(
                "{} bits declared, {} bytes supplied",
                bit_len,
                data.len()
            )));
        }
        data.truncate(byte_len);
        if bit_len % 8 != 0 {
            let keep = 0xFFu8 << (8 - bit_len % 8);
            if let Some(last) = data.last_mut() {
                *last &= keep;
            }
        }

        let children: Vec<CellDigest> = refs.iter().map(|c| c.digest).collect();
        let digest = compute_digest(&data, bit_len, &children);

        Ok(Self {
            data,
            bit_len,
            refs,
            digest,
        })
    }

    /// The empty cell (0 bits, no references)
    pub fn empty() -> ArcCell {
        Arc::new(Self {
            data: Vec::new(),
            bit_len: 0,
            refs: Vec::new(),
            digest: compute_digest(&[], 0, &[]),
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn refs(&self) -> &[ArcCell] {
        &self.refs
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0 && self.refs.is_empty()
    }

    pub fn digest(&self) -> CellDigest {
        self.digest
    }

    /// Representation hash
    pub fn hash(&self) -> [u8; 32] {
        self.digest.hash
    }

    pub fn depth(&self) -> u16 {
        self.digest.depth
    }

    /// Bit at `index` (must be < `bit_len`)
    pub fn bit(&self, index: usize) -> bool {
        (self.data[index / 8] >> (7 - index % 8)) & 1 == 1
    }

    /// Start reading this cell from its first bit
    pub fn parse(&self) -> CellSlice<'_> {
        CellSlice::new(self)
    }

    /// `d1` descriptor byte: reference count (ordinary cell, level 0)
    pub(crate) fn refs_descriptor(&self) -> u8 {
        self.refs.len() as u8
    }

    /// `d2` descriptor byte: floor(bits/8) + ceil(bits/8)
    pub(crate) fn bits_descriptor(&self) -> u8 {
        (self.bit_len / 8 + self.bit_len.div_ceil(8)) as u8
    }

    /// Data bytes with the completion tag appended when not byte-aligned
    pub(crate) fn padded_data(&self) -> Vec<u8> {
        padded(&self.data, self.bit_len)
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("bits", &self.bit_len)
            .field("data", &hex::encode(&self.data))
            .field("refs", &self.refs.len())
            .field("hash", &self.digest.hash_hex())
            .finish()
    }
}

fn padded(data: &[u8], bit_len: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    let rem = bit_len % 8;
    if rem != 0 {
        if let Some(last) = out.last_mut() {
            *last |= 1 << (7 - rem);
        }
    }
    out
}

/// Representation hash: sha256(d1 ‖ d2 ‖ padded data ‖ child depths ‖ child hashes)
pub(crate) fn compute_digest(data: &[u8], bit_len: usize, children: &[CellDigest]) -> CellDigest {
    let mut hasher = Sha256::new();
    hasher.update([children.len() as u8]);
    hasher.update([(bit_len / 8 + bit_len.div_ceil(8)) as u8]);
    hasher.update(padded(data, bit_len));
    for child in children {
        hasher.update(child.depth.to_be_bytes());
    }
    for child in children {
        hasher.update(child.hash);
    }

    let depth = children
        .iter()
        .map(|c| c.depth + 1)
        .max()
        .unwrap_or(0);

    CellDigest {
        hash: hasher.finalize().into(),
        depth,
    }
}
