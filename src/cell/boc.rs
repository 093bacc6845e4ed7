//! Bag-of-cells (BOC) serialization
//!
//! Layout (generic magic `b5ee9c72`):
//! `magic | flags:size_bytes | off_bytes | cells | roots | absent | total_size
//!  | root indices | cell data | crc32c?`

use std::collections::HashMap;
use std::sync::Arc;

use super::{ArcCell, Cell, CellError};
use crate::utils::crypto::{base64_decode, base64_encode, crc32c};

const BOC_GENERIC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

const FLAG_HAS_IDX: u8 = 0x80;
const FLAG_HAS_CRC32C: u8 = 0x40;

/// Serialize a single-root bag of cells. Cells are deduplicated by hash and
/// ordered so that every parent precedes its children.
pub fn serialize_boc(root: &Cell, with_crc32c: bool) -> Vec<u8> {
    let mut order: Vec<&Cell> = Vec::new();
    let mut seen: HashMap<[u8; 32], ()> = HashMap::new();
    collect_post_order(root, &mut seen, &mut order);
    order.reverse();

    let index: HashMap<[u8; 32], usize> = order
        .iter()
        .enumerate()
        .map(|(i, c)| (c.hash(), i))
        .collect();

    let size_bytes = bytes_needed(order.len() as u64);

    let mut cells_data = Vec::new();
    for cell in &order {
        cells_data.push(cell.refs_descriptor());
        cells_data.push(cell.bits_descriptor());
        cells_data.extend(cell.padded_data());
        for child in cell.refs() {
            let idx = index[&child.hash()] as u64;
            cells_data.extend(&idx.to_be_bytes()[8 - size_bytes..]);
        }
    }

    let total = cells_data.len() as u64;
    let off_bytes = bytes_needed(total);

    let mut out = Vec::with_capacity(cells_data.len() + 32);
    out.extend(BOC_GENERIC_MAGIC);
    let flags = if with_crc32c { FLAG_HAS_CRC32C } else { 0 } | size_bytes as u8;
    out.push(flags);
    out.push(off_bytes as u8);
    out.extend(&(order.len() as u64).to_be_bytes()[8 - size_bytes..]);
    out.extend(&1u64.to_be_bytes()[8 - size_bytes..]);
    out.extend(&0u64.to_be_bytes()[8 - size_bytes..]);
    out.extend(&total.to_be_bytes()[8 - off_bytes..]);
    // Root is always the first cell
    out.extend(&0u64.to_be_bytes()[8 - size_bytes..]);
    out.extend(cells_data);

    if with_crc32c {
        let crc = crc32c(&out);
        out.extend(crc.to_le_bytes());
    }
    out
}

fn collect_post_order<'a>(
    cell: &'a Cell,
    seen: &mut HashMap<[u8; 32], ()>,
    order: &mut Vec<&'a Cell>,
) {
    if seen.contains_key(&cell.hash()) {
        return;
    }
    for child in cell.refs() {
        collect_post_order(child, seen, order);
    }
    seen.insert(cell.hash(), ());
    order.push(cell);
}

fn bytes_needed(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], CellError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| CellError::InvalidBoc("unexpected end of data".into()))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn byte(&mut self) -> Result<u8, CellError> {
        Ok(self.take(1)?[0])
    }

    fn uint(&mut self, len: usize) -> Result<usize, CellError> {
        let mut value = 0usize;
        for b in self.take(len)? {
            value = (value << 8) | *b as usize;
        }
        Ok(value)
    }
}

/// Parse a bag of cells and return its roots
pub fn parse_boc(bytes: &[u8]) -> Result<Vec<ArcCell>, CellError> {
    let mut r = Reader { bytes, pos: 0 };

    if r.take(4)? != &BOC_GENERIC_MAGIC[..] {
        return Err(CellError::InvalidBoc("unknown magic".into()));
    }

    let flags = r.byte()?;
    let has_idx = flags & FLAG_HAS_IDX != 0;
    let has_crc = flags & FLAG_HAS_CRC32C != 0;
    let size_bytes = (flags & 0x07) as usize;
    if size_bytes == 0 || size_bytes > 4 {
        return Err(CellError::InvalidBoc(format!("invalid size bytes {}", size_bytes)));
    }
    let off_bytes = r.byte()? as usize;
    if off_bytes == 0 || off_bytes > 8 {
        return Err(CellError::InvalidBoc(format!("invalid offset bytes {}", off_bytes)));
    }

    let cell_count = r.uint(size_bytes)?;
    let root_count = r.uint(size_bytes)?;
    let absent = r.uint(size_bytes)?;
    let total_size = r.uint(off_bytes)?;
    if root_count == 0 || root_count > cell_count || absent != 0 {
        return Err(CellError::InvalidBoc("inconsistent cell counts".into()));
    }

    let mut roots = Vec::with_capacity(root_count);
    for _ in 0..root_count {
        roots.push(r.uint(size_bytes)?);
    }
    if has_idx {
        r.take(cell_count * off_bytes)?;
    }

    let data_start = r.pos;
    let mut raw = Vec::with_capacity(cell_count);
    for i in 0..cell_count {
        let d1 = r.byte()?;
        let d2 = r.byte()?;
        if d1 & 0x08 != 0 {
            return Err(CellError::InvalidBoc(format!("exotic cell at index {}", i)));
        }
        if d1 & 0x10 != 0 {
            let level = (d1 >> 5) as usize;
            r.take((level + 1) * (32 + 2))?;
        }
        let ref_count = (d1 & 0x07) as usize;
        if ref_count > 4 {
            return Err(CellError::InvalidBoc(format!("cell {} has {} references", i, ref_count)));
        }

        let data_len = (d2 as usize).div_ceil(2);
        let data = r.take(data_len)?.to_vec();
        let bit_len = if d2 % 2 == 1 {
            let last = *data.last().unwrap_or(&0);
            if last == 0 {
                return Err(CellError::InvalidBoc(format!("missing completion tag in cell {}", i)));
            }
            data_len * 8 - (last.trailing_zeros() as usize + 1)
        } else {
            data_len * 8
        };

        let mut refs = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            let idx = r.uint(size_bytes)?;
            if idx <= i || idx >= cell_count {
                return Err(CellError::InvalidBoc(format!("cell {} has invalid reference {}", i, idx)));
            }
            refs.push(idx);
        }
        raw.push((data, bit_len, refs));
    }

    if r.pos - data_start != total_size {
        return Err(CellError::InvalidBoc("cell data size mismatch".into()));
    }

    if has_crc {
        let body_end = r.pos;
        let stored = r.take(4)?;
        let expected = crc32c(&bytes[..body_end]).to_le_bytes();
        if stored != &expected[..] {
            return Err(CellError::InvalidBoc("crc32c mismatch".into()));
        }
    }

    // Children always carry higher indices, so build from the back
    let mut built: Vec<Option<ArcCell>> = vec![None; cell_count];
    for i in (0..cell_count).rev() {
        let (data, bit_len, refs) = std::mem::take(&mut raw[i]);
        let children = refs
            .iter()
            .map(|idx| {
                built[*idx]
                    .clone()
                    .ok_or_else(|| CellError::InvalidBoc("dangling reference".into()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        built[i] = Some(Arc::new(Cell::new(data, bit_len, children)?));
    }

    roots
        .into_iter()
        .map(|idx| {
            built
                .get(idx)
                .cloned()
                .flatten()
                .ok_or_else(|| CellError::InvalidBoc(format!("invalid root index {}", idx)))
        })
        .collect()
}

impl Cell {
    /// Serialize as a single-root BOC with a CRC32C trailer
    pub fn to_boc(&self) -> Vec<u8> {
        serialize_boc(self, true)
    }

    pub fn to_boc_base64(&self) -> String {
        base64_encode(&self.to_boc())
    }

    /// Parse a BOC and return its first root
    pub fn from_boc(bytes: &[u8]) -> Result<ArcCell, CellError> {
        parse_boc(bytes)?
            .into_iter()
            .next()
            .ok_or_else(|| CellError::InvalidBoc("no roots".into()))
    }

    pub fn from_boc_base64(encoded: &str) -> Result<ArcCell, CellError> {
        let bytes = base64_decode(encoded).map_err(|e| CellError::InvalidBoc(e.message))?;
        Self::from_boc(&bytes)
    }

    pub fn from_boc_hex(encoded: &str) -> Result<ArcCell, CellError> {
        let bytes = hex::decode(encoded.trim()).map_err(|e| CellError::InvalidBoc(e.to_string()))?;
        Self::from_boc(&bytes)
    }
}
