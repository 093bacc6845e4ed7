//! `HashmapE` dictionaries with fixed-width unsigned keys
//!
//! Each edge label uses whichever of the short, long or same encodings is
//! shortest. Leaf values are inlined from the supplied cells.

use std::collections::BTreeMap;

use super::{ArcCell, Cell, CellBuilder, CellError, CellSlice};

/// Width of `#<= m`: bits needed to write any value up to `m`
fn len_bits(m: usize) -> usize {
    (usize::BITS - m.leading_zeros()) as usize
}

fn key_to_bits(key: u64, key_bits: usize) -> Vec<bool> {
    (0..key_bits).rev().map(|i| (key >> i) & 1 == 1).collect()
}

fn store_label(b: &mut CellBuilder, label: &[bool], max_len: usize) -> Result<(), CellError> {
    let n = label.len();
    let short_len = 2 * n + 2;
    let long_len = 2 + len_bits(max_len) + n;
    let same = n > 0 && label.iter().all(|bit| *bit == label[0]);
    let same_len = 3 + len_bits(max_len);

    if same && same_len < short_len.min(long_len) {
        // hml_same$11 v:Bit n:(#<= m)
        b.store_uint(0b11, 2)?;
        b.store_bit(label[0])?;
        b.store_uint(n as u128, len_bits(max_len))?;
    } else if long_len < short_len {
        // hml_long$10 n:(#<= m) s:(n * Bit)
        b.store_uint(0b10, 2)?;
        b.store_uint(n as u128, len_bits(max_len))?;
        for bit in label {
            b.store_bit(*bit)?;
        }
    } else {
        // hml_short$0 len:(Unary ~n) s:(n * Bit)
        b.store_bit(false)?;
        for _ in 0..n {
            b.store_bit(true)?;
        }
        b.store_bit(false)?;
        for bit in label {
            b.store_bit(*bit)?;
        }
    }
    Ok(())
}

fn build_edge(key_len: usize, entries: &[(Vec<bool>, &ArcCell)]) -> Result<ArcCell, CellError> {
    let first = &entries[0].0;
    let mut prefix = key_len;
    for (key, _) in &entries[1..] {
        let common = first.iter().zip(key.iter()).take_while(|(a, b)| a == b).count();
        prefix = prefix.min(common);
    }

    let mut b = CellBuilder::new();
    store_label(&mut b, &first[..prefix], key_len)?;

    if prefix == key_len {
        b.store_cell_contents(entries[0].1)?;
        return b.build();
    }

    let mut left = Vec::new();
    let mut right = Vec::new();
    for (key, value) in entries {
        let rest = key[prefix + 1..].to_vec();
        if key[prefix] {
            right.push((rest, *value));
        } else {
            left.push((rest, *value));
        }
    }

    let remaining = key_len - prefix - 1;
    b.store_ref(build_edge(remaining, &left)?)?;
    b.store_ref(build_edge(remaining, &right)?)?;
    b.build()
}

/// Serialize a dictionary and return its root edge, or `None` when empty.
/// Store the result with `CellBuilder::store_maybe_ref` to get a `HashmapE`.
pub fn build_dict(
    key_bits: usize,
    entries: &BTreeMap<u64, ArcCell>,
) -> Result<Option<ArcCell>, CellError> {
    if entries.is_empty() {
        return Ok(None);
    }
    if key_bits == 0 || key_bits > 64 {
        return Err(CellError::ValueTooLarge {
            value: "dictionary key".into(),
            bits: key_bits,
        });
    }

    let mut keyed = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        if key_bits < 64 && key >> key_bits != 0 {
            return Err(CellError::ValueTooLarge {
                value: key.to_string(),
                bits: key_bits,
            });
        }
        keyed.push((key_to_bits(*key, key_bits), value));
    }

    build_edge(key_bits, &keyed).map(Some)
}

fn load_label(s: &mut CellSlice<'_>, max_len: usize) -> Result<Vec<bool>, CellError> {
    if !s.load_bit()? {
        let mut n = 0;
        while s.load_bit()? {
            n += 1;
        }
        if n > max_len {
            return Err(CellError::Underflow("dictionary label longer than key".into()));
        }
        (0..n).map(|_| s.load_bit()).collect()
    } else if !s.load_bit()? {
        let n = s.load_uint(len_bits(max_len))? as usize;
        if n > max_len {
            return Err(CellError::Underflow("dictionary label longer than key".into()));
        }
        (0..n).map(|_| s.load_bit()).collect()
    } else {
        let bit = s.load_bit()?;
        let n = s.load_uint(len_bits(max_len))? as usize;
        if n > max_len {
            return Err(CellError::Underflow("dictionary label longer than key".into()));
        }
        Ok(vec![bit; n])
    }
}

fn parse_edge(
    cell: &Cell,
    key_len: usize,
    prefix: u64,
    out: &mut BTreeMap<u64, ArcCell>,
) -> Result<(), CellError> {
    let mut s = cell.parse();
    let label = load_label(&mut s, key_len)?;
    let mut key = prefix;
    for bit in &label {
        key = (key << 1) | *bit as u64;
    }
    let remaining = key_len - label.len();
    if remaining == 0 {
        out.insert(key, s.remainder()?);
        return Ok(());
    }
    let left = s.load_ref()?;
    let right = s.load_ref()?;
    parse_edge(left, remaining - 1, key << 1, out)?;
    parse_edge(right, remaining - 1, (key << 1) | 1, out)
}

/// Read back a dictionary root produced by `build_dict`
pub fn parse_dict(root: &Cell, key_bits: usize) -> Result<BTreeMap<u64, ArcCell>, CellError> {
    let mut out = BTreeMap::new();
    parse_edge(root, key_bits, 0, &mut out)?;
    Ok(out)
}
