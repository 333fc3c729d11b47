use bytes::BufMut;

use crate::error::{Result, WireError};

/// Longest encoding of a u64 varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Append `value` as an unsigned LEB128 varint.
pub fn put_varint<B: BufMut>(dst: &mut B, mut value: u64) {
    while value >= 0x80 {
        dst.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

/// Decode a varint from the start of `src`.
///
/// Returns the value and the number of bytes consumed.
pub fn get_varint(src: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    for (index, byte) in src.iter().take(MAX_VARINT_LEN).enumerate() {
        let low = u64::from(byte & 0x7F);
        if index == MAX_VARINT_LEN - 1 && low > 1 {
            return Err(WireError::VarintOverflow);
        }
        value |= low << (7 * index);
        if byte & 0x80 == 0 {
            return Ok((value, index + 1));
        }
    }
    if src.len() >= MAX_VARINT_LEN {
        Err(WireError::VarintOverflow)
    } else {
        Err(WireError::Truncated {
            needed: 1,
            available: 0,
        })
    }
}

/// Number of bytes `value` occupies as a varint.
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
