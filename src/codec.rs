use crate::error::{MinerError, Result};

/// Number of bytes `write_varint` will emit for `val`.
pub fn varint_size(val: u64) -> usize {
    if val < 0xfd {
        1
    } else if val <= u16::MAX as u64 {
        3
    } else if val <= u32::MAX as u64 {
        5
    } else {
        9
    }
}

/// Bitcoin compact-size integer: one-byte value below 0xfd, otherwise a
/// discriminant byte followed by the little-endian scalar.
pub fn write_varint(buf: &mut Vec<u8>, val: u64) {
    if val < 0xfd {
        buf.push(val as u8);
    } else if val <= u16::MAX as u64 {
        buf.push(0xfd);
        buf.extend((val as u16).to_le_bytes());
    } else if val <= u32::MAX as u64 {
        buf.push(0xfe);
        buf.extend((val as u32).to_le_bytes());
    } else {
        buf.push(0xff);
        buf.extend(val.to_le_bytes());
    }
}

/// `varint(len) || bytes`
pub fn write_varbytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Reversed copy, used to move hashes between display order (JSON, output
/// file) and natural order (everything internal).
pub fn reverse_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out.reverse();
    out
}

/// Decodes a display-order hex hash into a natural-order 32-byte array.
pub fn decode_hash32(display_hex: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(display_hex)?;
    if bytes.len() != 32 {
        return Err(MinerError::Decode(format!("hash is {} bytes, want 32", bytes.len())).into());
    }
    let mut hash = [0u8; 32];
    for (i, b) in bytes.iter().rev().enumerate() {
        hash[i] = *b;
    }
    Ok(hash)
}
