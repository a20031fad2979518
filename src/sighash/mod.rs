//! Signature-hash engine. Three digest algorithms live here, dispatched by
//! the script template of the input being checked: the legacy pre-segwit
//! digest, the BIP-143 segwit v0 digest and the BIP-341/342 taproot digest.
//! All of them operate on clones of the caller's transaction; the caller's
//! value is never mutated.

pub mod segwit;
pub mod taproot;

use crate::error::{MinerError, Result};
use crate::hashes::{hash256, sha256};
use crate::transaction::{write_txout, Transaction};

pub const SIGHASH_DEFAULT: u32 = 0x00;
pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_NONE: u32 = 0x02;
pub const SIGHASH_SINGLE: u32 = 0x03;
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

// low five bits select which outputs the signature commits to
pub const SIGHASH_MASK: u32 = 0x1f;

/// For legacy and segwit v0 signatures the base type must be one of
/// ALL/NONE/SINGLE; anything else is an encoding error. SIGHASH_DEFAULT is
/// taproot-only and rejected here.
pub fn check_hashtype_encoding(hashtype: u32) -> Result<()> {
    let base = hashtype & !SIGHASH_ANYONECANPAY;
    if !(SIGHASH_ALL..=SIGHASH_SINGLE).contains(&base) {
        return Err(MinerError::Encoding(format!("invalid hash type 0x{:x}", hashtype)).into());
    }
    Ok(())
}

/// Legacy (pre-BIP143) signature hash over the serialized transaction with
/// per-type mutations applied to a local copy.
///
/// `subscript` is the scriptPubKey of the output being spent.
pub fn legacy_sighash(
    subscript: &[u8],
    hashtype: u32,
    tx: &Transaction,
    idx: usize,
) -> Result<[u8; 32]> {
    // SIGHASH_SINGLE with no matching output hashes to the 0x01 sentinel
    // instead of failing, a quirk inherited from the Satoshi client.
    if hashtype & SIGHASH_MASK == SIGHASH_SINGLE && idx >= tx.vout.len() {
        let mut hash = [0u8; 32];
        hash[0] = 0x01;
        return Ok(hash);
    }

    let mut tx_copy = tx.clone();
    for (i, input) in tx_copy.vin.iter_mut().enumerate() {
        if i == idx {
            input.scriptsig = Some(hex::encode(subscript));
        } else {
            input.scriptsig = Some(String::new());
        }
    }

    match hashtype & SIGHASH_MASK {
        SIGHASH_NONE => {
            tx_copy.vout.clear();
            for (i, input) in tx_copy.vin.iter_mut().enumerate() {
                if i != idx {
                    input.sequence = 0;
                }
            }
        }
        SIGHASH_SINGLE => {
            tx_copy.vout.truncate(idx + 1);
            for output in tx_copy.vout.iter_mut().take(idx) {
                output.value = -1;
                output.scriptpubkey = String::new();
            }
            for (i, input) in tx_copy.vin.iter_mut().enumerate() {
                if i != idx {
                    input.sequence = 0;
                }
            }
        }
        // undefined hash types digest like SIGHASH_ALL
        _ => {}
    }

    if hashtype & SIGHASH_ANYONECANPAY != 0 {
        tx_copy.vin = vec![tx_copy.vin[idx].clone()];
    }

    let mut preimage = tx_copy.serialize(false)?;
    preimage.extend(hashtype.to_le_bytes());
    Ok(hash256(&preimage))
}

// Single-SHA256 digests over whole-transaction concatenations. Taproot uses
// them directly; the BIP-143 cache wraps each in one more SHA256.

pub(crate) fn sha_prevouts(tx: &Transaction) -> Result<[u8; 32]> {
    let mut buf = Vec::new();
    for input in &tx.vin {
        buf.extend(input.prev_txid_natural()?);
        buf.extend(input.vout.to_le_bytes());
    }
    Ok(sha256(&buf))
}

pub(crate) fn sha_sequences(tx: &Transaction) -> [u8; 32] {
    let mut buf = Vec::new();
    for input in &tx.vin {
        buf.extend(input.sequence.to_le_bytes());
    }
    sha256(&buf)
}

pub(crate) fn sha_amounts(tx: &Transaction) -> [u8; 32] {
    let mut buf = Vec::new();
    for input in &tx.vin {
        buf.extend((input.prevout.value as u64).to_le_bytes());
    }
    sha256(&buf)
}

pub(crate) fn sha_scripts(tx: &Transaction) -> Result<[u8; 32]> {
    let mut buf = Vec::new();
    for input in &tx.vin {
        let script = input.prev_script_pubkey()?;
        crate::codec::write_varbytes(&mut buf, &script);
    }
    Ok(sha256(&buf))
}

pub(crate) fn sha_outputs(tx: &Transaction) -> Result<[u8; 32]> {
    let mut buf = Vec::new();
    for output in &tx.vout {
        write_txout(&mut buf, output.value, &output.scriptpubkey)?;
    }
    Ok(sha256(&buf))
}
