//! Script-template validators. Dispatch is on the script type of the spent
//! output; all four supported paths share the same skeleton: extract pubkey
//! and signature, compute the sighash, curve-verify.

use std::sync::OnceLock;

use log::{debug, warn};
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, VerifyOnly};

use crate::error::{MinerError, Result};
use crate::sighash::check_hashtype_encoding;
use crate::transaction::{ScriptType, Transaction};

pub mod p2pkh;
pub mod p2tr;
pub mod p2wpkh;

use self::p2pkh::input_verification_p2pkh;
use self::p2tr::input_verification_p2tr;
use self::p2wpkh::input_verification_p2wpkh;

/// Shared verification context. Building one is expensive, so it is created
/// once and reused by every signature check.
pub(crate) fn secp() -> &'static Secp256k1<VerifyOnly> {
    static SECP: OnceLock<Secp256k1<VerifyOnly>> = OnceLock::new();
    SECP.get_or_init(Secp256k1::verification_only)
}

/// Splits `sig || hashtype` and parses the DER signature and the public key,
/// range checks included. The pubkey must be 33-byte compressed or 65-byte
/// uncompressed.
pub(crate) fn parse_ecdsa_sig_and_pubkey(
    pubkey_bytes: &[u8],
    full_sig_bytes: &[u8],
) -> Result<(PublicKey, Signature, u32)> {
    let (&hashtype_byte, sig_bytes) = full_sig_bytes
        .split_last()
        .ok_or_else(|| MinerError::Encoding("empty signature".to_string()))?;
    let hashtype = hashtype_byte as u32;
    check_hashtype_encoding(hashtype)?;

    match pubkey_bytes.len() {
        33 if pubkey_bytes[0] == 0x02 || pubkey_bytes[0] == 0x03 => {}
        65 if pubkey_bytes[0] == 0x04 => {}
        _ => {
            return Err(MinerError::Encoding("unsupported public key type".to_string()).into());
        }
    }

    let pubkey = PublicKey::from_slice(pubkey_bytes)
        .map_err(|e| MinerError::Curve(format!("pubkey: {}", e)))?;
    let signature = Signature::from_der(sig_bytes)
        .map_err(|e| MinerError::Encoding(format!("signature: {}", e)))?;

    Ok((pubkey, signature, hashtype))
}

pub(crate) fn verify_ecdsa(digest: &[u8; 32], signature: &Signature, pubkey: &PublicKey) -> bool {
    let message = match Message::from_digest_slice(digest) {
        Ok(message) => message,
        Err(_) => return false,
    };
    secp().verify_ecdsa(&message, signature, pubkey).is_ok()
}

/// Validates one input, dispatching on the template of the output it spends.
/// P2SH and P2WSH need the full script interpreter and are not supported, so
/// transactions spending them never reach the block.
pub fn validate_input(tx: &Transaction, input_index: usize) -> Result<bool> {
    match tx.vin[input_index].prevout.scriptpubkey_type {
        ScriptType::P2pkh => input_verification_p2pkh(tx, input_index),
        ScriptType::P2wpkh => input_verification_p2wpkh(tx, input_index),
        ScriptType::P2tr => input_verification_p2tr(tx, input_index),
        ScriptType::P2sh | ScriptType::P2wsh | ScriptType::Unknown => Ok(false),
    }
}

fn check_fees(tx: &Transaction) -> Result<()> {
    let fee = tx.fee();
    if fee < 0 {
        return Err(MinerError::Policy(format!("negative fee {}", fee)).into());
    }
    Ok(())
}

/// Whole-transaction check used by the picker: the fee must not be negative
/// and every input must pass its template validation. A failure in any
/// single input skips the transaction; it never aborts the pipeline.
pub fn verify_tx(tx: &Transaction) -> bool {
    if let Err(e) = check_fees(tx) {
        warn!("rejecting transaction: {}", e);
        return false;
    }

    for input_index in 0..tx.vin.len() {
        match validate_input(tx, input_index) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                debug!("input {} failed validation: {}", input_index, e);
                return false;
            }
        }
    }
    true
}
