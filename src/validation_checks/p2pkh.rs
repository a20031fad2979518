//! Pay-to-pubkey-hash. The signature and public key come from the
//! scriptSig; the digest is the legacy pre-segwit sighash over the spent
//! scriptPubKey.

use log::debug;

use crate::error::Result;
use crate::hashes::hash160;
use crate::sighash::legacy_sighash;
use crate::transaction::Transaction;
use crate::validation_checks::{parse_ecdsa_sig_and_pubkey, verify_ecdsa};

pub fn input_verification_p2pkh(tx: &Transaction, input_index: usize) -> Result<bool> {
    let scriptsig_asm = match &tx.vin[input_index].scriptsig_asm {
        Some(asm) => asm.clone(),
        None => return Ok(false),
    };
    let scriptpubkey_asm = tx.vin[input_index].prevout.scriptpubkey_asm.clone();

    script_execution(&scriptpubkey_asm, &scriptsig_asm, tx, input_index)
}

/// Runs the fixed P2PKH template over the ASM the way a tiny stack machine
/// would: push sig and pubkey, then OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY
/// OP_CHECKSIG.
fn script_execution(
    scriptpubkey_asm: &str,
    scriptsig_asm: &str,
    tx: &Transaction,
    input_index: usize,
) -> Result<bool> {
    let scriptsig_tokens: Vec<&str> = scriptsig_asm.split_whitespace().collect();
    // scriptSig ASM is PUSH <sig> PUSH <pubkey>
    let (signature_hex, pubkey_hex) = match (scriptsig_tokens.get(1), scriptsig_tokens.last()) {
        (Some(sig), Some(pk)) if scriptsig_tokens.len() >= 4 => (*sig, *pk),
        _ => return Ok(false),
    };

    let mut stack: Vec<Vec<u8>> = Vec::new();
    stack.push(hex::decode(signature_hex)?);
    stack.push(hex::decode(pubkey_hex)?);

    let mut tokens = scriptpubkey_asm.split_whitespace();
    while let Some(op) = tokens.next() {
        match op {
            "OP_DUP" => {
                let top = match stack.last() {
                    Some(top) => top.clone(),
                    None => return Ok(false),
                };
                stack.push(top);
            }
            "OP_HASH160" => {
                let top = match stack.pop() {
                    Some(top) => top,
                    None => return Ok(false),
                };
                stack.push(hash160(&top).to_vec());
            }
            "OP_PUSHBYTES_20" => {
                let pushed = match tokens.next() {
                    Some(hex_str) if hex_str.len() == 40 => hex::decode(hex_str)?,
                    _ => return Ok(false),
                };
                stack.push(pushed);
            }
            "OP_EQUALVERIFY" => {
                let (a, b) = match (stack.pop(), stack.pop()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Ok(false),
                };
                if a != b {
                    debug!("pubkey hash mismatch on input {}", input_index);
                    return Ok(false);
                }
            }
            "OP_CHECKSIG" => {
                return op_checksig(tx, input_index, signature_hex, pubkey_hex);
            }
            _ => return Ok(false),
        }
    }
    Ok(false)
}

fn op_checksig(
    tx: &Transaction,
    input_index: usize,
    signature_hex: &str,
    pubkey_hex: &str,
) -> Result<bool> {
    let full_sig_bytes = hex::decode(signature_hex)?;
    let pubkey_bytes = hex::decode(pubkey_hex)?;

    let (pubkey, signature, hashtype) =
        parse_ecdsa_sig_and_pubkey(&pubkey_bytes, &full_sig_bytes)?;

    let subscript = tx.vin[input_index].prev_script_pubkey()?;
    let digest = legacy_sighash(&subscript, hashtype, tx, input_index)?;

    Ok(verify_ecdsa(&digest, &signature, &pubkey))
}
