//! Pay-to-witness-pubkey-hash. The witness carries `[sig || hashtype,
//! pubkey]`; the digest is the BIP-143 segwit v0 sighash.

use log::debug;

use crate::error::Result;
use crate::hashes::hash160;
use crate::sighash::segwit::{segwit_v0_sighash, SegwitSigHashes};
use crate::transaction::Transaction;
use crate::validation_checks::{parse_ecdsa_sig_and_pubkey, verify_ecdsa};

pub fn input_verification_p2wpkh(tx: &Transaction, input_index: usize) -> Result<bool> {
    let input = &tx.vin[input_index];

    let witness = input.witness_items()?;
    if witness.len() != 2 {
        return Ok(false);
    }
    // a native segwit spend leaves the scriptSig empty
    if !input.script_sig_bytes()?.is_empty() {
        return Ok(false);
    }

    let script_pubkey = input.prev_script_pubkey()?;
    if script_pubkey.len() != 22 || script_pubkey[0] != 0x00 || script_pubkey[1] != 0x14 {
        return Ok(false);
    }

    // the consensus rule the witness program stands for: the committed hash
    // must match the pubkey revealed in the witness
    let pubkey_bytes = &witness[1];
    if hash160(pubkey_bytes) != script_pubkey[2..22] {
        debug!("witness pubkey does not hash to the program");
        return Ok(false);
    }

    let (pubkey, signature, hashtype) = parse_ecdsa_sig_and_pubkey(pubkey_bytes, &witness[0])?;

    let sighashes = SegwitSigHashes::new(tx)?;
    let digest = segwit_v0_sighash(&script_pubkey, &sighashes, hashtype, tx, input_index)?;

    Ok(verify_ecdsa(&digest, &signature, &pubkey))
}
