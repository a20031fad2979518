//! BIP-341/342 digest for taproot inputs, key path and script path.

use crate::codec::write_varbytes;
use crate::error::{MinerError, Result};
use crate::hashes::{sha256, tagged_hash, TAG_TAP_SIGHASH};
use crate::sighash::{
    sha_amounts, sha_outputs, sha_prevouts, sha_scripts, sha_sequences, SIGHASH_ANYONECANPAY,
    SIGHASH_NONE, SIGHASH_SINGLE,
};
use crate::transaction::{write_txout, Transaction};

/// Whole-transaction digests of the BIP-341 message. Unlike the BIP-143
/// triplet these are single SHA-256; the domain separation comes from the
/// final tagged hash.
pub struct TaprootSigHashes {
    pub sha_prevouts: [u8; 32],
    pub sha_amounts: [u8; 32],
    pub sha_scripts: [u8; 32],
    pub sha_sequences: [u8; 32],
    pub sha_outputs: [u8; 32],
}

impl TaprootSigHashes {
    pub fn new(tx: &Transaction) -> Result<Self> {
        Ok(TaprootSigHashes {
            sha_prevouts: sha_prevouts(tx)?,
            sha_amounts: sha_amounts(tx),
            sha_scripts: sha_scripts(tx)?,
            sha_sequences: sha_sequences(tx),
            sha_outputs: sha_outputs(tx)?,
        })
    }
}

/// The BIP-342 message extension for script-path spends.
pub struct LeafExtension {
    pub leaf_hash: [u8; 32],
    pub key_version: u8,
    pub code_sep_pos: u32,
}

impl LeafExtension {
    pub fn new(leaf_hash: [u8; 32]) -> Self {
        LeafExtension {
            leaf_hash,
            key_version: 0x00,
            code_sep_pos: u32::MAX,
        }
    }
}

fn is_valid_taproot_hashtype(hashtype: u32) -> bool {
    matches!(hashtype, 0x00..=0x03 | 0x81 | 0x82 | 0x83)
}

/// BIP-341 signature hash for input `idx`. `leaf` carries the tapscript
/// extension for script-path spends (`ext_flag = 1`); `annex` is the raw
/// annex without its length prefix.
pub fn taproot_sighash(
    sighashes: &TaprootSigHashes,
    hashtype: u32,
    tx: &Transaction,
    idx: usize,
    leaf: Option<&LeafExtension>,
    annex: Option<&[u8]>,
) -> Result<[u8; 32]> {
    if !is_valid_taproot_hashtype(hashtype) {
        return Err(
            MinerError::Encoding(format!("invalid taproot sighash type 0x{:x}", hashtype)).into(),
        );
    }

    let input = &tx.vin[idx];
    let base_type = hashtype & SIGHASH_SINGLE;

    let mut msg = Vec::new();
    // sighash epoch
    msg.push(0x00);
    msg.push(hashtype as u8);
    msg.extend((tx.version as u32).to_le_bytes());
    msg.extend(tx.locktime.to_le_bytes());

    if hashtype & SIGHASH_ANYONECANPAY == 0 {
        msg.extend(sighashes.sha_prevouts);
        msg.extend(sighashes.sha_amounts);
        msg.extend(sighashes.sha_scripts);
        msg.extend(sighashes.sha_sequences);
    }

    if base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
        msg.extend(sighashes.sha_outputs);
    }

    // spend_type = 2 * ext_flag + annex_present
    let ext_flag: u8 = if leaf.is_some() { 1 } else { 0 };
    let mut spend_type = ext_flag * 2;
    if annex.is_some() {
        spend_type += 1;
    }
    msg.push(spend_type);

    if hashtype & SIGHASH_ANYONECANPAY != 0 {
        msg.extend(input.prev_txid_natural()?);
        msg.extend(input.vout.to_le_bytes());
        write_txout(&mut msg, input.prevout.value, &input.prevout.scriptpubkey)?;
        msg.extend(input.sequence.to_le_bytes());
    } else {
        msg.extend((idx as u32).to_le_bytes());
    }

    if let Some(annex_bytes) = annex {
        let mut annex_buf = Vec::new();
        write_varbytes(&mut annex_buf, annex_bytes);
        msg.extend(sha256(&annex_buf));
    }

    if base_type == SIGHASH_SINGLE {
        // unlike the legacy digest there is no sentinel here
        if idx >= tx.vout.len() {
            return Err(MinerError::Sighash(
                "SIGHASH_SINGLE input has no matching output".to_string(),
            )
            .into());
        }
        let mut out_buf = Vec::new();
        write_txout(&mut out_buf, tx.vout[idx].value, &tx.vout[idx].scriptpubkey)?;
        msg.extend(sha256(&out_buf));
    }

    if let Some(ext) = leaf {
        msg.extend(ext.leaf_hash);
        msg.push(ext.key_version);
        msg.extend(ext.code_sep_pos.to_le_bytes());
    }

    Ok(tagged_hash(TAG_TAP_SIGHASH, &[&msg]))
}
