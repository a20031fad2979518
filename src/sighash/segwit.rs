//! BIP-143 digest for segwit v0 inputs.

use crate::codec::write_varbytes;
use crate::error::Result;
use crate::hashes::{hash256, sha256};
use crate::sighash::{
    sha_outputs, sha_prevouts, sha_sequences, SIGHASH_ANYONECANPAY, SIGHASH_MASK, SIGHASH_NONE,
    SIGHASH_SINGLE,
};
use crate::transaction::{write_txout, Transaction};

/// Midstate digests BIP-143 reuses across every input of one transaction.
/// Each is the double SHA-256 of the concatenated field serializations.
pub struct SegwitSigHashes {
    pub hash_prevouts: [u8; 32],
    pub hash_sequence: [u8; 32],
    pub hash_outputs: [u8; 32],
}

impl SegwitSigHashes {
    pub fn new(tx: &Transaction) -> Result<Self> {
        Ok(SegwitSigHashes {
            hash_prevouts: sha256(&sha_prevouts(tx)?),
            hash_sequence: sha256(&sha_sequences(tx)),
            hash_outputs: sha256(&sha_outputs(tx)?),
        })
    }
}

// A canonical pay-to-witness-pubkey-hash program: OP_0 OP_DATA_20 <hash>.
fn extract_witness_pubkey_hash(script: &[u8]) -> Option<&[u8]> {
    if script.len() == 22 && script[0] == 0x00 && script[1] == 0x14 {
        Some(&script[2..22])
    } else {
        None
    }
}

/// BIP-143 signature hash for input `idx`. `subscript` is the scriptPubKey
/// of the spent output; a canonical P2WPKH program is rewritten to the
/// legacy P2PKH scriptCode it stands for.
pub fn segwit_v0_sighash(
    subscript: &[u8],
    sighashes: &SegwitSigHashes,
    hashtype: u32,
    tx: &Transaction,
    idx: usize,
) -> Result<[u8; 32]> {
    let zero_hash = [0u8; 32];
    let input = &tx.vin[idx];
    let base_type = hashtype & SIGHASH_MASK;

    let mut preimage = Vec::new();
    preimage.extend((tx.version as u32).to_le_bytes());

    if hashtype & SIGHASH_ANYONECANPAY == 0 {
        preimage.extend(sighashes.hash_prevouts);
    } else {
        preimage.extend(zero_hash);
    }

    if hashtype & SIGHASH_ANYONECANPAY == 0
        && base_type != SIGHASH_SINGLE
        && base_type != SIGHASH_NONE
    {
        preimage.extend(sighashes.hash_sequence);
    } else {
        preimage.extend(zero_hash);
    }

    // outpoint being spent
    preimage.extend(input.prev_txid_natural()?);
    preimage.extend(input.vout.to_le_bytes());

    // scriptCode
    match extract_witness_pubkey_hash(subscript) {
        Some(pubkey_hash) => {
            preimage.push(0x19);
            preimage.push(0x76); // OP_DUP
            preimage.push(0xa9); // OP_HASH160
            preimage.push(0x14); // OP_DATA_20
            preimage.extend_from_slice(pubkey_hash);
            preimage.push(0x88); // OP_EQUALVERIFY
            preimage.push(0xac); // OP_CHECKSIG
        }
        None => write_varbytes(&mut preimage, subscript),
    }

    preimage.extend((input.prevout.value as u64).to_le_bytes());
    preimage.extend(input.sequence.to_le_bytes());

    if base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
        preimage.extend(sighashes.hash_outputs);
    } else if base_type == SIGHASH_SINGLE && idx < tx.vout.len() {
        let mut out_buf = Vec::new();
        write_txout(&mut out_buf, tx.vout[idx].value, &tx.vout[idx].scriptpubkey)?;
        preimage.extend(hash256(&out_buf));
    } else {
        preimage.extend(zero_hash);
    }

    preimage.extend(tx.locktime.to_le_bytes());
    preimage.extend(hashtype.to_le_bytes());

    Ok(hash256(&preimage))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sighash::test::two_input_tx;
    use crate::sighash::SIGHASH_ALL;

    #[test]
    fn p2wpkh_program_is_rewritten_to_p2pkh_script_code() {
        let script = hex::decode("0014bc2870381de4d706a92105419f0c3072e26532d1").unwrap();
        let hash = extract_witness_pubkey_hash(&script).unwrap();
        assert_eq!(hex::encode(hash), "bc2870381de4d706a92105419f0c3072e26532d1");

        // 23-byte scripts and other templates pass through
        assert!(extract_witness_pubkey_hash(&[0u8; 23]).is_none());
        let p2pkh = hex::decode("76a9145ae0dedcb9a96b8d4310e4ff137a22e0233258e988ac").unwrap();
        assert!(extract_witness_pubkey_hash(&p2pkh).is_none());
    }

    #[test]
    fn preimage_length_for_p2wpkh_program() {
        // For the canonical 22-byte program the scriptCode expands to 26
        // bytes and the full preimage is 156 + 26 bytes; hashing it twice
        // must stay deterministic.
        let mut tx = two_input_tx();
        tx.vin[0].prevout.scriptpubkey = "0014bc2870381de4d706a92105419f0c3072e26532d1".to_string();
        let subscript = hex::decode(&tx.vin[0].prevout.scriptpubkey).unwrap();
        let sighashes = SegwitSigHashes::new(&tx).unwrap();
        let a = segwit_v0_sighash(&subscript, &sighashes, SIGHASH_ALL, &tx, 0).unwrap();
        let b = segwit_v0_sighash(&subscript, &sighashes, SIGHASH_ALL, &tx, 0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn anyonecanpay_zeroes_prevout_hashes() {
        let tx = two_input_tx();
        let subscript = hex::decode(&tx.vin[0].prevout.scriptpubkey).unwrap();
        let sighashes = SegwitSigHashes::new(&tx).unwrap();
        let all = segwit_v0_sighash(&subscript, &sighashes, SIGHASH_ALL, &tx, 0).unwrap();
        let acp = segwit_v0_sighash(
            &subscript,
            &sighashes,
            SIGHASH_ALL | SIGHASH_ANYONECANPAY,
            &tx,
            0,
        )
        .unwrap();
        assert_ne!(all, acp);
    }

    #[test]
    fn single_commits_to_matching_output_only() {
        let tx = two_input_tx();
        let subscript = hex::decode(&tx.vin[0].prevout.scriptpubkey).unwrap();
        let sighashes = SegwitSigHashes::new(&tx).unwrap();
        let single_0 = segwit_v0_sighash(&subscript, &sighashes, SIGHASH_SINGLE, &tx, 0).unwrap();
        let single_1 = segwit_v0_sighash(&subscript, &sighashes, SIGHASH_SINGLE, &tx, 1).unwrap();
        assert_ne!(single_0, single_1);
    }

    #[test]
    fn caches_are_double_sha() {
        let tx = two_input_tx();
        let sighashes = SegwitSigHashes::new(&tx).unwrap();
        assert_eq!(
            sighashes.hash_prevouts,
            sha256(&crate::sighash::sha_prevouts(&tx).unwrap())
        );
    }
}
