use crate::block_mine::merkle_root::merkle_root;
use crate::error::Result;
use crate::hashes::hash256;
use crate::transaction::{Input, Output, Prevout, ScriptType, Transaction};

const MAX_VOUT_INDEX: u32 = 0xffff_ffff;
const COINBASE_VERSION: i32 = 1;

// OP_RETURN OP_PUSHBYTES_36 0xaa21a9ed
const WITNESS_COMMITMENT_HEADER: [u8; 6] = [0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed];

/// Builds the coinbase: one input spending the null outpoint with the
/// BIP-34 height push as its scriptSig, one OP_TRUE output worth
/// subsidy + fees.
pub fn new_coinbase(fees: i64, subsidy: i64, height: u32) -> Transaction {
    // minimal push of the height as three little-endian bytes
    let script_sig = [
        0x03,
        height as u8,
        (height >> 8) as u8,
        (height >> 16) as u8,
    ];

    let vin = Input {
        txid: hex::encode([0u8; 32]),
        vout: MAX_VOUT_INDEX,
        prevout: Prevout {
            scriptpubkey: String::new(),
            scriptpubkey_asm: String::new(),
            scriptpubkey_type: ScriptType::Unknown,
            scriptpubkey_address: None,
            value: 0,
        },
        scriptsig: Some(hex::encode(script_sig)),
        scriptsig_asm: None,
        witness: None,
        is_coinbase: true,
        sequence: u32::MAX,
    };

    // OP_TRUE, anyone can redeem
    let vout = Output {
        scriptpubkey: "51".to_string(),
        scriptpubkey_asm: String::new(),
        scriptpubkey_type: String::new(),
        scriptpubkey_address: None,
        value: subsidy + fees,
    };

    Transaction {
        version: COINBASE_VERSION,
        locktime: 0,
        vin: vec![vin],
        vout: vec![vout],
    }
}

/// Commits to the wtxids of the block: the coinbase wtxid counts as 32 zero
/// bytes by protocol rule, the commitment output is appended to the
/// coinbase and the witness reserved value becomes its witness.
pub fn add_witness_commitment(
    coinbase: &mut Transaction,
    block_txns: &[Transaction],
) -> Result<[u8; 32]> {
    let witness_nonce = [0u8; 32];
    coinbase.vin[0].witness = Some(vec![hex::encode(witness_nonce)]);

    let mut wtxids = vec![[0u8; 32]];
    for tx in block_txns {
        wtxids.push(tx.wtxid()?);
    }
    let witness_merkle_root = merkle_root(&wtxids);

    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(&witness_merkle_root);
    preimage[32..].copy_from_slice(&witness_nonce);
    let commitment = hash256(&preimage);

    let mut script = WITNESS_COMMITMENT_HEADER.to_vec();
    script.extend(commitment);

    coinbase.vout.push(Output {
        scriptpubkey: hex::encode(script),
        scriptpubkey_asm: String::new(),
        scriptpubkey_type: String::new(),
        scriptpubkey_address: None,
        value: 0,
    });

    Ok(commitment)
}
