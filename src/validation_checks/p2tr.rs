//! Pay-to-taproot, key path and script path. Key path verifies a BIP-340
//! signature straight against the output key in the witness program. Script
//! path parses the control block, reconstructs the taproot commitment and
//! then checks the one recognized leaf shape, `<PUSH_32 pk> OP_CHECKSIG`.

use log::debug;
use secp256k1::schnorr::Signature as SchnorrSignature;
use secp256k1::{Message, Parity, Scalar, XOnlyPublicKey};

use crate::error::{MinerError, Result};
use crate::hashes::{tagged_hash, TAG_TAP_BRANCH, TAG_TAP_LEAF, TAG_TAP_TWEAK};
use crate::sighash::taproot::{taproot_sighash, LeafExtension, TaprootSigHashes};
use crate::sighash::SIGHASH_DEFAULT;
use crate::transaction::Transaction;
use crate::validation_checks::secp;

// control block: leaf-version/parity byte + 32-byte internal key, then up
// to 128 proof nodes of 32 bytes each
const CONTROL_BASE_SIZE: usize = 33;
const CONTROL_NODE_SIZE: usize = 32;
const CONTROL_MAX_SIZE: usize = CONTROL_BASE_SIZE + CONTROL_NODE_SIZE * 128;

const ANNEX_TAG: u8 = 0x50;

pub fn input_verification_p2tr(tx: &Transaction, input_index: usize) -> Result<bool> {
    let witness = tx.vin[input_index].witness_items()?;
    if witness.is_empty() {
        return Ok(false);
    }

    // the annex, when present, is the last witness item and is bound into
    // the sighash but not otherwise consumed
    let (witness, annex) = split_annex(witness);

    let program = witness_program(tx, input_index)?;

    if witness.len() == 1 {
        key_path_spend(tx, input_index, &witness[0], &program, annex.as_deref())
    } else {
        script_path_spend(tx, input_index, &witness, &program, annex.as_deref())
    }
}

fn split_annex(mut witness: Vec<Vec<u8>>) -> (Vec<Vec<u8>>, Option<Vec<u8>>) {
    let has_annex = witness.len() >= 2
        && witness
            .last()
            .map_or(false, |item| item.first() == Some(&ANNEX_TAG));
    if has_annex {
        let annex = witness.pop();
        (witness, annex)
    } else {
        (witness, None)
    }
}

/// The 32-byte x-only output key committed in `OP_1 OP_PUSHBYTES_32 <key>`.
fn witness_program(tx: &Transaction, input_index: usize) -> Result<[u8; 32]> {
    let script_pubkey = tx.vin[input_index].prev_script_pubkey()?;
    if script_pubkey.len() != 34 || script_pubkey[0] != 0x51 || script_pubkey[1] != 0x20 {
        return Err(MinerError::Script("malformed taproot witness program".to_string()).into());
    }
    let mut program = [0u8; 32];
    program.copy_from_slice(&script_pubkey[2..34]);
    Ok(program)
}

/// 64 bytes means implicit SIGHASH_DEFAULT; 65 bytes carries an explicit,
/// necessarily nonzero hash type.
fn parse_schnorr_sig(raw: &[u8]) -> Result<(SchnorrSignature, u32)> {
    match raw.len() {
        64 => {
            let sig = SchnorrSignature::from_slice(raw)
                .map_err(|e| MinerError::Encoding(format!("schnorr sig: {}", e)))?;
            Ok((sig, SIGHASH_DEFAULT))
        }
        65 if raw[64] != 0 => {
            let sig = SchnorrSignature::from_slice(&raw[..64])
                .map_err(|e| MinerError::Encoding(format!("schnorr sig: {}", e)))?;
            Ok((sig, raw[64] as u32))
        }
        n => Err(MinerError::Encoding(format!("invalid schnorr sig length {}", n)).into()),
    }
}

fn verify_schnorr(digest: &[u8; 32], signature: &SchnorrSignature, pubkey: &XOnlyPublicKey) -> bool {
    let message = match Message::from_digest_slice(digest) {
        Ok(message) => message,
        Err(_) => return false,
    };
    secp().verify_schnorr(signature, &message, pubkey).is_ok()
}

fn key_path_spend(
    tx: &Transaction,
    input_index: usize,
    raw_sig: &[u8],
    program: &[u8; 32],
    annex: Option<&[u8]>,
) -> Result<bool> {
    let output_key = XOnlyPublicKey::from_slice(program)
        .map_err(|e| MinerError::Curve(format!("output key: {}", e)))?;
    let (signature, hashtype) = parse_schnorr_sig(raw_sig)?;

    let sighashes = TaprootSigHashes::new(tx)?;
    let digest = taproot_sighash(&sighashes, hashtype, tx, input_index, None, annex)?;

    Ok(verify_schnorr(&digest, &signature, &output_key))
}

struct ControlBlock {
    leaf_version: u8,
    output_key_parity_odd: bool,
    internal_key: XOnlyPublicKey,
    inclusion_proof: Vec<[u8; 32]>,
}

fn parse_control_block(control: &[u8]) -> Result<ControlBlock> {
    if control.len() < CONTROL_BASE_SIZE {
        return Err(MinerError::Script(format!(
            "control block is {} bytes, min is {}",
            control.len(),
            CONTROL_BASE_SIZE
        ))
        .into());
    }
    if control.len() > CONTROL_MAX_SIZE {
        return Err(MinerError::Script(format!(
            "control block is {} bytes, max is {}",
            control.len(),
            CONTROL_MAX_SIZE
        ))
        .into());
    }
    if (control.len() - CONTROL_BASE_SIZE) % CONTROL_NODE_SIZE != 0 {
        return Err(MinerError::Script(
            "control block proof is not a multiple of 32 bytes".to_string(),
        )
        .into());
    }

    let internal_key = XOnlyPublicKey::from_slice(&control[1..33])
        .map_err(|e| MinerError::Curve(format!("internal key: {}", e)))?;

    let inclusion_proof = control[CONTROL_BASE_SIZE..]
        .chunks_exact(CONTROL_NODE_SIZE)
        .map(|chunk| {
            let mut node = [0u8; 32];
            node.copy_from_slice(chunk);
            node
        })
        .collect();

    Ok(ControlBlock {
        leaf_version: control[0] & 0xfe,
        output_key_parity_odd: control[0] & 0x01 == 0x01,
        internal_key,
        inclusion_proof,
    })
}

/// `tagged_hash("TapLeaf", leaf_version || varbytes(script))`
fn tap_leaf_hash(leaf_version: u8, script: &[u8]) -> [u8; 32] {
    let mut encoding = vec![leaf_version];
    crate::codec::write_varbytes(&mut encoding, script);
    tagged_hash(TAG_TAP_LEAF, &[&encoding])
}

/// Walks the inclusion proof up to the merkle root, sorting each pair of
/// nodes lexicographically before hashing the branch.
fn merkle_root_from_proof(control: &ControlBlock, leaf_hash: [u8; 32]) -> [u8; 32] {
    let mut accumulator = leaf_hash;
    for node in &control.inclusion_proof {
        accumulator = if accumulator.as_slice() <= node.as_slice() {
            tagged_hash(TAG_TAP_BRANCH, &[&accumulator, node])
        } else {
            tagged_hash(TAG_TAP_BRANCH, &[node, &accumulator])
        };
    }
    accumulator
}

/// Recomputes `Q = P + tagged_hash("TapTweak", P || root) * G` and checks it
/// against the witness program, parity included.
fn verify_taproot_commitment(
    control: &ControlBlock,
    program: &[u8; 32],
    script: &[u8],
) -> Result<bool> {
    let leaf_hash = tap_leaf_hash(control.leaf_version, script);
    let root = merkle_root_from_proof(control, leaf_hash);

    let output_key = XOnlyPublicKey::from_slice(program)
        .map_err(|e| MinerError::Curve(format!("output key: {}", e)))?;

    let tweak_hash = tagged_hash(
        TAG_TAP_TWEAK,
        &[&control.internal_key.serialize(), &root],
    );
    let tweak = Scalar::from_be_bytes(tweak_hash)
        .map_err(|_| MinerError::Curve("tap tweak overflows the group order".to_string()))?;

    let parity = if control.output_key_parity_odd {
        Parity::Odd
    } else {
        Parity::Even
    };

    Ok(control
        .internal_key
        .tweak_add_check(secp(), &output_key, parity, tweak))
}

enum TapscriptScan {
    /// Contains an OP_SUCCESSx opcode; BIP-342 makes the spend valid
    /// unconditionally.
    HasOpSuccess,
    Parses,
    Invalid,
}

fn is_op_success(opcode: u8) -> bool {
    matches!(
        opcode,
        0x50 | 0x62
            | 0x7e..=0x81
            | 0x83..=0x86
            | 0x89..=0x8a
            | 0x8d..=0x8e
            | 0x95..=0x99
            | 0xbb..=0xfe
    )
}

/// Push-data-aware opcode walk. Stops at the first OP_SUCCESSx, since from
/// that point the rest of the script does not need to parse.
fn scan_tapscript(script: &[u8]) -> TapscriptScan {
    let mut i = 0;
    while i < script.len() {
        let opcode = script[i];
        i += 1;

        if is_op_success(opcode) {
            return TapscriptScan::HasOpSuccess;
        }

        let push_len = match opcode {
            0x01..=0x4b => opcode as usize,
            0x4c => {
                if i + 1 > script.len() {
                    return TapscriptScan::Invalid;
                }
                let len = script[i] as usize;
                i += 1;
                len
            }
            0x4d => {
                if i + 2 > script.len() {
                    return TapscriptScan::Invalid;
                }
                let len = u16::from_le_bytes([script[i], script[i + 1]]) as usize;
                i += 2;
                len
            }
            0x4e => {
                if i + 4 > script.len() {
                    return TapscriptScan::Invalid;
                }
                let len = u32::from_le_bytes([
                    script[i],
                    script[i + 1],
                    script[i + 2],
                    script[i + 3],
                ]) as usize;
                i += 4;
                len
            }
            _ => 0,
        };

        if i + push_len > script.len() {
            return TapscriptScan::Invalid;
        }
        i += push_len;
    }
    TapscriptScan::Parses
}

fn script_path_spend(
    tx: &Transaction,
    input_index: usize,
    witness: &[Vec<u8>],
    program: &[u8; 32],
    annex: Option<&[u8]>,
) -> Result<bool> {
    // [...stack, script, control_block]
    let control_bytes = &witness[witness.len() - 1];
    let script = &witness[witness.len() - 2];
    let stack = &witness[..witness.len() - 2];

    let control = parse_control_block(control_bytes)?;

    if !verify_taproot_commitment(&control, program, script)? {
        debug!("taproot commitment mismatch on input {}", input_index);
        return Ok(false);
    }

    match scan_tapscript(script) {
        TapscriptScan::HasOpSuccess => return Ok(true),
        TapscriptScan::Parses => {}
        TapscriptScan::Invalid => return Ok(false),
    }

    // the only leaf shape executed here: <PUSH_32 pk> OP_CHECKSIG
    if script.len() != 34 || script[0] != 0x20 || script[33] != 0xac {
        return Err(MinerError::Script("unsupported tapscript leaf shape".to_string()).into());
    }
    if stack.len() != 1 {
        return Ok(false);
    }

    let leaf_pubkey = XOnlyPublicKey::from_slice(&script[1..33])
        .map_err(|e| MinerError::Curve(format!("leaf key: {}", e)))?;
    let (signature, hashtype) = parse_schnorr_sig(&stack[0])?;

    let leaf = LeafExtension::new(tap_leaf_hash(control.leaf_version, script));
    let sighashes = TaprootSigHashes::new(tx)?;
    let digest = taproot_sighash(&sighashes, hashtype, tx, input_index, Some(&leaf), annex)?;

    Ok(verify_schnorr(&digest, &signature, &leaf_pubkey))
}
