use std::collections::HashMap;
use std::sync::OnceLock;

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

// SHA256
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

// HASH256
pub fn hash256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

// HASH160
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

pub const TAG_TAP_SIGHASH: &str = "TapSighash";
pub const TAG_TAP_LEAF: &str = "TapLeaf";
pub const TAG_TAP_BRANCH: &str = "TapBranch";
pub const TAG_TAP_TWEAK: &str = "TapTweak";
pub const TAG_BIP0340_CHALLENGE: &str = "BIP0340/challenge";
pub const TAG_BIP0340_AUX: &str = "BIP0340/aux";
pub const TAG_BIP0340_NONCE: &str = "BIP0340/nonce";

fn tag_digest(tag: &str) -> [u8; 32] {
    static PRECOMPUTED: OnceLock<HashMap<&'static str, [u8; 32]>> = OnceLock::new();
    let table = PRECOMPUTED.get_or_init(|| {
        [
            TAG_TAP_SIGHASH,
            TAG_TAP_LEAF,
            TAG_TAP_BRANCH,
            TAG_TAP_TWEAK,
            TAG_BIP0340_CHALLENGE,
            TAG_BIP0340_AUX,
            TAG_BIP0340_NONCE,
        ]
        .into_iter()
        .map(|t| (t, sha256(t.as_bytes())))
        .collect()
    });
    match table.get(tag) {
        Some(digest) => *digest,
        None => sha256(tag.as_bytes()),
    }
}

/// BIP-340 tagged hash: `SHA256(SHA256(tag) || SHA256(tag) || msgs...)`.
pub fn tagged_hash(tag: &str, msgs: &[&[u8]]) -> [u8; 32] {
    let tag_hash = tag_digest(tag);
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    for msg in msgs {
        hasher.update(msg);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash256_is_sha256_twice() {
        let data = b"tx-miner";
        assert_eq!(hash256(data), sha256(&sha256(data)));
    }

    #[test]
    fn hash160_is_ripemd_of_sha() {
        let data = b"tx-miner";
        let expected: [u8; 20] = Ripemd160::digest(Sha256::digest(data)).into();
        assert_eq!(hash160(data), expected);
    }

    #[test]
    fn tagged_hash_matches_manual_construction() {
        let msg = [0xabu8; 40];
        let tag_hash = sha256(TAG_TAP_LEAF.as_bytes());
        let mut preimage = Vec::new();
        preimage.extend_from_slice(&tag_hash);
        preimage.extend_from_slice(&tag_hash);
        preimage.extend_from_slice(&msg);
        assert_eq!(tagged_hash(TAG_TAP_LEAF, &[&msg]), sha256(&preimage));
    }

    #[test]
    fn tagged_hash_concatenates_chunks() {
        let a = [1u8; 10];
        let b = [2u8; 22];
        let mut joined = Vec::new();
        joined.extend_from_slice(&a);
        joined.extend_from_slice(&b);
        assert_eq!(
            tagged_hash(TAG_TAP_BRANCH, &[&a, &b]),
            tagged_hash(TAG_TAP_BRANCH, &[&joined])
        );
    }

    #[test]
    fn unknown_tag_still_hashes() {
        let digest = tagged_hash("SomeFutureTag", &[b"msg"]);
        let tag_hash = sha256(b"SomeFutureTag");
        let mut preimage = Vec::new();
        preimage.extend_from_slice(&tag_hash);
        preimage.extend_from_slice(&tag_hash);
        preimage.extend_from_slice(b"msg");
        assert_eq!(digest, sha256(&preimage));
    }
}
