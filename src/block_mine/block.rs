use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::info;
use num_bigint::BigUint;
use num_traits::Zero;

use crate::block_mine::coinbase::{add_witness_commitment, new_coinbase};
use crate::block_mine::merkle_root::merkle_root;
use crate::codec::reverse_bytes;
use crate::config::Config;
use crate::error::{MinerError, Result};
use crate::hashes::hash256;
use crate::transaction::Transaction;

const HEADER_SIZE: usize = 80;

pub struct BlockHeader {
    pub version: i32,
    /// Natural byte order, like every hash used internally.
    pub prev_block_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    pub time: i64,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn serialize(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&(self.version as u32).to_le_bytes());
        buf[4..36].copy_from_slice(&self.prev_block_hash);
        buf[36..68].copy_from_slice(&self.merkle_root);
        buf[68..72].copy_from_slice(&(self.time as u32).to_le_bytes());
        buf[72..76].copy_from_slice(&self.bits.to_le_bytes());
        buf[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        buf
    }
}

pub struct Block {
    pub header: BlockHeader,
    pub coinbase: Transaction,
    pub transactions: Vec<Transaction>,
}

/// Compact difficulty encoding: exponent in the top byte, 23-bit mantissa,
/// sign at bit 23 (unused here, targets are positive).
pub fn nbits_to_target(compact: u32) -> BigUint {
    let mantissa = compact & 0x007f_ffff;
    let exponent = compact >> 24;
    if exponent <= 3 {
        BigUint::from(mantissa >> (8 * (3 - exponent)))
    } else {
        BigUint::from(mantissa) << (8 * (exponent - 3))
    }
}

pub fn target_to_nbits(target: &BigUint) -> u32 {
    if target.is_zero() {
        return 0;
    }
    let bytes = target.to_bytes_be();
    let mut exponent = bytes.len() as u32;
    let mut mantissa: u32 = if exponent <= 3 {
        let mut value: u32 = 0;
        for b in &bytes {
            value = (value << 8) | *b as u32;
        }
        value << (8 * (3 - exponent))
    } else {
        ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32
    };
    // a set high bit would read as a sign, so shift into the exponent
    if mantissa & 0x0080_0000 != 0 {
        mantissa >>= 8;
        exponent += 1;
    }
    (exponent << 24) | mantissa
}

pub fn parse_target(target_hex: &str) -> Result<BigUint> {
    if target_hex.len() != 64 {
        return Err(MinerError::Decode(format!(
            "target must be 64 hex characters, got {}",
            target_hex.len()
        ))
        .into());
    }
    BigUint::parse_bytes(target_hex.as_bytes(), 16)
        .ok_or_else(|| MinerError::Decode("target is not valid hex".to_string()).into())
}

/// Assembles the candidate block: coinbase with witness commitment first,
/// then the header over the txid Merkle root. The nonce starts at zero and
/// is filled in by `mine`.
pub fn assemble_block(config: &Config, transactions: Vec<Transaction>) -> Result<Block> {
    let fees: i64 = transactions.iter().map(|tx| tx.fee()).sum();

    let mut coinbase = new_coinbase(fees, config.block_subsidy, config.block_height);
    add_witness_commitment(&mut coinbase, &transactions)?;

    let mut txids = vec![coinbase.txid()?];
    for tx in &transactions {
        txids.push(tx.txid()?);
    }

    let target = parse_target(&config.target_hex)?;
    let time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let header = BlockHeader {
        version: config.block_version,
        prev_block_hash: [0u8; 32],
        merkle_root: merkle_root(&txids),
        time,
        bits: target_to_nbits(&target),
        nonce: 0,
    };

    Ok(Block {
        header,
        coinbase,
        transactions,
    })
}

/// The header digest read as a big-endian integer, the form the target
/// comparison wants.
fn header_hash_value(header: &BlockHeader) -> BigUint {
    let hash = hash256(&header.serialize());
    BigUint::from_bytes_be(&reverse_bytes(&hash))
}

/// Busy-loops over random nonces until the header hashes at or below the
/// target. With the default target this terminates quickly; it cannot fail.
pub fn mine(block: &mut Block, target: &BigUint) {
    let mut attempts: u64 = 0;
    loop {
        block.header.nonce = rand::random::<u32>();
        attempts += 1;
        if header_hash_value(&block.header) <= *target {
            info!(
                "found nonce {} after {} attempts",
                block.header.nonce, attempts
            );
            return;
        }
    }
}

impl Block {
    /// Line 1: header hex. Line 2: full coinbase serialization. Line 3:
    /// coinbase txid. Then the txids of the mined transactions in block
    /// order, all in display order.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "{}", hex::encode(self.header.serialize()))?;
        writeln!(writer, "{}", hex::encode(self.coinbase.serialize(true)?))?;
        writeln!(writer, "{}", self.coinbase.txid_hex()?)?;
        for tx in &self.transactions {
            writeln!(writer, "{}", tx.txid_hex()?)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;

    fn test_config(target_hex: &str) -> Config {
        Config {
            mempool_dir: "./mempool".into(),
            output_file: "./output.txt".into(),
            max_total_weight: 3_999_680,
            max_total_fees: None,
            target_hex: target_hex.to_string(),
            block_version: 4,
            block_subsidy: 0,
            block_height: 400_021,
        }
    }

    const EASY_TARGET: &str = "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";
    const DEFAULT_TARGET: &str =
        "0000ffff00000000000000000000000000000000000000000000000000000000";

    #[test]
    fn header_is_exactly_80_bytes() {
        let header = BlockHeader {
            version: 4,
            prev_block_hash: [0xaa; 32],
            merkle_root: [0xbb; 32],
            time: 1713276373,
            bits: 0x1f00ffff,
            nonce: 42,
        };
        let raw = header.serialize();
        assert_eq!(raw.len(), 80);
        assert_eq!(&raw[0..4], &4u32.to_le_bytes());
        assert_eq!(&raw[4..36], &[0xaa; 32]);
        assert_eq!(&raw[36..68], &[0xbb; 32]);
        assert_eq!(&raw[68..72], &1713276373u32.to_le_bytes());
        assert_eq!(&raw[72..76], &0x1f00ffffu32.to_le_bytes());
        assert_eq!(&raw[76..80], &42u32.to_le_bytes());
    }

    #[test]
    fn nbits_round_trip() {
        let target = parse_target(DEFAULT_TARGET).unwrap();
        let bits = target_to_nbits(&target);
        assert_eq!(bits, 0x1f00ffff);
        assert_eq!(nbits_to_target(bits), target);

        // every compact form produced by target_to_nbits round-trips
        for hex_target in [
            DEFAULT_TARGET,
            EASY_TARGET,
            "00000000ffff0000000000000000000000000000000000000000000000000000",
        ] {
            let t = parse_target(hex_target).unwrap();
            let compact = target_to_nbits(&t);
            assert_eq!(target_to_nbits(&nbits_to_target(compact)), compact);
        }
    }

    #[test]
    fn small_targets_use_low_exponents() {
        let target = BigUint::from(0x12u32);
        let bits = target_to_nbits(&target);
        assert_eq!(nbits_to_target(bits), target);

        let target = BigUint::from(0x8000u32);
        let bits = target_to_nbits(&target);
        assert_eq!(nbits_to_target(bits), target);
    }

    #[test]
    fn bad_targets_rejected() {
        assert!(parse_target("ffff").is_err());
        assert!(parse_target(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn assemble_and_mine_empty_block() {
        let config = test_config(EASY_TARGET);
        let mut block = assemble_block(&config, Vec::new()).unwrap();

        // header commits to the coinbase alone
        assert_eq!(block.header.merkle_root, block.coinbase.txid().unwrap());
        assert!(block.coinbase.vin[0].is_coinbase);
        assert_eq!(block.coinbase.vout.len(), 2);

        let target = parse_target(&config.target_hex).unwrap();
        mine(&mut block, &target);
        assert!(header_hash_value(&block.header) <= target);
    }

    #[test]
    fn output_file_layout() {
        let config = test_config(EASY_TARGET);
        let mut block = assemble_block(&config, Vec::new()).unwrap();
        let target = parse_target(&config.target_hex).unwrap();
        mine(&mut block, &target);

        let dir = std::env::temp_dir().join("tx-miner-block-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("output.txt");
        block.write_to_file(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);

        let header_bytes = hex::decode(lines[0]).unwrap();
        assert_eq!(header_bytes.len(), 80);

        let coinbase_raw = hex::decode(lines[1]).unwrap();
        // witness serialization carries the marker and flag
        assert_eq!(coinbase_raw[4], 0x00);
        assert_eq!(coinbase_raw[5], 0x01);

        assert_eq!(lines[2], block.coinbase.txid_hex().unwrap());
        std::fs::remove_file(&path).unwrap();
    }
}
