use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_TARGET_HEX: &str =
    "0000ffff00000000000000000000000000000000000000000000000000000000";

// the weight budget leaves room for the 80-byte header and counts
pub const DEFAULT_MAX_TOTAL_WEIGHT: usize = 4_000_000 - 320;

/// Everything the pipeline can be told from the outside; there are no
/// hidden globals beyond these.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tx-miner",
    about = "Validates mempool transactions and mines them into a candidate block"
)]
pub struct Config {
    /// Directory of per-transaction JSON files
    #[arg(long, default_value = "./mempool")]
    pub mempool_dir: PathBuf,

    /// Destination for the mined block
    #[arg(long, default_value = "./output.txt")]
    pub output_file: PathBuf,

    /// Upper weight bound the picker enforces
    #[arg(long, default_value_t = DEFAULT_MAX_TOTAL_WEIGHT)]
    pub max_total_weight: usize,

    /// Optional fee ceiling for the picked set, in satoshis
    #[arg(long)]
    pub max_total_fees: Option<i64>,

    /// 64-character difficulty target
    #[arg(long, default_value = DEFAULT_TARGET_HEX)]
    pub target_hex: String,

    #[arg(long, default_value_t = 4)]
    pub block_version: i32,

    /// Satoshis added to the coinbase on top of the collected fees
    #[arg(long, default_value_t = 0)]
    pub block_subsidy: i64,

    /// Height pushed into the coinbase scriptSig
    #[arg(long, default_value_t = 400_021)]
    pub block_height: u32,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["tx-miner"]);
        assert_eq!(config.mempool_dir, PathBuf::from("./mempool"));
        assert_eq!(config.output_file, PathBuf::from("./output.txt"));
        assert_eq!(config.max_total_weight, 3_999_680);
        assert_eq!(config.max_total_fees, None);
        assert_eq!(config.target_hex, DEFAULT_TARGET_HEX);
        assert_eq!(config.block_version, 4);
        assert_eq!(config.block_subsidy, 0);
        assert_eq!(config.block_height, 400_021);
    }

    #[test]
    fn overrides() {
        let config = Config::parse_from([
            "tx-miner",
            "--mempool-dir",
            "/tmp/pool",
            "--max-total-weight",
            "1000000",
            "--block-height",
            "840000",
        ]);
        assert_eq!(config.mempool_dir, PathBuf::from("/tmp/pool"));
        assert_eq!(config.max_total_weight, 1_000_000);
        assert_eq!(config.block_height, 840_000);
    }
}
