mod block_mine;
mod codec;
mod config;
mod error;
mod hashes;
mod picker;
mod sighash;
mod transaction;
mod validation_checks;

use clap::Parser;
use log::info;

use crate::block_mine::block::{assemble_block, mine, parse_target};
use crate::config::Config;
use crate::error::Result;
use crate::picker::TransactionPicker;

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::parse();

    let target = parse_target(&config.target_hex)?;

    let picker = TransactionPicker {
        mempool_dir: config.mempool_dir.clone(),
        max_total_weight: config.max_total_weight,
        max_total_fees: config.max_total_fees,
    };
    let transactions = picker.pick()?;

    let mut block = assemble_block(&config, transactions)?;
    mine(&mut block, &target);
    block.write_to_file(&config.output_file)?;

    info!("block written to {}", config.output_file.display());
    Ok(())
}
