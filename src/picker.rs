//! Fee-priority transaction picker. Every mempool file is decoded and fully
//! validated, then pushed into a max-heap keyed on fee-per-weight; the
//! picker pops until the block weight budget (and optional fee budget) is
//! spent.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

use crate::error::Result;
use crate::transaction::Transaction;
use crate::validation_checks::verify_tx;

// fee/weight scaled to an integer priority
const PRIORITY_SCALE: u64 = 100_000;

struct Candidate {
    priority: u64,
    // insertion order, used to break priority ties deterministically
    seq: usize,
    weight: usize,
    fee: i64,
    tx: Transaction,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // higher priority wins; on a tie the earlier insertion wins
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub struct TransactionPicker {
    pub mempool_dir: PathBuf,
    pub max_total_weight: usize,
    pub max_total_fees: Option<i64>,
}

impl TransactionPicker {
    /// Scans the mempool directory, validates every transaction and returns
    /// the picked set in descending priority order. Files that fail to
    /// read, decode or validate are skipped, never fatal.
    pub fn pick(&self) -> Result<Vec<Transaction>> {
        let mut heap = BinaryHeap::new();
        let mut seq = 0usize;

        for path in sorted_json_files(&self.mempool_dir) {
            let candidate = match read_candidate(&path, seq) {
                Some(candidate) => candidate,
                None => continue,
            };
            seq += 1;
            heap.push(candidate);
        }
        info!("{} valid transactions in the mempool", heap.len());

        let mut picked = Vec::new();
        let mut total_weight = 0usize;
        let mut total_fees = 0i64;

        while let Some(candidate) = heap.pop() {
            if total_weight + candidate.weight >= self.max_total_weight {
                break;
            }
            if let Some(max_fees) = self.max_total_fees {
                if total_fees + candidate.fee >= max_fees {
                    break;
                }
            }
            total_weight += candidate.weight;
            total_fees += candidate.fee;
            picked.push(candidate.tx);
        }
        info!(
            "picked {} transactions, weight {}, fees {}",
            picked.len(),
            total_weight,
            total_fees
        );
        Ok(picked)
    }
}

// Directory iteration order is filesystem-dependent; sorting by path keeps
// the seq tie-break reproducible across runs.
fn sorted_json_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

fn read_candidate(path: &Path, seq: usize) -> Option<Candidate> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            debug!("skipping {}: {}", path.display(), e);
            return None;
        }
    };
    let tx: Transaction = match serde_json::from_str(&contents) {
        Ok(tx) => tx,
        Err(e) => {
            debug!("skipping {}: {}", path.display(), e);
            return None;
        }
    };

    if tx.vin.is_empty() || tx.vin[0].is_coinbase {
        return None;
    }
    if !verify_tx(&tx) {
        debug!("skipping {}: validation failed", path.display());
        return None;
    }

    let weight = tx.weight().ok()?;
    if weight == 0 {
        return None;
    }
    let fee = tx.fee();
    Some(Candidate {
        priority: fee as u64 * PRIORITY_SCALE / weight as u64,
        seq,
        weight,
        fee,
        tx,
    })
}
