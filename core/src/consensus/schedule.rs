//! Witness schedule derivation (§4.5).
//!
//! Runs at genesis and whenever `block.index mod witnesses == 0`.

use crate::crypto::Hash256;
use crate::types::{Account, WitnessSchedule};

/// Derives the next [`WitnessSchedule`] from the seed block's hash and the
/// current candidate set.
///
/// `seed_block_index` is recorded as `anchor_block_ref` on the returned
/// schedule; callers pass the index of the block whose hash is `seed_hash`.
///
/// The RNG step deliberately does not remix `rand` between draws — this
/// reproduces a known, non-uniform property of the upstream algorithm that
/// must be preserved bit-for-bit for cross-node determinism (§9).
pub fn derive_schedule(
    seed_block_index: u64,
    seed_hash: &Hash256,
    candidates: &[Account],
    witnesses: usize,
    shuffle_precision: usize,
) -> WitnessSchedule {
    let mut top: Vec<&Account> = candidates
        .iter()
        .filter(|a| a.total_vote_weight > 0 && a.witness_public_key.is_some())
        .collect();
    top.sort_by(|a, b| b.total_vote_weight.cmp(&a.total_vote_weight));
    top.truncate(witnesses);
    top.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));

    let seed_hex = seed_hash.last_hex_chars(shuffle_precision);
    let rand = u64::from_str_radix(&seed_hex, 16).unwrap_or(0);

    let mut remaining: Vec<String> = top.iter().map(|a| a.name.as_str().to_string()).collect();
    let mut shuffle = Vec::with_capacity(witnesses);

    while !remaining.is_empty() {
        let idx = (rand as usize) % remaining.len();
        shuffle.push(remaining.remove(idx));
    }

    if !shuffle.is_empty() {
        let mut i = 0;
        while shuffle.len() < witnesses {
            shuffle.push(shuffle[i % shuffle.len()].clone());
            i += 1;
        }
    }

    WitnessSchedule {
        anchor_block_ref: seed_block_index,
        shuffle: shuffle
            .into_iter()
            .map(crate::types::AccountName::new)
            .collect(),
    }
}
