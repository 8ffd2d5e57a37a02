// core/src/types/schedule.rs

//! Witness schedule, the output of the §4.5 shuffle algorithm.

use serde::{Deserialize, Serialize};

use super::AccountName;

/// A witness schedule covering one round of `witnesses` blocks (§3, §4.5).
///
/// `shuffle[i]` is the primary witness for block `anchor_block_ref.index + i + 1`,
/// where `anchor_block_ref` is the block whose hash seeded the shuffle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WitnessSchedule {
    /// Index of the block whose hash seeded this shuffle.
    pub anchor_block_ref: u64,
    pub shuffle: Vec<AccountName>,
}

impl WitnessSchedule {
    /// Returns the primary witness for slot `slot` within this round, if
    /// the round covers that many slots.
    pub fn primary_for_slot(&self, slot: usize) -> Option<&AccountName> {
        self.shuffle.get(slot)
    }

    pub fn len(&self) -> usize {
        self.shuffle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shuffle.is_empty()
    }
}
