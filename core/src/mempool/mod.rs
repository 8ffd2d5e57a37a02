//! Mempool: deduplicated, timestamp-ordered pool of pending transactions.
//!
//! Single-writer queue with snapshot reads (§5 "Mempool concurrency"): the
//! producer calls [`Mempool::take_ordered`] which removes admitted
//! transactions in one step, so a concurrent arrival can never be silently
//! dropped from the pool between the snapshot and the removal.

use std::collections::{HashMap, HashSet};

use crate::consensus::proposer::TxSource;
use crate::crypto::Hash256;
use crate::types::{AccountName, Transaction};

/// A pending transaction plus the bookkeeping needed to order it.
struct Entry {
    tx: Transaction,
    /// Insertion sequence, breaking ties between equal `ts` values (§5
    /// ordering guarantee: "ties broken by insertion order").
    seq: u64,
}

pub struct Mempool {
    tx_expiration_time: i64,
    next_seq: u64,
    by_hash: HashMap<Hash256, Entry>,
}

impl Mempool {
    pub fn new(tx_expiration_time: i64) -> Self {
        Self {
            tx_expiration_time,
            next_seq: 0,
            by_hash: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.by_hash.contains_key(hash)
    }

    /// Inserts `tx`, rejecting duplicates by hash. Returns `true` if the
    /// transaction was newly admitted.
    pub fn insert(&mut self, tx: Transaction) -> bool {
        if self.by_hash.contains_key(&tx.hash) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_hash.insert(tx.hash, Entry { tx, seq });
        true
    }

    pub fn remove(&mut self, hash: &Hash256) -> Option<Transaction> {
        self.by_hash.remove(hash).map(|e| e.tx)
    }

    /// Drops transactions whose expiry has passed relative to the latest
    /// committed block's timestamp (`tx.ts + tx_expiration_time < latest`).
    pub fn prune_expired(&mut self, latest_block_timestamp: i64) -> usize {
        let before = self.by_hash.len();
        self.by_hash
            .retain(|_, e| e.tx.ts + self.tx_expiration_time >= latest_block_timestamp);
        before - self.by_hash.len()
    }

    fn ordered_snapshot(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.by_hash.values().collect();
        entries.sort_by_key(|e| (e.tx.ts, e.seq));
        entries
    }
}

impl TxSource for Mempool {
    /// Admits up to `max` transactions, `ts`-ascending, at most one per
    /// sender, and removes admitted transactions from the pool (§4.1
    /// prepare step 2, §8 "double spend within block").
    fn take_ordered(&mut self, max: usize) -> Vec<Transaction> {
        let ordered_hashes: Vec<Hash256> = self
            .ordered_snapshot()
            .iter()
            .map(|e| e.tx.hash)
            .collect();

        let mut seen_senders: HashSet<AccountName> = HashSet::new();
        let mut admitted = Vec::new();
        for hash in ordered_hashes {
            if admitted.len() >= max {
                break;
            }
            let sender = match self.by_hash.get(&hash) {
                Some(e) => e.tx.sender.clone(),
                None => continue,
            };
            if seen_senders.insert(sender) {
                if let Some(entry) = self.by_hash.remove(&hash) {
                    admitted.push(entry.tx);
                }
            }
        }
        admitted
    }
}
