//! Block producer (§4.1).
//!
//! The producer is deliberately stateless with respect to the chain: it
//! takes a view of the head, the mempool, the witness schedule, and sync
//! mode, and returns a draft block for the caller to execute and commit.

use crate::crypto::{CompactSignature, PrivateKey};
use crate::types::{AccountName, Block, BlockHash, HashMode, Transaction, WitnessSchedule};

use super::config::ConsensusConfig;

/// Abstract mempool interface the producer draws transactions from.
///
/// The producer does not care how transactions are stored or gossiped; it
/// only needs a way to ask for a `ts`-ordered batch that fits a block, and
/// a way to return transactions it could not use.
pub trait TxSource {
    /// Removes and returns up to `max` transactions, ordered by `ts`
    /// ascending, ties broken by insertion order (§5 ordering guarantee).
    fn take_ordered(&mut self, max: usize) -> Vec<Transaction>;
}

/// Local identity used to produce and sign blocks.
pub struct WitnessIdentity {
    pub name: AccountName,
    pub signing_key: PrivateKey,
}

/// Eligibility result for a production slot (§4.1 "Eligibility").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eligibility {
    /// This witness holds the primary slot.
    Primary,
    /// This witness is eligible as a backup at `priority`.
    Backup { priority: u64 },
    /// Not eligible to produce for this slot right now.
    Ineligible,
}

/// Determines whether `identity` may produce the next block right now,
/// scanning `recent_blocks` (most-recent-first) for backup eligibility.
pub fn eligibility(
    identity: &AccountName,
    next_index: u64,
    schedule: &WitnessSchedule,
    recent_blocks: &[Block],
    witnesses: usize,
    block_time_ms: i64,
    now_ms: i64,
    last_block_timestamp: i64,
) -> Eligibility {
    let slot = next_index
        .checked_sub(schedule.anchor_block_ref + 1)
        .map(|s| s as usize);
    if let Some(slot) = slot {
        if schedule.primary_for_slot(slot) == Some(identity) {
            return Eligibility::Primary;
        }
    }

    let scan_limit = (2 * witnesses).min(recent_blocks.len());
    for (i, past) in recent_blocks.iter().take(scan_limit).enumerate() {
        if &past.witness == identity {
            let priority = i as u64 + 2;
            let deadline = last_block_timestamp + priority as i64 * block_time_ms;
            if now_ms >= deadline {
                return Eligibility::Backup { priority };
            }
            return Eligibility::Ineligible;
        }
    }
    Eligibility::Ineligible
}

/// Configurable block producer.
pub struct Producer {
    config: ConsensusConfig,
    hash_mode: HashMode,
}

impl Producer {
    pub fn new(config: ConsensusConfig, hash_mode: HashMode) -> Self {
        Self { config, hash_mode }
    }

    /// Computes the target timestamp for a draft block (§4.1 prepare step 3).
    pub fn target_timestamp(
        &self,
        now_ms: i64,
        previous_timestamp: i64,
        priority: u64,
        sync_mode: bool,
        next_index: u64,
    ) -> i64 {
        let block_time_ms = if sync_mode {
            self.config.sync_block_time.as_millis() as i64
        } else {
            self.config.block_time.as_millis() as i64
        };
        let buffer = if sync_mode || next_index <= 10 {
            block_time_ms / 5
        } else {
            block_time_ms / 20
        };
        (now_ms + buffer).max(previous_timestamp + priority as i64 * block_time_ms + buffer)
    }

    /// Returns `true` if the wall-clock remaining before the slot deadline
    /// is too tight to risk producing (§4.1 "Performance gate").
    pub fn should_skip_slot(
        &self,
        remaining_ms: i64,
        sync_mode: bool,
    ) -> bool {
        let block_time_ms = if sync_mode {
            self.config.sync_block_time.as_millis() as i64
        } else {
            self.config.block_time.as_millis() as i64
        };
        let gate = if sync_mode {
            block_time_ms / 20
        } else {
            block_time_ms / 3
        };
        remaining_ms < gate
    }

    /// Assembles a draft block on top of `head` (§4.1 prepare + finalize).
    ///
    /// Admission of mempool transactions (cumulative count, one-per-sender,
    /// no duplicate hashes) happens in `tx_source`; the producer trusts it
    /// to honor §5's ordering guarantee.
    #[allow(clippy::too_many_arguments)]
    pub fn build_block<S: TxSource>(
        &self,
        head: &Block,
        identity: &WitnessIdentity,
        tx_source: &mut S,
        timestamp: i64,
        missed_by: Option<AccountName>,
        leader_reward: u64,
    ) -> Block {
        let txs = tx_source.take_ordered(self.config.max_tx_per_block);

        let mut block = Block {
            index: head.index + 1,
            anchor_block_num: head.anchor_block_num + 1,
            prev_hash: BlockHash(head.hash.0),
            timestamp,
            txs,
            witness: identity.name.clone(),
            missed_by,
            distributed: leader_reward,
            burned: 0,
            hash: BlockHash(head.hash.0),
            signature: CompactSignature::sign(&identity.signing_key, &head.hash.0),
        };

        let hash = block.compute_hash(self.hash_mode);
        block.hash = hash;
        block.signature = CompactSignature::sign(&identity.signing_key, &hash.0);
        block
    }
}

/// Trivial round-robin tx source for tests and demos.
pub struct VecTxSource(pub Vec<Transaction>);

impl TxSource for VecTxSource {
    fn take_ordered(&mut self, max: usize) -> Vec<Transaction> {
        self.0.sort_by_key(|tx| tx.ts);
        let mut seen_senders = std::collections::HashSet::new();
        let mut seen_hashes = std::collections::HashSet::new();
        let mut admitted = Vec::new();
        let mut remaining = Vec::new();

        for tx in self.0.drain(..) {
            if admitted.len() < max
                && seen_senders.insert(tx.sender.clone())
                && seen_hashes.insert(tx.hash)
            {
                admitted.push(tx);
            } else {
                remaining.push(tx);
            }
        }
        self.0 = remaining;
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Hash256;
    use crate::types::{AccountName, TransactionKind, TransactionPayload, TxSignature, HASH_LEN};

    fn genesis() -> Block {
        let sk = PrivateKey::generate();
        Block {
            index: 0,
            anchor_block_num: 10,
            prev_hash: BlockHash(Hash256([0u8; HASH_LEN])),
            timestamp: 1_700_000_000_000,
            txs: vec![],
            witness: AccountName::new("genesis"),
            missed_by: None,
            distributed: 0,
            burned: 0,
            hash: BlockHash(Hash256([0u8; HASH_LEN])),
            signature: CompactSignature::sign(&sk, &Hash256([0u8; HASH_LEN])),
        }
    }

    fn dummy_tx(sender: &str, ts: i64) -> Transaction {
        let sender = AccountName::new(sender);
        let payload = TransactionPayload::VoteWitness {
            witness: AccountName::new("w1"),
        };
        let hash = Transaction::compute_hash(&TransactionKind::VoteWitness, &sender, &payload, ts);
        let sk = PrivateKey::generate();
        Transaction {
            hash,
            sender,
            kind: TransactionKind::VoteWitness,
            payload,
            ts,
            anchor_ref: None,
            signature: TxSignature::Single(CompactSignature::sign(&sk, &hash)),
        }
    }

    #[test]
    fn build_block_links_to_head_and_signs() {
        let head = genesis();
        let identity = WitnessIdentity {
            name: AccountName::new("w1"),
            signing_key: PrivateKey::generate(),
        };
        let producer = Producer::new(ConsensusConfig::default(), HashMode::Canonical);
        let mut source = VecTxSource(vec![dummy_tx("alice", 10), dummy_tx("alice", 20)]);

        let block = producer.build_block(&head, &identity, &mut source, head.timestamp + 3000, None, 500);

        assert_eq!(block.index, 1);
        assert_eq!(block.prev_hash.0, head.hash.0);
        assert_eq!(block.txs.len(), 1, "one-tx-per-sender rule admits only the earlier tx");
        assert!(block.signature.verify(&block.hash.0, &identity.signing_key.public_key()));
    }

    #[test]
    fn vec_tx_source_admits_earliest_per_sender() {
        let mut source = VecTxSource(vec![
            dummy_tx("alice", 20),
            dummy_tx("alice", 10),
            dummy_tx("bob", 5),
        ]);
        let admitted = source.take_ordered(10);
        assert_eq!(admitted.len(), 2);
        assert_eq!(admitted[0].sender.as_str(), "bob");
        assert_eq!(admitted[1].sender.as_str(), "alice");
        assert_eq!(admitted[1].ts, 10);
    }
}
