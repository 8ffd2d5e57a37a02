// core/src/types/block.rs

//! Block types and hashing.
//!
//! Serialization for the canonical hashing mode is done with **bincode 2**
//! using the `serde` integration (`bincode::serde::encode_to_vec`) and an
//! explicit `standard()` config. A legacy concatenation mode is also
//! supported; see [`HashMode`].

use serde::{Deserialize, Serialize};

use crate::crypto::{CompactSignature, Hash256};

use super::{AccountName, Transaction};

/// Strongly-typed block hash (§3 Block `hash`).
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub Hash256);

impl std::fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockHash({})", self.0)
    }
}

impl std::fmt::Display for BlockHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which canonical encoding a block hash is computed over.
///
/// `Legacy` chains the individual field bytes together before hashing
/// (§6 serialization mode 1); `Canonical` hashes the bincode-2 `serde`
/// encoding of the whole block (§6 serialization mode 2). A node only
/// ever uses one mode, fixed at startup via [`crate::config::NodeConfig`],
/// but both must be available to replay history recorded under either.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum HashMode {
    Legacy,
    Canonical,
}

/// Block = the fields named in §3, flattened (no separate header type):
/// the chain has exactly one producer role per slot, so there is nothing
/// a split header/body representation would buy here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// Monotonic block index, starting at 0 at genesis.
    pub index: u64,
    /// Anchor chain block number this block mirrors; `previous.anchor_block_num + 1`.
    pub anchor_block_num: u64,
    /// Hash of the previous block in this chain.
    pub prev_hash: BlockHash,
    /// Milliseconds since Unix epoch.
    pub timestamp: i64,
    /// Ordered transactions included in this block.
    pub txs: Vec<Transaction>,
    /// Account that signed this block.
    pub witness: AccountName,
    /// Set when a backup witness produced this block in place of the
    /// scheduled primary.
    pub missed_by: Option<AccountName>,
    /// Native units distributed to the witness as a block reward.
    pub distributed: u64,
    /// Native units burned while executing this block's transactions.
    pub burned: u64,
    /// Content hash of this block, computed by [`Block::compute_hash`].
    pub hash: BlockHash,
    /// secp256k1 signature over `hash`, by the witness's declared witness key.
    pub signature: CompactSignature,
}

impl Block {
    /// Returns the bytes this block's hash is computed over, excluding
    /// `hash` and `signature` themselves (§3 invariant).
    fn hashed_bytes(&self, mode: HashMode) -> Vec<u8> {
        match mode {
            HashMode::Legacy => {
                let tx_hashes: Vec<u8> = self
                    .txs
                    .iter()
                    .flat_map(|tx| *tx.hash.as_bytes())
                    .collect();
                let missed_by = self.missed_by.as_ref().map(|a| a.as_str()).unwrap_or("");
                Hash256::compute_concat(&[
                    &self.index.to_be_bytes(),
                    &self.anchor_block_num.to_be_bytes(),
                    self.prev_hash.0.as_bytes(),
                    &self.timestamp.to_be_bytes(),
                    &tx_hashes,
                    self.witness.as_str().as_bytes(),
                    missed_by.as_bytes(),
                    &self.distributed.to_be_bytes(),
                    &self.burned.to_be_bytes(),
                ])
                .as_bytes()
                .to_vec()
            }
            HashMode::Canonical => {
                let unsigned = UnsignedBlock {
                    index: self.index,
                    anchor_block_num: self.anchor_block_num,
                    prev_hash: self.prev_hash,
                    timestamp: self.timestamp,
                    txs: &self.txs,
                    witness: &self.witness,
                    missed_by: &self.missed_by,
                    distributed: self.distributed,
                    burned: self.burned,
                };
                let cfg = bincode::config::standard();
                bincode::serde::encode_to_vec(&unsigned, cfg)
                    .expect("Block fields should always be serializable with bincode 2 + serde")
            }
        }
    }

    /// Computes `hash == H(canonical(block \ {hash, signature}))` (§3).
    pub fn compute_hash(&self, mode: HashMode) -> BlockHash {
        BlockHash(Hash256::compute(&self.hashed_bytes(mode)))
    }
}

/// Every field a block hash is computed over, minus `hash` and `signature`.
///
/// Kept as a private, borrowing mirror of [`Block`] purely so the
/// `Canonical` hash mode serializes the same field set the `Legacy` mode
/// concatenates, without needing a second owned copy of the transactions.
#[derive(Serialize)]
struct UnsignedBlock<'a> {
    index: u64,
    anchor_block_num: u64,
    prev_hash: BlockHash,
    timestamp: i64,
    txs: &'a [Transaction],
    witness: &'a AccountName,
    missed_by: &'a Option<AccountName>,
    distributed: u64,
    burned: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{HASH_LEN, PrivateKey};

    fn dummy_block(mode_tag: u8) -> Block {
        let sk = PrivateKey::generate();
        let hash = Hash256::compute(&[mode_tag]);
        Block {
            index: 1,
            anchor_block_num: 42,
            prev_hash: BlockHash(Hash256([1u8; HASH_LEN])),
            timestamp: 1_700_000_000_000,
            txs: vec![],
            witness: AccountName::new("witness-one"),
            missed_by: None,
            distributed: 0,
            burned: 0,
            hash: BlockHash(hash),
            signature: CompactSignature::sign(&sk, &hash),
        }
    }

    #[test]
    fn canonical_hash_is_deterministic() {
        let block = dummy_block(1);
        let h1 = block.compute_hash(HashMode::Canonical);
        let h2 = block.compute_hash(HashMode::Canonical);
        assert_eq!(h1.0, h2.0);
    }

    #[test]
    fn legacy_hash_is_deterministic() {
        let block = dummy_block(2);
        let h1 = block.compute_hash(HashMode::Legacy);
        let h2 = block.compute_hash(HashMode::Legacy);
        assert_eq!(h1.0, h2.0);
    }

    #[test]
    fn legacy_and_canonical_hashes_differ() {
        let block = dummy_block(3);
        assert_ne!(
            block.compute_hash(HashMode::Legacy).0,
            block.compute_hash(HashMode::Canonical).0
        );
    }

    #[test]
    fn hash_changes_with_missed_by() {
        let mut a = dummy_block(4);
        let mut b = a.clone();
        a.missed_by = None;
        b.missed_by = Some(AccountName::new("backup-witness"));
        assert_ne!(
            a.compute_hash(HashMode::Canonical).0,
            b.compute_hash(HashMode::Canonical).0
        );
    }
}
