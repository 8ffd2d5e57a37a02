//! In-memory chain store.
//!
//! Useful for unit tests, the rebuild engine's scratch pass, and small
//! devnets. Blocks are kept in a `Vec` indexed by block index; accounts in
//! a `HashMap` keyed by name.

use std::collections::HashMap;

use crate::consensus::error::StorageError;
use crate::consensus::store::ChainStore;
use crate::types::{Account, AccountName, Block, BlockHash};

#[derive(Default)]
pub struct InMemoryChainStore {
    blocks: Vec<Block>,
    by_hash: HashMap<BlockHash, usize>,
    accounts: HashMap<AccountName, Account>,
}

impl InMemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns up to `k` most recent blocks, most-recent-first.
    pub fn recent_blocks(&self, k: usize) -> Vec<Block> {
        self.blocks.iter().rev().take(k).cloned().collect()
    }
}

impl ChainStore for InMemoryChainStore {
    fn get_block_by_index(&self, index: u64) -> Result<Option<Block>, StorageError> {
        Ok(self.blocks.get(index as usize).cloned())
    }

    fn get_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Block>, StorageError> {
        Ok(self
            .by_hash
            .get(hash)
            .and_then(|&idx| self.blocks.get(idx))
            .cloned())
    }

    fn put_block(&mut self, block: Block) -> Result<(), StorageError> {
        let hash = block.hash;
        let idx = block.index as usize;
        if idx != self.blocks.len() {
            return Err(StorageError::Backend(format!(
                "blocks must be appended in order: next index {}, got {}",
                self.blocks.len(),
                idx
            )));
        }
        self.blocks.push(block);
        self.by_hash.insert(hash, idx);
        Ok(())
    }

    fn head(&self) -> Result<Option<Block>, StorageError> {
        Ok(self.blocks.last().cloned())
    }

    fn get_account(&self, name: &AccountName) -> Result<Option<Account>, StorageError> {
        Ok(self.accounts.get(name).cloned())
    }

    fn put_account(&mut self, account: Account) -> Result<(), StorageError> {
        self.accounts.insert(account.name.clone(), account);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CompactSignature, Hash256, PrivateKey, HASH_LEN};

    fn dummy_block(index: u64) -> Block {
        let sk = PrivateKey::generate();
        let hash = Hash256::compute(&index.to_be_bytes());
        Block {
            index,
            anchor_block_num: index,
            prev_hash: BlockHash(Hash256([0u8; HASH_LEN])),
            timestamp: 1_700_000_000 + index as i64,
            txs: vec![],
            witness: AccountName::new("w1"),
            missed_by: None,
            distributed: 0,
            burned: 0,
            hash: BlockHash(hash),
            signature: CompactSignature::sign(&sk, &hash),
        }
    }

    #[test]
    fn put_and_get_block_roundtrip() {
        let mut store = InMemoryChainStore::new();
        let block = dummy_block(0);
        let hash = block.hash;
        store.put_block(block).unwrap();

        let fetched = store.get_block_by_hash(&hash).unwrap().unwrap();
        assert_eq!(fetched.index, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rejects_out_of_order_append() {
        let mut store = InMemoryChainStore::new();
        assert!(store.put_block(dummy_block(1)).is_err());
    }

    #[test]
    fn get_or_create_account_creates_stub() {
        let mut store = InMemoryChainStore::new();
        let name = AccountName::new("alice");
        let acct = store.get_or_create_account(&name).unwrap();
        assert_eq!(acct.balance("MEE"), 0);
        assert!(store.get_account(&name).unwrap().is_some());
    }
}
