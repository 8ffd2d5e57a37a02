//! Storage abstraction used by consensus.
//!
//! `ChainStore` is intentionally small: blocks are appended by index, the
//! current head is tracked, and accounts are looked up by name. A bounded
//! ring of recent blocks lives on top of this trait in
//! [`crate::consensus::coordinator`], since how many to keep is a
//! consensus-level policy, not a storage concern.

use crate::types::{Account, AccountName, Block, BlockHash};

use super::error::StorageError;

pub trait ChainStore {
    fn get_block_by_index(&self, index: u64) -> Result<Option<Block>, StorageError>;
    fn get_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Block>, StorageError>;
    fn put_block(&mut self, block: Block) -> Result<(), StorageError>;

    /// Returns the current chain head (the highest-index committed block).
    fn head(&self) -> Result<Option<Block>, StorageError>;

    fn get_account(&self, name: &AccountName) -> Result<Option<Account>, StorageError>;
    fn put_account(&mut self, account: Account) -> Result<(), StorageError>;

    /// Returns or creates a zero-balance account stub (§4.3 pre-pass).
    fn get_or_create_account(&mut self, name: &AccountName) -> Result<Account, StorageError> {
        match self.get_account(name)? {
            Some(acct) => Ok(acct),
            None => {
                let stub = Account::new_stub(name.clone());
                self.put_account(stub.clone())?;
                Ok(stub)
            }
        }
    }
}
