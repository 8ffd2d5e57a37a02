//! Write-through account cache and per-block rollback sandbox (§4.9).
//!
//! Execution (§4.3) never touches [`crate::consensus::store::ChainStore`]
//! directly. It stages every account mutation in a [`CacheSandbox`]; on
//! success the sandbox is committed into the [`StateCache`], on failure it
//! is dropped and the block's effects vanish. The cache itself only
//! reaches the backing store on [`StateCache::write_to_disk`], so many
//! blocks' worth of account churn can happen between disk writes.

use std::collections::{HashMap, HashSet};

use crate::consensus::error::StorageError;
use crate::consensus::store::ChainStore;
use crate::types::{Account, AccountName, Block, BlockHash};

/// Flush to the backing store once this many accounts are dirty, even
/// without an explicit `force`.
const DIRTY_FLUSH_THRESHOLD: usize = 512;

/// In-memory account cache sitting in front of a [`ChainStore`].
///
/// Blocks are not cached here: they are appended once and never mutated,
/// so there is nothing a cache buys beyond what the backing store already
/// does.
pub struct StateCache<S> {
    inner: S,
    accounts: HashMap<AccountName, Account>,
    dirty: HashSet<AccountName>,
}

impl<S: ChainStore> StateCache<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            accounts: HashMap::new(),
            dirty: HashSet::new(),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn get_block_by_index(&self, index: u64) -> Result<Option<Block>, StorageError> {
        self.inner.get_block_by_index(index)
    }

    pub fn get_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Block>, StorageError> {
        self.inner.get_block_by_hash(hash)
    }

    pub fn put_block(&mut self, block: Block) -> Result<(), StorageError> {
        self.inner.put_block(block)
    }

    pub fn head(&self) -> Result<Option<Block>, StorageError> {
        self.inner.head()
    }

    /// Reads an account, populating the cache from the backing store
    /// (creating a zero-balance stub per §4.3) on a miss.
    pub fn get_account(&mut self, name: &AccountName) -> Result<Account, StorageError> {
        if let Some(acct) = self.accounts.get(name) {
            return Ok(acct.clone());
        }
        let acct = self.inner.get_or_create_account(name)?;
        self.accounts.insert(name.clone(), acct.clone());
        Ok(acct)
    }

    fn put_account(&mut self, account: Account) {
        self.dirty.insert(account.name.clone());
        self.accounts.insert(account.name.clone(), account);
    }

    /// Opens a sandbox for staging one block's worth of account mutations.
    pub fn sandbox(&mut self) -> CacheSandbox<'_, S> {
        CacheSandbox {
            cache: self,
            staged: HashMap::new(),
        }
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Flushes dirty accounts to the backing store. Runs unconditionally
    /// when `force`, otherwise only once the dirty set crosses
    /// [`DIRTY_FLUSH_THRESHOLD`] (§4.9 "periodic `write_to_disk(force)`").
    pub fn write_to_disk(&mut self, force: bool) -> Result<(), StorageError> {
        if !force && self.dirty.len() < DIRTY_FLUSH_THRESHOLD {
            return Ok(());
        }
        for name in self.dirty.drain() {
            if let Some(acct) = self.accounts.get(&name) {
                self.inner.put_account(acct.clone())?;
            }
        }
        Ok(())
    }
}

/// Staged mutations for a single block, applied atomically to the
/// [`StateCache`] on [`CacheSandbox::commit`] or discarded on
/// [`CacheSandbox::rollback`] (§4.9, §4.3 "execute step").
pub struct CacheSandbox<'a, S> {
    cache: &'a mut StateCache<S>,
    staged: HashMap<AccountName, Account>,
}

impl<'a, S: ChainStore> CacheSandbox<'a, S> {
    /// Reads through staged mutations first, falling back to the cache.
    pub fn get_account(&mut self, name: &AccountName) -> Result<Account, StorageError> {
        if let Some(acct) = self.staged.get(name) {
            return Ok(acct.clone());
        }
        self.cache.get_account(name)
    }

    /// Stages a mutation. Invisible to the backing [`StateCache`] (and to
    /// any other in-flight sandbox) until [`Self::commit`].
    pub fn put_account(&mut self, account: Account) {
        self.staged.insert(account.name.clone(), account);
    }

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Applies every staged mutation to the cache, marking the affected
    /// accounts dirty for the next [`StateCache::write_to_disk`].
    pub fn commit(self) {
        for (_, account) in self.staged {
            self.cache.put_account(account);
        }
    }

    /// Discards all staged mutations. Equivalent to dropping the sandbox,
    /// spelled out for callers that want the intent explicit at the call
    /// site (§4.1 "On exceptions or any tx validation failure, reset
    /// cache rollback sandbox").
    pub fn rollback(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mem::InMemoryChainStore;

    fn cache() -> StateCache<InMemoryChainStore> {
        StateCache::new(InMemoryChainStore::new())
    }

    #[test]
    fn sandbox_commit_is_visible_in_cache() {
        let mut cache = cache();
        let alice = AccountName::new("alice");
        {
            let mut sandbox = cache.sandbox();
            let mut acct = sandbox.get_account(&alice).unwrap();
            acct.credit("MEE", 100);
            sandbox.put_account(acct);
            sandbox.commit();
        }
        let acct = cache.get_account(&alice).unwrap();
        assert_eq!(acct.balance("MEE"), 100);
    }

    #[test]
    fn sandbox_rollback_discards_mutations() {
        let mut cache = cache();
        let alice = AccountName::new("alice");
        {
            let mut sandbox = cache.sandbox();
            let mut acct = sandbox.get_account(&alice).unwrap();
            acct.credit("MEE", 100);
            sandbox.put_account(acct);
            sandbox.rollback();
        }
        let acct = cache.get_account(&alice).unwrap();
        assert_eq!(acct.balance("MEE"), 0);
    }

    #[test]
    fn sandbox_reads_its_own_staged_writes() {
        let mut cache = cache();
        let alice = AccountName::new("alice");
        let mut sandbox = cache.sandbox();
        let mut acct = sandbox.get_account(&alice).unwrap();
        acct.credit("MEE", 50);
        sandbox.put_account(acct);

        let reread = sandbox.get_account(&alice).unwrap();
        assert_eq!(reread.balance("MEE"), 50);
    }

    #[test]
    fn write_to_disk_forces_flush_below_threshold() {
        let mut cache = cache();
        let alice = AccountName::new("alice");
        {
            let mut sandbox = cache.sandbox();
            let mut acct = sandbox.get_account(&alice).unwrap();
            acct.credit("MEE", 5);
            sandbox.put_account(acct);
            sandbox.commit();
        }
        assert_eq!(cache.dirty_count(), 1);
        cache.write_to_disk(true).unwrap();
        assert_eq!(cache.dirty_count(), 0);
        assert_eq!(
            cache.inner().get_account(&alice).unwrap().unwrap().balance("MEE"),
            5
        );
    }
}
