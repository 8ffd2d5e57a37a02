//! RocksDB-backed chain store.
//!
//! Column families:
//!
//! - `"blocks"`:       maps `BlockHash` (32 bytes) -> canonical block bytes,
//! - `"block_index"`:  maps block index (big-endian `u64`) -> `BlockHash`,
//! - `"accounts"`:     maps account name -> canonical account bytes,
//! - `"meta"`:         stores the current head hash under `"head"`.

use std::{path::Path, sync::Arc};

use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, Options, DB};

use crate::consensus::error::StorageError;
use crate::consensus::store::ChainStore;
use crate::crypto::{Hash256, HASH_LEN};
use crate::types::{Account, AccountName, Block, BlockHash};

/// Configuration for [`RocksDbChainStore`].
#[derive(Clone, Debug)]
pub struct RocksDbConfig {
    /// Filesystem path to the RocksDB database directory.
    pub path: String,
    /// Whether to create the database and missing column families if they
    /// do not yet exist.
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "data/chain-db".to_string(),
            create_if_missing: true,
        }
    }
}

/// RocksDB-backed implementation of [`ChainStore`].
pub struct RocksDbChainStore {
    db: DB,
}

impl RocksDbChainStore {
    /// Opens (or creates) a RocksDB-backed chain store at the given path.
    pub fn open(cfg: &RocksDbConfig) -> Result<Self, StorageError> {
        let path = Path::new(&cfg.path);

        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let cfs = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new("blocks", Options::default()),
            ColumnFamilyDescriptor::new("block_index", Options::default()),
            ColumnFamilyDescriptor::new("accounts", Options::default()),
            ColumnFamilyDescriptor::new("meta", Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(Self { db })
    }

    fn cf_blocks(&self) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db
            .cf_handle("blocks")
            .ok_or(StorageError::MissingColumnFamily("blocks"))
    }

    fn cf_block_index(&self) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db
            .cf_handle("block_index")
            .ok_or(StorageError::MissingColumnFamily("block_index"))
    }

    fn cf_accounts(&self) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db
            .cf_handle("accounts")
            .ok_or(StorageError::MissingColumnFamily("accounts"))
    }

    fn cf_meta(&self) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db
            .cf_handle("meta")
            .ok_or(StorageError::MissingColumnFamily("meta"))
    }

    fn encode_block(block: &Block) -> Result<Vec<u8>, StorageError> {
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(block, cfg).map_err(|e| StorageError::Encoding(e.to_string()))
    }

    fn decode_block(bytes: &[u8]) -> Result<Block, StorageError> {
        let cfg = bincode::config::standard();
        bincode::serde::decode_from_slice(bytes, cfg)
            .map(|(block, _)| block)
            .map_err(|e| StorageError::Encoding(e.to_string()))
    }

    fn encode_account(account: &Account) -> Result<Vec<u8>, StorageError> {
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(account, cfg).map_err(|e| StorageError::Encoding(e.to_string()))
    }

    fn decode_account(bytes: &[u8]) -> Result<Account, StorageError> {
        let cfg = bincode::config::standard();
        bincode::serde::decode_from_slice(bytes, cfg)
            .map(|(account, _)| account)
            .map_err(|e| StorageError::Encoding(e.to_string()))
    }
}

impl ChainStore for RocksDbChainStore {
    fn get_block_by_index(&self, index: u64) -> Result<Option<Block>, StorageError> {
        let cf_index = self.cf_block_index()?;
        let key = index.to_be_bytes();
        let hash_bytes = match self
            .db
            .get_cf(&cf_index, key)
            .map_err(|e| StorageError::Backend(e.to_string()))?
        {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        if hash_bytes.len() != HASH_LEN {
            return Err(StorageError::CorruptedMeta("block_index hash length"));
        }
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(&hash_bytes);
        self.get_block_by_hash(&BlockHash(Hash256(arr)))
    }

    fn get_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Block>, StorageError> {
        let cf = self.cf_blocks()?;
        match self
            .db
            .get_cf(&cf, hash.0.as_bytes())
            .map_err(|e| StorageError::Backend(e.to_string()))?
        {
            Some(bytes) => Self::decode_block(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn put_block(&mut self, block: Block) -> Result<(), StorageError> {
        let cf_blocks = self.cf_blocks()?;
        let cf_index = self.cf_block_index()?;
        let cf_meta = self.cf_meta()?;

        let hash = block.hash;
        let index = block.index;
        let bytes = Self::encode_block(&block)?;

        self.db
            .put_cf(&cf_blocks, hash.0.as_bytes(), bytes)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.db
            .put_cf(&cf_index, index.to_be_bytes(), hash.0.as_bytes())
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.db
            .put_cf(&cf_meta, b"head", hash.0.as_bytes())
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    fn head(&self) -> Result<Option<Block>, StorageError> {
        let cf_meta = self.cf_meta()?;
        let hash_bytes = match self
            .db
            .get_cf(&cf_meta, b"head")
            .map_err(|e| StorageError::Backend(e.to_string()))?
        {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        if hash_bytes.len() != HASH_LEN {
            return Err(StorageError::CorruptedMeta("head hash length"));
        }
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(&hash_bytes);
        self.get_block_by_hash(&BlockHash(Hash256(arr)))
    }

    fn get_account(&self, name: &AccountName) -> Result<Option<Account>, StorageError> {
        let cf = self.cf_accounts()?;
        match self
            .db
            .get_cf(&cf, name.as_str().as_bytes())
            .map_err(|e| StorageError::Backend(e.to_string()))?
        {
            Some(bytes) => Self::decode_account(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn put_account(&mut self, account: Account) -> Result<(), StorageError> {
        let cf = self.cf_accounts()?;
        let bytes = Self::encode_account(&account)?;
        self.db
            .put_cf(&cf, account.name.as_str().as_bytes(), bytes)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CompactSignature, PrivateKey};
    use tempfile::TempDir;

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

    fn open_temp() -> (TempDir, RocksDbChainStore) {
        let tmp = TempDir::new().expect("create temp dir");
        let cfg = RocksDbConfig {
            path: tmp.path().to_string_lossy().to_string(),
            create_if_missing: true,
        };
        let store = RocksDbChainStore::open(&cfg).expect("open RocksDB");
        (tmp, store)
    }

    #[test]
    fn rocksdb_store_roundtrips_block_by_index_and_hash() {
        let (_tmp, mut store) = open_temp();
        let block = dummy_block(0);
        let hash = block.hash;
        store.put_block(block).unwrap();

        assert_eq!(
            store.get_block_by_hash(&hash).unwrap().unwrap().index,
            0
        );
        assert_eq!(store.get_block_by_index(0).unwrap().unwrap().hash.0, hash.0);
        assert_eq!(store.head().unwrap().unwrap().hash.0, hash.0);
    }

    #[test]
    fn rocksdb_store_roundtrips_account() {
        let (_tmp, mut store) = open_temp();
        let mut acct = Account::new_stub(AccountName::new("alice"));
        acct.credit("MEE", 42);
        store.put_account(acct).unwrap();

        let fetched = store.get_account(&AccountName::new("alice")).unwrap().unwrap();
        assert_eq!(fetched.balance("MEE"), 42);
    }

    #[test]
    fn missing_account_returns_none() {
        let (_tmp, store) = open_temp();
        assert!(store.get_account(&AccountName::new("nobody")).unwrap().is_none());
    }
}
