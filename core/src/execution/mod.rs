//! Transaction execution pipeline (§4.3).
//!
//! Deterministic, serial, in-block-order. All mutations go through the
//! cache sandbox; on any failure the sandbox is dropped and no state
//! changes persist.

use tracing::{debug, warn};

use crate::consensus::error::{BlockExecutionError, ExecutionError};
use crate::consensus::store::ChainStore;
use crate::consensus::validator::{BlockExecutor, ExecutionTotals};
use crate::dispatch::{Dispatch, NATIVE_SYMBOL};
use crate::storage::cache::StateCache;
use crate::types::{AccountName, Block, TransactionPayload};

/// A pluggable per-block hook: given an index or timestamp and the cache,
/// returns additional units burned. Used for the hardfork hook (§4.3 step
/// 3, keyed by block index) and DAO-trigger burns (§4.3 step 5, keyed by
/// block timestamp). Neither has a concrete built-in implementation here:
/// both are domain-specific collaborators, so the default is "none
/// registered" rather than a no-op closure.
pub type Hook<S> = Box<dyn Fn(u64, &mut StateCache<S>) -> Result<u64, ExecutionError> + Send + Sync>;

/// Knobs §4.3 needs from [`crate::consensus::config::ConsensusConfig`],
/// narrowed so the pipeline does not depend on unrelated consensus knobs.
#[derive(Clone, Debug)]
pub struct ExecutionConfig {
    pub witness_reward: u64,
    pub burn_account: String,
    pub eco_blocks: u64,
    /// Whether to re-run each handler's `validate` before `execute`
    /// (§4.3 step 2a). `false` when the caller (e.g. trusted rebuild)
    /// has already established the block is well-formed.
    pub revalidate: bool,
}

/// Runs §4.3 against a candidate block, owning the cache the sandbox is
/// staged against.
pub struct ExecutionPipeline<S: ChainStore> {
    cache: StateCache<S>,
    dispatch: Dispatch,
    config: ExecutionConfig,
    blocks_since_decay_burn: u64,
    hardfork_hook: Option<Hook<S>>,
    dao_hook: Option<Hook<S>>,
}

impl<S: ChainStore> ExecutionPipeline<S> {
    pub fn new(cache: StateCache<S>, dispatch: Dispatch, config: ExecutionConfig) -> Self {
        Self {
            cache,
            dispatch,
            config,
            blocks_since_decay_burn: 0,
            hardfork_hook: None,
            dao_hook: None,
        }
    }

    pub fn with_hardfork_hook(mut self, hook: Hook<S>) -> Self {
        self.hardfork_hook = Some(hook);
        self
    }

    pub fn with_dao_hook(mut self, hook: Hook<S>) -> Self {
        self.dao_hook = Some(hook);
        self
    }

    pub fn cache(&self) -> &StateCache<S> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut StateCache<S> {
        &mut self.cache
    }

    pub fn into_cache(self) -> StateCache<S> {
        self.cache
    }

    /// Periodic decay-burn (§4.3 step 4): every `eco_blocks` blocks, burn
    /// up to the witness reward from the designated burn account, capped
    /// at its balance.
    fn apply_eco_burn(&mut self, block: &Block) -> Result<u64, ExecutionError> {
        self.blocks_since_decay_burn += 1;
        if self.config.eco_blocks == 0 || self.blocks_since_decay_burn < self.config.eco_blocks {
            return Ok(0);
        }
        self.blocks_since_decay_burn = 0;

        let mut sandbox = self.cache.sandbox();
        let mut burn_account = sandbox
            .get_account(&AccountName::new(self.config.burn_account.as_str()))
            .map_err(|e| ExecutionError::ExecutorFailed(e.to_string()))?;
        let burned = burn_account.balance(NATIVE_SYMBOL).min(self.config.witness_reward);
        if burned > 0 {
            burn_account
                .debit(NATIVE_SYMBOL, burned)
                .map_err(|e| ExecutionError::ExecutorFailed(e.to_string()))?;
            sandbox.put_account(burn_account);
        }
        sandbox.commit();
        debug!(target: "execution", block_index = block.index, burned, "periodic eco decay-burn");
        Ok(burned)
    }

    /// Witness reward (§4.3 step 6): credit `witness_reward` to the
    /// block's witness.
    fn apply_witness_reward(&mut self, block: &Block) -> Result<u64, ExecutionError> {
        if self.config.witness_reward == 0 {
            return Ok(0);
        }
        let mut sandbox = self.cache.sandbox();
        let mut witness = sandbox
            .get_account(&block.witness)
            .map_err(|e| ExecutionError::ExecutorFailed(e.to_string()))?;
        witness.credit(NATIVE_SYMBOL, self.config.witness_reward);
        sandbox.put_account(witness);
        sandbox.commit();
        Ok(self.config.witness_reward)
    }
}

impl<S: ChainStore> BlockExecutor for ExecutionPipeline<S> {
    fn execute_block(&mut self, block: &Block) -> Result<ExecutionTotals, BlockExecutionError> {
        let mut distributed = 0u64;
        let mut burned = 0u64;

        // Pre-pass (§4.3 step 1): create zero-balance stubs for every
        // sender and payload-declared recipient so downstream ops can
        // debit/credit uniformly.
        {
            let mut sandbox = self.cache.sandbox();
            for tx in &block.txs {
                sandbox
                    .get_account(&tx.sender)
                    .map_err(|e| ExecutionError::ExecutorFailed(e.to_string()))?;
                if let TransactionPayload::Transfer { to, .. } = &tx.payload {
                    sandbox
                        .get_account(to)
                        .map_err(|e| ExecutionError::ExecutorFailed(e.to_string()))?;
                }
            }
            sandbox.commit();
        }

        for tx in &block.txs {
            let handler = self
                .dispatch
                .get(&tx.kind)
                .ok_or_else(|| ExecutionError::UnknownKind(tx.kind.to_string()))?;

            let mut sandbox = self.cache.sandbox();

            // A validate rejection here is a normal invalid-block
            // rejection (§7), not a fatal error: the block simply
            // contains a transaction that doesn't hold up, distinct from
            // `execute` failing on input that was supposed to already be
            // valid.
            if self.config.revalidate {
                handler
                    .validate(&mut sandbox, tx, block.timestamp)
                    .map_err(|e| BlockExecutionError::InvalidTransaction {
                        hash: tx.hash.to_string(),
                        reason: e.to_string(),
                    })?;
            }
            let outcome = handler.execute(&mut sandbox, tx, block.timestamp)?;
            sandbox.commit();

            distributed += outcome.distributed;
            burned += outcome.burned;
        }

        if let Some(hook) = &self.hardfork_hook {
            burned += hook(block.index, &mut self.cache)?;
        }
        burned += self.apply_eco_burn(block)?;
        if let Some(hook) = &self.dao_hook {
            burned += hook(block.timestamp as u64, &mut self.cache)?;
        }
        distributed += self.apply_witness_reward(block)?;

        warn_if_zero_reward(block, distributed);

        Ok(ExecutionTotals { distributed, burned })
    }
}

fn warn_if_zero_reward(block: &Block, distributed: u64) {
    if distributed == 0 {
        warn!(target: "execution", block_index = block.index, "block committed with zero distributed reward");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CompactSignature, Hash256, PrivateKey, HASH_LEN};
    use crate::storage::mem::InMemoryChainStore;
    use crate::types::{AccountName, BlockHash, TransactionKind, TxSignature};

    fn config() -> ExecutionConfig {
        ExecutionConfig {
            witness_reward: 10,
            burn_account: "null".to_string(),
            eco_blocks: 0,
            revalidate: true,
        }
    }

    fn dummy_tx(sender: &str, to: &str, amount: u64) -> crate::types::Transaction {
        let sender_name = AccountName::new(sender);
        let payload = TransactionPayload::Transfer {
            to: AccountName::new(to),
            symbol: NATIVE_SYMBOL.to_string(),
            amount,
        };
        let hash = crate::types::Transaction::compute_hash(
            &TransactionKind::Transfer,
            &sender_name,
            &payload,
            0,
        );
        let sk = PrivateKey::generate();
        crate::types::Transaction {
            hash,
            sender: sender_name,
            kind: TransactionKind::Transfer,
            payload,
            ts: 0,
            anchor_ref: None,
            signature: TxSignature::Single(CompactSignature::sign(&sk, &hash)),
        }
    }

    fn block_with_txs(txs: Vec<crate::types::Transaction>) -> Block {
        let sk = PrivateKey::generate();
        let hash = Hash256::compute(b"block");
        Block {
            index: 1,
            anchor_block_num: 1,
            prev_hash: BlockHash(Hash256([0u8; HASH_LEN])),
            timestamp: 1_700_000_000_000,
            txs,
            witness: AccountName::new("w1"),
            missed_by: None,
            distributed: 0,
            burned: 0,
            hash: BlockHash(hash),
            signature: CompactSignature::sign(&sk, &hash),
        }
    }

    #[test]
    fn executes_transfer_and_credits_witness_reward() {
        let cache = StateCache::new(InMemoryChainStore::new());
        let mut pipeline = ExecutionPipeline::new(cache, Dispatch::with_builtins(), config());

        {
            let mut sandbox = pipeline.cache_mut().sandbox();
            let mut alice = sandbox.get_account(&AccountName::new("alice")).unwrap();
            alice.credit(NATIVE_SYMBOL, 100);
            sandbox.put_account(alice);
            sandbox.commit();
        }

        let block = block_with_txs(vec![dummy_tx("alice", "bob", 40)]);
        let totals = pipeline.execute_block(&block).unwrap();

        assert_eq!(totals.distributed, 10);
        assert_eq!(totals.burned, 0);
        assert_eq!(
            pipeline.cache_mut().get_account(&AccountName::new("bob")).unwrap().balance(NATIVE_SYMBOL),
            40
        );
        assert_eq!(
            pipeline.cache_mut().get_account(&AccountName::new("w1")).unwrap().balance(NATIVE_SYMBOL),
            10
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let cache = StateCache::new(InMemoryChainStore::new());
        let mut pipeline = ExecutionPipeline::new(cache, Dispatch::empty(), config());
        let block = block_with_txs(vec![dummy_tx("alice", "bob", 10)]);
        assert!(pipeline.execute_block(&block).is_err());
    }

    #[test]
    fn eco_burn_fires_every_configured_interval() {
        let cache = StateCache::new(InMemoryChainStore::new());
        let mut cfg = config();
        cfg.eco_blocks = 2;
        let mut pipeline = ExecutionPipeline::new(cache, Dispatch::with_builtins(), cfg);

        {
            let mut sandbox = pipeline.cache_mut().sandbox();
            let mut burn = sandbox.get_account(&AccountName::new("null")).unwrap();
            burn.credit(NATIVE_SYMBOL, 100);
            sandbox.put_account(burn);
            sandbox.commit();
        }

        let b1 = block_with_txs(vec![]);
        let t1 = pipeline.execute_block(&b1).unwrap();
        assert_eq!(t1.burned, 0);

        let mut b2 = block_with_txs(vec![]);
        b2.index = 2;
        let t2 = pipeline.execute_block(&b2).unwrap();
        assert_eq!(t2.burned, 10);
    }

    #[test]
    fn hardfork_hook_contributes_to_burned_total() {
        let cache = StateCache::new(InMemoryChainStore::new());
        let pipeline = ExecutionPipeline::new(cache, Dispatch::with_builtins(), config())
            .with_hardfork_hook(Box::new(|index, _cache| {
                Ok(if index == 1 { 7 } else { 0 })
            }));
        let mut pipeline = pipeline;

        let block = block_with_txs(vec![]);
        let totals = pipeline.execute_block(&block).unwrap();
        assert_eq!(totals.burned, 7);
    }
}
