//! Staged block validator (§4.2).
//!
//! Stages run in order and short-circuit on the first failure — the
//! "reject-and-stop" contract adopted for the validator path (§9 Open
//! Questions).

use std::collections::HashMap;

use crate::types::{Account, Block, HashMode, WitnessSchedule};

use super::config::ConsensusConfig;
use super::error::{BlockExecutionError, ConsensusError, ValidationError};

/// Checks a block's anchor-referencing transactions against the anchor
/// chain (§4.2 stage 6). Implemented by [`crate::anchor::AnchorIngester`];
/// kept as a trait here so the validator does not depend on the ingester's
/// networking concerns.
pub trait AnchorCheck {
    fn validate_block_against_anchor(&self, block: &Block) -> Result<(), ValidationError>;
}

/// Totals reported by running §4.3 against a candidate block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutionTotals {
    pub distributed: u64,
    pub burned: u64,
}

/// Runs §4.3 against a candidate block (§4.2 stage 8). Implemented by
/// [`crate::execution::ExecutionPipeline`].
pub trait BlockExecutor {
    fn execute_block(&mut self, block: &Block) -> Result<ExecutionTotals, BlockExecutionError>;
}

/// Everything the validator needs about chain state that isn't carried on
/// the candidate block itself.
pub struct ValidationContext<'a> {
    pub head: &'a Block,
    /// Most-recent-first, at least `2 * witnesses` entries when available.
    pub recent_blocks: &'a [Block],
    pub schedule: &'a WitnessSchedule,
    pub witness_account: &'a Account,
    pub now_ms: i64,
    pub sync_mode: bool,
    pub trusted_rebuild: bool,
    pub recovering: bool,
    pub observer: bool,
    /// Blocks produced since the last exit from sync mode; `u32::MAX` if
    /// sync mode has never been exited (no tripling from this source).
    pub blocks_since_sync_exit: u32,
}

/// Staged, stateful block validator.
///
/// Statefulness is limited to the §4.2 stage 5 "three consecutive timing
/// rejections force-accept" counter, keyed by block index.
pub struct BlockValidator {
    config: ConsensusConfig,
    hash_mode: HashMode,
    timing_strikes: HashMap<u64, u32>,
}

impl BlockValidator {
    pub fn new(config: ConsensusConfig, hash_mode: HashMode) -> Self {
        Self {
            config,
            hash_mode,
            timing_strikes: HashMap::new(),
        }
    }

    /// Determines `miner_priority` for `block.witness` (§4.2 stage 4).
    ///
    /// Returns `1` if scheduled for this slot; otherwise the smallest
    /// `i + 2` such that `witness` produced the block `i + 1` slots back
    /// (i.e. `recent_blocks[i]`, where `recent_blocks[0]` is the immediate
    /// predecessor); otherwise `0`.
    fn miner_priority(&self, block: &Block, ctx: &ValidationContext) -> u64 {
        let slot = block
            .index
            .checked_sub(ctx.schedule.anchor_block_ref + 1)
            .map(|s| s as usize);
        if let Some(slot) = slot {
            if ctx.schedule.primary_for_slot(slot) == Some(&block.witness) {
                return 1;
            }
        }

        let scan_limit = (2 * self.config.witnesses).min(ctx.recent_blocks.len());
        for (i, past) in ctx.recent_blocks.iter().take(scan_limit).enumerate() {
            if past.witness == block.witness {
                return i as u64 + 2;
            }
        }
        0
    }

    fn drift_multiplier(&self, block: &Block, ctx: &ValidationContext) -> i64 {
        if ctx.blocks_since_sync_exit < 10 || block.index <= 10 {
            3
        } else {
            1
        }
    }

    fn check_structural(&self, block: &Block) -> Result<(), ValidationError> {
        if block.witness.as_str().is_empty() {
            return Err(ValidationError::InvalidStructure(
                "witness name is empty".to_string(),
            ));
        }
        let mut seen_senders = std::collections::HashSet::new();
        let mut seen_hashes = std::collections::HashSet::new();
        for tx in &block.txs {
            if !seen_senders.insert(tx.sender.clone()) {
                return Err(ValidationError::InvalidStructure(format!(
                    "duplicate sender in block: {}",
                    tx.sender
                )));
            }
            if !seen_hashes.insert(tx.hash) {
                return Err(ValidationError::InvalidStructure(
                    "duplicate tx hash in block".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn check_linkage(&self, block: &Block, ctx: &ValidationContext) -> Result<(), ValidationError> {
        if block.index != ctx.head.index + 1 {
            return Err(ValidationError::InvalidIndex {
                expected: ctx.head.index + 1,
                got: block.index,
            });
        }
        if block.prev_hash.0 != ctx.head.hash.0 {
            return Err(ValidationError::InvalidPrevHash);
        }
        if block.anchor_block_num != ctx.head.anchor_block_num + 1 {
            return Err(ValidationError::InvalidAnchorBlockNum {
                expected: ctx.head.anchor_block_num + 1,
                got: block.anchor_block_num,
            });
        }
        Ok(())
    }

    fn check_bound(&self, block: &Block) -> Result<(), ValidationError> {
        if block.txs.len() > self.config.max_tx_per_block {
            return Err(ValidationError::TooManyTransactions {
                got: block.txs.len(),
                max: self.config.max_tx_per_block,
            });
        }
        Ok(())
    }

    fn check_timing(&mut self, block: &Block, ctx: &ValidationContext, priority: u64) -> Result<(), ValidationError> {
        if ctx.recovering || ctx.sync_mode || ctx.observer {
            return Ok(());
        }

        let block_time_ms = self.config.block_time.as_millis() as i64;
        let drift = self.config.max_drift * self.drift_multiplier(block, ctx);

        let earliest = ctx.head.timestamp + priority as i64 * block_time_ms - drift;
        let latest = ctx.now_ms + drift;

        let result = if block.timestamp < earliest {
            Err(ValidationError::BlockTooEarly {
                timestamp: block.timestamp,
                earliest,
            })
        } else if block.timestamp > latest {
            Err(ValidationError::BlockTooLate {
                timestamp: block.timestamp,
                latest,
            })
        } else {
            Ok(())
        };

        match result {
            Ok(()) => {
                self.timing_strikes.remove(&block.index);
                Ok(())
            }
            Err(e) => {
                let strikes = self.timing_strikes.entry(block.index).or_insert(0);
                *strikes += 1;
                if *strikes >= 3 {
                    self.timing_strikes.remove(&block.index);
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    fn check_hash_and_signature(&self, block: &Block, witness_account: &Account) -> Result<(), ValidationError> {
        let recomputed = block.compute_hash(self.hash_mode);
        if recomputed.0 != block.hash.0 {
            return Err(ValidationError::InvalidHash);
        }
        if !super::auth::verify_block_authority(witness_account, &block.hash.0, &block.signature) {
            return Err(ValidationError::InvalidSignature);
        }
        Ok(())
    }

    /// Runs all §4.2 stages against `block`, short-circuiting on the first
    /// failure. On success, returns the totals §4.3 execution reported so
    /// the caller can commit them without recomputing.
    pub fn validate(
        &mut self,
        block: &Block,
        ctx: &ValidationContext,
        anchor: &dyn AnchorCheck,
        executor: &mut dyn BlockExecutor,
    ) -> Result<ExecutionTotals, ConsensusError> {
        self.check_structural(block)?;
        self.check_linkage(block, ctx)?;
        self.check_bound(block)?;

        let priority = self.miner_priority(block, ctx);
        if priority == 0 {
            return Err(ValidationError::UnauthorizedMiner {
                witness: block.witness.to_string(),
            }
            .into());
        }

        self.check_timing(block, ctx, priority)?;

        if !ctx.trusted_rebuild {
            anchor.validate_block_against_anchor(block)?;
        }

        self.check_hash_and_signature(block, ctx.witness_account)?;

        // Two-tier per §7: an invalid transaction caught during
        // revalidation just rejects the block, while any other
        // execution failure means the executor wasn't actually total on
        // pre-validated input, which is fatal. `BlockExecutionError`'s
        // `From` impl for `ConsensusError` keeps that split.
        let totals = executor.execute_block(block)?;

        if totals.distributed != block.distributed || totals.burned != block.burned {
            return Err(ValidationError::TotalsMismatch {
                reported_distributed: block.distributed,
                computed_distributed: totals.distributed,
                reported_burned: block.burned,
                computed_burned: totals.burned,
            }
            .into());
        }

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::error::ExecutionError;
    use crate::crypto::{CompactSignature, Hash256, PrivateKey, HASH_LEN};
    use crate::types::{AccountName, BlockHash};

    struct AcceptAllAnchor;
    impl AnchorCheck for AcceptAllAnchor {
        fn validate_block_against_anchor(&self, _block: &Block) -> Result<(), ValidationError> {
            Ok(())
        }
    }

    struct StubExecutor {
        totals: ExecutionTotals,
    }
    impl BlockExecutor for StubExecutor {
        fn execute_block(&mut self, _block: &Block) -> Result<ExecutionTotals, BlockExecutionError> {
            Ok(self.totals)
        }
    }

    fn signed_block(sk: &PrivateKey, index: u64, prev: &Block, mode: HashMode) -> Block {
        let mut block = Block {
            index,
            anchor_block_num: prev.anchor_block_num + 1,
            prev_hash: BlockHash(prev.hash.0),
            timestamp: prev.timestamp + 3_000,
            txs: vec![],
            witness: AccountName::new("w1"),
            missed_by: None,
            distributed: 0,
            burned: 0,
            hash: BlockHash(Hash256([0u8; HASH_LEN])),
            signature: CompactSignature::sign(sk, &Hash256([0u8; HASH_LEN])),
        };
        let hash = block.compute_hash(mode);
        block.hash = hash;
        block.signature = CompactSignature::sign(sk, &hash.0);
        block
    }

    fn genesis() -> Block {
        Block {
            index: 0,
            anchor_block_num: 100,
            prev_hash: BlockHash(Hash256([0u8; HASH_LEN])),
            timestamp: 1_700_000_000_000,
            txs: vec![],
            witness: AccountName::new("genesis"),
            missed_by: None,
            distributed: 0,
            burned: 0,
            hash: BlockHash(Hash256([0u8; HASH_LEN])),
            signature: CompactSignature::sign(&PrivateKey::generate(), &Hash256([0u8; HASH_LEN])),
        }
    }

    #[test]
    fn accepts_well_formed_scheduled_block() {
        let sk = PrivateKey::generate();
        let mut witness_account = Account::new_stub(AccountName::new("w1"));
        witness_account.witness_public_key = Some(sk.public_key());

        let head = genesis();
        let block = signed_block(&sk, 1, &head, HashMode::Canonical);

        let schedule = WitnessSchedule {
            anchor_block_ref: 0,
            shuffle: vec![AccountName::new("w1")],
        };

        let mut validator = BlockValidator::new(ConsensusConfig::default(), HashMode::Canonical);
        let ctx = ValidationContext {
            head: &head,
            recent_blocks: &[],
            schedule: &schedule,
            witness_account: &witness_account,
            now_ms: block.timestamp + 10,
            sync_mode: false,
            trusted_rebuild: false,
            recovering: false,
            observer: false,
            blocks_since_sync_exit: u32::MAX,
        };

        let mut executor = StubExecutor {
            totals: ExecutionTotals::default(),
        };

        let result = validator.validate(&block, &ctx, &AcceptAllAnchor, &mut executor);
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn rejects_wrong_index() {
        let sk = PrivateKey::generate();
        let mut witness_account = Account::new_stub(AccountName::new("w1"));
        witness_account.witness_public_key = Some(sk.public_key());

        let head = genesis();
        let mut block = signed_block(&sk, 5, &head, HashMode::Canonical);
        block.index = 5;

        let schedule = WitnessSchedule {
            anchor_block_ref: 0,
            shuffle: vec![AccountName::new("w1")],
        };

        let mut validator = BlockValidator::new(ConsensusConfig::default(), HashMode::Canonical);
        let ctx = ValidationContext {
            head: &head,
            recent_blocks: &[],
            schedule: &schedule,
            witness_account: &witness_account,
            now_ms: block.timestamp + 10,
            sync_mode: false,
            trusted_rebuild: false,
            recovering: false,
            observer: false,
            blocks_since_sync_exit: u32::MAX,
        };
        let mut executor = StubExecutor {
            totals: ExecutionTotals::default(),
        };

        let err = validator
            .validate(&block, &ctx, &AcceptAllAnchor, &mut executor)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::Validation(ValidationError::InvalidIndex { .. })));
    }

    #[test]
    fn rejects_unauthorized_miner() {
        let sk = PrivateKey::generate();
        let mut witness_account = Account::new_stub(AccountName::new("w1"));
        witness_account.witness_public_key = Some(sk.public_key());

        let head = genesis();
        let block = signed_block(&sk, 1, &head, HashMode::Canonical);

        let schedule = WitnessSchedule {
            anchor_block_ref: 0,
            shuffle: vec![AccountName::new("someone-else")],
        };

        let mut validator = BlockValidator::new(ConsensusConfig::default(), HashMode::Canonical);
        let ctx = ValidationContext {
            head: &head,
            recent_blocks: &[],
            schedule: &schedule,
            witness_account: &witness_account,
            now_ms: block.timestamp + 10,
            sync_mode: false,
            trusted_rebuild: false,
            recovering: false,
            observer: false,
            blocks_since_sync_exit: u32::MAX,
        };
        let mut executor = StubExecutor {
            totals: ExecutionTotals::default(),
        };

        let err = validator
            .validate(&block, &ctx, &AcceptAllAnchor, &mut executor)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::Validation(ValidationError::UnauthorizedMiner { .. })));
    }

    #[test]
    fn force_accepts_after_three_timing_rejections() {
        let sk = PrivateKey::generate();
        let mut witness_account = Account::new_stub(AccountName::new("w1"));
        witness_account.witness_public_key = Some(sk.public_key());

        let head = genesis();
        let mut block = signed_block(&sk, 1, &head, HashMode::Canonical);
        // Too early relative to head: way before earliest allowed timestamp.
        block.timestamp = head.timestamp + 1;
        let hash = block.compute_hash(HashMode::Canonical);
        block.hash = hash;
        block.signature = CompactSignature::sign(&sk, &hash.0);

        let schedule = WitnessSchedule {
            anchor_block_ref: 0,
            shuffle: vec![AccountName::new("w1")],
        };

        let mut validator = BlockValidator::new(ConsensusConfig::default(), HashMode::Canonical);
        let mut executor = StubExecutor {
            totals: ExecutionTotals::default(),
        };

        let make_ctx = |block: &Block| ValidationContext {
            head: &head,
            recent_blocks: &[],
            schedule: &schedule,
            witness_account: &witness_account,
            now_ms: block.timestamp + 100_000,
            sync_mode: false,
            trusted_rebuild: false,
            recovering: false,
            observer: false,
            blocks_since_sync_exit: u32::MAX,
        };

        let ctx1 = make_ctx(&block);
        assert!(validator
            .validate(&block, &ctx1, &AcceptAllAnchor, &mut executor)
            .is_err());
        let ctx2 = make_ctx(&block);
        assert!(validator
            .validate(&block, &ctx2, &AcceptAllAnchor, &mut executor)
            .is_err());
        let ctx3 = make_ctx(&block);
        assert!(validator
            .validate(&block, &ctx3, &AcceptAllAnchor, &mut executor)
            .is_ok());
    }

    struct InvalidTxExecutor;
    impl BlockExecutor for InvalidTxExecutor {
        fn execute_block(&mut self, _block: &Block) -> Result<ExecutionTotals, BlockExecutionError> {
            Err(BlockExecutionError::InvalidTransaction {
                hash: "deadbeef".to_string(),
                reason: "insufficient balance".to_string(),
            })
        }
    }

    struct FatalExecutor;
    impl BlockExecutor for FatalExecutor {
        fn execute_block(&mut self, _block: &Block) -> Result<ExecutionTotals, BlockExecutionError> {
            Err(BlockExecutionError::Fatal(ExecutionError::ExecutorFailed(
                "state diverged from producer".to_string(),
            )))
        }
    }

    #[test]
    fn invalid_transaction_rejects_block_without_fatal_error() {
        let sk = PrivateKey::generate();
        let mut witness_account = Account::new_stub(AccountName::new("w1"));
        witness_account.witness_public_key = Some(sk.public_key());

        let head = genesis();
        let block = signed_block(&sk, 1, &head, HashMode::Canonical);
        let schedule = WitnessSchedule {
            anchor_block_ref: 0,
            shuffle: vec![AccountName::new("w1")],
        };

        let mut validator = BlockValidator::new(ConsensusConfig::default(), HashMode::Canonical);
        let ctx = ValidationContext {
            head: &head,
            recent_blocks: &[],
            schedule: &schedule,
            witness_account: &witness_account,
            now_ms: block.timestamp + 10,
            sync_mode: false,
            trusted_rebuild: false,
            recovering: false,
            observer: false,
            blocks_since_sync_exit: u32::MAX,
        };
        let mut executor = InvalidTxExecutor;

        let err = validator
            .validate(&block, &ctx, &AcceptAllAnchor, &mut executor)
            .unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::Validation(ValidationError::InvalidTransaction { .. })
        ));
    }

    #[test]
    fn executor_failure_on_pre_validated_input_is_fatal() {
        let sk = PrivateKey::generate();
        let mut witness_account = Account::new_stub(AccountName::new("w1"));
        witness_account.witness_public_key = Some(sk.public_key());

        let head = genesis();
        let block = signed_block(&sk, 1, &head, HashMode::Canonical);
        let schedule = WitnessSchedule {
            anchor_block_ref: 0,
            shuffle: vec![AccountName::new("w1")],
        };

        let mut validator = BlockValidator::new(ConsensusConfig::default(), HashMode::Canonical);
        let ctx = ValidationContext {
            head: &head,
            recent_blocks: &[],
            schedule: &schedule,
            witness_account: &witness_account,
            now_ms: block.timestamp + 10,
            sync_mode: false,
            trusted_rebuild: false,
            recovering: false,
            observer: false,
            blocks_since_sync_exit: u32::MAX,
        };
        let mut executor = FatalExecutor;

        let err = validator
            .validate(&block, &ctx, &AcceptAllAnchor, &mut executor)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::Execution(_)));
    }
}
