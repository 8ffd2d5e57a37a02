//! Transaction dispatch: maps [`TransactionKind`] to a `(validate, execute)`
//! pair (§4.3, §9 "Dynamic dispatch to transaction kinds").
//!
//! A tagged discriminant plus a lookup table, not inheritance: each
//! registered [`TxHandler`] is total on its own kind and returns a small
//! result struct rather than mutating shared totals directly.

use std::collections::{BTreeSet, HashMap};

use crate::consensus::error::{ExecutionError, StorageError};
use crate::types::{Account, AccountName, Transaction, TransactionKind, TransactionPayload};

/// Native token symbol used for vote-weight bookkeeping.
pub const NATIVE_SYMBOL: &str = "MEE";

/// Per-transaction issuance/destruction reported by a handler's `execute`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxOutcome {
    pub distributed: u64,
    pub burned: u64,
}

/// Narrow view onto account state that dispatch handlers operate through.
///
/// Kept separate from [`crate::consensus::store::ChainStore`] so handlers
/// do not need to know about blocks, and separate from
/// [`crate::storage::cache::CacheSandbox`] directly so they do not need to
/// be generic over the backing store.
pub trait AccountAccess {
    fn get_account(&mut self, name: &AccountName) -> Result<Account, StorageError>;
    fn put_account(&mut self, account: Account);
}

impl<'a, S: crate::consensus::store::ChainStore> AccountAccess
    for crate::storage::cache::CacheSandbox<'a, S>
{
    fn get_account(&mut self, name: &AccountName) -> Result<Account, StorageError> {
        crate::storage::cache::CacheSandbox::get_account(self, name)
    }

    fn put_account(&mut self, account: Account) {
        crate::storage::cache::CacheSandbox::put_account(self, account)
    }
}

/// One registered transaction kind's validator and executor.
pub trait TxHandler: Send + Sync {
    /// Re-checks a transaction against current state (§4.3 step 2a). Only
    /// called when `revalidate` is requested; failures reject the block
    /// rather than the handler.
    fn validate(
        &self,
        accounts: &mut dyn AccountAccess,
        tx: &Transaction,
        block_ts: i64,
    ) -> Result<(), ExecutionError>;

    /// Applies the transaction. Must be total on pre-validated input
    /// (§4.3 step 2b): any failure here is escalated as fatal.
    fn execute(
        &self,
        accounts: &mut dyn AccountAccess,
        tx: &Transaction,
        block_ts: i64,
    ) -> Result<TxOutcome, ExecutionError>;
}

fn storage_to_execution(e: StorageError) -> ExecutionError {
    ExecutionError::ExecutorFailed(e.to_string())
}

struct TransferHandler;
impl TxHandler for TransferHandler {
    fn validate(
        &self,
        accounts: &mut dyn AccountAccess,
        tx: &Transaction,
        _block_ts: i64,
    ) -> Result<(), ExecutionError> {
        let TransactionPayload::Transfer { symbol, amount, .. } = &tx.payload else {
            return Err(ExecutionError::ExecutorFailed(
                "transfer handler given non-transfer payload".to_string(),
            ));
        };
        let sender = accounts.get_account(&tx.sender).map_err(storage_to_execution)?;
        if sender.balance(symbol) < *amount {
            return Err(ExecutionError::InsufficientBalance(format!(
                "{} has {} {}, needs {}",
                tx.sender,
                sender.balance(symbol),
                symbol,
                amount
            )));
        }
        Ok(())
    }

    fn execute(
        &self,
        accounts: &mut dyn AccountAccess,
        tx: &Transaction,
        _block_ts: i64,
    ) -> Result<TxOutcome, ExecutionError> {
        let TransactionPayload::Transfer { to, symbol, amount } = &tx.payload else {
            return Err(ExecutionError::ExecutorFailed(
                "transfer handler given non-transfer payload".to_string(),
            ));
        };
        let mut sender = accounts.get_account(&tx.sender).map_err(storage_to_execution)?;
        sender
            .debit(symbol, *amount)
            .map_err(|e| ExecutionError::InsufficientBalance(e.to_string()))?;
        accounts.put_account(sender);

        let mut recipient = accounts.get_account(to).map_err(storage_to_execution)?;
        recipient.credit(symbol, *amount);
        accounts.put_account(recipient);

        Ok(TxOutcome::default())
    }
}

struct VoteWitnessHandler;
impl TxHandler for VoteWitnessHandler {
    fn validate(
        &self,
        _accounts: &mut dyn AccountAccess,
        tx: &Transaction,
        _block_ts: i64,
    ) -> Result<(), ExecutionError> {
        match &tx.payload {
            TransactionPayload::VoteWitness { .. } => Ok(()),
            _ => Err(ExecutionError::ExecutorFailed(
                "vote_witness handler given mismatched payload".to_string(),
            )),
        }
    }

    fn execute(
        &self,
        accounts: &mut dyn AccountAccess,
        tx: &Transaction,
        _block_ts: i64,
    ) -> Result<TxOutcome, ExecutionError> {
        let TransactionPayload::VoteWitness { witness } = &tx.payload else {
            return Err(ExecutionError::ExecutorFailed(
                "vote_witness handler given mismatched payload".to_string(),
            ));
        };
        let mut voter = accounts.get_account(&tx.sender).map_err(storage_to_execution)?;
        if voter.voted_witnesses.contains(witness) {
            return Ok(TxOutcome::default());
        }
        let stake = voter.balance(NATIVE_SYMBOL);
        voter.voted_witnesses.insert(witness.clone());
        accounts.put_account(voter);

        let mut candidate = accounts.get_account(witness).map_err(storage_to_execution)?;
        candidate.total_vote_weight += stake;
        accounts.put_account(candidate);

        Ok(TxOutcome::default())
    }
}

struct UnvoteWitnessHandler;
impl TxHandler for UnvoteWitnessHandler {
    fn validate(
        &self,
        _accounts: &mut dyn AccountAccess,
        tx: &Transaction,
        _block_ts: i64,
    ) -> Result<(), ExecutionError> {
        match &tx.payload {
            TransactionPayload::UnvoteWitness { .. } => Ok(()),
            _ => Err(ExecutionError::ExecutorFailed(
                "unvote_witness handler given mismatched payload".to_string(),
            )),
        }
    }

    fn execute(
        &self,
        accounts: &mut dyn AccountAccess,
        tx: &Transaction,
        _block_ts: i64,
    ) -> Result<TxOutcome, ExecutionError> {
        let TransactionPayload::UnvoteWitness { witness } = &tx.payload else {
            return Err(ExecutionError::ExecutorFailed(
                "unvote_witness handler given mismatched payload".to_string(),
            ));
        };
        let mut voter = accounts.get_account(&tx.sender).map_err(storage_to_execution)?;
        if !voter.voted_witnesses.remove(witness) {
            return Ok(TxOutcome::default());
        }
        let stake = voter.balance(NATIVE_SYMBOL);
        accounts.put_account(voter);

        let mut candidate = accounts.get_account(witness).map_err(storage_to_execution)?;
        candidate.total_vote_weight = candidate.total_vote_weight.saturating_sub(stake);
        accounts.put_account(candidate);

        Ok(TxOutcome::default())
    }
}

struct SetWitnessKeyHandler;
impl TxHandler for SetWitnessKeyHandler {
    fn validate(
        &self,
        _accounts: &mut dyn AccountAccess,
        tx: &Transaction,
        _block_ts: i64,
    ) -> Result<(), ExecutionError> {
        match &tx.payload {
            TransactionPayload::SetWitnessKey { .. } => Ok(()),
            _ => Err(ExecutionError::ExecutorFailed(
                "set_witness_key handler given mismatched payload".to_string(),
            )),
        }
    }

    fn execute(
        &self,
        accounts: &mut dyn AccountAccess,
        tx: &Transaction,
        _block_ts: i64,
    ) -> Result<TxOutcome, ExecutionError> {
        let TransactionPayload::SetWitnessKey { witness_public_key } = &tx.payload else {
            return Err(ExecutionError::ExecutorFailed(
                "set_witness_key handler given mismatched payload".to_string(),
            ));
        };
        let mut account = accounts.get_account(&tx.sender).map_err(storage_to_execution)?;
        account.witness_public_key = Some(*witness_public_key);
        accounts.put_account(account);
        Ok(TxOutcome::default())
    }
}

/// Registry of `(validate, execute)` pairs keyed by [`TransactionKind`].
pub struct Dispatch {
    handlers: HashMap<TransactionKind, Box<dyn TxHandler>>,
}

impl Dispatch {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers the handlers for the four native account/stake kinds.
    /// Domain-specific kinds (token, NFT, AMM, ...) register themselves
    /// via [`Self::register`] as an external collaborator concern.
    pub fn with_builtins() -> Self {
        let mut d = Self::empty();
        d.register(TransactionKind::Transfer, Box::new(TransferHandler));
        d.register(TransactionKind::VoteWitness, Box::new(VoteWitnessHandler));
        d.register(TransactionKind::UnvoteWitness, Box::new(UnvoteWitnessHandler));
        d.register(TransactionKind::SetWitnessKey, Box::new(SetWitnessKeyHandler));
        d
    }

    pub fn register(&mut self, kind: TransactionKind, handler: Box<dyn TxHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub fn get(&self, kind: &TransactionKind) -> Option<&dyn TxHandler> {
        self.handlers.get(kind).map(|b| b.as_ref())
    }

    pub fn registered_kinds(&self) -> BTreeSet<TransactionKind> {
        self.handlers.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CompactSignature, PrivateKey};
    use crate::storage::cache::StateCache;
    use crate::storage::mem::InMemoryChainStore;
    use crate::types::TxSignature;

    fn dummy_tx(sender: &str, kind: TransactionKind, payload: TransactionPayload) -> Transaction {
        let sender = AccountName::new(sender);
        let hash = Transaction::compute_hash(&kind, &sender, &payload, 0);
        let sk = PrivateKey::generate();
        Transaction {
            hash,
            sender,
            kind,
            payload,
            ts: 0,
            anchor_ref: None,
            signature: TxSignature::Single(CompactSignature::sign(&sk, &hash)),
        }
    }

    #[test]
    fn transfer_moves_balance_between_accounts() {
        let dispatch = Dispatch::with_builtins();
        let mut cache = StateCache::new(InMemoryChainStore::new());
        let mut sandbox = cache.sandbox();

        let mut alice = sandbox.get_account(&AccountName::new("alice")).unwrap();
        alice.credit(NATIVE_SYMBOL, 100);
        sandbox.put_account(alice);

        let tx = dummy_tx(
            "alice",
            TransactionKind::Transfer,
            TransactionPayload::Transfer {
                to: AccountName::new("bob"),
                symbol: NATIVE_SYMBOL.to_string(),
                amount: 40,
            },
        );

        let handler = dispatch.get(&TransactionKind::Transfer).unwrap();
        handler.validate(&mut sandbox, &tx, 0).unwrap();
        handler.execute(&mut sandbox, &tx, 0).unwrap();
        sandbox.commit();

        assert_eq!(cache.get_account(&AccountName::new("alice")).unwrap().balance(NATIVE_SYMBOL), 60);
        assert_eq!(cache.get_account(&AccountName::new("bob")).unwrap().balance(NATIVE_SYMBOL), 40);
    }

    #[test]
    fn transfer_validate_rejects_insufficient_balance() {
        let dispatch = Dispatch::with_builtins();
        let mut cache = StateCache::new(InMemoryChainStore::new());
        let mut sandbox = cache.sandbox();

        let tx = dummy_tx(
            "alice",
            TransactionKind::Transfer,
            TransactionPayload::Transfer {
                to: AccountName::new("bob"),
                symbol: NATIVE_SYMBOL.to_string(),
                amount: 40,
            },
        );

        let handler = dispatch.get(&TransactionKind::Transfer).unwrap();
        assert!(handler.validate(&mut sandbox, &tx, 0).is_err());
    }

    #[test]
    fn vote_witness_transfers_stake_weight() {
        let dispatch = Dispatch::with_builtins();
        let mut cache = StateCache::new(InMemoryChainStore::new());
        let mut sandbox = cache.sandbox();

        let mut alice = sandbox.get_account(&AccountName::new("alice")).unwrap();
        alice.credit(NATIVE_SYMBOL, 500);
        sandbox.put_account(alice);

        let tx = dummy_tx(
            "alice",
            TransactionKind::VoteWitness,
            TransactionPayload::VoteWitness {
                witness: AccountName::new("w1"),
            },
        );
        let handler = dispatch.get(&TransactionKind::VoteWitness).unwrap();
        handler.execute(&mut sandbox, &tx, 0).unwrap();
        sandbox.commit();

        assert_eq!(
            cache.get_account(&AccountName::new("w1")).unwrap().total_vote_weight,
            500
        );
    }
}
