// core/src/types/account.rs

//! Account state and the weight-threshold authorization model (§3, §4.4).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;

use super::{AccountName, TransactionKind};

/// An additional key bound to an account, permitted for a set of
/// transaction kinds at a given weight (§4.4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyAuth {
    pub public_key: PublicKey,
    pub weight: u32,
    /// Transaction kinds this key may sign for. An empty set means "any
    /// kind", matching the primary key's implicit authority.
    pub permitted_kinds: BTreeSet<TransactionKind>,
}

/// Authority delegated from another account's key, bound to an id (§4.4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyDelegation {
    pub from: AccountName,
    pub public_key: PublicKey,
    pub weight: u32,
    pub permitted_kinds: BTreeSet<TransactionKind>,
}

/// Account state (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub name: AccountName,
    /// Token symbol -> balance, in integer native units.
    pub balances: BTreeMap<String, u64>,
    /// Block-signing key, distinct from any transaction-signing key.
    pub witness_public_key: Option<PublicKey>,
    /// Primary transaction-signing key and its weight (§4.4). Unrelated to
    /// `witness_public_key`: a witness's block-signing key carries no
    /// authority over that witness's own transactions.
    pub primary_key: Option<(PublicKey, u32)>,
    /// Sum of stake delegated toward this account as a witness candidate.
    pub total_vote_weight: u64,
    pub voted_witnesses: BTreeSet<AccountName>,
    /// Additional keys declared by this account, beyond its primary.
    pub additional_keys: Vec<KeyAuth>,
    /// Authority delegated from other accounts' keys.
    pub delegations: Vec<KeyDelegation>,
    /// Per-kind signature weight thresholds; `None` falls back to
    /// `thresholds.default`, then 1 (§4.4).
    pub thresholds: BTreeMap<TransactionKind, u32>,
    pub default_threshold: u32,
    /// Anti-replay nonce, strictly increasing per accepted transaction.
    pub nonce: u64,
}

impl Account {
    /// Creates a fresh, zero-balance account stub (§4.3 pre-pass).
    pub fn new_stub(name: AccountName) -> Self {
        Account {
            name,
            balances: BTreeMap::new(),
            witness_public_key: None,
            primary_key: None,
            total_vote_weight: 0,
            voted_witnesses: BTreeSet::new(),
            additional_keys: Vec::new(),
            delegations: Vec::new(),
            thresholds: BTreeMap::new(),
            default_threshold: 1,
            nonce: 0,
        }
    }

    pub fn balance(&self, symbol: &str) -> u64 {
        self.balances.get(symbol).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, symbol: &str, amount: u64) {
        *self.balances.entry(symbol.to_string()).or_insert(0) += amount;
    }

    /// Debits `amount` of `symbol`, failing if the balance would go negative.
    pub fn debit(&mut self, symbol: &str, amount: u64) -> Result<(), InsufficientBalance> {
        let balance = self.balances.entry(symbol.to_string()).or_insert(0);
        if *balance < amount {
            return Err(InsufficientBalance {
                symbol: symbol.to_string(),
                balance: *balance,
                requested: amount,
            });
        }
        *balance -= amount;
        Ok(())
    }

    /// Returns the signature threshold required for `kind` (§4.4).
    pub fn threshold_for(&self, kind: &TransactionKind) -> u32 {
        self.thresholds
            .get(kind)
            .copied()
            .unwrap_or(self.default_threshold)
    }

    /// All `(public_key, weight)` pairs allowed to sign for `kind`,
    /// primary key first, then additional keys, then delegations from
    /// other accounts — the order single-signature verification iterates
    /// in (§4.4).
    pub fn allowed_signers(&self, kind: &TransactionKind) -> Vec<(PublicKey, u32)> {
        let mut out = Vec::new();
        if let Some((primary, weight)) = &self.primary_key {
            out.push((*primary, *weight));
        }
        for key in &self.additional_keys {
            if key.permitted_kinds.is_empty() || key.permitted_kinds.contains(kind) {
                out.push((key.public_key, key.weight));
            }
        }
        for deleg in &self.delegations {
            if deleg.permitted_kinds.is_empty() || deleg.permitted_kinds.contains(kind) {
                out.push((deleg.public_key, deleg.weight));
            }
        }
        out
    }
}

#[derive(Debug, thiserror::Error)]
#[error("insufficient balance of {symbol}: have {balance}, need {requested}")]
pub struct InsufficientBalance {
    pub symbol: String,
    pub balance: u64,
    pub requested: u64,
}
