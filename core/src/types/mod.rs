//! Core domain types shared across the sidechain core.
//!
//! This module defines strongly-typed account, transaction, block, and
//! witness-schedule types, avoiding "naked" strings/byte buffers in public
//! APIs in favor of domain-specific newtypes.

pub mod account;
pub mod block;
pub mod schedule;
pub mod tx;

pub use account::{Account, KeyAuth, KeyDelegation};
pub use block::{Block, BlockHash, HashMode};
pub use schedule::WitnessSchedule;
pub use tx::{AnchorRef, Transaction, TransactionKind, TransactionPayload, TxSignature};

use serde::{Deserialize, Serialize};

/// Lowercase, unique account identifier (§3 Account).
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct AccountName(String);

impl AccountName {
    /// Constructs an `AccountName`, lower-casing the input so that two
    /// differently-cased spellings of the same name never diverge.
    pub fn new(name: impl Into<String>) -> Self {
        AccountName(name.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccountName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for AccountName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountName {
    fn from(s: &str) -> Self {
        AccountName::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_name_lowercases() {
        let a = AccountName::new("Witness-One");
        assert_eq!(a.as_str(), "witness-one");
    }

    #[test]
    fn account_names_compare_case_insensitively() {
        let a = AccountName::new("Alice");
        let b = AccountName::new("alice");
        assert_eq!(a, b);
    }
}
