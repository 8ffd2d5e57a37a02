// core/src/types/tx.rs

//! Transaction types.
//!
//! A [`Transaction`] couples a tagged payload with the bookkeeping fields
//! needed for mempool ordering, expiry, and anchor-chain provenance. The
//! built-in native kinds cover account/stake management; anything else is
//! dispatched by name through [`crate::dispatch`] without this module
//! needing to know about it.

use serde::{Deserialize, Serialize};

use crate::crypto::{CompactSignature, Hash256, MultiSignature};

use super::AccountName;

/// Reference to the anchor-chain operation a transaction originated from,
/// parsed from the wire form `"<anchor_block>:<op_index>"` (§3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AnchorRef {
    pub anchor_block: u64,
    pub op_index: u32,
}

impl std::fmt::Display for AnchorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.anchor_block, self.op_index)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid anchor ref {0:?}: expected \"<anchor_block>:<op_index>\"")]
pub struct AnchorRefParseError(String);

impl std::str::FromStr for AnchorRef {
    type Err = AnchorRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (block, op) = s
            .split_once(':')
            .ok_or_else(|| AnchorRefParseError(s.to_string()))?;
        let anchor_block = block
            .parse()
            .map_err(|_| AnchorRefParseError(s.to_string()))?;
        let op_index = op.parse().map_err(|_| AnchorRefParseError(s.to_string()))?;
        Ok(AnchorRef {
            anchor_block,
            op_index,
        })
    }
}

/// Discriminant for the kind of a transaction (§3 `kind`).
///
/// The built-in variants are the account/stake operations this core
/// understands natively; `Custom` covers any domain-specific kind that is
/// dispatched by name rather than hard-coded here.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Transfer,
    VoteWitness,
    UnvoteWitness,
    SetWitnessKey,
    Custom(String),
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Transfer => write!(f, "transfer"),
            TransactionKind::VoteWitness => write!(f, "vote_witness"),
            TransactionKind::UnvoteWitness => write!(f, "unvote_witness"),
            TransactionKind::SetWitnessKey => write!(f, "set_witness_key"),
            TransactionKind::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Kind-specific payload, one variant per built-in [`TransactionKind`].
///
/// `Custom` kinds carry their payload as opaque JSON, decoded by whatever
/// handler is registered for that kind name in [`crate::dispatch`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TransactionPayload {
    Transfer {
        to: AccountName,
        symbol: String,
        amount: u64,
    },
    VoteWitness {
        witness: AccountName,
    },
    UnvoteWitness {
        witness: AccountName,
    },
    SetWitnessKey {
        witness_public_key: crate::crypto::PublicKey,
    },
    Custom(serde_json::Value),
}

/// Signature over a transaction, either a single key or a weighted
/// multisig payload (§4.4).
#[derive(Clone, Serialize, Deserialize)]
pub enum TxSignature {
    Single(CompactSignature),
    Multi(MultiSignature),
}

/// A transaction (§3).
#[derive(Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Content-derived hash, deterministic over `(kind, sender, payload, ts)`.
    pub hash: Hash256,
    pub sender: AccountName,
    pub kind: TransactionKind,
    pub payload: TransactionPayload,
    /// Milliseconds since epoch; used for mempool ordering and expiry.
    pub ts: i64,
    /// Set when this transaction originated from the anchor chain.
    pub anchor_ref: Option<AnchorRef>,
    pub signature: TxSignature,
}

impl Transaction {
    /// Computes the content hash a transaction should carry, over
    /// `(kind, sender, payload, ts)` — deliberately excluding `signature`
    /// and `hash` itself, and `anchor_ref` (provenance, not content).
    pub fn compute_hash(
        kind: &TransactionKind,
        sender: &AccountName,
        payload: &TransactionPayload,
        ts: i64,
    ) -> Hash256 {
        #[derive(Serialize)]
        struct Unsigned<'a> {
            kind: &'a TransactionKind,
            sender: &'a AccountName,
            payload: &'a TransactionPayload,
            ts: i64,
        }
        let cfg = bincode::config::standard();
        let bytes = bincode::serde::encode_to_vec(
            &Unsigned {
                kind,
                sender,
                payload,
                ts,
            },
            cfg,
        )
        .expect("transaction fields should always be serializable with bincode 2 + serde");
        Hash256::compute(&bytes)
    }

    /// Returns whether the carried `hash` matches a freshly recomputed one.
    pub fn hash_is_valid(&self) -> bool {
        self.hash == Self::compute_hash(&self.kind, &self.sender, &self.payload, self.ts)
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("hash", &self.hash)
            .field("sender", &self.sender)
            .field("kind", &self.kind)
            .field("ts", &self.ts)
            .field("anchor_ref", &self.anchor_ref)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_ref_roundtrips_through_display_and_fromstr() {
        let r = AnchorRef {
            anchor_block: 12_345,
            op_index: 3,
        };
        let s = r.to_string();
        let parsed: AnchorRef = s.parse().unwrap();
        assert_eq!(r, parsed);
    }

    #[test]
    fn anchor_ref_rejects_malformed_input() {
        assert!("not-a-ref".parse::<AnchorRef>().is_err());
        assert!("12:".parse::<AnchorRef>().is_err());
    }

    #[test]
    fn hash_excludes_signature_and_anchor_ref() {
        let payload = TransactionPayload::Transfer {
            to: AccountName::new("bob"),
            symbol: "MEE".to_string(),
            amount: 100,
        };
        let sender = AccountName::new("alice");
        let h1 = Transaction::compute_hash(&TransactionKind::Transfer, &sender, &payload, 1000);
        let h2 = Transaction::compute_hash(&TransactionKind::Transfer, &sender, &payload, 1000);
        assert_eq!(h1, h2);
    }

    #[test]
    fn hash_changes_with_timestamp() {
        let payload = TransactionPayload::Transfer {
            to: AccountName::new("bob"),
            symbol: "MEE".to_string(),
            amount: 100,
        };
        let sender = AccountName::new("alice");
        let h1 = Transaction::compute_hash(&TransactionKind::Transfer, &sender, &payload, 1000);
        let h2 = Transaction::compute_hash(&TransactionKind::Transfer, &sender, &payload, 1001);
        assert_ne!(h1, h2);
    }
}
