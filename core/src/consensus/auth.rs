//! Weight-threshold signature authorization (§4.4).

use std::collections::HashSet;

use crate::crypto::{Hash256, PublicKey};
use crate::types::{Account, TransactionKind, TxSignature};

/// Verifies `signature` over `hash` authorizes `kind` for `account`.
///
/// Single signature: iterate `account.allowed_signers(kind)` in order; the
/// first verifying pair whose weight meets the threshold accepts.
///
/// Multisig: recover each component's public key, reject duplicate
/// recovered keys, and sum the weights of the ones that match an allowed
/// signer; accept once the sum meets the threshold.
pub fn verify_tx_authority(
    account: &Account,
    kind: &TransactionKind,
    hash: &Hash256,
    signature: &TxSignature,
) -> bool {
    let threshold = account.threshold_for(kind);
    let allowed = account.allowed_signers(kind);

    match signature {
        TxSignature::Single(sig) => allowed
            .iter()
            .any(|(pk, weight)| *weight >= threshold && sig.verify(hash, pk)),
        TxSignature::Multi(multi) => {
            let mut seen: HashSet<[u8; 33]> = HashSet::new();
            let mut total_weight = 0u32;
            for component in &multi.0 {
                let Ok(recovered) = component.recover(hash) else {
                    continue;
                };
                if !seen.insert(recovered.to_compressed_bytes()) {
                    continue;
                }
                if let Some((_, weight)) = allowed
                    .iter()
                    .find(|(pk, _)| signer_matches(pk, &recovered))
                {
                    total_weight += weight;
                }
            }
            total_weight >= threshold
        }
    }
}

fn signer_matches(allowed: &PublicKey, recovered: &PublicKey) -> bool {
    allowed == recovered
}

/// Verifies a block signature: only the witness's current block-signing
/// key is accepted, with no key delegation (§4.4).
pub fn verify_block_authority(
    witness_account: &Account,
    hash: &Hash256,
    signature: &crate::crypto::CompactSignature,
) -> bool {
    match &witness_account.witness_public_key {
        Some(pk) => signature.verify(hash, pk),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CompactSignature, MultiSignature, PrivateKey};
    use crate::types::AccountName;

    #[test]
    fn single_signature_accepts_primary_key() {
        let sk = PrivateKey::generate();
        let mut account = Account::new_stub(AccountName::new("alice"));
        account.primary_key = Some((sk.public_key(), 1));
        account.default_threshold = 1;

        let hash = Hash256::compute(b"payload");
        let sig = TxSignature::Single(CompactSignature::sign(&sk, &hash));

        assert!(verify_tx_authority(
            &account,
            &TransactionKind::Transfer,
            &hash,
            &sig
        ));
    }

    #[test]
    fn single_signature_rejects_unlisted_key() {
        let sk = PrivateKey::generate();
        let other = PrivateKey::generate();
        let mut account = Account::new_stub(AccountName::new("alice"));
        account.primary_key = Some((sk.public_key(), 1));

        let hash = Hash256::compute(b"payload");
        let sig = TxSignature::Single(CompactSignature::sign(&other, &hash));

        assert!(!verify_tx_authority(
            &account,
            &TransactionKind::Transfer,
            &hash,
            &sig
        ));
    }

    #[test]
    fn witness_key_alone_grants_no_transaction_authority() {
        let sk = PrivateKey::generate();
        let mut account = Account::new_stub(AccountName::new("alice"));
        account.witness_public_key = Some(sk.public_key());
        account.default_threshold = 1;

        let hash = Hash256::compute(b"payload");
        let sig = TxSignature::Single(CompactSignature::sign(&sk, &hash));

        assert!(!verify_tx_authority(
            &account,
            &TransactionKind::Transfer,
            &hash,
            &sig
        ));
    }

    #[test]
    fn multisig_sums_weights_to_reach_threshold() {
        use crate::types::account::KeyAuth;
        use std::collections::BTreeSet;

        let sk1 = PrivateKey::generate();
        let sk2 = PrivateKey::generate();

        let mut account = Account::new_stub(AccountName::new("multisig-acct"));
        account.default_threshold = 3;
        account.additional_keys.push(KeyAuth {
            public_key: sk1.public_key(),
            weight: 2,
            permitted_kinds: BTreeSet::new(),
        });
        account.additional_keys.push(KeyAuth {
            public_key: sk2.public_key(),
            weight: 2,
            permitted_kinds: BTreeSet::new(),
        });

        let hash = Hash256::compute(b"payload");
        let multi = MultiSignature(vec![
            CompactSignature::sign(&sk1, &hash),
            CompactSignature::sign(&sk2, &hash),
        ]);
        let sig = TxSignature::Multi(multi);

        assert!(verify_tx_authority(
            &account,
            &TransactionKind::Transfer,
            &hash,
            &sig
        ));
    }

    #[test]
    fn multisig_rejects_duplicate_components() {
        use crate::types::account::KeyAuth;
        use std::collections::BTreeSet;

        let sk1 = PrivateKey::generate();
        let mut account = Account::new_stub(AccountName::new("multisig-acct"));
        account.default_threshold = 4;
        account.additional_keys.push(KeyAuth {
            public_key: sk1.public_key(),
            weight: 2,
            permitted_kinds: BTreeSet::new(),
        });

        let hash = Hash256::compute(b"payload");
        let sig_component = CompactSignature::sign(&sk1, &hash);
        let multi = MultiSignature(vec![sig_component.clone(), sig_component]);
        let sig = TxSignature::Multi(multi);

        assert!(!verify_tx_authority(
            &account,
            &TransactionKind::Transfer,
            &hash,
            &sig
        ));
    }
}
