//! secp256k1 ECDSA signing, verification, and public-key recovery.
//!
//! Signatures are always over a [`Hash256`] message digest, never over raw
//! payload bytes: callers must hash first (block hashes already are a
//! hash; transaction signing hashes the canonical transaction encoding).

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, Secp256k1};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::base58;
use super::hash::Hash256;
use super::keys::{PrivateKey, PublicKey};

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("signature recovery failed: {0}")]
    RecoveryFailed(String),
}

fn message_from_hash(hash: &Hash256) -> Message {
    // `Hash256` is always a 32-byte digest, so this cannot fail.
    Message::from_digest(*hash.as_bytes())
}

/// A compact (64-byte r||s) secp256k1 ECDSA signature plus its recovery id,
/// base58-encoded for wire/storage display per §6.
#[derive(Clone, Serialize, Deserialize)]
pub struct CompactSignature {
    #[serde(with = "base58_bytes")]
    bytes: Vec<u8>,
    recovery_id: u8,
}

mod base58_bytes {
    use super::base58;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base58::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base58::decode(&s).map_err(serde::de::Error::custom)
    }
}

impl CompactSignature {
    /// Signs `hash` with `key`, producing a recoverable compact signature.
    pub fn sign(key: &PrivateKey, hash: &Hash256) -> Self {
        let secp = Secp256k1::new();
        let msg = message_from_hash(hash);
        let sig = secp.sign_ecdsa_recoverable(&msg, key.secret());
        let (recovery_id, bytes) = sig.serialize_compact();
        CompactSignature {
            bytes: bytes.to_vec(),
            recovery_id: recovery_id.to_i32() as u8,
        }
    }

    /// Recovers the public key that produced this signature over `hash`.
    pub fn recover(&self, hash: &Hash256) -> Result<PublicKey, CryptoError> {
        let secp = Secp256k1::new();
        let msg = message_from_hash(hash);
        let recovery_id = RecoveryId::try_from(self.recovery_id as i32)
            .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;
        let mut arr = [0u8; 64];
        arr.copy_from_slice(&self.bytes);
        let sig = RecoverableSignature::from_compact(&arr, recovery_id)
            .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;
        let pubkey = secp
            .recover_ecdsa(&msg, &sig)
            .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;
        Ok(PublicKey::from_compressed_bytes(&pubkey.serialize())?)
    }

    /// Verifies this signature was produced by `expected` over `hash`.
    ///
    /// This is recovery-based: it recovers whichever key signed and
    /// compares against `expected`, matching the wire convention in §4.4
    /// (signatures do not separately carry the signer's key).
    pub fn verify(&self, hash: &Hash256, expected: &PublicKey) -> bool {
        match self.recover(hash) {
            Ok(recovered) => recovered == *expected,
            Err(_) => false,
        }
    }

    pub fn to_base58(&self) -> String {
        let mut buf = self.bytes.clone();
        buf.push(self.recovery_id);
        base58::encode(&buf)
    }

    pub fn from_base58(s: &str) -> Result<Self, CryptoError> {
        let buf = base58::decode(s).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        if buf.len() != 65 {
            return Err(CryptoError::InvalidSignature(
                "expected 65 bytes (64-byte compact sig + recovery id)".to_string(),
            ));
        }
        let (bytes, recovery_id) = buf.split_at(64);
        Ok(CompactSignature {
            bytes: bytes.to_vec(),
            recovery_id: recovery_id[0],
        })
    }
}

/// One entry in a multisig payload: a signature plus its recovery id,
/// exactly as described in §4.4 ("array of `(sig, recovery_id)`").
pub type SigComponent = CompactSignature;

/// A multisig payload: an array of `(sig, recovery_id)` pairs.
///
/// Verification against a weighted key set lives in
/// [`crate::consensus::auth`], since it needs access to the account's
/// permission model; this type is just the wire representation.
#[derive(Clone, Serialize, Deserialize)]
pub struct MultiSignature(pub Vec<SigComponent>);
