//! secp256k1 keypairs, base58-encoded.

use secp256k1::{PublicKey as Secp256k1PublicKey, SecretKey};
use serde::{Deserialize, Serialize};

use super::base58;
use super::sign::CryptoError;

/// A secp256k1 private (signing) key.
///
/// Never serialized; only ever used to produce signatures via
/// [`super::sign`].
#[derive(Clone)]
pub struct PrivateKey(SecretKey);

impl PrivateKey {
    /// Generates a new random private key.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let (secret, _public) = secp256k1::generate_keypair(&mut rng);
        PrivateKey(secret)
    }

    /// Constructs a private key from raw secret bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        SecretKey::from_slice(bytes)
            .map(PrivateKey)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Derives the corresponding compressed public key.
    pub fn public_key(&self) -> PublicKey {
        let secp = secp256k1::Secp256k1::new();
        PublicKey(Secp256k1PublicKey::from_secret_key(&secp, &self.0))
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.0
    }
}

/// A compressed secp256k1 public key, base58-encoded for external display.
///
/// This is the type stored on [`crate::types::Account::witness_public_key`]
/// and referenced by transaction/block signatures.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct PublicKey(Secp256k1PublicKey);

impl PublicKey {
    pub fn from_compressed_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Secp256k1PublicKey::from_slice(bytes)
            .map(PublicKey)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    pub fn to_compressed_bytes(&self) -> [u8; 33] {
        self.0.serialize()
    }

    pub fn to_base58(&self) -> String {
        base58::encode(&self.to_compressed_bytes())
    }

    pub fn from_base58(s: &str) -> Result<Self, CryptoError> {
        let bytes = base58::decode(s).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Self::from_compressed_bytes(&bytes)
    }

    pub(crate) fn inner(&self) -> &Secp256k1PublicKey {
        &self.0
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.to_base58())
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_base58(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base58_roundtrip_preserves_key() {
        let sk = PrivateKey::generate();
        let pk = sk.public_key();
        let encoded = pk.to_base58();
        let decoded = PublicKey::from_base58(&encoded).unwrap();
        assert_eq!(pk, decoded);
    }

    #[test]
    fn derivation_is_deterministic() {
        let sk = PrivateKey::generate();
        let pk1 = sk.public_key();
        let pk2 = sk.public_key();
        assert_eq!(pk1, pk2);
    }
}
