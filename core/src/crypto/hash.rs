//! SHA-256 content hashing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length in bytes of all 256-bit hashes used in this crate.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit SHA-256 hash.
///
/// Used as the backing representation of block hashes, transaction
/// hashes, and anchor-chain content hashes.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes the SHA-256 digest of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let digest = hasher.finalize();
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&digest);
        Hash256(out)
    }

    /// Chains multiple byte slices into a single SHA-256 digest without
    /// an intermediate allocation, matching the legacy "concatenate
    /// fields then hash" serialization mode (§6 serialization mode 1).
    pub fn compute_concat(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        let digest = hasher.finalize();
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&digest);
        Hash256(out)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != HASH_LEN {
            // hex::FromHexError has no "wrong length" variant that fits a
            // generic byte buffer, so surface via OddLength/InvalidStringLength
            // is misleading; callers should prefer `try_from_hex`.
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&bytes);
        Ok(Hash256(out))
    }

    /// Returns the last `k` hex characters of this hash, as used by the
    /// witness-shuffle RNG seed (§4.5 step 3).
    pub fn last_hex_chars(&self, k: usize) -> String {
        let full = self.to_hex();
        let start = full.len().saturating_sub(k);
        full[start..].to_string()
    }
}

impl std::fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_is_deterministic() {
        let a = Hash256::compute(b"hello");
        let b = Hash256::compute(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn compute_concat_matches_manual_concatenation() {
        let concat = Hash256::compute(b"foobar");
        let chained = Hash256::compute_concat(&[b"foo", b"bar"]);
        assert_eq!(concat, chained);
    }

    #[test]
    fn hex_roundtrip() {
        let h = Hash256::compute(b"roundtrip");
        let hex = h.to_hex();
        let back = Hash256::from_hex(&hex).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn last_hex_chars_takes_suffix() {
        let h = Hash256([0xAB; HASH_LEN]);
        let suffix = h.last_hex_chars(4);
        assert_eq!(suffix, "abab");
    }
}
