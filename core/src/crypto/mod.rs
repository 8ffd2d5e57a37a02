//! Crypto primitives for the sidechain core.
//!
//! This module provides:
//!
//! - SHA-256 content hashing ([`hash::Hash256`]),
//! - secp256k1 ECDSA keypairs, signing, and recovery ([`keys`], [`sign`]),
//! - base58 encoding for signatures and public keys ([`base58`]).
//!
//! Higher-level code (types, validation, consensus) only ever sees the
//! newtypes defined here, never raw byte buffers or a specific crypto
//! crate's types.

pub mod base58;
pub mod hash;
pub mod keys;
pub mod sign;

pub use hash::{HASH_LEN, Hash256};
pub use keys::{PrivateKey, PublicKey};
pub use sign::{CompactSignature, CryptoError, MultiSignature, SigComponent};
