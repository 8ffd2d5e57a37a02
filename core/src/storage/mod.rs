//! Storage backends for the sidechain core.
//!
//! This module provides concrete implementations of
//! [`crate::consensus::store::ChainStore`]:
//!
//! - an in-memory store ([`mem::InMemoryChainStore`]) for tests and the
//!   rebuild engine's scratch state,
//! - a RocksDB-backed store ([`rocksdb::RocksDbChainStore`]) for persistent
//!   nodes,
//!
//! plus the write-through cache and per-block rollback sandbox ([`cache`])
//! that execution runs against exclusively (§4.9).

pub mod cache;
pub mod mem;
pub mod rocksdb;

pub use cache::{CacheSandbox, StateCache};
pub use mem::InMemoryChainStore;
pub use rocksdb::{RocksDbChainStore, RocksDbConfig};
