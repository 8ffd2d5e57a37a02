//! Top-level configuration for a sidechain node.
//!
//! This module aggregates configuration for:
//!
//! - consensus parameters (`ConsensusConfig`),
//! - storage (RocksDB path and creation flags),
//! - anchor-chain ingestion (`AnchorConfig`),
//! - the canonical block-hashing mode (`HashMode`),
//! - Prometheus metrics exporter (enable flag + listen address).
//!
//! The goal is to have a single `NodeConfig` struct that higher-level
//! binaries (e.g. `main.rs`) can construct from defaults, config files, or
//! environment variables as needed.

use std::net::SocketAddr;

use crate::anchor::AnchorConfig;
use crate::consensus::ConsensusConfig;
use crate::storage::RocksDbConfig;
use crate::types::HashMode;

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration for a sidechain node.
///
/// This aggregates all the sub-configs needed to wire up a typical node:
///
/// - consensus tuning (`consensus`),
/// - persistent storage (`storage`),
/// - anchor-chain ingestion (`anchor`),
/// - which block-hash encoding this node uses (`hash_mode`),
/// - Prometheus metrics exporter (`metrics`).
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub consensus: ConsensusConfig,
    pub storage: RocksDbConfig,
    pub anchor: AnchorConfig,
    pub hash_mode: HashMode,
    pub metrics: MetricsConfig,
    /// Run as a non-producing observer: receive and validate blocks, never
    /// enter the production/coordination path.
    pub observer: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            consensus: ConsensusConfig::default(),
            storage: RocksDbConfig::default(),
            anchor: AnchorConfig::default(),
            hash_mode: HashMode::Canonical,
            metrics: MetricsConfig::default(),
            observer: false,
        }
    }
}
