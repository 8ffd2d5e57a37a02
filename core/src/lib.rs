//! Sidechain core crate.
//!
//! This crate provides the core building blocks for a delegated-proof-of-
//! stake sidechain that mirrors an anchor chain:
//!
//! - strongly-typed domain types (`types`),
//! - cryptographic primitives (`crypto`),
//! - the consensus layer: scheduling, the staged validator, the block
//!   producer, and per-height coordination (`consensus`),
//! - the deterministic transaction dispatch/execution pipeline
//!   (`dispatch`, `execution`),
//! - the mempool (`mempool`),
//! - the anchor-chain ingester (`anchor`),
//! - the sync controller (`sync`),
//! - the boot-time replay engine (`rebuild`),
//! - storage backends (`storage`),
//! - the peer wire protocol (`network`),
//! - Prometheus-based metrics (`metrics`),
//! - top-level node configuration (`config`),
//! - and the owning node context that wires all of the above together
//!   (`node`).

pub mod anchor;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod dispatch;
pub mod execution;
pub mod mempool;
pub mod metrics;
pub mod network;
pub mod node;
pub mod rebuild;
pub mod storage;
pub mod sync;
pub mod types;

// Re-export top-level configuration types.
pub use config::{MetricsConfig, NodeConfig};

// Re-export "core" consensus types and traits.
pub use consensus::{
    AnchorCheck, AnchorError, BlockExecutionError, BlockExecutor, BlockValidator, ChainStore,
    ConsensusConfig, ConsensusError, Coordinator, Eligibility, ExecutionError, ExecutionTotals,
    Producer, StorageError, TxSource, ValidationContext, ValidationError, WitnessIdentity,
};

// Re-export storage backends.
pub use storage::{CacheSandbox, InMemoryChainStore, RocksDbChainStore, RocksDbConfig, StateCache};

// Re-export mempool, dispatch, execution, anchor, sync, rebuild, and network.
pub use anchor::{AnchorBlock, AnchorConfig, AnchorIngester, AnchorOp, AnchorSource};
pub use dispatch::{Dispatch, TxHandler, TxOutcome, NATIVE_SYMBOL};
pub use execution::{ExecutionConfig, ExecutionPipeline};
pub use mempool::Mempool;
pub use network::{PeerMessage, SyncStatusMessage};
pub use rebuild::{RebuildConfig, RebuildEngine, RebuildReport};
pub use sync::{PeerStatus, SyncConfig, SyncController, SyncState};

// Re-export the node context.
pub use node::NodeContext;

// Re-export metrics registry and consensus metrics.
pub use metrics::{ConsensusMetrics, MetricsRegistry, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;
