//! Consensus layer: scheduling, validation, production, and coordination.
//!
//! This module provides:
//!
//! - configuration parameters ([`config::ConsensusConfig`]),
//! - the weight-threshold signature authority model ([`auth`]),
//! - witness schedule derivation ([`schedule`]),
//! - the staged block validator ([`validator::BlockValidator`]),
//! - the block producer ([`proposer::Producer`]),
//! - per-height candidate tracking ([`coordinator::Coordinator`]),
//! - and the storage abstraction consensus depends on ([`store::ChainStore`]).

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod proposer;
pub mod schedule;
pub mod store;
pub mod validator;

pub use config::ConsensusConfig;
pub use coordinator::Coordinator;
pub use error::{
    AnchorError, BlockExecutionError, ConsensusError, ExecutionError, StorageError, ValidationError,
};
pub use proposer::{Eligibility, Producer, TxSource, WitnessIdentity};
pub use store::ChainStore;
pub use validator::{AnchorCheck, BlockExecutor, BlockValidator, ExecutionTotals, ValidationContext};
