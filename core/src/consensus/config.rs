//! Consensus tuning parameters (§6 "Configuration (recognized knobs)").

use std::time::Duration;

/// Consensus configuration parameters.
///
/// This includes protocol-level knobs (committee size, block cadence) and
/// implementation-level limits (batch sizes, retry/backoff caps).
#[derive(Clone, Debug)]
pub struct ConsensusConfig {
    /// Witness committee size.
    pub witnesses: usize,
    /// Target block time outside sync mode.
    pub block_time: Duration,
    /// Target block time while in sync mode (shorter).
    pub sync_block_time: Duration,
    pub max_tx_per_block: usize,
    /// Number of coordinator rounds before a height is considered stalled.
    pub consensus_rounds: u32,
    /// Number of hex chars of the seed hash used to derive the shuffle RNG.
    pub witness_shuffle_precision: usize,
    /// Native units credited to the block witness per block.
    pub witness_reward: u64,
    /// Account periodic decay-burns draw from.
    pub burn_account: String,
    /// Interval, in blocks, of the periodic decay-burn.
    pub eco_blocks: u64,
    /// Max age, in ms, a transaction may sit in the mempool before expiring.
    pub tx_expiration_time: i64,
    /// Base allowed clock drift for block timing checks.
    pub max_drift: i64,
    pub max_batch_blocks: usize,
    pub max_retry_delay: Duration,
    pub circuit_breaker_threshold: u32,
    pub sync_entry_quorum_percent: u8,
    pub sync_exit_quorum_percent: u8,
    pub min_witnesses_for_quorum: usize,
    /// Peer status entries older than this are ignored; `4 *` this are pruned.
    pub height_expiry: Duration,
    /// "Behind" threshold (in anchor blocks) used by the sync controller.
    pub steem_block_delay_threshold: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            witnesses: 21,
            block_time: Duration::from_secs(3),
            sync_block_time: Duration::from_millis(500),
            max_tx_per_block: 200,
            consensus_rounds: 3,
            witness_shuffle_precision: 8,
            witness_reward: 1_000,
            burn_account: "null".to_string(),
            eco_blocks: 28_800,
            tx_expiration_time: 60_000,
            max_drift: 1_500,
            max_batch_blocks: 100,
            max_retry_delay: Duration::from_secs(30),
            circuit_breaker_threshold: 5,
            sync_entry_quorum_percent: 50,
            sync_exit_quorum_percent: 60,
            min_witnesses_for_quorum: 1,
            height_expiry: Duration::from_secs(60),
            steem_block_delay_threshold: 10,
        }
    }
}
