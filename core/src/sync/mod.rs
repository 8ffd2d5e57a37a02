//! Sync controller and network status aggregation (§4.7).
//!
//! Transitions between `Normal` and `Syncing` are quorum-driven from
//! peer-reported status, with a local override when critically behind.
//! The controller does not itself decide block cadence or timing drift;
//! it only tracks state and exposes it for the producer/validator to
//! consult (`sync_mode`, `blocks_since_sync_exit` style callers).

use std::collections::HashMap;
use std::time::Duration;

use tracing::info;

/// One peer's self-reported sync status (§4.7, §6 `SyncStatus`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerStatus {
    pub node_id: String,
    pub behind_blocks: u64,
    pub anchor_block: u64,
    pub is_syncing: bool,
    pub head_block_id: String,
    /// Milliseconds since epoch this status was recorded.
    pub timestamp: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Normal,
    Syncing,
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub block_delay_threshold: u64,
    pub entry_quorum_percent: u8,
    pub exit_quorum_percent: u8,
    pub min_witnesses_for_quorum: usize,
    pub height_expiry: Duration,
}

/// Aggregates peer sync statuses and decides `Normal` <-> `Syncing`
/// transitions (§4.7).
pub struct SyncController {
    config: SyncConfig,
    state: SyncState,
    peers: HashMap<String, PeerStatus>,
    active_witnesses: std::collections::HashSet<String>,
    last_sync_exit_at: Option<i64>,
}

/// Length of the lenient-timing grace window after exiting sync mode.
const GRACE_WINDOW: Duration = Duration::from_secs(120);

impl SyncController {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            state: SyncState::Normal,
            peers: HashMap::new(),
            active_witnesses: std::collections::HashSet::new(),
            last_sync_exit_at: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_syncing(&self) -> bool {
        self.state == SyncState::Syncing
    }

    /// Declares the current witness committee, used to prefer witness
    /// reports over arbitrary peers when enough are present (§4.7
    /// "preferring active witnesses when enough are reporting").
    pub fn set_active_witnesses(&mut self, names: impl IntoIterator<Item = String>) {
        self.active_witnesses = names.into_iter().collect();
    }

    pub fn record_peer_status(&mut self, status: PeerStatus) {
        self.peers.insert(status.node_id.clone(), status);
    }

    /// Drops statuses older than `4 * height_expiry` (§4.7).
    pub fn prune_stale(&mut self, now_ms: i64) {
        let max_age = 4 * self.config.height_expiry.as_millis() as i64;
        self.peers.retain(|_, p| now_ms - p.timestamp <= max_age);
    }

    fn relevant_peers(&self, now_ms: i64) -> Vec<&PeerStatus> {
        let fresh: Vec<&PeerStatus> = self
            .peers
            .values()
            .filter(|p| now_ms - p.timestamp <= self.config.height_expiry.as_millis() as i64)
            .collect();

        let witness_reports: Vec<&PeerStatus> = fresh
            .iter()
            .copied()
            .filter(|p| self.active_witnesses.contains(&p.node_id))
            .collect();

        if witness_reports.len() >= self.config.min_witnesses_for_quorum {
            witness_reports
        } else {
            fresh
        }
    }

    /// Evaluates entry/exit conditions given the local node's own behind
    /// count, advancing `state` if the relevant quorum is met. Returns
    /// `true` if the state changed.
    pub fn evaluate(&mut self, local_behind: u64, now_ms: i64) -> bool {
        self.prune_stale(now_ms);
        let peers = self.relevant_peers(now_ms);
        let total = peers.len() + 1; // local node always counted

        match self.state {
            SyncState::Normal => {
                let votes = peers
                    .iter()
                    .filter(|p| p.is_syncing || p.behind_blocks > self.config.block_delay_threshold)
                    .count()
                    + usize::from(local_behind > self.config.block_delay_threshold);
                let quorum_pct = votes * 100 / total;

                let local_critical = peers.is_empty()
                    && local_behind >= 5 * self.config.block_delay_threshold;

                if quorum_pct as u8 >= self.config.entry_quorum_percent || local_critical {
                    self.state = SyncState::Syncing;
                    info!(target: "sync", quorum_pct, local_behind, local_critical, "entering Syncing");
                    true
                } else {
                    false
                }
            }
            SyncState::Syncing => {
                if local_behind != 0 {
                    return false;
                }
                let votes = peers
                    .iter()
                    .filter(|p| !p.is_syncing && p.behind_blocks <= self.config.block_delay_threshold)
                    .count()
                    + 1; // local already meets the exit condition (behind == 0)
                let quorum_pct = votes * 100 / total;

                if quorum_pct as u8 >= self.config.exit_quorum_percent {
                    self.state = SyncState::Normal;
                    self.last_sync_exit_at = Some(now_ms);
                    info!(target: "sync", quorum_pct, "exiting Syncing");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Whether `now_ms` falls within the lenient-timing grace window
    /// following the most recent exit from sync mode.
    pub fn in_grace_window(&self, now_ms: i64) -> bool {
        match self.last_sync_exit_at {
            Some(exit_at) => now_ms - exit_at < GRACE_WINDOW.as_millis() as i64,
            None => false,
        }
    }
}
