//! Boot-time replay engine (§4.10).
//!
//! Replays already-committed blocks from a source [`ChainStore`] through a
//! live [`ExecutionPipeline`] to reconstruct account state — used both for
//! first-time bootstrap from a blocks-only store and for recovering from a
//! corrupted account cache. Validation of each replayed block is limited to
//! hash/signature recomputation (§4.2 stage 7); the rest of §4.2 is assumed
//! to already hold for blocks that were previously committed, unless the
//! caller explicitly asks for full re-validation elsewhere.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::consensus::auth::verify_block_authority;
use crate::consensus::config::ConsensusConfig;
use crate::consensus::error::{ConsensusError, ValidationError};
use crate::consensus::store::ChainStore;
use crate::execution::ExecutionPipeline;
use crate::types::HashMode;

/// Knobs for a rebuild run, overridable via environment (§6 "Environment
/// toggles").
#[derive(Clone, Debug)]
pub struct RebuildConfig {
    pub max_batch_blocks: usize,
    /// Skip hash/signature re-verification per block (`REBUILD_NO_VALIDATE`).
    pub skip_validation: bool,
    /// Skip the §4.3 totals cross-check (`REBUILD_NO_VERIFY`).
    pub skip_totals_verification: bool,
    /// How often staged account writes are flushed to disk mid-rebuild
    /// (`REBUILD_WRITE_INTERVAL`, seconds).
    pub write_interval: Duration,
    /// Optional path to append a one-line-per-block replay log
    /// (`REPLAY_OUTPUT`).
    pub replay_output: Option<String>,
}

impl RebuildConfig {
    /// Starts from `defaults` and applies any of the recognized environment
    /// overrides that are set.
    pub fn from_env(defaults: &ConsensusConfig) -> Self {
        let mut config = Self {
            max_batch_blocks: defaults.max_batch_blocks,
            skip_validation: false,
            skip_totals_verification: false,
            write_interval: Duration::from_secs(30),
            replay_output: None,
        };

        if std::env::var("REBUILD_NO_VALIDATE").is_ok() {
            config.skip_validation = true;
        }
        if std::env::var("REBUILD_NO_VERIFY").is_ok() {
            config.skip_totals_verification = true;
        }
        if let Ok(raw) = std::env::var("REBUILD_WRITE_INTERVAL") {
            if let Ok(secs) = raw.parse::<u64>() {
                config.write_interval = Duration::from_secs(secs);
            }
        }
        if let Ok(path) = std::env::var("REPLAY_OUTPUT") {
            config.replay_output = Some(path);
        }
        config
    }
}

/// Summary of a completed (or batch-bounded) rebuild run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub blocks_replayed: u64,
    /// Height to resume from on the next call — the index just past the
    /// last block actually replayed.
    pub resume_height: u64,
}

pub struct RebuildEngine {
    config: RebuildConfig,
    replay_log: Option<File>,
}

impl RebuildEngine {
    pub fn new(config: RebuildConfig) -> std::io::Result<Self> {
        let replay_log = match &config.replay_output {
            Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
            None => None,
        };
        Ok(Self { config, replay_log })
    }

    /// Replays blocks `[from_height, ..)` from `source` through `pipeline`
    /// in batches of `max_batch_blocks`, stopping when `source` has no more
    /// blocks to offer. Returns the height to resume from, which equals the
    /// source's next-unavailable index once the whole history is caught up.
    pub fn run<S: ChainStore>(
        &mut self,
        from_height: u64,
        source: &dyn ChainStore,
        pipeline: &mut ExecutionPipeline<S>,
        hash_mode: HashMode,
    ) -> Result<RebuildReport, ConsensusError> {
        let mut height = from_height;
        let mut replayed = 0u64;
        let mut last_flush = Instant::now();

        loop {
            let batch: Vec<_> = (height..height + self.config.max_batch_blocks as u64)
                .map_while(|i| source.get_block_by_index(i).transpose())
                .collect::<Result<_, _>>()?;
            if batch.is_empty() {
                break;
            }

            for block in &batch {
                if !self.config.skip_validation {
                    let recomputed = block.compute_hash(hash_mode);
                    if recomputed.0 != block.hash.0 {
                        return Err(ValidationError::InvalidHash.into());
                    }
                    let witness_account = pipeline
                        .cache_mut()
                        .get_account(&block.witness)
                        .map_err(ConsensusError::Storage)?;
                    if !verify_block_authority(&witness_account, &block.hash.0, &block.signature) {
                        return Err(ValidationError::InvalidSignature.into());
                    }
                }

                let totals = pipeline.execute_block(block)?;

                if !self.config.skip_totals_verification
                    && (totals.distributed != block.distributed || totals.burned != block.burned)
                {
                    return Err(ValidationError::TotalsMismatch {
                        reported_distributed: block.distributed,
                        computed_distributed: totals.distributed,
                        reported_burned: block.burned,
                        computed_burned: totals.burned,
                    }
                    .into());
                }

                if let Some(log) = &mut self.replay_log {
                    let _ = writeln!(
                        log,
                        "{} {} distributed={} burned={}",
                        block.index, block.hash.0, totals.distributed, totals.burned
                    );
                }

                height = block.index + 1;
                replayed += 1;

                if last_flush.elapsed() >= self.config.write_interval {
                    pipeline
                        .cache_mut()
                        .write_to_disk(true)
                        .map_err(ConsensusError::Storage)?;
                    last_flush = Instant::now();
                    info!(target: "rebuild", height, replayed, "rebuild checkpoint flushed");
                }
            }
        }

        pipeline
            .cache_mut()
            .write_to_disk(true)
            .map_err(ConsensusError::Storage)?;

        if replayed == 0 {
            warn!(target: "rebuild", from_height, "rebuild found nothing to replay");
        }
        info!(target: "rebuild", replayed, resume_height = height, "rebuild run complete");

        Ok(RebuildReport {
            blocks_replayed: replayed,
            resume_height: height,
        })
    }
}
