// src/main.rs
//
// Minimal demo node that wires up the sidechain core:
//
// - RocksDB-backed storage, seeded with a genesis block on first run
// - the staged validator + execution pipeline
// - Prometheus metrics exporter on /metrics
// - a production loop that, when a witness identity is configured via
//   environment variables, builds, signs, validates, and commits blocks
//   on a fixed cadence against a stub anchor source (no anchor chain is
//   wired up here; this binary is a skeleton for composing the library).

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sidechain_core::anchor::{AnchorBlock, AnchorSource};
use sidechain_core::consensus::proposer::WitnessIdentity;
use sidechain_core::consensus::validator::{BlockExecutor, ValidationContext};
use sidechain_core::crypto::PrivateKey;
use sidechain_core::{AccountName, ConsensusError, NodeConfig, NodeContext, ValidationError};

/// A no-op anchor source: every fetch returns an empty block. Stands in
/// until a binary wires up a real transport to the anchor chain.
struct NullAnchorSource;

impl AnchorSource for NullAnchorSource {
    fn endpoint_count(&self) -> usize {
        1
    }
    fn fetch_anchor_block(&self, _endpoint: usize, block_num: u64) -> Result<AnchorBlock, String> {
        Ok(AnchorBlock {
            number: block_num,
            ops: vec![],
        })
    }
}

fn witness_identity_from_env() -> Option<WitnessIdentity> {
    let name = std::env::var("WITNESS_NAME").ok()?;
    let hex_key = std::env::var("WITNESS_PRIVATE_KEY").ok()?;
    let bytes = hex::decode(hex_key.trim()).ok()?;
    let signing_key = PrivateKey::from_bytes(&bytes).ok()?;
    Some(WitnessIdentity {
        name: AccountName::new(name),
        signing_key,
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run_node().await {
        tracing::error!(target: "consensus", error = %err, "fatal error");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), ConsensusError> {
    let config = NodeConfig::default();
    let witness = witness_identity_from_env();
    let observing = witness.is_none() || config.observer;

    let node = NodeContext::new(config, witness, NullAnchorSource, 0)?;
    let _background = node.spawn_background_tasks();

    tracing::info!(target: "consensus", observing, "node started");

    if observing {
        // No local identity: just idle. A real binary would hook this up
        // to a network listener that feeds BlockAnnounce messages in.
        loop {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }

    let block_time = node.config.consensus.block_time;
    loop {
        if let Err(e) = produce_one(&node).await {
            tracing::warn!(target: "consensus", error = %e, "failed to produce block");
        }
        tokio::time::sleep(block_time).await;
    }
}

async fn produce_one<A: AnchorSource>(node: &Arc<NodeContext<A>>) -> Result<(), ConsensusError> {
    let Some(identity) = &node.witness else {
        return Ok(());
    };

    let head = {
        let pipeline = node.pipeline.lock().await;
        pipeline
            .cache()
            .inner()
            .head()
            .map_err(ConsensusError::Storage)?
            .ok_or_else(|| ConsensusError::Other("store has no head".to_string()))?
    };

    let now_ms = current_unix_millis();
    let timestamp = head.timestamp + node.config.consensus.block_time.as_millis() as i64;

    let block = {
        let mut mempool = node.mempool.lock().await;
        node.producer
            .build_block(&head, identity, &mut *mempool, timestamp, None, node.config.consensus.witness_reward)
    };

    let witness_account = {
        let mut pipeline = node.pipeline.lock().await;
        pipeline
            .cache_mut()
            .get_account(&identity.name)
            .map_err(ConsensusError::Storage)?
    };
    let schedule = node.schedule.lock().await.clone();

    let ctx = ValidationContext {
        head: &head,
        recent_blocks: &[],
        schedule: &schedule,
        witness_account: &witness_account,
        now_ms,
        sync_mode: false,
        trusted_rebuild: true,
        recovering: false,
        observer: false,
        blocks_since_sync_exit: u32::MAX,
    };

    let mut validator = node.validator.lock().await;
    let mut pipeline = node.pipeline.lock().await;
    let anchor = node.anchor.lock().await;

    let totals = match validator.validate(&block, &ctx, &*anchor, &mut *pipeline) {
        Ok(totals) => totals,
        Err(e) => {
            node.metrics
                .consensus
                .blocks_rejected_total
                .with_label_values(&[rejection_reason_label(&e)])
                .inc();
            return Err(e);
        }
    };
    drop(anchor);
    drop(validator);

    pipeline
        .cache_mut()
        .put_block(block.clone())
        .map_err(ConsensusError::Storage)?;

    node.metrics.consensus.blocks_committed_total.inc();
    tracing::info!(
        target: "consensus",
        index = block.index,
        distributed = totals.distributed,
        burned = totals.burned,
        "committed block"
    );
    Ok(())
}

/// Label for the `blocks_rejected_total{reason=...}` counter (§6).
fn rejection_reason_label(err: &ConsensusError) -> &'static str {
    match err {
        ConsensusError::Validation(v) => match v {
            ValidationError::InvalidStructure(_) => "invalid_structure",
            ValidationError::InvalidIndex { .. } => "invalid_index",
            ValidationError::InvalidPrevHash => "invalid_prev_hash",
            ValidationError::InvalidAnchorBlockNum { .. } => "invalid_anchor_block_num",
            ValidationError::TooManyTransactions { .. } => "too_many_transactions",
            ValidationError::UnauthorizedMiner { .. } => "unauthorized_miner",
            ValidationError::BlockTooEarly { .. } => "block_too_early",
            ValidationError::BlockTooLate { .. } => "block_too_late",
            ValidationError::AnchorMismatch { .. } => "anchor_mismatch",
            ValidationError::InvalidHash => "invalid_hash",
            ValidationError::InvalidSignature => "invalid_signature",
            ValidationError::InvalidTransaction { .. } => "invalid_transaction",
            ValidationError::TotalsMismatch { .. } => "totals_mismatch",
        },
        ConsensusError::Anchor(_) => "anchor_unavailable",
        ConsensusError::Storage(_) => "storage",
        ConsensusError::Execution(_) => "execution_fatal",
        ConsensusError::Other(_) => "other",
    }
}

fn current_unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_millis() as i64
}
