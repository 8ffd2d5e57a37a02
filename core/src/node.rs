//! Node context: the single owning handle for all subsystems (§5, §9).
//!
//! `NodeContext` is constructed once at startup and shared as an `Arc`
//! across whatever tokio tasks a binary spawns (block production,
//! anchor prefetching, the metrics exporter, mempool pruning). Interior
//! mutability uses `tokio::sync::Mutex` rather than `std::sync::Mutex`
//! since subsystem access happens from async tasks and may itself await
//! (e.g. a future networked fetch inside the anchor ingester).

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::anchor::{AnchorIngester, AnchorSource};
use crate::config::NodeConfig;
use crate::consensus::coordinator::Coordinator;
use crate::consensus::error::ConsensusError;
use crate::consensus::proposer::{Producer, WitnessIdentity};
use crate::consensus::schedule::derive_schedule;
use crate::consensus::store::ChainStore;
use crate::consensus::validator::BlockValidator;
use crate::dispatch::Dispatch;
use crate::execution::{ExecutionConfig, ExecutionPipeline};
use crate::mempool::Mempool;
use crate::metrics::MetricsRegistry;
use crate::storage::cache::StateCache;
use crate::storage::rocksdb::RocksDbChainStore;
use crate::sync::{SyncConfig, SyncController};
use crate::crypto::{CompactSignature, Hash256, PrivateKey, HASH_LEN};
use crate::types::{Account, Block, BlockHash, WitnessSchedule};

fn exec_config(consensus: &crate::consensus::ConsensusConfig) -> ExecutionConfig {
    ExecutionConfig {
        witness_reward: consensus.witness_reward,
        burn_account: consensus.burn_account.clone(),
        eco_blocks: consensus.eco_blocks,
        revalidate: false,
    }
}

fn sync_config(consensus: &crate::consensus::ConsensusConfig) -> SyncConfig {
    SyncConfig {
        block_delay_threshold: consensus.steem_block_delay_threshold,
        entry_quorum_percent: consensus.sync_entry_quorum_percent,
        exit_quorum_percent: consensus.sync_exit_quorum_percent,
        min_witnesses_for_quorum: consensus.min_witnesses_for_quorum,
        height_expiry: consensus.height_expiry,
    }
}

fn genesis_block() -> Block {
    Block {
        index: 0,
        anchor_block_num: 0,
        prev_hash: BlockHash(Hash256([0u8; HASH_LEN])),
        timestamp: 0,
        txs: vec![],
        witness: crate::types::AccountName::new("genesis"),
        missed_by: None,
        distributed: 0,
        burned: 0,
        hash: BlockHash(Hash256([0u8; HASH_LEN])),
        signature: CompactSignature::sign(&PrivateKey::generate(), &Hash256([0u8; HASH_LEN])),
    }
}

/// Owns every long-lived subsystem a running node needs.
pub struct NodeContext<A: AnchorSource> {
    pub config: NodeConfig,
    pub metrics: Arc<MetricsRegistry>,
    pub witness: Option<WitnessIdentity>,

    pub pipeline: Mutex<ExecutionPipeline<RocksDbChainStore>>,
    pub mempool: Mutex<Mempool>,
    pub validator: Mutex<BlockValidator>,
    pub coordinator: Mutex<Coordinator>,
    pub sync: Mutex<SyncController>,
    pub schedule: Mutex<WitnessSchedule>,
    pub anchor: Mutex<AnchorIngester<A>>,

    pub producer: Producer,
}

impl<A: AnchorSource> NodeContext<A> {
    /// Opens storage, seeds genesis if empty, and wires every subsystem
    /// together from `config`.
    pub fn new(
        config: NodeConfig,
        witness: Option<WitnessIdentity>,
        anchor_source: A,
        next_expected_anchor_block: u64,
    ) -> Result<Arc<Self>, ConsensusError> {
        let mut store =
            RocksDbChainStore::open(&config.storage).map_err(ConsensusError::Storage)?;
        if store.head().map_err(ConsensusError::Storage)?.is_none() {
            store
                .put_block(genesis_block())
                .map_err(ConsensusError::Storage)?;
            info!(target: "consensus", "seeded empty store with genesis block");
        }

        let cache = StateCache::new(store);
        let pipeline =
            ExecutionPipeline::new(cache, Dispatch::with_builtins(), exec_config(&config.consensus));

        let metrics = Arc::new(MetricsRegistry::new().map_err(|e| ConsensusError::Other(e.to_string()))?);

        let validator = BlockValidator::new(config.consensus.clone(), config.hash_mode);
        let coordinator = Coordinator::new(0);
        let sync = SyncController::new(sync_config(&config.consensus));
        let anchor = AnchorIngester::new(
            anchor_source,
            config.anchor.clone(),
            next_expected_anchor_block,
        );
        let schedule = WitnessSchedule {
            anchor_block_ref: 0,
            shuffle: vec![],
        };
        let producer = Producer::new(config.consensus.clone(), config.hash_mode);
        let mempool = Mempool::new(config.consensus.tx_expiration_time);

        Ok(Arc::new(Self {
            config,
            metrics,
            witness,
            pipeline: Mutex::new(pipeline),
            mempool: Mutex::new(mempool),
            validator: Mutex::new(validator),
            coordinator: Mutex::new(coordinator),
            sync: Mutex::new(sync),
            schedule: Mutex::new(schedule),
            anchor: Mutex::new(anchor),
            producer,
        }))
    }

    /// Recomputes the witness schedule from the current candidate set and a
    /// seed block (§4.5), replacing the stored schedule.
    pub async fn rederive_schedule(&self, seed_index: u64, seed_hash: &Hash256, candidates: &[Account]) {
        let schedule = derive_schedule(
            seed_index,
            seed_hash,
            candidates,
            self.config.consensus.witnesses,
            self.config.consensus.witness_shuffle_precision,
        );
        *self.schedule.lock().await = schedule;
    }

    /// Spawns the node's background tasks: mempool expiry pruning and the
    /// Prometheus HTTP exporter (when enabled). Returns their join handles
    /// so a binary can await/cancel them as part of shutdown.
    pub fn spawn_background_tasks(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>>
    where
        A: 'static,
    {
        let mut handles = Vec::new();

        let node = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));
            loop {
                interval.tick().await;
                let head = {
                    let pipeline = node.pipeline.lock().await;
                    pipeline.cache().inner().head()
                };
                if let Ok(Some(head)) = head {
                    let removed = node.mempool.lock().await.prune_expired(head.timestamp);
                    node.metrics
                        .consensus
                        .mempool_size
                        .set(node.mempool.lock().await.len() as i64);
                    if removed > 0 {
                        info!(target: "consensus", removed, "pruned expired mempool entries");
                    }
                }

                {
                    let sync = node.sync.lock().await;
                    node.metrics
                        .consensus
                        .sync_mode
                        .set(i64::from(sync.is_syncing()));
                }
                {
                    let anchor = node.anchor.lock().await;
                    node.metrics
                        .consensus
                        .anchor_behind_blocks
                        .set(anchor.blocks_behind() as f64);
                    node.metrics
                        .consensus
                        .anchor_circuit_open
                        .set(i64::from(anchor.is_circuit_open()));
                }
            }
        }));

        if self.config.metrics.enabled {
            let metrics = Arc::clone(&self.metrics);
            let addr = self.config.metrics.listen_addr;
            handles.push(tokio::spawn(async move {
                if let Err(e) = crate::metrics::run_prometheus_http_server(metrics, addr).await {
                    tracing::error!(target: "consensus", error = %e, "metrics HTTP server exited");
                }
            }));
        }

        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::AnchorBlock;
    use tempfile::TempDir;

    struct NullSource;
    impl AnchorSource for NullSource {
        fn endpoint_count(&self) -> usize {
            1
        }
        fn fetch_anchor_block(&self, _endpoint: usize, block_num: u64) -> Result<AnchorBlock, String> {
            Ok(AnchorBlock { number: block_num, ops: vec![] })
        }
    }

    #[test]
    fn new_seeds_genesis_when_store_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut config = NodeConfig::default();
        config.storage.path = dir.path().to_string_lossy().to_string();
        config.metrics.enabled = false;

        let node = NodeContext::new(config, None, NullSource, 0).unwrap();
        let head = {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let pipeline = node.pipeline.lock().await;
                pipeline.cache().inner().head().unwrap()
            })
        };
        assert_eq!(head.unwrap().index, 0);
    }
}
