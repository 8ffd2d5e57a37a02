//! Anchor-chain ingester (§4.6).
//!
//! Pulls anchor blocks from an external primary chain through a small
//! [`AnchorSource`] collaborator (the actual transport — HTTP, RPC,
//! whatever — is out of scope), parses sidechain-relevant transactions
//! out of them, and exposes both a strictly-sequential consumption API
//! ([`AnchorIngester::process_block`]) and the §4.2 stage-6 validation
//! helper ([`AnchorIngester::validate_block_against_anchor`]).

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::{debug, info, warn};

use crate::consensus::error::{AnchorError, ValidationError};
use crate::consensus::validator::AnchorCheck;
use crate::types::{Block, Transaction};

/// One sidechain-relevant transaction parsed out of an anchor block,
/// indexed by its position within that block (the `op_index` half of a
/// `"<anchor_block>:<op_index>"` ref, §3 `Transaction.ref`).
#[derive(Clone, Debug)]
pub struct AnchorOp {
    pub op_index: u32,
    pub tx: Transaction,
}

/// A fetched and parsed anchor block.
#[derive(Clone, Debug)]
pub struct AnchorBlock {
    pub number: u64,
    pub ops: Vec<AnchorOp>,
}

/// External collaborator that actually talks to the anchor chain.
///
/// `endpoint_index` lets the ingester rotate across configured upstreams
/// on failure without needing to know how they are configured.
pub trait AnchorSource: Send + Sync {
    fn endpoint_count(&self) -> usize;
    fn fetch_anchor_block(&self, endpoint_index: usize, block_num: u64) -> Result<AnchorBlock, String>;
}

#[derive(Clone, Debug)]
pub struct AnchorConfig {
    /// How many blocks ahead the prefetcher fetches outside sync mode.
    pub max_prefetch: usize,
    /// How many blocks ahead the prefetcher fetches in sync mode.
    pub sync_batch: usize,
    pub max_retry_delay: Duration,
    pub circuit_breaker_threshold: u32,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            max_prefetch: 1,
            sync_batch: 20,
            max_retry_delay: Duration::from_secs(30),
            circuit_breaker_threshold: 5,
        }
    }
}

/// Fetches, caches, and sequences anchor blocks for a single sidechain.
pub struct AnchorIngester<A: AnchorSource> {
    source: A,
    config: AnchorConfig,
    cache: LruCache<u64, AnchorBlock>,
    next_expected: u64,
    current_endpoint: usize,
    consecutive_failures: u32,
    circuit_open_until: Option<Instant>,
    highest_fetched: u64,
}

impl<A: AnchorSource> AnchorIngester<A> {
    pub fn new(source: A, config: AnchorConfig, next_expected_anchor_block: u64) -> Self {
        let cache_size = (4 * config.max_prefetch.max(1)).max(1);
        Self {
            source,
            config,
            cache: LruCache::new(NonZeroUsize::new(cache_size).unwrap()),
            next_expected: next_expected_anchor_block,
            current_endpoint: 0,
            consecutive_failures: 0,
            circuit_open_until: None,
            highest_fetched: next_expected_anchor_block.saturating_sub(1),
        }
    }

    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    /// Anchor blocks between the highest one successfully fetched so far
    /// and the next one this ingester still needs to consume — the
    /// `anchor_behind_blocks` metric (§6).
    pub fn blocks_behind(&self) -> u64 {
        self.highest_fetched.saturating_sub(self.next_expected.saturating_sub(1))
    }

    /// Whether the circuit breaker is currently open (§4.6).
    pub fn is_circuit_open(&self) -> bool {
        self.circuit_open_until
            .is_some_and(|until| Instant::now() < until)
    }

    fn backoff_delay(&self) -> Duration {
        let exp = self.consecutive_failures.min(10);
        let delay = Duration::from_millis(100u64.saturating_mul(1u64 << exp));
        delay.min(self.config.max_retry_delay)
    }

    /// Fetches (or returns from cache) anchor block `n`, rotating
    /// endpoints and tripping the circuit breaker on repeated failure.
    fn fetch(&mut self, n: u64) -> Result<AnchorBlock, AnchorError> {
        if let Some(block) = self.cache.get(&n) {
            return Ok(block.clone());
        }

        if let Some(open_until) = self.circuit_open_until {
            if Instant::now() < open_until {
                return Err(AnchorError::CircuitOpen {
                    retry_delay_ms: (open_until - Instant::now()).as_millis() as u64,
                });
            }
        }

        match self.source.fetch_anchor_block(self.current_endpoint, n) {
            Ok(block) => {
                self.consecutive_failures = 0;
                self.circuit_open_until = None;
                self.highest_fetched = self.highest_fetched.max(n);
                debug!(target: "anchor", anchor_block = n, "fetched anchor block");
                self.cache.put(n, block.clone());
                Ok(block)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                let endpoint_count = self.source.endpoint_count().max(1);
                self.current_endpoint = (self.current_endpoint + 1) % endpoint_count;
                warn!(target: "anchor", anchor_block = n, error = %e, next_endpoint = self.current_endpoint, "anchor fetch failed, rotating endpoint");

                if self.consecutive_failures >= self.config.circuit_breaker_threshold {
                    let delay = self.backoff_delay();
                    self.circuit_open_until = Some(Instant::now() + delay);
                    info!(target: "anchor", retry_delay_ms = delay.as_millis() as u64, "circuit breaker open");
                }
                Err(AnchorError::FetchFailed(n, e))
            }
        }
    }

    /// Returns the parsed sidechain-relevant transactions from anchor
    /// block `n`, exactly once per `n` (§4.6). Rejects non-sequential
    /// requests.
    pub fn process_block(&mut self, n: u64) -> Result<Vec<Transaction>, AnchorError> {
        if n != self.next_expected {
            return Err(AnchorError::NonSequentialRequest {
                requested: n,
                next_expected: self.next_expected,
            });
        }
        let block = self.fetch(n)?;
        self.next_expected += 1;
        Ok(block.ops.into_iter().map(|op| op.tx).collect())
    }

    /// Prefetches ahead of `next_expected`, `sync_batch` blocks in sync
    /// mode or `max_prefetch` otherwise, populating the cache without
    /// advancing `next_expected`.
    pub fn prefetch(&mut self, sync_mode: bool) {
        let ahead = if sync_mode {
            self.config.sync_batch
        } else {
            self.config.max_prefetch
        };
        for offset in 0..ahead {
            let n = self.next_expected + offset as u64;
            if self.cache.contains(&n) {
                continue;
            }
            if self.fetch(n).is_err() {
                break;
            }
        }
    }
}

impl<A: AnchorSource> AnchorCheck for AnchorIngester<A> {
    /// Recomputes the expected set of sidechain-relevant tx content
    /// hashes for `block.anchor_block_num` and requires exact set
    /// equality with the block's anchor-referencing transactions (§4.2
    /// stage 6, §8 property 4).
    fn validate_block_against_anchor(&self, block: &Block) -> Result<(), ValidationError> {
        let expected = match self.cache.peek(&block.anchor_block_num) {
            Some(b) => b,
            None => {
                return Err(ValidationError::AnchorMismatch {
                    anchor_block_num: block.anchor_block_num,
                })
            }
        };

        let expected_hashes: HashSet<_> = expected.ops.iter().map(|op| op.tx.hash).collect();
        let claimed_hashes: HashSet<_> = block
            .txs
            .iter()
            .filter(|tx| {
                tx.anchor_ref
                    .is_some_and(|r| r.anchor_block == block.anchor_block_num)
            })
            .map(|tx| tx.hash)
            .collect();

        if expected_hashes != claimed_hashes {
            return Err(ValidationError::AnchorMismatch {
                anchor_block_num: block.anchor_block_num,
            });
        }
        Ok(())
    }
}
