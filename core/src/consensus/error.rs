//! Error types shared by the validator, producer, and coordinator.

use thiserror::Error;

/// Reasons a candidate block is rejected by §4.2's staged validator.
///
/// Exactly one variant is ever returned per call: stages short-circuit on
/// the first failure (see the Open Questions resolution in the design
/// notes — reject-and-stop is the only supported contract).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid structure: {0}")]
    InvalidStructure(String),
    #[error("invalid index: expected {expected}, got {got}")]
    InvalidIndex { expected: u64, got: u64 },
    #[error("invalid prev_hash")]
    InvalidPrevHash,
    #[error("invalid anchor_block_num: expected {expected}, got {got}")]
    InvalidAnchorBlockNum { expected: u64, got: u64 },
    #[error("block has {got} txs, exceeds max_tx_per_block={max}")]
    TooManyTransactions { got: usize, max: usize },
    #[error("unauthorized miner: {witness}")]
    UnauthorizedMiner { witness: String },
    #[error("block too early: timestamp {timestamp} < earliest {earliest}")]
    BlockTooEarly { timestamp: i64, earliest: i64 },
    #[error("block too late: timestamp {timestamp} > latest {latest}")]
    BlockTooLate { timestamp: i64, latest: i64 },
    #[error("anchor mismatch: transactions not found on anchor {anchor_block_num}")]
    AnchorMismatch { anchor_block_num: u64 },
    #[error("invalid hash: recomputed hash does not match carried hash")]
    InvalidHash,
    #[error("invalid signature: witness signature does not verify")]
    InvalidSignature,
    #[error("invalid transaction {hash}: {reason}")]
    InvalidTransaction { hash: String, reason: String },
    #[error("reported totals do not match execution: distributed {reported_distributed} != {computed_distributed}, burned {reported_burned} != {computed_burned}")]
    TotalsMismatch {
        reported_distributed: u64,
        computed_distributed: u64,
        reported_burned: u64,
        computed_burned: u64,
    },
}

/// Errors raised while executing a transaction (§4.3).
///
/// Used both by a handler's `validate` (re-check, non-fatal per §7 — a
/// [`BlockExecutionError::InvalidTransaction`] wraps these as a normal
/// block rejection) and by its `execute` (contractually total on
/// pre-validated input, so a failure here is escalated to
/// [`BlockExecutionError::Fatal`]).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("unknown transaction kind: {0}")]
    UnknownKind(String),
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),
    #[error("executor failed on pre-validated input: {0}")]
    ExecutorFailed(String),
}

/// Outcome of running §4.3 against a block: the two-tier policy from §7.
///
/// `InvalidTransaction` comes from a handler's `validate` rejecting a tx
/// during revalidation — the block is simply invalid, not the state.
/// `Fatal` comes from a handler's `execute` (or any other pipeline step)
/// failing on input that was supposed to be pre-validated, which means
/// local state has diverged from what the block's producer computed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockExecutionError {
    #[error("invalid transaction {hash}: {reason}")]
    InvalidTransaction { hash: String, reason: String },
    #[error(transparent)]
    Fatal(#[from] ExecutionError),
}

/// Errors raised by the anchor-chain ingester (§4.6).
#[derive(Debug, Error, Clone)]
pub enum AnchorError {
    #[error("fetch of anchor block {0} failed: {1}")]
    FetchFailed(u64, String),
    #[error("circuit breaker open, retry after {retry_delay_ms}ms")]
    CircuitOpen { retry_delay_ms: u64 },
    #[error("anchor block {requested} not yet available (next expected: {next_expected})")]
    NonSequentialRequest { requested: u64, next_expected: u64 },
}

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("underlying storage error: {0}")]
    Backend(String),
    #[error("missing column family: {0}")]
    MissingColumnFamily(&'static str),
    #[error("corrupted metadata: {0}")]
    CorruptedMeta(&'static str),
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Top-level consensus error, composing all of the above (§7).
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Anchor(#[from] AnchorError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// An `ExecutionError` surfacing all the way to the coordinator is a
    /// fatal invariant violation: the block was already staged validated
    /// but failed to execute deterministically.
    #[error("fatal execution failure during commit: {0}")]
    Execution(ExecutionError),
    #[error("{0}")]
    Other(String),
}

/// Splits a [`BlockExecutionError`] back into the two-tier policy (§7): a
/// rejected-but-not-fatal transaction becomes an ordinary
/// [`ValidationError`], everything else stays fatal.
impl From<BlockExecutionError> for ConsensusError {
    fn from(e: BlockExecutionError) -> Self {
        match e {
            BlockExecutionError::InvalidTransaction { hash, reason } => {
                ConsensusError::Validation(ValidationError::InvalidTransaction { hash, reason })
            }
            BlockExecutionError::Fatal(inner) => ConsensusError::Execution(inner),
        }
    }
}
