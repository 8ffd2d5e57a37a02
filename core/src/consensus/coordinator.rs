//! Consensus coordinator (§4.8).
//!
//! Tracks candidate blocks at the current height, each annotated with
//! per-round approval sets. The contract is: exactly one candidate per
//! height commits. The local producer's own candidate short-circuits its
//! own validation (round 0 is pre-approved); remote candidates go through
//! the full §4.2 validator.

use std::collections::HashSet;

use crate::types::{AccountName, Block, BlockHash};

/// One candidate block being considered for the current height.
pub struct Candidate {
    pub block: Block,
    /// Witnesses that have approved this candidate, indexed by round.
    approvals: Vec<HashSet<AccountName>>,
    pub committed: bool,
}

impl Candidate {
    fn new(block: Block) -> Self {
        Self {
            block,
            approvals: vec![HashSet::new()],
            committed: false,
        }
    }

    fn ensure_round(&mut self, round: usize) {
        while self.approvals.len() <= round {
            self.approvals.push(HashSet::new());
        }
    }

    pub fn approve(&mut self, round: usize, witness: AccountName) {
        self.ensure_round(round);
        self.approvals[round].insert(witness);
    }

    pub fn approvals_in_round(&self, round: usize) -> usize {
        self.approvals.get(round).map(HashSet::len).unwrap_or(0)
    }
}

/// Tracks candidates for a single height and enforces commit-exactly-one.
#[derive(Default)]
pub struct Coordinator {
    height: u64,
    candidates: Vec<Candidate>,
    committed_hash: Option<BlockHash>,
}

impl Coordinator {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            candidates: Vec::new(),
            committed_hash: None,
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn committed(&self) -> Option<&Block> {
        self.committed_hash.and_then(|hash| {
            self.candidates
                .iter()
                .find(|c| c.block.hash.0 == hash.0)
                .map(|c| &c.block)
        })
    }

    /// Pushes the local producer's own candidate, pre-approving round 0 so
    /// its own validation is short-circuited, then immediately ends round 0
    /// for it (§4.8: "endRound(0, block) is invoked").
    pub fn push_local_candidate(&mut self, block: Block, local_witness: AccountName) {
        let mut candidate = Candidate::new(block);
        candidate.approve(0, local_witness);
        self.candidates.push(candidate);
        self.end_round_locally();
    }

    /// Pushes a remote candidate that has already passed §4.2 validation.
    /// Accepting it here commits it, enforcing "exactly one candidate per
    /// height" by rejecting further pushes once committed.
    pub fn accept_remote_candidate(&mut self, block: Block) -> bool {
        if self.committed_hash.is_some() {
            return false;
        }
        let hash = block.hash;
        self.candidates.push(Candidate::new(block));
        self.committed_hash = Some(hash);
        if let Some(c) = self
            .candidates
            .iter_mut()
            .find(|c| c.block.hash.0 == hash.0)
        {
            c.committed = true;
        }
        true
    }

    /// Commits the first (and by contract, only) locally-pushed candidate.
    fn end_round_locally(&mut self) {
        if self.committed_hash.is_some() {
            return;
        }
        if let Some(candidate) = self.candidates.last_mut() {
            candidate.committed = true;
            self.committed_hash = Some(candidate.block.hash);
        }
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }
}
