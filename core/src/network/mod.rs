//! Peer wire protocol (§6 "Peer messages").
//!
//! A single `serde`-derived enum covers every message this core sends or
//! receives; the actual transport (TCP framing, gossip topology, etc.) is
//! deliberately out of scope here and left to whatever binds a node to its
//! peers.

use serde::{Deserialize, Serialize};

use crate::types::Block;

/// One node's self-reported sync status, broadcast periodically (§4.7).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncStatusMessage {
    pub node_id: String,
    pub behind_blocks: u64,
    pub anchor_block: u64,
    pub is_syncing: bool,
    pub head_block_id: String,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PeerMessage {
    /// A freshly produced or freshly received block, gossiped onward.
    BlockAnnounce(Block),
    /// Requests blocks `start..=end` by index.
    BlockRequest { start: u64, end: u64 },
    BlockResponse(Vec<Block>),
    SyncStatus(SyncStatusMessage),
    PeerListRequest,
    PeerListResponse(Vec<String>),
}

impl PeerMessage {
    /// Short tag for logging/metrics without matching on the full payload.
    pub fn kind_str(&self) -> &'static str {
        match self {
            PeerMessage::BlockAnnounce(_) => "block_announce",
            PeerMessage::BlockRequest { .. } => "block_request",
            PeerMessage::BlockResponse(_) => "block_response",
            PeerMessage::SyncStatus(_) => "sync_status",
            PeerMessage::PeerListRequest => "peer_list_request",
            PeerMessage::PeerListResponse(_) => "peer_list_response",
        }
    }
}
