//! Definition of Strata bus messages

use crate::hash::BlockHash;
use crate::types::Block;

/// Candidate block offered for processing
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct BlockAvailableMessage {
    pub block: Block,

    /// Block is known to link to a trusted checkpoint
    pub fast_add: bool,
}

/// Block accepted into the index
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct BlockAcceptedMessage {
    pub hash: BlockHash,
    pub height: u64,
    pub fork_length: i64,

    /// Block is the new best chain tip
    pub best_chain: bool,
}

/// Block rejected by validation or chain selection
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct BlockRejectedMessage {
    pub hash: BlockHash,

    /// Name of the violated consensus rule; `None` for internal failures
    pub rule: Option<String>,

    pub reason: String,
}

/// Best chain switched to a heavier branch
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChainReorganizedMessage {
    pub old_tip: BlockHash,
    pub new_tip: BlockHash,
    pub fork_height: u64,
    pub detached: Vec<BlockHash>,
    pub attached: Vec<BlockHash>,
}

// === Global message enum ===
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Message {
    None(()), // Just so we have a simple default

    String(String),

    BlockAvailable(BlockAvailableMessage),
    BlockAccepted(BlockAcceptedMessage),
    BlockRejected(BlockRejectedMessage),
    ChainReorganized(ChainReorganizedMessage),
}

impl Default for Message {
    fn default() -> Self {
        Self::None(())
    }
}

impl From<BlockAvailableMessage> for Message {
    fn from(msg: BlockAvailableMessage) -> Self {
        Message::BlockAvailable(msg)
    }
}

impl From<BlockAcceptedMessage> for Message {
    fn from(msg: BlockAcceptedMessage) -> Self {
        Message::BlockAccepted(msg)
    }
}

impl From<BlockRejectedMessage> for Message {
    fn from(msg: BlockRejectedMessage) -> Self {
        Message::BlockRejected(msg)
    }
}

impl From<ChainReorganizedMessage> for Message {
    fn from(msg: ChainReorganizedMessage) -> Self {
        Message::ChainReorganized(msg)
    }
}
