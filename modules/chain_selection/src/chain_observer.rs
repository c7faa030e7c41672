//! Observer trait for chain events.

use strata_common::BlockHash;

/// Best chain switch from one tip to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorgEvent {
    pub old_tip: BlockHash,
    pub new_tip: BlockHash,
    /// Height of the last block common to both chains.
    pub fork_height: u64,
    /// Blocks removed from the best chain, tip first.
    pub detached: Vec<BlockHash>,
    /// Blocks added to the best chain, fork side first.
    pub attached: Vec<BlockHash>,
}

/// Event produced while the chain state lock is held, delivered after it is
/// released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainNotification {
    BlockAccepted {
        hash: BlockHash,
        height: u64,
        fork_length: i64,
        best_chain: bool,
    },
    BlockConnected {
        hash: BlockHash,
        height: u64,
    },
    BlockDisconnected {
        hash: BlockHash,
        height: u64,
    },
    Reorganized(ReorgEvent),
}

/// Callback receiver for chain events.
///
/// Callbacks run on the processing thread after each block, in the order
/// the state changed: disconnects, connects, the reorganisation summary,
/// then acceptance. They must not call back into block processing.
pub trait ChainObserver: Send + Sync {
    /// A block passed every check and is now indexed.
    fn block_accepted(&self, hash: BlockHash, height: u64, fork_length: i64, best_chain: bool);

    /// A block joined the best chain.
    fn block_connected(&self, hash: BlockHash, height: u64);

    /// A block left the best chain.
    fn block_disconnected(&self, hash: BlockHash, height: u64);

    /// The best chain switched to a heavier fork.
    fn reorganized(&self, event: &ReorgEvent);
}

pub(crate) fn dispatch(observer: &dyn ChainObserver, notification: &ChainNotification) {
    match notification {
        ChainNotification::BlockAccepted {
            hash,
            height,
            fork_length,
            best_chain,
        } => observer.block_accepted(*hash, *height, *fork_length, *best_chain),
        ChainNotification::BlockConnected { hash, height } => {
            observer.block_connected(*hash, *height)
        }
        ChainNotification::BlockDisconnected { hash, height } => {
            observer.block_disconnected(*hash, *height)
        }
        ChainNotification::Reorganized(event) => observer.reorganized(event),
    }
}
