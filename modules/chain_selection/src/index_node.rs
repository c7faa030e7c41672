//! Block representation within the block index.

use dashu_int::UBig;
use strata_common::{BlockHash, BlockHeader};

/// Stable handle of a node in the index arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// How far a block has been validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BlockStatus {
    /// Passed sanity and context checks; scripts were skipped because the
    /// block links to a trusted checkpoint.
    Accepted,
    /// Passed every check including script validation.
    Validated,
}

/// Whether a block is on the best chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainMembership {
    Main,
    Side,
}

/// Per-block metadata kept by the index.
#[derive(Debug, Clone)]
pub struct BlockNode {
    /// Identity key.
    pub hash: BlockHash,
    /// Parent handle; `None` only for genesis.
    pub parent: Option<NodeId>,
    pub height: u64,
    pub bits: u32,
    pub timestamp: i64,
    pub vote_bits: u16,
    /// Total work of the chain ending at this block.
    pub work_sum: UBig,
    pub status: BlockStatus,
    pub membership: ChainMembership,
}

impl BlockNode {
    /// Create a side-chain node for `header`; the index links it.
    pub fn new(
        header: &BlockHeader,
        parent: Option<NodeId>,
        work_sum: UBig,
        status: BlockStatus,
    ) -> Self {
        Self {
            hash: header.hash(),
            parent,
            height: u64::from(header.height),
            bits: header.bits,
            timestamp: header.timestamp,
            vote_bits: header.vote_bits,
            work_sum,
            status,
            membership: ChainMembership::Side,
        }
    }

    pub fn is_main_chain(&self) -> bool {
        self.membership == ChainMembership::Main
    }
}
