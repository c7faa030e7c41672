//! Persistence of the block index.
//!
//! Every accepted block is committed to the store before the in-memory
//! index changes, so a failed write leaves no trace of the block.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use dashu_int::UBig;
use strata_common::{BlockHash, BlockHeader};
use tracing::info;

use crate::block_index::BlockIndex;
use crate::index_node::{BlockNode, BlockStatus, ChainMembership, NodeId};
use crate::pow::calc_work;
use crate::rule_error::{ChainError, InternalError};

/// Persisted form of one index node.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IndexEntry {
    pub hash: BlockHash,
    pub prev_hash: BlockHash,
    pub height: u64,
    pub bits: u32,
    pub timestamp: i64,
    pub vote_bits: u16,
    pub status: BlockStatus,
}

impl IndexEntry {
    pub fn from_header(header: &BlockHeader, status: BlockStatus) -> Self {
        Self {
            hash: header.hash(),
            prev_hash: header.prev_block,
            height: u64::from(header.height),
            bits: header.bits,
            timestamp: header.timestamp,
            vote_bits: header.vote_bits,
            status,
        }
    }
}

/// One atomic write: a new entry and, if it changed, the new best tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexUpdate {
    pub entry: IndexEntry,
    pub best_tip: Option<BlockHash>,
}

/// Everything needed to rebuild the index at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredIndex {
    /// Entries in commit order, so parents precede children
    pub entries: Vec<IndexEntry>,
    pub best_tip: BlockHash,
}

/// Block index store
/// Note all methods immutable; implementations lock internally
pub trait IndexStore: Send + Sync {
    /// Atomically apply an update
    fn commit(&self, update: &IndexUpdate) -> Result<()>;

    /// Load the stored index, or `None` if nothing was ever committed
    fn load(&self) -> Result<Option<StoredIndex>>;
}

#[derive(Default)]
pub struct InMemoryIndexStore {
    index: RwLock<Option<StoredIndex>>,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        info!("Storing block index in memory");
        Self::default()
    }
}

impl IndexStore for InMemoryIndexStore {
    fn commit(&self, update: &IndexUpdate) -> Result<()> {
        let mut guard = self.index.write().map_err(|_| anyhow!("index store lock poisoned"))?;
        let stored = guard.get_or_insert_with(|| StoredIndex {
            entries: Vec::new(),
            best_tip: update.entry.hash,
        });
        stored.entries.push(update.entry.clone());
        if let Some(tip) = update.best_tip {
            stored.best_tip = tip;
        }
        Ok(())
    }

    fn load(&self) -> Result<Option<StoredIndex>> {
        let guard = self.index.read().map_err(|_| anyhow!("index store lock poisoned"))?;
        Ok(guard.clone())
    }
}

pub(crate) fn store_error(e: anyhow::Error) -> ChainError {
    ChainError::Internal(InternalError::Store(format!("{e:#}")))
}

fn corruption(msg: String) -> ChainError {
    ChainError::Internal(InternalError::Corruption(msg))
}

/// Rebuild the in-memory index from stored entries. The first entry must be
/// the expected genesis block.
pub(crate) fn rebuild_index(
    stored: &StoredIndex,
    genesis_hash: &BlockHash,
) -> Result<BlockIndex, ChainError> {
    let Some((first, rest)) = stored.entries.split_first() else {
        return Err(corruption("stored index has no entries".to_string()));
    };
    if first.hash != *genesis_hash {
        return Err(corruption(format!(
            "stored genesis {} does not match network genesis {genesis_hash}",
            first.hash
        )));
    }

    let mut index = BlockIndex::new(node_from_entry(first, None, calc_work(first.bits)));
    for entry in rest {
        let Some(parent) = index.lookup(&entry.prev_hash) else {
            return Err(corruption(format!(
                "stored block {} has unknown parent {}",
                entry.hash, entry.prev_hash
            )));
        };
        let parent_node = index.node(parent);
        if entry.height != parent_node.height + 1 {
            return Err(corruption(format!(
                "stored block {} at height {} does not follow parent at height {}",
                entry.hash, entry.height, parent_node.height
            )));
        }
        let work_sum = &parent_node.work_sum + calc_work(entry.bits);
        index.insert(node_from_entry(entry, Some(parent), work_sum));
    }

    let Some(best) = index.lookup(&stored.best_tip) else {
        return Err(corruption(format!("stored best tip {} is not indexed", stored.best_tip)));
    };
    let path = index.reorg_path(best);
    index.reparent_subtree(&path);

    info!(
        "Loaded {} block index entries, best tip {} at height {}",
        index.len(),
        stored.best_tip,
        index.best_height()
    );
    Ok(index)
}

fn node_from_entry(
    entry: &IndexEntry,
    parent: Option<NodeId>,
    work_sum: UBig,
) -> BlockNode {
    BlockNode {
        hash: entry.hash,
        parent,
        height: entry.height,
        bits: entry.bits,
        timestamp: entry.timestamp,
        vote_bits: entry.vote_bits,
        work_sum,
        status: entry.status,
        membership: ChainMembership::Side,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::ChainParams;

    fn entry(header: &BlockHeader) -> IndexEntry {
        IndexEntry::from_header(header, BlockStatus::Validated)
    }

    fn child(parent: &BlockHeader, nonce: u32) -> BlockHeader {
        BlockHeader {
            prev_block: parent.hash(),
            height: parent.height + 1,
            timestamp: parent.timestamp + 1,
            nonce,
            ..parent.clone()
        }
    }

    fn commit(store: &InMemoryIndexStore, header: &BlockHeader, best: bool) {
        let update = IndexUpdate {
            entry: entry(header),
            best_tip: best.then(|| header.hash()),
        };
        store.commit(&update).unwrap();
    }

    #[test]
    fn empty_store_loads_none() {
        assert_eq!(InMemoryIndexStore::new().load().unwrap(), None);
    }

    #[test]
    fn commits_accumulate() {
        let genesis = ChainParams::simnet().genesis_block().header;
        let a = child(&genesis, 1);
        let side = child(&genesis, 2);

        let store = InMemoryIndexStore::new();
        commit(&store, &genesis, true);
        commit(&store, &a, true);
        commit(&store, &side, false);

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.entries.len(), 3);
        assert_eq!(loaded.best_tip, a.hash());
    }

    #[test]
    fn rebuild_restores_best_chain() {
        let genesis = ChainParams::simnet().genesis_block().header;
        let a1 = child(&genesis, 1);
        let a2 = child(&a1, 1);
        let b1 = child(&genesis, 2);

        let store = InMemoryIndexStore::new();
        commit(&store, &genesis, true);
        commit(&store, &a1, true);
        commit(&store, &b1, false);
        commit(&store, &a2, true);

        let index = rebuild_index(&store.load().unwrap().unwrap(), &genesis.hash()).unwrap();
        assert_eq!(index.len(), 4);
        assert_eq!(index.node(index.best_tip()).hash, a2.hash());
        assert_eq!(index.best_height(), 2);
        assert!(!index.entry(&b1.hash()).unwrap().is_main_chain());
        assert_eq!(
            index.entry(&a2.hash()).unwrap().work_sum,
            calc_work(genesis.bits) * UBig::from(3u8)
        );
    }

    #[test]
    fn rebuild_rejects_wrong_genesis() {
        let genesis = ChainParams::simnet().genesis_block().header;
        let other = ChainParams::regnet().genesis_block().header;
        let stored = StoredIndex {
            entries: vec![entry(&other)],
            best_tip: other.hash(),
        };
        let err = rebuild_index(&stored, &genesis.hash()).unwrap_err();
        assert!(matches!(err, ChainError::Internal(InternalError::Corruption(_))));
    }

    #[test]
    fn rebuild_rejects_orphan_entry() {
        let genesis = ChainParams::simnet().genesis_block().header;
        let a1 = child(&genesis, 1);
        let a2 = child(&a1, 1);
        let stored = StoredIndex {
            entries: vec![entry(&genesis), entry(&a2)],
            best_tip: genesis.hash(),
        };
        assert!(matches!(
            rebuild_index(&stored, &genesis.hash()),
            Err(ChainError::Internal(InternalError::Corruption(_)))
        ));
    }
}
