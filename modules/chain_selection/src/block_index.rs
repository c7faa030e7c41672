//! In-memory index of every known block.
//!
//! Nodes live in an arena and refer to their parents by [`NodeId`], so
//! ancestor walks never touch the hash map. The best chain is kept as a
//! height-indexed vector whose last element is the best tip.

use std::collections::HashMap;

use strata_common::params::MEDIAN_TIME_BLOCKS;
use strata_common::BlockHash;

use crate::index_node::{BlockNode, ChainMembership, NodeId};

/// Blocks to detach and attach to move the best chain onto another tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorgPath {
    /// Last block shared by the old and new chains.
    pub fork: NodeId,
    /// Old best chain blocks above the fork, tip first.
    pub detach: Vec<NodeId>,
    /// New best chain blocks above the fork, fork side first.
    pub attach: Vec<NodeId>,
}

#[derive(Debug)]
pub struct BlockIndex {
    nodes: Vec<BlockNode>,
    by_hash: HashMap<BlockHash, NodeId>,
    /// Best chain, indexed by height.
    main_chain: Vec<NodeId>,
}

impl BlockIndex {
    /// Create an index rooted at the genesis node, which becomes the best tip.
    pub fn new(mut genesis: BlockNode) -> Self {
        genesis.parent = None;
        genesis.membership = ChainMembership::Main;
        let id = NodeId(0);
        let mut by_hash = HashMap::new();
        by_hash.insert(genesis.hash, id);
        Self {
            nodes: vec![genesis],
            by_hash,
            main_chain: vec![id],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn have_block(&self, hash: &BlockHash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn lookup(&self, hash: &BlockHash) -> Option<NodeId> {
        self.by_hash.get(hash).copied()
    }

    pub fn node(&self, id: NodeId) -> &BlockNode {
        &self.nodes[id.index()]
    }

    pub fn entry(&self, hash: &BlockHash) -> Option<&BlockNode> {
        self.lookup(hash).map(|id| self.node(id))
    }

    /// Entry for the parent named by a candidate header.
    pub fn get_parent_entry(&self, prev_hash: &BlockHash) -> Option<(NodeId, &BlockNode)> {
        self.lookup(prev_hash).map(|id| (id, self.node(id)))
    }

    /// Add a node as a side-chain block. Inserting a known hash returns the
    /// existing handle and leaves the index untouched.
    pub fn insert(&mut self, mut node: BlockNode) -> NodeId {
        if let Some(id) = self.lookup(&node.hash) {
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        node.membership = ChainMembership::Side;
        self.by_hash.insert(node.hash, id);
        self.nodes.push(node);
        id
    }

    pub fn best_tip(&self) -> NodeId {
        self.main_chain[self.main_chain.len() - 1]
    }

    pub fn best_height(&self) -> u64 {
        (self.main_chain.len() - 1) as u64
    }

    pub fn is_main_chain(&self, id: NodeId) -> bool {
        self.node(id).is_main_chain()
    }

    pub fn main_chain_at(&self, height: u64) -> Option<NodeId> {
        usize::try_from(height).ok().and_then(|h| self.main_chain.get(h).copied())
    }

    /// Ancestor of `id` at `height`; a node is its own ancestor.
    pub fn ancestor(&self, id: NodeId, height: u64) -> Option<NodeId> {
        let node = self.node(id);
        if height > node.height {
            return None;
        }
        if node.is_main_chain() {
            return self.main_chain_at(height);
        }

        let mut current = id;
        loop {
            let n = self.node(current);
            if n.height == height {
                return Some(current);
            }
            // Main chain ancestors can jump straight to the target
            if n.is_main_chain() {
                return self.main_chain_at(height);
            }
            current = n.parent?;
        }
    }

    /// Last main chain block on the path from `id` back to genesis.
    pub fn find_fork(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while !self.is_main_chain(current) {
            match self.node(current).parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Median timestamp of `id` and up to ten of its ancestors.
    pub fn median_time_past(&self, id: NodeId) -> i64 {
        let mut timestamps = Vec::with_capacity(MEDIAN_TIME_BLOCKS);
        let mut current = Some(id);
        while let Some(c) = current {
            if timestamps.len() == MEDIAN_TIME_BLOCKS {
                break;
            }
            let node = self.node(c);
            timestamps.push(node.timestamp);
            current = node.parent;
        }
        timestamps.sort_unstable();
        timestamps[timestamps.len() / 2]
    }

    /// Path that would make `tip` the best tip. `tip` need not be stored
    /// yet; a candidate block is handled by passing its parent and
    /// appending the candidate to `attach` once inserted.
    pub fn reorg_path(&self, tip: NodeId) -> ReorgPath {
        let fork = self.find_fork(tip);

        let mut attach = Vec::new();
        let mut current = tip;
        while current != fork {
            attach.push(current);
            match self.node(current).parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        attach.reverse();

        let fork_height = self.node(fork).height as usize;
        let detach = self.main_chain[fork_height + 1..].iter().rev().copied().collect();

        ReorgPath {
            fork,
            detach,
            attach,
        }
    }

    /// Move the best chain along `path`. Detached blocks stay indexed as side
    /// chain blocks. The best tip changes only after every membership flip.
    pub fn reparent_subtree(&mut self, path: &ReorgPath) {
        for id in &path.detach {
            self.nodes[id.index()].membership = ChainMembership::Side;
        }
        for id in &path.attach {
            self.nodes[id.index()].membership = ChainMembership::Main;
        }

        let fork_height = self.node(path.fork).height as usize;
        self.main_chain.truncate(fork_height + 1);
        self.main_chain.extend_from_slice(&path.attach);
    }

    /// Nodes in insertion order.
    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = (NodeId, &BlockNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i as u32), n))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::index_node::BlockStatus;
    use dashu_int::UBig;
    use quickcheck_macros::quickcheck;
    use std::collections::HashSet;

    pub(crate) fn hash(n: u16) -> BlockHash {
        let mut bytes = [0u8; 32];
        bytes[0..2].copy_from_slice(&n.to_le_bytes());
        bytes[31] = 0xff;
        BlockHash::from(bytes)
    }

    pub(crate) fn node(n: u16, parent: Option<NodeId>, height: u64, timestamp: i64) -> BlockNode {
        BlockNode {
            hash: hash(n),
            parent,
            height,
            bits: 0x207fffff,
            timestamp,
            vote_bits: 0,
            work_sum: UBig::from(height + 1),
            status: BlockStatus::Validated,
            membership: ChainMembership::Side,
        }
    }

    /// Genesis plus a main chain of `len` blocks, one second apart.
    pub(crate) fn linear_index(len: u16) -> BlockIndex {
        let mut index = BlockIndex::new(node(0, None, 0, 1000));
        for n in 1..=len {
            let parent = index.best_tip();
            let id = index.insert(node(n, Some(parent), n as u64, 1000 + n as i64));
            let path = index.reorg_path(id);
            index.reparent_subtree(&path);
        }
        index
    }

    #[test]
    fn genesis_is_best_tip() {
        let index = BlockIndex::new(node(0, None, 0, 0));
        assert_eq!(index.len(), 1);
        assert_eq!(index.best_tip(), NodeId(0));
        assert!(index.is_main_chain(NodeId(0)));
        assert!(index.have_block(&hash(0)));
        assert!(!index.have_block(&hash(1)));
    }

    #[test]
    fn insert_is_idempotent() {
        let mut index = linear_index(2);
        let before = index.len();
        let id = index.insert(node(2, Some(NodeId(1)), 2, 0));
        assert_eq!(id, NodeId(2));
        assert_eq!(index.len(), before);
        assert!(index.is_main_chain(id));
    }

    #[test]
    fn ancestor_walks_side_chains() {
        let mut index = linear_index(4);
        let a = index.insert(node(100, Some(NodeId(2)), 3, 0));
        let b = index.insert(node(101, Some(a), 4, 0));

        assert_eq!(index.ancestor(b, 4), Some(b));
        assert_eq!(index.ancestor(b, 3), Some(a));
        assert_eq!(index.ancestor(b, 1), Some(NodeId(1)));
        assert_eq!(index.ancestor(b, 5), None);
        assert_eq!(index.ancestor(NodeId(4), 0), Some(NodeId(0)));
    }

    #[test]
    fn find_fork_of_main_chain_block_is_itself() {
        let mut index = linear_index(3);
        assert_eq!(index.find_fork(NodeId(3)), NodeId(3));
        let side = index.insert(node(50, Some(NodeId(1)), 2, 0));
        assert_eq!(index.find_fork(side), NodeId(1));
    }

    #[test]
    fn median_time_uses_eleven_blocks() {
        let index = linear_index(20);
        // Timestamps 1010..=1020 ending at height 20
        assert_eq!(index.median_time_past(index.best_tip()), 1015);
        // Only genesis and one block
        assert_eq!(index.median_time_past(NodeId(1)), 1001);
        assert_eq!(index.median_time_past(NodeId(0)), 1000);
    }

    #[test]
    fn reorg_path_extension_detaches_nothing() {
        let mut index = linear_index(2);
        let id = index.insert(node(3, Some(NodeId(2)), 3, 0));
        let path = index.reorg_path(id);
        assert_eq!(
            path,
            ReorgPath {
                fork: NodeId(2),
                detach: vec![],
                attach: vec![id],
            }
        );
    }

    #[test]
    fn reparent_subtree_swaps_chains() {
        let mut index = linear_index(3);
        let a = index.insert(node(10, Some(NodeId(1)), 2, 0));
        let b = index.insert(node(11, Some(a), 3, 0));
        let c = index.insert(node(12, Some(b), 4, 0));

        let path = index.reorg_path(c);
        assert_eq!(path.fork, NodeId(1));
        assert_eq!(path.detach, vec![NodeId(3), NodeId(2)]);
        assert_eq!(path.attach, vec![a, b, c]);

        index.reparent_subtree(&path);
        assert_eq!(index.best_tip(), c);
        assert_eq!(index.best_height(), 4);
        assert!(!index.is_main_chain(NodeId(2)));
        assert!(!index.is_main_chain(NodeId(3)));
        assert!(index.is_main_chain(a));
        assert_eq!(index.main_chain_at(2), Some(a));
        assert_eq!(index.main_chain_at(1), Some(NodeId(1)));

        // Back again
        let d = index.insert(node(4, Some(NodeId(3)), 4, 0));
        let e = index.insert(node(5, Some(d), 5, 0));
        let path = index.reorg_path(e);
        assert_eq!(path.detach, vec![c, b, a]);
        index.reparent_subtree(&path);
        assert_eq!(index.best_tip(), e);
        assert!(index.is_main_chain(NodeId(2)));
        assert!(!index.is_main_chain(a));
    }

    /// Grow a tree where each new block picks an existing parent, moving
    /// the best chain whenever a branch gets taller.
    #[quickcheck]
    fn main_chain_links_back_from_best_tip(choices: Vec<u8>) -> bool {
        let mut index = BlockIndex::new(node(0, None, 0, 0));
        for (i, choice) in choices.iter().take(200).enumerate() {
            let parent = NodeId(u32::from(*choice) % index.len() as u32);
            let height = index.node(parent).height + 1;
            let id = index.insert(node(i as u16 + 1, Some(parent), height, 0));
            if height > index.best_height() {
                let path = index.reorg_path(id);
                index.reparent_subtree(&path);
            }
        }

        let mut on_path = HashSet::new();
        let mut current = Some(index.best_tip());
        while let Some(id) = current {
            let node = index.node(id);
            if index.main_chain_at(node.height) != Some(id) {
                return false;
            }
            on_path.insert(id);
            current = node.parent;
        }

        index.main_chain_at(index.best_height() + 1).is_none()
            && index.iter().all(|(id, node)| {
                node.is_main_chain() == on_path.contains(&id)
                    && on_path.contains(&index.find_fork(id))
            })
    }
}
