//! Acceptance of a fully checked block into the index and best chain.

use strata_common::{BehaviorFlags, Block, BlockHeader};
use tracing::{debug, info};

use crate::agenda::AgendaResolver;
use crate::block_index::BlockIndex;
use crate::chain_observer::{ChainNotification, ReorgEvent};
use crate::index_node::{BlockNode, BlockStatus, NodeId};
use crate::index_store::{store_error, IndexEntry, IndexStore, IndexUpdate};
use crate::pow::calc_work;
use crate::rule_error::{rule_error, ChainError, ErrorKind};

/// Everything guarded by the chain state lock.
pub(crate) struct ChainState {
    pub index: BlockIndex,
    pub agendas: AgendaResolver,
}

/// Result of accepting one block.
#[derive(Debug)]
pub(crate) struct Accepted {
    pub fork_length: i64,
    pub notifications: Vec<ChainNotification>,
}

/// Checks of the header against its parent in the index.
pub(crate) fn check_block_context(
    index: &BlockIndex,
    parent: NodeId,
    header: &BlockHeader,
    flags: BehaviorFlags,
) -> Result<(), ChainError> {
    let parent_node = index.node(parent);
    let expected = parent_node.height + 1;
    if u64::from(header.height) != expected {
        return Err(rule_error(
            ErrorKind::BadBlockHeight,
            format!(
                "block header height of {} does not match expected height of {expected}",
                header.height
            ),
        ));
    }

    // Fast add blocks are known good up to a checkpoint
    if !flags.is_fast_add() {
        let median_time = index.median_time_past(parent);
        if header.timestamp <= median_time {
            return Err(rule_error(
                ErrorKind::TimeTooOld,
                format!(
                    "block timestamp of {} is not after expected {median_time}",
                    header.timestamp
                ),
            ));
        }
    }

    Ok(())
}

/// Index `block` and move the best chain onto it if it carries strictly
/// more work than the current best tip. The store is written first; on
/// error nothing in memory has changed.
pub(crate) fn maybe_accept_block(
    state: &mut ChainState,
    store: &dyn IndexStore,
    block: &Block,
    status: BlockStatus,
) -> Result<Accepted, ChainError> {
    let header = &block.header;
    let hash = header.hash();
    let index = &mut state.index;

    let parent = index.lookup(&header.prev_block).ok_or_else(|| {
        ChainError::assert(format!("parent {} vanished before acceptance", header.prev_block))
    })?;
    let parent_node = index.node(parent);
    let work_sum = &parent_node.work_sum + calc_work(header.bits);
    let height = parent_node.height + 1;

    let best = index.best_tip();
    let best_node = index.node(best);
    let (best_hash, best_height) = (best_node.hash, best_node.height);
    let becomes_best = parent == best || work_sum > best_node.work_sum;

    // Fork point and the chain changes that would make this block best
    let mut path = index.reorg_path(parent);
    let fork_height = index.node(path.fork).height;

    let update = IndexUpdate {
        entry: IndexEntry::from_header(header, status),
        best_tip: becomes_best.then_some(hash),
    };
    store.commit(&update).map_err(store_error)?;

    let id = index.insert(BlockNode::new(header, Some(parent), work_sum, status));
    let mut notifications = Vec::new();

    if !becomes_best {
        let fork_length = (height - fork_height) as i64;
        debug!(
            "Block {hash} at height {height} extends a side chain forking at height {fork_height}"
        );
        notifications.push(ChainNotification::BlockAccepted {
            hash,
            height,
            fork_length,
            best_chain: false,
        });
        return Ok(Accepted {
            fork_length,
            notifications,
        });
    }

    path.attach.push(id);
    index.reparent_subtree(&path);

    let fork_length = (best_height - fork_height) as i64;
    for id in &path.detach {
        let node = index.node(*id);
        notifications.push(ChainNotification::BlockDisconnected {
            hash: node.hash,
            height: node.height,
        });
    }
    for id in &path.attach {
        let node = index.node(*id);
        notifications.push(ChainNotification::BlockConnected {
            hash: node.hash,
            height: node.height,
        });
    }

    if !path.detach.is_empty() {
        info!(
            "Reorganized chain from {best_hash} (height {best_height}) to {hash} (height {height}) \
             forking at height {fork_height}: {} detached, {} attached",
            path.detach.len(),
            path.attach.len()
        );
        notifications.push(ChainNotification::Reorganized(ReorgEvent {
            old_tip: best_hash,
            new_tip: hash,
            fork_height,
            detached: path.detach.iter().map(|id| index.node(*id).hash).collect(),
            attached: path.attach.iter().map(|id| index.node(*id).hash).collect(),
        }));
    }

    notifications.push(ChainNotification::BlockAccepted {
        hash,
        height,
        fork_length,
        best_chain: true,
    });

    Ok(Accepted {
        fork_length,
        notifications,
    })
}
