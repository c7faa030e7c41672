//! Block processing entry point and chain queries.

use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use dashu_int::UBig;
use strata_common::{BehaviorFlags, Block, BlockHash, ChainParams, TimeSource};
use tracing::{debug, info, trace};

use crate::acceptor::{check_block_context, maybe_accept_block, ChainState};
use crate::agenda::{AgendaResolver, ThresholdState};
use crate::block_index::BlockIndex;
use crate::chain_observer::{dispatch, ChainNotification, ChainObserver};
use crate::index_node::{BlockNode, BlockStatus, ChainMembership};
use crate::index_store::{rebuild_index, store_error, IndexEntry, IndexStore, IndexUpdate};
use crate::pow::calc_work;
use crate::rule_error::{rule_error, ChainError, ErrorKind, InternalError};
use crate::sanity::{check_block_sanity_context_free, check_block_sanity_contextual};
use crate::script_validator::{AcceptAllScripts, BlockScriptValidator};

/// Snapshot of the best chain tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestState {
    pub hash: BlockHash,
    pub height: u64,
    pub bits: u32,
    pub work_sum: UBig,
    pub median_time: i64,
}

/// Public view of one indexed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    pub hash: BlockHash,
    pub parent: Option<BlockHash>,
    pub height: u64,
    pub work_sum: UBig,
    pub status: BlockStatus,
    pub membership: ChainMembership,
}

/// Logs the processing time of a block when dropped, on every exit path.
struct ProcessTimer {
    hash: BlockHash,
    height: u32,
    start: Instant,
}

impl Drop for ProcessTimer {
    fn drop(&mut self) {
        debug!(
            "Block {} (height {}) finished processing in {:?}",
            self.hash,
            self.height,
            self.start.elapsed()
        );
    }
}

pub struct BlockChain {
    params: Arc<ChainParams>,
    time_source: Arc<dyn TimeSource>,
    store: Arc<dyn IndexStore>,
    script_validator: Arc<dyn BlockScriptValidator>,
    /// Serialises whole `process_block` calls
    process_lock: Mutex<()>,
    /// Guards the index; held for writing only while it mutates
    chain_lock: RwLock<ChainState>,
    observers: RwLock<Vec<Arc<dyn ChainObserver>>>,
}

impl BlockChain {
    /// Open the chain over `store`, seeding it with the network genesis
    /// block if it is empty.
    pub fn new(
        params: ChainParams,
        time_source: Arc<dyn TimeSource>,
        store: Arc<dyn IndexStore>,
    ) -> Result<Self, ChainError> {
        let genesis = params.genesis_block();
        let genesis_hash = genesis.hash();

        let index = match store.load().map_err(store_error)? {
            Some(stored) => rebuild_index(&stored, &genesis_hash)?,
            None => {
                let update = IndexUpdate {
                    entry: IndexEntry::from_header(&genesis.header, BlockStatus::Validated),
                    best_tip: Some(genesis_hash),
                };
                store.commit(&update).map_err(store_error)?;
                info!("Initialised {} chain at genesis {genesis_hash}", params.network);
                BlockIndex::new(BlockNode::new(
                    &genesis.header,
                    None,
                    calc_work(genesis.header.bits),
                    BlockStatus::Validated,
                ))
            }
        };

        let agendas = AgendaResolver::new(&params);
        Ok(Self {
            params: Arc::new(params),
            time_source,
            store,
            script_validator: Arc::new(AcceptAllScripts),
            process_lock: Mutex::new(()),
            chain_lock: RwLock::new(ChainState { index, agendas }),
            observers: RwLock::new(Vec::new()),
        })
    }

    pub fn with_script_validator(mut self, validator: Arc<dyn BlockScriptValidator>) -> Self {
        self.script_validator = validator;
        self
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn add_observer(&self, observer: Arc<dyn ChainObserver>) -> Result<(), ChainError> {
        self.observers
            .write()
            .map_err(|_| InternalError::LockPoisoned("observers"))?
            .push(observer);
        Ok(())
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, ChainState>, ChainError> {
        Ok(self.chain_lock.read().map_err(|_| InternalError::LockPoisoned("chain state"))?)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, ChainState>, ChainError> {
        Ok(self.chain_lock.write().map_err(|_| InternalError::LockPoisoned("chain state"))?)
    }

    /// Validate `block` and add it to the index, reorganising onto it if it
    /// makes a heavier chain.
    ///
    /// Returns the fork length: 0 when the block extends the best chain,
    /// the number of old best chain blocks replaced when it triggers a
    /// reorganisation, or its distance from the fork point when it lands on
    /// a side chain. On error the chain is exactly as it was.
    pub fn process_block(&self, block: &Block, flags: BehaviorFlags) -> Result<i64, ChainError> {
        let _serialised =
            self.process_lock.lock().map_err(|_| InternalError::LockPoisoned("process"))?;

        let hash = block.hash();
        trace!("Processing block {hash}");
        let _timer = ProcessTimer {
            hash,
            height: block.height(),
            start: Instant::now(),
        };

        if self.read_state()?.index.have_block(&hash) {
            return Err(rule_error(
                ErrorKind::DuplicateBlock,
                format!("already have block {hash}"),
            ));
        }

        check_block_sanity_context_free(block, self.time_source.as_ref(), flags, &self.params)?;

        // Only this call mutates the index while the process lock is held,
        // so what is read here still holds when the write lock is taken
        let prev_hash = block.header.prev_block;
        let agenda = {
            let state = self.read_state()?;
            let Some((parent, _)) = state.index.get_parent_entry(&prev_hash) else {
                return Err(rule_error(
                    ErrorKind::MissingParent,
                    format!("previous block {prev_hash} is not known"),
                ));
            };
            let agenda = state.agendas.agenda_context(&state.index, &prev_hash)?;
            check_block_context(&state.index, parent, &block.header, flags)?;
            agenda
        };

        check_block_sanity_contextual(block, &self.params, agenda)?;

        let status = if flags.is_fast_add() {
            BlockStatus::Accepted
        } else {
            self.script_validator.validate_scripts(block, &agenda).map_err(|e| {
                rule_error(
                    ErrorKind::ScriptValidation,
                    format!("block {hash} failed script validation: {e:#}"),
                )
            })?;
            BlockStatus::Validated
        };

        let accepted = {
            let mut state = self.write_state()?;
            maybe_accept_block(&mut state, self.store.as_ref(), block, status)?
        };

        self.notify(&accepted.notifications)?;
        debug!("Accepted block {hash}");
        Ok(accepted.fork_length)
    }

    fn notify(&self, notifications: &[ChainNotification]) -> Result<(), ChainError> {
        let observers =
            self.observers.read().map_err(|_| InternalError::LockPoisoned("observers"))?;
        for notification in notifications {
            for observer in observers.iter() {
                dispatch(observer.as_ref(), notification);
            }
        }
        Ok(())
    }

    pub fn best_snapshot(&self) -> Result<BestState, ChainError> {
        let state = self.read_state()?;
        let tip = state.index.best_tip();
        let node = state.index.node(tip);
        Ok(BestState {
            hash: node.hash,
            height: node.height,
            bits: node.bits,
            work_sum: node.work_sum.clone(),
            median_time: state.index.median_time_past(tip),
        })
    }

    /// Whether the block is indexed on any chain.
    pub fn have_block(&self, hash: &BlockHash) -> Result<bool, ChainError> {
        Ok(self.read_state()?.index.have_block(hash))
    }

    pub fn main_chain_has_block(&self, hash: &BlockHash) -> Result<bool, ChainError> {
        Ok(self.read_state()?.index.entry(hash).is_some_and(BlockNode::is_main_chain))
    }

    pub fn block_height(&self, hash: &BlockHash) -> Result<Option<u64>, ChainError> {
        Ok(self.read_state()?.index.entry(hash).map(|n| n.height))
    }

    pub fn main_chain_hash_at(&self, height: u64) -> Result<Option<BlockHash>, ChainError> {
        let state = self.read_state()?;
        Ok(state.index.main_chain_at(height).map(|id| state.index.node(id).hash))
    }

    pub fn block_entry(&self, hash: &BlockHash) -> Result<Option<BlockEntry>, ChainError> {
        let state = self.read_state()?;
        let index = &state.index;
        Ok(index.entry(hash).map(|node| BlockEntry {
            hash: node.hash,
            parent: node.parent.map(|p| index.node(p).hash),
            height: node.height,
            work_sum: node.work_sum.clone(),
            status: node.status,
            membership: node.membership,
        }))
    }

    /// Whether the treasury agenda applies to a child of `parent_hash`.
    pub fn is_treasury_agenda_active(&self, parent_hash: &BlockHash) -> Result<bool, ChainError> {
        let state = self.read_state()?;
        state.agendas.is_treasury_agenda_active(&state.index, parent_hash)
    }

    /// Threshold state of deployment `name` for a child of `parent_hash`.
    pub fn deployment_state(
        &self,
        name: &str,
        parent_hash: &BlockHash,
    ) -> Result<Option<ThresholdState>, ChainError> {
        let Some(deployment) = self.params.deployment(name) else {
            return Ok(None);
        };
        let state = self.read_state()?;
        let parent = state.index.lookup(parent_hash);
        if parent.is_none() {
            return Ok(None);
        }
        state.agendas.deployment_state(&state.index, parent, deployment).map(Some)
    }
}
