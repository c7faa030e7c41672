//! Block builders and a chain harness shared by the integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use strata_common::merkle::transactions_root;
use strata_common::{
    BehaviorFlags, Block, BlockHash, BlockHeader, ChainParams, FixedTimeSource, OutPoint,
    Transaction, TxHash, TxIn, TxOut, TxTree, OP_SSGEN, OP_TGEN,
};
use strata_module_chain_selection::pow::{compact_to_big, hash_to_big};
use strata_module_chain_selection::{
    BlockChain, ChainError, ChainObserver, InMemoryIndexStore, IndexStore, ReorgEvent,
};

/// Seconds between the genesis timestamp and the harness clock.
pub const CLOCK_AHEAD: i64 = 1_000_000;

fn null_input(tag: u32) -> TxIn {
    let mut script = vec![0x03];
    script.extend_from_slice(&tag.to_le_bytes());
    TxIn {
        previous_outpoint: OutPoint::null(),
        sequence: u32::MAX,
        value_in: 0,
        signature_script: script,
    }
}

fn spend(tag: u32) -> TxIn {
    TxIn {
        previous_outpoint: OutPoint {
            hash: TxHash::digest(&tag.to_le_bytes()),
            index: 0,
            tree: TxTree::Stake,
        },
        sequence: u32::MAX,
        value_in: 1,
        signature_script: vec![0x51],
    }
}

fn output(tag_byte: u8) -> TxOut {
    TxOut {
        value: 1,
        version: 0,
        pk_script: vec![tag_byte, 0x76, 0xa9, 0x14],
    }
}

/// Coinbase made unique by `tag`.
pub fn coinbase(tag: u32) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![null_input(tag)],
        outputs: vec![output(0x76)],
        lock_time: 0,
        expiry: 0,
    }
}

pub fn treasurybase(tag: u32) -> Transaction {
    Transaction {
        version: 3,
        inputs: vec![null_input(tag)],
        outputs: vec![output(OP_TGEN)],
        lock_time: 0,
        expiry: 0,
    }
}

pub fn vote(tag: u32) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![null_input(tag), spend(tag)],
        outputs: vec![output(OP_SSGEN)],
        lock_time: 0,
        expiry: 0,
    }
}

/// Builds a child block with consistent commitments.
pub struct BlockBuilder {
    block: Block,
}

impl BlockBuilder {
    /// Child of `parent` one second later, distinguished from siblings by `tag`.
    pub fn child_of(parent: &Block, tag: u32) -> Self {
        let header = BlockHeader {
            version: 1,
            prev_block: parent.hash(),
            bits: parent.header.bits,
            height: parent.header.height + 1,
            timestamp: parent.header.timestamp + 1,
            ..Default::default()
        };
        Self {
            block: Block {
                header,
                transactions: vec![coinbase(tag)],
                stake_transactions: Vec::new(),
            },
        }
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.block.header.timestamp = timestamp;
        self
    }

    pub fn vote_bits(mut self, vote_bits: u16) -> Self {
        self.block.header.vote_bits = vote_bits;
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.block.header.height = height;
        self
    }

    pub fn stake(mut self, txs: Vec<Transaction>) -> Self {
        self.block.stake_transactions = txs;
        self
    }

    /// Commit to the transaction trees without solving proof of work.
    pub fn build_unsolved(mut self) -> Block {
        let block = &mut self.block;
        block.header.merkle_root = transactions_root(&block.transactions);
        block.header.stake_root = transactions_root(&block.stake_transactions);
        block.header.voters = block
            .stake_transactions
            .iter()
            .filter(|tx| tx.outputs[0].pk_script[0] == OP_SSGEN)
            .count() as u16;
        self.block
    }

    /// Commit and solve proof of work.
    pub fn build(self) -> Block {
        solve(self.build_unsolved())
    }
}

/// Grind the nonce until the hash meets the target.
pub fn solve(mut block: Block) -> Block {
    let target = compact_to_big(block.header.bits).unwrap();
    while hash_to_big(&block.hash()) > target {
        block.header.nonce += 1;
    }
    block
}

/// Grind the nonce until the hash misses the target.
pub fn unsolve(mut block: Block) -> Block {
    let target = compact_to_big(block.header.bits).unwrap();
    while hash_to_big(&block.hash()) <= target {
        block.header.nonce += 1;
    }
    block
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Accepted {
        hash: BlockHash,
        fork_length: i64,
        best_chain: bool,
    },
    Connected(BlockHash),
    Disconnected(BlockHash),
    Reorganized(ReorgEvent),
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl ChainObserver for RecordingObserver {
    fn block_accepted(&self, hash: BlockHash, _height: u64, fork_length: i64, best_chain: bool) {
        self.events.lock().unwrap().push(Event::Accepted {
            hash,
            fork_length,
            best_chain,
        });
    }

    fn block_connected(&self, hash: BlockHash, _height: u64) {
        self.events.lock().unwrap().push(Event::Connected(hash));
    }

    fn block_disconnected(&self, hash: BlockHash, _height: u64) {
        self.events.lock().unwrap().push(Event::Disconnected(hash));
    }

    fn reorganized(&self, event: &ReorgEvent) {
        self.events.lock().unwrap().push(Event::Reorganized(event.clone()));
    }
}

pub struct Harness {
    pub chain: BlockChain,
    pub time: Arc<FixedTimeSource>,
    pub observer: Arc<RecordingObserver>,
    pub genesis: Block,
}

impl Harness {
    pub fn new(params: ChainParams) -> Self {
        Self::with_store(params, Arc::new(InMemoryIndexStore::new()))
    }

    pub fn with_store(params: ChainParams, store: Arc<dyn IndexStore>) -> Self {
        let genesis = params.genesis_block();
        let time = Arc::new(FixedTimeSource::new(params.genesis_timestamp + CLOCK_AHEAD));
        let chain = BlockChain::new(params, time.clone(), store).unwrap();
        let observer = Arc::new(RecordingObserver::default());
        chain.add_observer(observer.clone()).unwrap();
        Self {
            chain,
            time,
            observer,
            genesis,
        }
    }

    pub fn process(&self, block: &Block) -> Result<i64, ChainError> {
        self.chain.process_block(block, BehaviorFlags::NONE)
    }

    /// Build and accept `len` blocks on `parent`, tagging them from `tag`.
    pub fn extend(&self, parent: &Block, len: u32, tag: u32) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut tip = parent.clone();
        for i in 0..len {
            let block = BlockBuilder::child_of(&tip, tag + i).build();
            self.process(&block).unwrap();
            tip = block.clone();
            blocks.push(block);
        }
        blocks
    }

    pub fn best_hash(&self) -> BlockHash {
        self.chain.best_snapshot().unwrap().hash
    }
}
