//! Core block and transaction model shared across Strata crates

use crate::hash::{BlockHash, TxHash};
use bitflags::bitflags;

/// Size in bytes of a serialised block header.
pub const HEADER_SIZE: usize = 4 + 32 + 32 + 32 + 2 + 2 + 1 + 1 + 4 + 4 + 8 + 4;

/// Output index marking a null (coinbase / stakebase) previous outpoint.
pub const NULL_OUTPOINT_INDEX: u32 = u32::MAX;

// Tag opcodes identifying stake transaction outputs.
pub const OP_SSTX: u8 = 0xba;
pub const OP_SSGEN: u8 = 0xbb;
pub const OP_SSRTX: u8 = 0xbc;
pub const OP_TADD: u8 = 0xc1;
pub const OP_TSPEND: u8 = 0xc2;
pub const OP_TGEN: u8 = 0xc3;

bitflags! {
    /// Tweaks to the normal behaviour of block processing for one call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BehaviorFlags: u32 {
        /// The block is already known to link into the chain up to a
        /// trusted checkpoint, so checks which that linkage guarantees may
        /// be skipped. Used by headers-first sync.
        const FAST_ADD = 1 << 0;

        /// Skip the check that the block hashes below its target.
        const NO_POW_CHECK = 1 << 1;
    }
}

impl BehaviorFlags {
    /// No tweaks.
    pub const NONE: Self = Self::empty();

    pub fn is_fast_add(&self) -> bool {
        self.contains(Self::FAST_ADD)
    }

    pub fn skip_pow(&self) -> bool {
        self.contains(Self::NO_POW_CHECK)
    }
}

/// Which transaction tree an outpoint refers to
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TxTree {
    #[default]
    Regular,
    Stake,
}

impl TxTree {
    fn as_byte(self) -> u8 {
        match self {
            TxTree::Regular => 0,
            TxTree::Stake => 1,
        }
    }
}

/// Classification of a transaction by the tag of its first output script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    Regular,
    TicketPurchase,
    Vote,
    Revocation,
    TreasuryAdd,
    TreasurySpend,
    Treasurybase,
}

impl TxKind {
    pub fn is_stake(&self) -> bool {
        !matches!(self, TxKind::Regular)
    }

    pub fn is_treasury(&self) -> bool {
        matches!(
            self,
            TxKind::TreasuryAdd | TxKind::TreasurySpend | TxKind::Treasurybase
        )
    }
}

/// Reference to a previous transaction output
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct OutPoint {
    pub hash: TxHash,
    pub index: u32,
    pub tree: TxTree,
}

impl OutPoint {
    /// Outpoint used by inputs which create new coins.
    pub fn null() -> Self {
        Self {
            hash: TxHash::ZERO,
            index: NULL_OUTPOINT_INDEX,
            tree: TxTree::Regular,
        }
    }

    pub fn is_null(&self) -> bool {
        self.index == NULL_OUTPOINT_INDEX && self.hash.is_zero()
    }
}

/// Transaction input
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TxIn {
    pub previous_outpoint: OutPoint,
    pub sequence: u32,
    pub value_in: i64,
    pub signature_script: Vec<u8>,
}

/// Transaction output
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TxOut {
    pub value: i64,
    pub version: u16,
    pub pk_script: Vec<u8>,
}

/// Transaction
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub version: u16,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
    pub expiry: u32,
}

impl Transaction {
    /// Canonical little-endian serialisation.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            buf.extend_from_slice(input.previous_outpoint.hash.as_ref());
            buf.extend_from_slice(&input.previous_outpoint.index.to_le_bytes());
            buf.push(input.previous_outpoint.tree.as_byte());
            buf.extend_from_slice(&input.sequence.to_le_bytes());
            buf.extend_from_slice(&input.value_in.to_le_bytes());
            buf.extend_from_slice(&(input.signature_script.len() as u32).to_le_bytes());
            buf.extend_from_slice(&input.signature_script);
        }
        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            buf.extend_from_slice(&output.version.to_le_bytes());
            buf.extend_from_slice(&(output.pk_script.len() as u32).to_le_bytes());
            buf.extend_from_slice(&output.pk_script);
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf.extend_from_slice(&self.expiry.to_le_bytes());
        buf
    }

    pub fn serialized_size(&self) -> usize {
        let inputs: usize =
            self.inputs.iter().map(|i| 32 + 4 + 1 + 4 + 8 + 4 + i.signature_script.len()).sum();
        let outputs: usize = self.outputs.iter().map(|o| 8 + 2 + 4 + o.pk_script.len()).sum();
        2 + 4 + inputs + 4 + outputs + 4 + 4
    }

    pub fn hash(&self) -> TxHash {
        TxHash::digest(&self.serialize())
    }

    /// Kind of transaction, derived from the tag of the first output.
    pub fn kind(&self) -> TxKind {
        match self.outputs.first().and_then(|o| o.pk_script.first()) {
            Some(&OP_SSTX) => TxKind::TicketPurchase,
            Some(&OP_SSGEN) => TxKind::Vote,
            Some(&OP_SSRTX) => TxKind::Revocation,
            Some(&OP_TADD) => TxKind::TreasuryAdd,
            Some(&OP_TSPEND) => TxKind::TreasurySpend,
            Some(&OP_TGEN) => TxKind::Treasurybase,
            _ => TxKind::Regular,
        }
    }

    /// A coinbase has exactly one input which spends the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.kind() == TxKind::Regular
            && self.inputs.len() == 1
            && self.inputs[0].previous_outpoint.is_null()
    }
}

/// Block header
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockHeader {
    pub version: i32,

    /// Hash of the parent block; zero for genesis
    pub prev_block: BlockHash,

    /// Merkle root of the regular transaction tree
    pub merkle_root: TxHash,

    /// Merkle root of the stake transaction tree
    pub stake_root: TxHash,

    /// Agenda vote bits signalled by this block
    pub vote_bits: u16,

    /// Number of votes included in the stake tree
    pub voters: u16,

    /// Number of ticket purchases included in the stake tree
    pub fresh_stake: u8,

    /// Number of revocations included in the stake tree
    pub revocations: u8,

    /// Compact proof-of-work target
    pub bits: u32,

    pub height: u32,

    /// Unix time in seconds
    pub timestamp: i64,

    pub nonce: u32,
}

impl BlockHeader {
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(self.prev_block.as_ref());
        buf.extend_from_slice(self.merkle_root.as_ref());
        buf.extend_from_slice(self.stake_root.as_ref());
        buf.extend_from_slice(&self.vote_bits.to_le_bytes());
        buf.extend_from_slice(&self.voters.to_le_bytes());
        buf.push(self.fresh_stake);
        buf.push(self.revocations);
        buf.extend_from_slice(&self.bits.to_le_bytes());
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf
    }

    pub fn hash(&self) -> BlockHash {
        BlockHash::digest(&self.serialize())
    }
}

/// Candidate block: header plus regular and stake transaction trees
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub stake_transactions: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> BlockHash {
        self.header.hash()
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn serialized_size(&self) -> usize {
        let regular: usize = self.transactions.iter().map(Transaction::serialized_size).sum();
        let stake: usize = self.stake_transactions.iter().map(Transaction::serialized_size).sum();
        HEADER_SIZE + 4 + regular + 4 + stake
    }
}

/// Agenda vote signalled alongside a block, as carried by the RPC layer
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VoteBits {
    pub bits: u16,
    pub extended_bits: Vec<u8>,
}
