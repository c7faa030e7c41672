//! Consensus parameters for each network

use crate::configuration::Network;
use crate::merkle::transactions_root;
use crate::types::{Block, BlockHeader, OutPoint, Transaction, TxIn, TxOut};

/// Name of the treasury agenda deployment.
pub const TREASURY_AGENDA: &str = "treasury";

/// Number of ancestors used for the median time past.
pub const MEDIAN_TIME_BLOCKS: usize = 11;

/// A votable rule change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    /// Agenda identifier
    pub name: String,

    /// Bits of the header vote field owned by this agenda
    pub mask: u16,

    /// Masked value which counts as a yes vote
    pub yes_choice: u16,

    /// Median time from which voting may start
    pub start_time: i64,

    /// Median time after which an agenda that has not locked in fails
    pub expire_time: i64,

    /// Treat the agenda as active from genesis
    pub always_active: bool,
}

/// Consensus parameters
#[derive(Debug, Clone)]
pub struct ChainParams {
    pub network: Network,

    /// Easiest allowed compact proof-of-work target
    pub pow_limit_bits: u32,

    /// How far ahead of adjusted time a block timestamp may be, in seconds
    pub max_future_block_time: i64,

    pub max_block_size: usize,

    pub max_votes_per_block: u16,

    pub max_fresh_stake_per_block: u8,

    /// Upper bound on any output value, in atoms
    pub max_atoms: i64,

    /// Blocks per agenda voting window
    pub rule_change_interval: u32,

    /// Yes votes needed to lock in, as multiplier/divisor of the window
    pub rule_change_quorum_multiplier: u32,
    pub rule_change_quorum_divisor: u32,

    /// Treasury spends may only appear on multiples of this height
    pub treasury_vote_interval: u32,

    pub max_tspends_per_block: usize,

    pub deployments: Vec<Deployment>,

    pub genesis_timestamp: i64,
}

impl ChainParams {
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self::mainnet(),
            Network::Testnet => Self::testnet(),
            Network::Simnet => Self::simnet(),
            Network::Regnet => Self::regnet(),
        }
    }

    pub fn mainnet() -> Self {
        Self {
            network: Network::Mainnet,
            pow_limit_bits: 0x1d00ffff,
            max_future_block_time: 2 * 60 * 60,
            max_block_size: 393_216,
            max_votes_per_block: 5,
            max_fresh_stake_per_block: 20,
            max_atoms: 21_000_000 * 100_000_000,
            rule_change_interval: 8064,
            rule_change_quorum_multiplier: 3,
            rule_change_quorum_divisor: 4,
            treasury_vote_interval: 288,
            max_tspends_per_block: 7,
            deployments: vec![Deployment {
                name: TREASURY_AGENDA.to_string(),
                mask: 0x0006,
                yes_choice: 0x0004,
                start_time: 1_596_240_000,
                expire_time: 1_627_776_000,
                always_active: false,
            }],
            genesis_timestamp: 1_454_954_400,
        }
    }

    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            pow_limit_bits: 0x1e00ffff,
            rule_change_interval: 2016,
            treasury_vote_interval: 144,
            genesis_timestamp: 1_533_513_600,
            ..Self::mainnet()
        }
    }

    pub fn simnet() -> Self {
        Self {
            network: Network::Simnet,
            pow_limit_bits: 0x207fffff,
            rule_change_interval: 320,
            treasury_vote_interval: 16,
            deployments: vec![Deployment {
                name: TREASURY_AGENDA.to_string(),
                mask: 0x0006,
                yes_choice: 0x0004,
                start_time: 0,
                expire_time: i64::MAX,
                always_active: false,
            }],
            genesis_timestamp: 1_401_292_357,
            ..Self::mainnet()
        }
    }

    /// Regression network: trivial proof of work and a treasury agenda that
    /// is active from genesis.
    pub fn regnet() -> Self {
        Self {
            network: Network::Regnet,
            rule_change_interval: 144,
            treasury_vote_interval: 4,
            deployments: vec![Deployment {
                name: TREASURY_AGENDA.to_string(),
                mask: 0x0006,
                yes_choice: 0x0004,
                start_time: 0,
                expire_time: i64::MAX,
                always_active: true,
            }],
            genesis_timestamp: 1_538_524_800,
            ..Self::simnet()
        }
    }

    pub fn deployment(&self, name: &str) -> Option<&Deployment> {
        self.deployments.iter().find(|d| d.name == name)
    }

    /// Yes votes within one window needed to lock an agenda in.
    pub fn rule_change_threshold(&self) -> u64 {
        let interval = u64::from(self.rule_change_interval);
        (interval * u64::from(self.rule_change_quorum_multiplier))
            .div_ceil(u64::from(self.rule_change_quorum_divisor.max(1)))
    }

    /// Genesis block for this network. It is never validated; it seeds the
    /// block index.
    pub fn genesis_block(&self) -> Block {
        let coinbase = Transaction {
            version: 1,
            inputs: vec![TxIn {
                previous_outpoint: OutPoint::null(),
                sequence: u32::MAX,
                value_in: 0,
                signature_script: format!("strata {} genesis", self.network).into_bytes(),
            }],
            outputs: vec![TxOut {
                value: 0,
                version: 0,
                pk_script: vec![0x6a],
            }],
            lock_time: 0,
            expiry: 0,
        };
        let transactions = vec![coinbase];

        Block {
            header: BlockHeader {
                version: 1,
                merkle_root: transactions_root(&transactions),
                bits: self.pow_limit_bits,
                height: 0,
                timestamp: self.genesis_timestamp,
                ..Default::default()
            },
            transactions,
            stake_transactions: Vec::new(),
        }
    }
}
