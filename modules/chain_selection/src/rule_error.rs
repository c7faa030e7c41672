//! Error types for block processing.
//!
//! Consensus rule violations are expected and recoverable: the block is
//! invalid, or cannot yet be connected. Internal errors mean the core can
//! no longer trust its own state and the caller may want to halt.

use std::fmt;

use strata_common::TimeSourceError;
use thiserror::Error;

/// Identifies the specific consensus rule a block violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Block already exists in the main chain or a side chain.
    DuplicateBlock,
    /// Parent block is not known to the index.
    MissingParent,
    /// Timestamp too far ahead of adjusted time.
    TimeTooNew,
    /// Timestamp not after the median time of recent ancestors.
    TimeTooOld,
    /// Compact target is non-positive or above the network limit.
    UnexpectedDifficulty,
    /// Block hash is above its claimed target.
    HighHash,
    /// Header height does not follow the parent.
    BadBlockHeight,
    NoTransactions,
    BlockTooBig,
    FirstTxNotCoinbase,
    MultipleCoinbases,
    BadCoinbaseScriptLen,
    NoTxInputs,
    NoTxOutputs,
    BadTxOutValue,
    DuplicateTxInputs,
    /// Non-coinbase input spends the null outpoint.
    BadTxInput,
    StakeTxInRegularTree,
    RegTxInStakeTree,
    TooManyVotes,
    VotesMismatch,
    TooManyFreshStake,
    FreshStakeMismatch,
    RevocationsMismatch,
    BadMerkleRoot,
    BadStakeRoot,
    DuplicateTx,
    /// Treasury transaction before the treasury agenda is active.
    TreasuryTxBeforeActivation,
    FirstTxNotTreasurybase,
    MultipleTreasurybases,
    /// Treasury spend outside a treasury vote interval block.
    NotTvi,
    TooManyTSpends,
    /// Rejected by the transaction script validator.
    ScriptValidation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DuplicateBlock => "ErrDuplicateBlock",
            ErrorKind::MissingParent => "ErrMissingParent",
            ErrorKind::TimeTooNew => "ErrTimeTooNew",
            ErrorKind::TimeTooOld => "ErrTimeTooOld",
            ErrorKind::UnexpectedDifficulty => "ErrUnexpectedDifficulty",
            ErrorKind::HighHash => "ErrHighHash",
            ErrorKind::BadBlockHeight => "ErrBadBlockHeight",
            ErrorKind::NoTransactions => "ErrNoTransactions",
            ErrorKind::BlockTooBig => "ErrBlockTooBig",
            ErrorKind::FirstTxNotCoinbase => "ErrFirstTxNotCoinbase",
            ErrorKind::MultipleCoinbases => "ErrMultipleCoinbases",
            ErrorKind::BadCoinbaseScriptLen => "ErrBadCoinbaseScriptLen",
            ErrorKind::NoTxInputs => "ErrNoTxInputs",
            ErrorKind::NoTxOutputs => "ErrNoTxOutputs",
            ErrorKind::BadTxOutValue => "ErrBadTxOutValue",
            ErrorKind::DuplicateTxInputs => "ErrDuplicateTxInputs",
            ErrorKind::BadTxInput => "ErrBadTxInput",
            ErrorKind::StakeTxInRegularTree => "ErrStakeTxInRegularTree",
            ErrorKind::RegTxInStakeTree => "ErrRegTxInStakeTree",
            ErrorKind::TooManyVotes => "ErrTooManyVotes",
            ErrorKind::VotesMismatch => "ErrVotesMismatch",
            ErrorKind::TooManyFreshStake => "ErrTooManySStxs",
            ErrorKind::FreshStakeMismatch => "ErrFreshStakeMismatch",
            ErrorKind::RevocationsMismatch => "ErrRevocationsMismatch",
            ErrorKind::BadMerkleRoot => "ErrBadMerkleRoot",
            ErrorKind::BadStakeRoot => "ErrBadStakeRoot",
            ErrorKind::DuplicateTx => "ErrDuplicateTx",
            ErrorKind::TreasuryTxBeforeActivation => "ErrTreasuryTxBeforeActivation",
            ErrorKind::FirstTxNotTreasurybase => "ErrFirstTxNotTreasurybase",
            ErrorKind::MultipleTreasurybases => "ErrMultipleTreasurybases",
            ErrorKind::NotTvi => "ErrNotTVI",
            ErrorKind::TooManyTSpends => "ErrTooManyTSpends",
            ErrorKind::ScriptValidation => "ErrScriptValidation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A consensus rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{description}")]
pub struct RuleError {
    pub kind: ErrorKind,
    pub description: String,
}

pub fn rule_error(kind: ErrorKind, description: impl Into<String>) -> ChainError {
    ChainError::Rule(RuleError {
        kind,
        description: description.into(),
    })
}

/// A fault in the core itself or one of its collaborators.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InternalError {
    /// An invariant the core relies on does not hold.
    #[error("assertion failed: {0}")]
    Assert(String),

    #[error(transparent)]
    TimeSource(#[from] TimeSourceError),

    /// The persistent index rejected a write or read.
    #[error("index store failure: {0}")]
    Store(String),

    /// Persisted index data is inconsistent.
    #[error("index corruption: {0}")]
    Corruption(String),

    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
}

/// Any failure of block processing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl ChainError {
    pub fn is_rule_error(&self) -> bool {
        matches!(self, ChainError::Rule(_))
    }

    pub fn rule_kind(&self) -> Option<ErrorKind> {
        match self {
            ChainError::Rule(e) => Some(e.kind),
            ChainError::Internal(_) => None,
        }
    }

    pub(crate) fn assert(msg: impl Into<String>) -> Self {
        ChainError::Internal(InternalError::Assert(msg.into()))
    }
}

impl From<TimeSourceError> for ChainError {
    fn from(e: TimeSourceError) -> Self {
        ChainError::Internal(InternalError::TimeSource(e))
    }
}
