//! Block sanity rules.
//!
//! Context-free checks need only the block, the adjusted time and the
//! network parameters. Contextual checks additionally depend on agenda
//! activation, resolved from the parent before they run. Neither touches
//! the block index.

use std::collections::HashSet;

use strata_common::merkle::transactions_root;
use strata_common::{
    Block, BehaviorFlags, BlockHeader, ChainParams, TimeSource, Transaction, TxKind, TxTree,
};

use crate::agenda::AgendaContext;
use crate::pow::check_proof_of_work;
use crate::rule_error::{rule_error, ChainError, ErrorKind};

const MIN_COINBASE_SCRIPT_LEN: usize = 2;
const MAX_COINBASE_SCRIPT_LEN: usize = 100;

fn check_block_header_sanity(
    header: &BlockHeader,
    time_source: &dyn TimeSource,
    flags: BehaviorFlags,
    params: &ChainParams,
) -> Result<(), ChainError> {
    check_proof_of_work(header, params, flags.skip_pow())?;

    let max_timestamp = time_source.adjusted_time()? + params.max_future_block_time;
    if header.timestamp > max_timestamp {
        return Err(rule_error(
            ErrorKind::TimeTooNew,
            format!(
                "block timestamp of {} is too far in the future (max {max_timestamp})",
                header.timestamp
            ),
        ));
    }

    Ok(())
}

/// Structural checks shared by transactions in either tree.
fn check_transaction_sanity(tx: &Transaction, params: &ChainParams) -> Result<(), ChainError> {
    if tx.inputs.is_empty() {
        return Err(rule_error(ErrorKind::NoTxInputs, "transaction has no inputs"));
    }
    if tx.outputs.is_empty() {
        return Err(rule_error(ErrorKind::NoTxOutputs, "transaction has no outputs"));
    }

    let mut total: i64 = 0;
    for output in &tx.outputs {
        if output.value < 0 {
            return Err(rule_error(
                ErrorKind::BadTxOutValue,
                format!("transaction output has negative value of {}", output.value),
            ));
        }
        if output.value > params.max_atoms {
            return Err(rule_error(
                ErrorKind::BadTxOutValue,
                format!(
                    "transaction output value of {} is higher than max allowed value of {}",
                    output.value, params.max_atoms
                ),
            ));
        }
        total = match total.checked_add(output.value) {
            Some(t) if t <= params.max_atoms => t,
            _ => {
                return Err(rule_error(
                    ErrorKind::BadTxOutValue,
                    format!(
                        "total value of all transaction outputs exceeds max allowed value of {}",
                        params.max_atoms
                    ),
                ))
            }
        };
    }

    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        if !seen.insert(&input.previous_outpoint) {
            return Err(rule_error(
                ErrorKind::DuplicateTxInputs,
                "transaction contains duplicate inputs",
            ));
        }
    }

    Ok(())
}

fn check_no_null_inputs(tx: &Transaction, skip: usize) -> Result<(), ChainError> {
    if tx.inputs.iter().skip(skip).any(|i| i.previous_outpoint.is_null()) {
        return Err(rule_error(
            ErrorKind::BadTxInput,
            format!("transaction {} input refers to previous output that is null", tx.hash()),
        ));
    }
    Ok(())
}

/// Checks which depend on nothing but the block itself.
pub fn check_block_sanity_context_free(
    block: &Block,
    time_source: &dyn TimeSource,
    flags: BehaviorFlags,
    params: &ChainParams,
) -> Result<(), ChainError> {
    let header = &block.header;
    check_block_header_sanity(header, time_source, flags, params)?;

    if block.transactions.is_empty() {
        return Err(rule_error(ErrorKind::NoTransactions, "block does not contain any transactions"));
    }

    let size = block.serialized_size();
    if size > params.max_block_size {
        return Err(rule_error(
            ErrorKind::BlockTooBig,
            format!(
                "serialized block is too big - got {size}, max {}",
                params.max_block_size
            ),
        ));
    }

    if !block.transactions[0].is_coinbase() {
        return Err(rule_error(
            ErrorKind::FirstTxNotCoinbase,
            "first transaction in block is not a coinbase",
        ));
    }

    for (i, tx) in block.transactions.iter().enumerate() {
        check_transaction_sanity(tx, params)?;

        if tx.kind().is_stake() {
            return Err(rule_error(
                ErrorKind::StakeTxInRegularTree,
                format!("block contains a stake transaction in the regular tree at index {i}"),
            ));
        }

        if i == 0 {
            let len = tx.inputs[0].signature_script.len();
            if !(MIN_COINBASE_SCRIPT_LEN..=MAX_COINBASE_SCRIPT_LEN).contains(&len) {
                return Err(rule_error(
                    ErrorKind::BadCoinbaseScriptLen,
                    format!(
                        "coinbase transaction script length of {len} is out of range \
                         (min: {MIN_COINBASE_SCRIPT_LEN}, max: {MAX_COINBASE_SCRIPT_LEN})"
                    ),
                ));
            }
            continue;
        }

        if tx.is_coinbase() {
            return Err(rule_error(
                ErrorKind::MultipleCoinbases,
                format!("block contains second coinbase at index {i}"),
            ));
        }
        check_no_null_inputs(tx, 0)?;
    }

    let mut votes: u64 = 0;
    let mut tickets: u64 = 0;
    let mut revocations: u64 = 0;
    for tx in &block.stake_transactions {
        check_transaction_sanity(tx, params)?;

        match tx.kind() {
            TxKind::Regular => {
                return Err(rule_error(
                    ErrorKind::RegTxInStakeTree,
                    format!("block contains regular transaction {} in the stake tree", tx.hash()),
                ))
            }
            // The first input of a vote is the stakebase
            TxKind::Vote => {
                votes += 1;
                check_no_null_inputs(tx, 1)?;
            }
            TxKind::Treasurybase => {}
            TxKind::TicketPurchase => {
                tickets += 1;
                check_no_null_inputs(tx, 0)?;
            }
            TxKind::Revocation => {
                revocations += 1;
                check_no_null_inputs(tx, 0)?;
            }
            TxKind::TreasuryAdd | TxKind::TreasurySpend => check_no_null_inputs(tx, 0)?,
        }
    }

    if votes > u64::from(params.max_votes_per_block) {
        return Err(rule_error(
            ErrorKind::TooManyVotes,
            format!(
                "block contains too many votes - got {votes}, max {}",
                params.max_votes_per_block
            ),
        ));
    }
    if votes != u64::from(header.voters) {
        return Err(rule_error(
            ErrorKind::VotesMismatch,
            format!(
                "block header commitment to {} votes does not match {votes} contained in the block",
                header.voters
            ),
        ));
    }
    if tickets > u64::from(params.max_fresh_stake_per_block) {
        return Err(rule_error(
            ErrorKind::TooManyFreshStake,
            format!(
                "block contains too many ticket purchases - got {tickets}, max {}",
                params.max_fresh_stake_per_block
            ),
        ));
    }
    if tickets != u64::from(header.fresh_stake) {
        return Err(rule_error(
            ErrorKind::FreshStakeMismatch,
            format!(
                "block header commitment to {} ticket purchases does not match {tickets} \
                 contained in the block",
                header.fresh_stake
            ),
        ));
    }
    if revocations != u64::from(header.revocations) {
        return Err(rule_error(
            ErrorKind::RevocationsMismatch,
            format!(
                "block header commitment to {} revocations does not match {revocations} \
                 contained in the block",
                header.revocations
            ),
        ));
    }

    let merkle_root = transactions_root(&block.transactions);
    if merkle_root != header.merkle_root {
        return Err(rule_error(
            ErrorKind::BadMerkleRoot,
            format!(
                "block merkle root is invalid - block header indicates {}, but calculated value \
                 is {merkle_root}",
                header.merkle_root
            ),
        ));
    }
    let stake_root = transactions_root(&block.stake_transactions);
    if stake_root != header.stake_root {
        return Err(rule_error(
            ErrorKind::BadStakeRoot,
            format!(
                "block stake merkle root is invalid - block header indicates {}, but calculated \
                 value is {stake_root}",
                header.stake_root
            ),
        ));
    }

    let mut seen = HashSet::new();
    let trees = [
        (TxTree::Regular, &block.transactions),
        (TxTree::Stake, &block.stake_transactions),
    ];
    for (tree, txs) in trees {
        for tx in txs {
            let hash = tx.hash();
            if !seen.insert(hash) {
                return Err(rule_error(
                    ErrorKind::DuplicateTx,
                    format!("block contains duplicate transaction {hash} in the {tree:?} tree"),
                ));
            }
        }
    }

    Ok(())
}

/// Checks whose outcome depends on which agendas are active.
pub fn check_block_sanity_contextual(
    block: &Block,
    params: &ChainParams,
    agenda: AgendaContext,
) -> Result<(), ChainError> {
    let stake = &block.stake_transactions;

    if !agenda.is_treasury_active() {
        if let Some(tx) = stake.iter().find(|tx| tx.kind().is_treasury()) {
            return Err(rule_error(
                ErrorKind::TreasuryTxBeforeActivation,
                format!(
                    "block contains treasury transaction {} before the treasury agenda is active",
                    tx.hash()
                ),
            ));
        }
        return Ok(());
    }

    if stake.first().map(Transaction::kind) != Some(TxKind::Treasurybase) {
        return Err(rule_error(
            ErrorKind::FirstTxNotTreasurybase,
            "first transaction in stake tree is not a treasurybase",
        ));
    }
    if stake.iter().skip(1).any(|tx| tx.kind() == TxKind::Treasurybase) {
        return Err(rule_error(
            ErrorKind::MultipleTreasurybases,
            "block contains more than one treasurybase",
        ));
    }

    let tspends = stake.iter().filter(|tx| tx.kind() == TxKind::TreasurySpend).count();
    if tspends > 0 {
        let interval = params.treasury_vote_interval.max(1);
        if block.header.height % interval != 0 {
            return Err(rule_error(
                ErrorKind::NotTvi,
                format!(
                    "block at height {} contains treasury spends but is not on a treasury vote \
                     interval of {interval}",
                    block.header.height
                ),
            ));
        }
        if tspends > params.max_tspends_per_block {
            return Err(rule_error(
                ErrorKind::TooManyTSpends,
                format!(
                    "block contains {tspends} treasury spends, max {}",
                    params.max_tspends_per_block
                ),
            ));
        }
    }

    Ok(())
}
