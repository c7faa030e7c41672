//! Merkle commitments over transaction trees

use crate::hash::TxHash;
use crate::types::Transaction;

/// Merkle root of the given leaf hashes.
///
/// Odd levels pair the last node with itself. An empty tree commits to the
/// zero hash.
pub fn merkle_root(leaves: &[TxHash]) -> TxHash {
    if leaves.is_empty() {
        return TxHash::ZERO;
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => TxHash::digest_pair(left, right),
                [single] => TxHash::digest_pair(single, single),
                _ => unreachable!("chunks(2) yields one or two items"),
            })
            .collect();
    }
    level[0]
}

/// Merkle root of a transaction tree.
pub fn transactions_root(txs: &[Transaction]) -> TxHash {
    let leaves: Vec<TxHash> = txs.iter().map(Transaction::hash).collect();
    merkle_root(&leaves)
}
